//! Index entry representation
//!
//! Each entry in the index represents a tracked path with:
//! - File path
//! - Content hash (object ID)
//! - Merge stage (0 when merged, 1-3 for the sides of a conflict)
//! - File metadata (mode, size, timestamps)
//!
//! ## Entry Format
//!
//! Entries are stored in a binary format with 8-byte alignment. The 16-bit
//! flags field holds the path length in its low 12 bits and the stage in
//! bits 12-13.

use crate::artifacts::database::database_entry::DatabaseEntry;
use crate::artifacts::index::entry_mode::{EntryMode, FileMode};
use crate::artifacts::objects::object::{Packable, Unpackable};
use crate::artifacts::objects::object_id::ObjectId;
use bitflags::bitflags;
use byteorder::{ByteOrder, NetworkEndian, WriteBytesExt};
use bytes::Bytes;
use derive_new::new;
use is_executable::IsExecutable;
use std::fs::Metadata;
use std::io::{BufRead, Write};
use std::os::unix::prelude::MetadataExt;
use std::path::{Path, PathBuf};

/// Block size for entry alignment (8 bytes)
pub const ENTRY_BLOCK: usize = 8;

/// Minimum size of an index entry in bytes
pub const ENTRY_MIN_SIZE: usize = 64;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct EntryFlags: u16 {
        const ASSUME_VALID = 0x8000;
        const EXTENDED = 0x4000;
        const STAGE = 0x3000;
        const NAME_LENGTH = 0x0fff;
    }
}

/// Merge stage of an index entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Stage {
    #[default]
    Merged = 0,
    Base = 1,
    Ours = 2,
    Theirs = 3,
}

impl Stage {
    pub fn is_conflict(&self) -> bool {
        *self != Stage::Merged
    }

    fn from_flags(flags: EntryFlags) -> Self {
        match (flags & EntryFlags::STAGE).bits() >> 12 {
            1 => Stage::Base,
            2 => Stage::Ours,
            3 => Stage::Theirs,
            _ => Stage::Merged,
        }
    }
}

#[derive(Debug, Clone, Default, new)]
pub struct IndexEntry {
    /// File path relative to repository root
    pub name: PathBuf,
    pub oid: ObjectId,
    pub metadata: EntryMetadata,
    #[new(default)]
    pub stage: Stage,
}

impl IndexEntry {
    /// Entry for a conflicted path, written by merges
    pub fn conflicted(name: PathBuf, entry: DatabaseEntry, stage: Stage) -> Self {
        IndexEntry {
            name,
            oid: entry.oid,
            metadata: EntryMetadata::from_mode(entry.mode),
            stage,
        }
    }

    /// Entry pinning a nested repository at `commit`
    pub fn gitlink(name: PathBuf, commit: ObjectId) -> Self {
        IndexEntry::new(name, commit, EntryMetadata::from_mode(EntryMode::Gitlink))
    }

    pub fn basename(&self) -> anyhow::Result<&str> {
        self.name
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| anyhow::anyhow!("Invalid file name"))
    }

    /// Ancestor directories, outermost first
    pub fn parent_dirs(&self) -> Vec<&Path> {
        let mut dirs = self
            .name
            .ancestors()
            .skip(1)
            .filter(|parent| !parent.as_os_str().is_empty())
            .collect::<Vec<_>>();
        dirs.reverse();

        dirs
    }

    pub fn mode(&self) -> EntryMode {
        self.metadata.mode
    }

    pub fn is_gitlink(&self) -> bool {
        self.metadata.mode.is_gitlink()
    }

    pub fn as_database_entry(&self) -> DatabaseEntry {
        DatabaseEntry::new(self.oid.clone(), self.metadata.mode)
    }

    pub fn stat_match(&self, other: &EntryMetadata) -> bool {
        (self.metadata.size == 0 || self.metadata.size == other.size)
            && self.metadata.mode == other.mode
    }

    pub fn times_match(&self, other: &EntryMetadata) -> bool {
        self.metadata.ctime == other.ctime
            && self.metadata.ctime_nsec == other.ctime_nsec
            && self.metadata.mtime == other.mtime
            && self.metadata.mtime_nsec == other.mtime_nsec
    }

    fn flags(&self, name_length: usize) -> EntryFlags {
        let name_length = name_length.min(EntryFlags::NAME_LENGTH.bits() as usize) as u16;
        EntryFlags::from_bits_retain(name_length | ((self.stage as u16) << 12))
    }
}

impl PartialEq for IndexEntry {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.stage == other.stage
    }
}

impl Eq for IndexEntry {}

impl PartialOrd for IndexEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for IndexEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (&self.name, self.stage).cmp(&(&other.name, other.stage))
    }
}

/// Stat information cached for fast change detection
///
/// - `ctime`: inode change time
/// - `mtime`: content modification time
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryMetadata {
    pub ctime: i64,
    pub ctime_nsec: i64,
    pub mtime: i64,
    pub mtime_nsec: i64,
    pub dev: u64,
    pub ino: u64,
    pub mode: EntryMode,
    pub uid: u32,
    pub gid: u32,
    pub size: u64,
}

impl EntryMetadata {
    /// Metadata carrying only a mode, for entries with no file of their own
    pub fn from_mode(mode: EntryMode) -> Self {
        EntryMetadata {
            mode,
            ..Default::default()
        }
    }
}

impl Packable for IndexEntry {
    fn serialize(&self) -> anyhow::Result<Bytes> {
        let entry_name = self
            .name
            .to_str()
            .ok_or_else(|| anyhow::anyhow!("Invalid entry name"))?;

        let mut entry_bytes = Vec::new();
        entry_bytes.write_u32::<NetworkEndian>(self.metadata.ctime as u32)?;
        entry_bytes.write_u32::<NetworkEndian>(self.metadata.ctime_nsec as u32)?;
        entry_bytes.write_u32::<NetworkEndian>(self.metadata.mtime as u32)?;
        entry_bytes.write_u32::<NetworkEndian>(self.metadata.mtime_nsec as u32)?;
        entry_bytes.write_u32::<NetworkEndian>(self.metadata.dev as u32)?;
        entry_bytes.write_u32::<NetworkEndian>(self.metadata.ino as u32)?;
        entry_bytes.write_u32::<NetworkEndian>(self.metadata.mode.as_u32())?;
        entry_bytes.write_u32::<NetworkEndian>(self.metadata.uid)?;
        entry_bytes.write_u32::<NetworkEndian>(self.metadata.gid)?;
        entry_bytes.write_u32::<NetworkEndian>(self.metadata.size as u32)?;
        self.oid.write_h40_to(&mut entry_bytes)?;
        entry_bytes.write_u16::<NetworkEndian>(self.flags(entry_name.len()).bits())?;
        entry_bytes.write_all(entry_name.as_bytes())?;

        // at least one NUL terminates the name, then pad to the block size
        entry_bytes.push(0);
        while entry_bytes.len() % ENTRY_BLOCK != 0 {
            entry_bytes.push(0);
        }

        Ok(Bytes::from(entry_bytes))
    }
}

impl Unpackable for IndexEntry {
    fn deserialize(mut reader: impl BufRead) -> anyhow::Result<Self> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;

        if bytes.len() < ENTRY_MIN_SIZE {
            return Err(anyhow::anyhow!("Invalid index entry size"));
        }

        let read_u32 = |offset: usize| NetworkEndian::read_u32(&bytes[offset..offset + 4]);

        let mode = EntryMode::try_from(read_u32(24))?;
        let oid = ObjectId::read_h40_from(&mut std::io::Cursor::new(&bytes[40..60]))?;
        let flags = EntryFlags::from_bits_retain(NetworkEndian::read_u16(&bytes[60..62]));

        let name_end = bytes[62..]
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| anyhow::anyhow!("Missing null terminator in entry name"))?;
        let name = std::str::from_utf8(&bytes[62..62 + name_end])
            .map_err(|_| anyhow::anyhow!("Invalid UTF-8 in entry name"))?;

        Ok(IndexEntry {
            name: PathBuf::from(name),
            oid,
            metadata: EntryMetadata {
                ctime: read_u32(0) as i64,
                ctime_nsec: read_u32(4) as i64,
                mtime: read_u32(8) as i64,
                mtime_nsec: read_u32(12) as i64,
                dev: read_u32(16) as u64,
                ino: read_u32(20) as u64,
                mode,
                uid: read_u32(28),
                gid: read_u32(32),
                size: read_u32(36) as u64,
            },
            stage: Stage::from_flags(flags),
        })
    }
}

impl TryFrom<(&Path, Metadata)> for EntryMetadata {
    type Error = anyhow::Error;

    fn try_from((file_path, metadata): (&Path, Metadata)) -> Result<Self, Self::Error> {
        let mode = if metadata.is_dir() {
            EntryMode::Directory
        } else if file_path.is_executable() {
            EntryMode::File(FileMode::Executable)
        } else {
            EntryMode::File(FileMode::Regular)
        };

        Ok(Self {
            ctime: metadata.ctime(),
            ctime_nsec: metadata.ctime_nsec(),
            mtime: metadata.mtime(),
            mtime_nsec: metadata.mtime_nsec(),
            dev: metadata.dev(),
            ino: metadata.ino(),
            mode,
            uid: metadata.uid(),
            gid: metadata.gid(),
            size: metadata.size(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};

    #[fixture]
    fn oid() -> ObjectId {
        ObjectId::hash(b"test data")
    }

    #[rstest]
    fn test_entry_parent_dirs(oid: ObjectId) {
        let entry = IndexEntry::new(PathBuf::from("a/b/c"), oid, EntryMetadata::default());

        pretty_assertions::assert_eq!(
            entry.parent_dirs(),
            vec![Path::new("a"), Path::new("a/b")]
        );
    }

    #[rstest]
    fn test_entry_parent_dirs_root(oid: ObjectId) {
        let entry = IndexEntry::new(PathBuf::from("a"), oid, EntryMetadata::default());

        pretty_assertions::assert_eq!(entry.parent_dirs(), Vec::<&Path>::new());
    }

    #[rstest]
    #[case(Stage::Merged)]
    #[case(Stage::Base)]
    #[case(Stage::Ours)]
    #[case(Stage::Theirs)]
    fn stage_is_kept_in_the_flag_bits(oid: ObjectId, #[case] stage: Stage) {
        let entry = IndexEntry::conflicted(
            PathBuf::from("src/lib.rs"),
            DatabaseEntry::new(oid, EntryMode::File(FileMode::Regular)),
            stage,
        );

        let bytes = entry.serialize().unwrap();
        assert_eq!(bytes.len() % ENTRY_BLOCK, 0);

        let parsed = IndexEntry::deserialize(std::io::Cursor::new(bytes)).unwrap();
        assert_eq!(parsed.stage, stage);
        assert_eq!(parsed.name, PathBuf::from("src/lib.rs"));
    }

    #[rstest]
    fn gitlink_entries_carry_no_stat(oid: ObjectId) {
        let entry = IndexEntry::gitlink(PathBuf::from("recipes-common"), oid);

        assert!(entry.is_gitlink());
        assert_eq!(entry.metadata.size, 0);
        assert_eq!(entry.metadata.mode.as_u32(), 0o160000);
    }
}
