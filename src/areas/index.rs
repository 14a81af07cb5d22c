//! Index (staging area)
//!
//! The index records what the next commit will contain: one stage-0 entry per
//! tracked path, or up to three conflict stages (base, ours, theirs) for a path
//! left unmerged.
//!
//! ## Index File Format
//!
//! - Header: signature, version and entry count
//! - Entries: sorted by path then stage, each padded to 8 bytes
//! - Checksum: SHA-1 of everything before it, verified on load
//!
//! ## Data Structures
//!
//! - `entries`: entries keyed by `(path, stage)`
//! - `children`: directory paths mapped to the tracked paths below them

use crate::areas::database::Database;
use crate::artifacts::database::database_entry::DatabaseEntry;
use crate::artifacts::index::checksum::Checksum;
use crate::artifacts::index::index_entry::{
    ENTRY_BLOCK, ENTRY_MIN_SIZE, EntryMetadata, IndexEntry, Stage,
};
use crate::artifacts::index::index_header::IndexHeader;
use crate::artifacts::index::{HEADER_SIZE, SIGNATURE, VERSION};
use crate::artifacts::objects::blob::Blob;
use crate::artifacts::objects::object::{Object, Packable, Unpackable};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::tree::Tree;
use crate::errors::RepositoryError;
use anyhow::anyhow;
use bytes::Bytes;
use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct Index {
    /// Path to the index file (typically `.git/index`)
    path: Box<Path>,
    entries: BTreeMap<(PathBuf, Stage), IndexEntry>,
    children: BTreeMap<PathBuf, BTreeSet<PathBuf>>,
    header: IndexHeader,
    /// Set when entries differ from what was last loaded or written
    changed: bool,
}

impl Index {
    pub fn new(path: Box<Path>) -> Self {
        Index {
            path,
            entries: BTreeMap::new(),
            children: BTreeMap::new(),
            header: IndexHeader::empty(),
            changed: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_changed(&self) -> bool {
        self.changed
    }

    /// Stage-0 entry of a path
    pub fn entry_by_path(&self, path: &Path) -> Option<&IndexEntry> {
        self.entries.get(&(path.to_path_buf(), Stage::Merged))
    }

    /// All stages recorded for a path
    pub fn stages_of(&self, path: &Path) -> impl Iterator<Item = &IndexEntry> {
        self.entries
            .range((path.to_path_buf(), Stage::Merged)..=(path.to_path_buf(), Stage::Theirs))
            .map(|(_, entry)| entry)
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.children.clear();
        self.header = IndexHeader::empty();
        self.changed = false;
    }

    /// Load the index from disk under a shared lock
    ///
    /// A missing or empty file is an empty index. A checksum mismatch is an
    /// error, never a silently emptied index.
    pub fn rehydrate(&mut self) -> anyhow::Result<()> {
        self.clear();

        if !self.path().exists() {
            return Ok(());
        }

        let mut index_file = std::fs::OpenOptions::new().read(true).open(self.path())?;
        let lock = file_guard::lock(&mut index_file, file_guard::Lock::Shared, 0, 1)?;

        if lock.metadata()?.len() == 0 {
            return Ok(());
        }

        let mut reader = Checksum::new(lock);
        let entries_count = self.parse_header(&mut reader)?;
        self.parse_entries(entries_count, &mut reader)?;

        reader.verify()?;
        self.changed = false;

        Ok(())
    }

    fn parse_header(&self, reader: &mut Checksum) -> anyhow::Result<u32> {
        let header_bytes = reader.read_block(HEADER_SIZE)?;
        let header = IndexHeader::deserialize(std::io::Cursor::new(header_bytes))?;

        if header.marker != SIGNATURE {
            return Err(anyhow!("Invalid index file signature"));
        }

        if header.version != VERSION {
            return Err(anyhow!(
                "Unsupported index file version: {}",
                header.version
            ));
        }

        Ok(header.entries_count)
    }

    /// Entries are variable length: read blocks until the NUL-padded tail.
    fn parse_entries(&mut self, entries_count: u32, reader: &mut Checksum) -> anyhow::Result<()> {
        for _ in 0..entries_count {
            let mut entry_bytes = reader.read_block(ENTRY_MIN_SIZE)?.to_vec();

            while entry_bytes.last() != Some(&0) {
                entry_bytes.extend_from_slice(&reader.read_block(ENTRY_BLOCK)?);
            }

            let entry = IndexEntry::deserialize(std::io::Cursor::new(entry_bytes))?;
            self.store_entry(entry);
        }

        self.header.entries_count = entries_count;

        Ok(())
    }

    /// Drop entries that cannot coexist with `entry`
    ///
    /// Parents tracked as files, tracked children of a path becoming a file,
    /// and every other stage of the same path.
    fn discard_conflicts(&mut self, entry: &IndexEntry) {
        for parent in entry.parent_dirs() {
            self.remove_path(parent);
        }
        self.remove_children(&entry.name);
        self.remove_path(&entry.name);
    }

    fn store_entry(&mut self, entry: IndexEntry) {
        for parent in entry.parent_dirs() {
            self.children
                .entry(parent.to_path_buf())
                .or_default()
                .insert(entry.name.clone());
        }

        self.entries
            .insert((entry.name.clone(), entry.stage), entry);
    }

    fn remove_children(&mut self, path_name: &Path) {
        if let Some(children) = self.children.remove(path_name) {
            for child in children {
                self.remove_path(&child);
            }
        }
    }

    /// Remove every stage of exactly `path_name`
    fn remove_path(&mut self, path_name: &Path) {
        let stages = self
            .stages_of(path_name)
            .map(|entry| (entry.name.clone(), entry.stage))
            .collect::<Vec<_>>();
        if stages.is_empty() {
            return;
        }

        for key in stages {
            self.entries.remove(&key);
        }

        for parent in path_name.ancestors().skip(1) {
            if let Some(children) = self.children.get_mut(parent) {
                children.remove(path_name);
                if children.is_empty() {
                    self.children.remove(parent);
                }
            }
        }
    }

    /// Upsert a stage-0 entry, resolving any conflict on its path
    pub fn add(&mut self, entry: IndexEntry) {
        let entry = IndexEntry {
            stage: Stage::Merged,
            ..entry
        };
        self.discard_conflicts(&entry);
        self.store_entry(entry);

        self.changed = true;
    }

    /// Record the sides of an unmerged path
    pub fn add_conflict(
        &mut self,
        path: &Path,
        base: Option<DatabaseEntry>,
        ours: Option<DatabaseEntry>,
        theirs: Option<DatabaseEntry>,
    ) {
        self.remove_children(path);
        self.remove_path(path);

        for (stage, side) in [(Stage::Base, base), (Stage::Ours, ours), (Stage::Theirs, theirs)] {
            if let Some(side) = side {
                self.store_entry(IndexEntry::conflicted(path.to_path_buf(), side, stage));
            }
        }

        self.changed = true;
    }

    /// Store `content` as a blob and stage it at `path`
    pub fn stage(
        &mut self,
        database: &Database,
        path: &Path,
        content: Bytes,
        metadata: EntryMetadata,
    ) -> anyhow::Result<IndexEntry> {
        let oid = database.store(&Blob::new(content))?;
        let entry = IndexEntry::new(path.to_path_buf(), oid, metadata);
        self.add(entry.clone());

        Ok(entry)
    }

    /// Untrack a path, or everything tracked below it when it is a directory
    pub fn unstage(&mut self, path: &Path) {
        self.remove_path(path);
        self.remove_children(path);

        self.changed = true;
    }

    pub fn write_updates(&mut self) -> anyhow::Result<()> {
        let mut index_file = std::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(self.path())?;
        let lock = file_guard::lock(&mut index_file, file_guard::Lock::Exclusive, 0, 1)?;
        lock.set_len(0)?;

        let mut writer = Checksum::new(lock);

        self.header = IndexHeader {
            entries_count: self.entries.len() as u32,
            ..self.header.clone()
        };
        writer.write_all(&self.header.serialize()?)?;

        for entry in self.entries.values() {
            writer.write_all(&entry.serialize()?)?;
        }

        writer.finish()?;
        self.changed = false;

        Ok(())
    }

    pub fn update_entry_stat(&mut self, path: &Path, stat: EntryMetadata) {
        if let Some(existing_entry) = self.entries.get_mut(&(path.to_path_buf(), Stage::Merged)) {
            existing_entry.metadata = stat;
            self.changed = true;
        }
    }

    /// Every entry, sorted by path then stage
    pub fn entries(&self) -> impl Iterator<Item = &IndexEntry> {
        self.entries.values()
    }

    pub fn merged_entries(&self) -> impl Iterator<Item = &IndexEntry> {
        self.entries().filter(|entry| !entry.stage.is_conflict())
    }

    pub fn conflicted_paths(&self) -> Vec<PathBuf> {
        self.entries()
            .filter(|entry| entry.stage.is_conflict())
            .map(|entry| entry.name.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn has_conflicts(&self) -> bool {
        self.entries().any(|entry| entry.stage.is_conflict())
    }

    /// A path is tracked when it has entries or tracked children.
    pub fn is_directly_tracked(&self, path: &Path) -> bool {
        self.stages_of(path).next().is_some() || self.children.contains_key(path)
    }

    /// The gitlink entry at or above `path`, if the path lies in a nested repository
    pub fn gitlink_containing(&self, path: &Path) -> Option<&IndexEntry> {
        path.ancestors()
            .filter(|ancestor| !ancestor.as_os_str().is_empty())
            .filter_map(|ancestor| self.entry_by_path(ancestor))
            .find(|entry| entry.is_gitlink())
    }

    pub fn entries_under_path(&self, path: &Path) -> Vec<PathBuf> {
        self.entries
            .keys()
            .filter(|(entry_path, _)| path == Path::new(".") || entry_path.starts_with(path))
            .map(|(entry_path, _)| entry_path.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Store the trees for the stage-0 entries and return the root tree id
    ///
    /// Fails with `UnresolvedConflict` while any path is unmerged.
    pub fn build_tree(&self, database: &Database) -> anyhow::Result<ObjectId> {
        let conflicts = self.conflicted_paths();
        if !conflicts.is_empty() {
            return Err(RepositoryError::UnresolvedConflict { paths: conflicts }.into());
        }

        let tree = Tree::build(
            self.merged_entries()
                .map(|entry| (entry.name.as_path(), entry.as_database_entry())),
        )?;
        tree.traverse(&|tree| database.store(tree).map(|_| ()))?;

        tree.object_id()
    }
}
