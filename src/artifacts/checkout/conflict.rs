use crate::artifacts::database::database_entry::DatabaseEntry;
use crate::artifacts::index::index_entry::{EntryMetadata, IndexEntry};

/// Why moving a path to its target state would destroy local work
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ConflictType {
    /// A tracked file has edits that are in neither tree
    StaleFile,
    /// A directory with untracked content sits where a file must go
    StaleDirectory,
    UntrackedOverwritten,
    UntrackedRemoved,
}

impl ConflictType {
    pub fn classify(
        stat: Option<&EntryMetadata>,
        entry: Option<&IndexEntry>,
        target: Option<&DatabaseEntry>,
    ) -> ConflictType {
        match (entry, stat, target) {
            (Some(_), _, _) => ConflictType::StaleFile,
            (None, Some(stat), _) if stat.mode.is_tree() => ConflictType::StaleDirectory,
            (None, _, Some(_)) => ConflictType::UntrackedOverwritten,
            (None, _, None) => ConflictType::UntrackedRemoved,
        }
    }
}

/// Text around the list of paths reported for one kind of conflict
#[derive(Debug)]
pub struct ConflictMessage {
    pub header: &'static str,
    pub footer: &'static str,
}

impl From<&ConflictType> for ConflictMessage {
    fn from(conflict: &ConflictType) -> Self {
        let (header, footer) = match conflict {
            ConflictType::StaleFile => (
                "local changes to these files would be overwritten:",
                "commit or discard them first",
            ),
            ConflictType::StaleDirectory => (
                "untracked files in these directories would be lost:",
                "",
            ),
            ConflictType::UntrackedOverwritten => (
                "untracked files would be overwritten:",
                "move or remove them first",
            ),
            ConflictType::UntrackedRemoved => (
                "untracked files would be removed:",
                "move or remove them first",
            ),
        };

        ConflictMessage { header, footer }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::index::entry_mode::EntryMode;
    use crate::artifacts::objects::object_id::ObjectId;
    use std::path::PathBuf;

    #[test]
    fn tracked_paths_are_stale_files() {
        let entry = IndexEntry::new(
            PathBuf::from("a.txt"),
            ObjectId::hash(b"a"),
            EntryMetadata::default(),
        );

        assert_eq!(
            ConflictType::classify(None, Some(&entry), None),
            ConflictType::StaleFile
        );
    }

    #[test]
    fn untracked_directories_in_the_way_are_stale_directories() {
        let stat = EntryMetadata::from_mode(EntryMode::Directory);

        assert_eq!(
            ConflictType::classify(Some(&stat), None, None),
            ConflictType::StaleDirectory
        );
    }

    #[test]
    fn untracked_files_are_overwritten_or_removed() {
        let stat = EntryMetadata::default();
        let target = DatabaseEntry::new(ObjectId::hash(b"b"), EntryMode::default());

        assert_eq!(
            ConflictType::classify(Some(&stat), None, Some(&target)),
            ConflictType::UntrackedOverwritten
        );
        assert_eq!(
            ConflictType::classify(Some(&stat), None, None),
            ConflictType::UntrackedRemoved
        );
    }
}
