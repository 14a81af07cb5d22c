use crate::areas::index::Index;
use crate::areas::refs::Refs;
use crate::areas::repository::Repository;
use crate::artifacts::database::database_entry::DatabaseEntry;
use crate::artifacts::index::index_entry::{EntryMetadata, IndexEntry};
use crate::artifacts::objects::object::Object;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::status::file_change::{IndexChangeType, WorkspaceChangeType};
use derive_new::new;
use std::path::Path;

/// Compares index entries with the working tree and with HEAD's tree
#[derive(new)]
pub struct Inspector<'r> {
    repository: &'r Repository,
}

impl<'r> Inspector<'r> {
    /// Whether `path` is, or contains, a file the index does not track
    ///
    /// Empty directories contain nothing worth reporting. A nested repository
    /// counts as content of its own.
    pub fn contains_untracked_files(&self, path: &Path, index: &Index) -> anyhow::Result<bool> {
        let workspace = self.repository.workspace();

        if index.is_directly_tracked(path) && !workspace.path().join(path).is_dir() {
            return Ok(false);
        }
        if !workspace.path().join(path).is_dir() || workspace.is_nested_repository(path) {
            return Ok(!index.is_directly_tracked(path));
        }

        for child in workspace.list_dir(Some(path))? {
            if self.contains_untracked_files(&child, index)? {
                return Ok(true);
            }
        }

        Ok(false)
    }

    /// HEAD of the repository nested at `path`, if there is one
    pub fn nested_head(&self, path: &Path) -> anyhow::Result<Option<ObjectId>> {
        let workspace = self.repository.workspace();
        if !workspace.is_nested_repository(path) {
            return Ok(None);
        }

        let git_path = workspace.path().join(path).join(".git");
        Refs::new(git_path.into_boxed_path()).read_head()
    }

    fn is_content_changed(&self, index_entry: &IndexEntry) -> anyhow::Result<bool> {
        if index_entry.is_gitlink() {
            let head = self.nested_head(&index_entry.name)?;
            return Ok(head.is_some_and(|head| head != index_entry.oid));
        }

        let blob = self.repository.workspace().parse_blob(&index_entry.name)?;

        Ok(blob.object_id()? != index_entry.oid)
    }

    pub fn check_index_against_workspace(
        &self,
        entry: Option<&IndexEntry>,
        stat: Option<&EntryMetadata>,
    ) -> anyhow::Result<WorkspaceChangeType> {
        match (entry, stat) {
            (None, _) => Ok(WorkspaceChangeType::Untracked),
            (Some(_), None) => Ok(WorkspaceChangeType::Deleted),
            (Some(entry), Some(_)) if entry.is_gitlink() => {
                if self.is_content_changed(entry)? {
                    Ok(WorkspaceChangeType::Modified)
                } else {
                    Ok(WorkspaceChangeType::None)
                }
            }
            (Some(entry), Some(stat)) if !entry.stat_match(stat) => {
                Ok(WorkspaceChangeType::Modified)
            }
            (Some(entry), Some(stat)) if entry.times_match(stat) => Ok(WorkspaceChangeType::None),
            (Some(entry), Some(_)) if self.is_content_changed(entry)? => {
                Ok(WorkspaceChangeType::Modified)
            }
            _ => Ok(WorkspaceChangeType::None),
        }
    }

    pub fn check_index_against_head_tree(
        &self,
        index_entry: Option<&IndexEntry>,
        head_entry: Option<&DatabaseEntry>,
    ) -> IndexChangeType {
        match (index_entry, head_entry) {
            (Some(index_entry), Some(head_entry))
                if head_entry.mode != index_entry.mode() || head_entry.oid != index_entry.oid =>
            {
                IndexChangeType::Modified
            }
            (Some(_), None) => IndexChangeType::Added,
            (None, Some(_)) => IndexChangeType::Deleted,
            _ => IndexChangeType::None,
        }
    }
}
