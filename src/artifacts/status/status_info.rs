use crate::areas::index::Index;
use crate::areas::repository::Repository;
use crate::artifacts::database::database_entry::DatabaseEntry;
use crate::artifacts::index::index_entry::{EntryMetadata, IndexEntry};
use crate::artifacts::status::file_change::{FileChange, IndexChangeType, WorkspaceChangeType};
use crate::artifacts::status::inspector::Inspector;
use derive_new::new;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

pub type FileStatSet = BTreeMap<PathBuf, EntryMetadata>;
pub type FileSet = BTreeSet<PathBuf>;
pub type HeadTree = BTreeMap<PathBuf, DatabaseEntry>;

/// Three-way comparison of HEAD's tree, the index and the working tree
///
/// - `added`, `modified`, `removed`: index against HEAD
/// - `changed_in_workspace`, `missing`: working tree against index
/// - `untracked`: working tree paths absent from the index, directories once
///   with a trailing `/`
/// - `conflicting`: paths with unmerged stages
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusReport {
    pub added: FileSet,
    pub modified: FileSet,
    pub removed: FileSet,
    pub untracked: FileSet,
    pub changed_in_workspace: FileSet,
    pub missing: FileSet,
    pub conflicting: FileSet,
}

impl StatusReport {
    pub fn has_staged_changes(&self) -> bool {
        !(self.added.is_empty() && self.modified.is_empty() && self.removed.is_empty())
    }

    pub fn has_workspace_changes(&self) -> bool {
        !(self.changed_in_workspace.is_empty() && self.missing.is_empty())
    }

    /// No staged, unstaged or unmerged changes; untracked files do not count
    pub fn is_clean(&self) -> bool {
        !self.has_staged_changes() && !self.has_workspace_changes() && self.conflicting.is_empty()
    }

    /// Per-path two-letter codes for every tracked change, sorted by path
    pub fn changes(&self) -> BTreeMap<PathBuf, FileChange> {
        let mut changes = BTreeMap::<PathBuf, FileChange>::new();

        let index_sides = [
            (&self.added, IndexChangeType::Added),
            (&self.modified, IndexChangeType::Modified),
            (&self.removed, IndexChangeType::Deleted),
            (&self.conflicting, IndexChangeType::Unmerged),
        ];
        for (paths, change) in index_sides {
            for path in paths {
                changes.entry(path.clone()).or_default().index_change = change;
            }
        }

        let workspace_sides = [
            (&self.changed_in_workspace, WorkspaceChangeType::Modified),
            (&self.missing, WorkspaceChangeType::Deleted),
        ];
        for (paths, change) in workspace_sides {
            for path in paths {
                changes.entry(path.clone()).or_default().workspace_change = change;
            }
        }

        changes
    }
}

#[derive(new)]
pub struct Status<'r> {
    repository: &'r Repository,
}

impl<'r> Status<'r> {
    /// Build the report, refreshing cached stat data of unchanged entries
    pub fn initialize(&self, index: &mut Index) -> anyhow::Result<StatusReport> {
        let mut report = StatusReport::default();
        let mut file_stats = FileStatSet::new();
        let inspector = Inspector::new(self.repository);

        self.scan_workspace(None, &mut report.untracked, &mut file_stats, index, &inspector)?;
        let head_tree = self.load_head_tree()?;

        report.conflicting = index.conflicted_paths().into_iter().collect();

        let index_entries = index.merged_entries().cloned().collect::<Vec<_>>();
        for entry in index_entries {
            self.check_index_entry_against_workspace(
                &entry,
                &file_stats,
                index,
                &inspector,
                &mut report,
            )?;
            self.check_index_entry_against_head_tree(&entry, &head_tree, &inspector, &mut report);
        }

        for path in head_tree.keys() {
            if index.stages_of(path).next().is_none() {
                report.removed.insert(path.clone());
            }
        }

        Ok(report)
    }

    fn scan_workspace(
        &self,
        prefix_path: Option<&Path>,
        untracked_files: &mut FileSet,
        file_stats: &mut FileStatSet,
        index: &Index,
        inspector: &Inspector<'_>,
    ) -> anyhow::Result<()> {
        let workspace = self.repository.workspace();

        for path in workspace.list_dir(prefix_path)? {
            let is_dir = workspace.path().join(&path).is_dir();
            let is_gitlink = index.entry_by_path(&path).is_some_and(IndexEntry::is_gitlink);

            if index.is_directly_tracked(&path) {
                if is_dir && !is_gitlink {
                    self.scan_workspace(Some(&path), untracked_files, file_stats, index, inspector)?;
                } else {
                    file_stats.insert(path.clone(), workspace.stat_file(&path)?);
                }
            } else if inspector.contains_untracked_files(&path, index)? {
                let path = if is_dir { path.join("") } else { path };
                untracked_files.insert(path);
            }
        }

        Ok(())
    }

    fn load_head_tree(&self) -> anyhow::Result<HeadTree> {
        let head = self.repository.refs().read_head()?;

        self.repository.database().commit_files(head.as_ref())
    }

    fn check_index_entry_against_workspace(
        &self,
        index_entry: &IndexEntry,
        file_stats: &FileStatSet,
        index: &mut Index,
        inspector: &Inspector<'_>,
        report: &mut StatusReport,
    ) -> anyhow::Result<()> {
        let stat = file_stats.get(&index_entry.name);

        match inspector.check_index_against_workspace(Some(index_entry), stat)? {
            WorkspaceChangeType::Modified => {
                report.changed_in_workspace.insert(index_entry.name.clone());
            }
            WorkspaceChangeType::Deleted => {
                report.missing.insert(index_entry.name.clone());
            }
            WorkspaceChangeType::None | WorkspaceChangeType::Untracked => {
                if let Some(stat) = stat
                    && !index_entry.is_gitlink()
                    && index_entry.metadata != *stat
                {
                    index.update_entry_stat(&index_entry.name, stat.clone());
                }
            }
        }

        Ok(())
    }

    fn check_index_entry_against_head_tree(
        &self,
        index_entry: &IndexEntry,
        head_tree: &HeadTree,
        inspector: &Inspector<'_>,
        report: &mut StatusReport,
    ) {
        let head_entry = head_tree.get(&index_entry.name);

        match inspector.check_index_against_head_tree(Some(index_entry), head_entry) {
            IndexChangeType::Added => {
                report.added.insert(index_entry.name.clone());
            }
            IndexChangeType::Modified => {
                report.modified.insert(index_entry.name.clone());
            }
            _ => {}
        }
    }
}
