//! Checkout migration and conflict detection
//!
//! Moving the working tree from one tree to another:
//!
//! 1. Take the file-level changes between the current and target trees
//! 2. Check each change against local modifications
//! 3. Plan file system operations (create, delete, modify)
//! 4. Apply them to the workspace, then to the index
//!
//! ## Conflict Detection
//!
//! - Stale files: the index or the working tree differs from both trees
//! - Stale directories: a directory with untracked files is in the way of a file
//! - Untracked overwrites: the target would overwrite an untracked file
//! - Untracked removals: the change would remove an untracked file
//!
//! Every conflict is found before anything is touched; the whole migration then
//! fails with `LocalChangesWouldBeOverwritten`.
//!
//! Gitlinks only ever move the pin and the directory: the content of a nested
//! repository is never checked out by its parent.

use crate::areas::index::Index;
use crate::areas::repository::Repository;
use crate::artifacts::checkout::conflict::{ConflictMessage, ConflictType};
use crate::artifacts::database::database_entry::DatabaseEntry;
use crate::artifacts::diff::tree_diff::{ChangeSet, TreeChangeType};
use crate::artifacts::index::index_entry::{EntryMetadata, IndexEntry};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::status::file_change::{IndexChangeType, WorkspaceChangeType};
use crate::artifacts::status::inspector::Inspector;
use crate::errors::RepositoryError;
use bytes::Bytes;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

/// Type of file system action required for checkout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ActionType {
    Add,
    Delete,
    Modify,
}

/// Planned actions grouped by type; deletions carry the entry being removed
pub type ActionsSet = BTreeMap<ActionType, Vec<(PathBuf, Option<DatabaseEntry>)>>;

pub type ConflictsSet = BTreeMap<ConflictType, BTreeSet<PathBuf>>;

pub struct Migration<'r> {
    repository: &'r Repository,
    changes: ChangeSet,
    index: &'r mut Index,
    inspector: Inspector<'r>,
    actions: ActionsSet,
    conflicts: ConflictsSet,
    mkdirs: BTreeSet<PathBuf>,
    rmdirs: BTreeSet<PathBuf>,
}

impl<'r> Migration<'r> {
    pub fn new(repository: &'r Repository, index: &'r mut Index, changes: ChangeSet) -> Self {
        Self {
            repository,
            changes,
            index,
            inspector: Inspector::new(repository),
            actions: ActionsSet::new(),
            conflicts: ConflictsSet::new(),
            mkdirs: BTreeSet::new(),
            rmdirs: BTreeSet::new(),
        }
    }

    pub fn actions(&self, action: ActionType) -> impl Iterator<Item = &(PathBuf, Option<DatabaseEntry>)> {
        self.actions.get(&action).into_iter().flatten()
    }

    pub fn mkdirs(&self) -> &BTreeSet<PathBuf> {
        &self.mkdirs
    }

    pub fn rmdirs(&self) -> &BTreeSet<PathBuf> {
        &self.rmdirs
    }

    pub fn apply_changes(&mut self) -> anyhow::Result<()> {
        self.plan_changes()?;
        self.repository.workspace().apply_migration(self)?;
        self.update_index()?;

        Ok(())
    }

    fn plan_changes(&mut self) -> anyhow::Result<()> {
        let changes = std::mem::take(&mut self.changes);

        for (path, change) in &changes {
            self.check_for_conflict(path, change)?;
            self.record_change(path, change);
        }

        if self.conflicts.is_empty() {
            return Ok(());
        }

        let message = self
            .conflicts
            .iter()
            .map(|(conflict_type, paths)| {
                let ConflictMessage { header, footer } = conflict_type.into();
                let paths = paths
                    .iter()
                    .map(|path| format!("\t{}", path.display()))
                    .collect::<Vec<_>>()
                    .join("\n");
                format!("error: {header}\n{paths}\n{footer}")
            })
            .collect::<Vec<_>>()
            .join("\n");
        let paths = self.conflicts.values().flatten().cloned().collect::<BTreeSet<_>>();

        Err(anyhow::Error::new(RepositoryError::LocalChangesWouldBeOverwritten {
            paths: paths.into_iter().collect(),
        })
        .context(format!("{message}\nAborting")))
    }

    fn record_conflict(&mut self, conflict_type: ConflictType, path: &Path) {
        self.conflicts
            .entry(conflict_type)
            .or_default()
            .insert(path.to_path_buf());
    }

    fn check_for_conflict(&mut self, path: &Path, change: &TreeChangeType) -> anyhow::Result<()> {
        let entry = self.index.entry_by_path(path).cloned();
        let entry = entry.as_ref();
        let (old_entry, new_entry) = (change.old_entry(), change.new_entry());

        if self.index_differs_from_trees(entry, old_entry, new_entry) {
            self.record_conflict(ConflictType::StaleFile, path);
            return Ok(());
        }

        let touches_gitlink = entry.is_some_and(IndexEntry::is_gitlink)
            || old_entry.is_some_and(DatabaseEntry::is_gitlink)
            || new_entry.is_some_and(DatabaseEntry::is_gitlink);
        if touches_gitlink {
            return Ok(());
        }

        let stat = self.repository.workspace().stat_file(path).ok();
        let conflict_type = ConflictType::classify(stat.as_ref(), entry, new_entry);

        match stat {
            Some(stat) if stat.mode.is_tree() => {
                if self.inspector.contains_untracked_files(path, self.index)? {
                    self.record_conflict(conflict_type, path);
                }
            }
            Some(stat) => {
                if self.inspector.check_index_against_workspace(entry, Some(&stat))?
                    != WorkspaceChangeType::None
                {
                    self.record_conflict(conflict_type, path);
                }
            }
            None => {
                if let Some(parent) = self.untracked_parent(path) {
                    let conflicting_path = if entry.is_some() { path } else { parent };
                    self.record_conflict(conflict_type, conflicting_path);
                }
            }
        }

        Ok(())
    }

    /// An untracked file sitting where one of the path's directories must go
    fn untracked_parent<'p>(&self, path: &'p Path) -> Option<&'p Path> {
        let workspace = self.repository.workspace();

        path.ancestors()
            .skip(1)
            .filter(|parent| !parent.as_os_str().is_empty())
            .find(|parent| {
                workspace.path().join(parent).is_file() && !self.index.is_directly_tracked(parent)
            })
    }

    fn index_differs_from_trees(
        &self,
        index_entry: Option<&IndexEntry>,
        old_entry: Option<&DatabaseEntry>,
        new_entry: Option<&DatabaseEntry>,
    ) -> bool {
        self.inspector
            .check_index_against_head_tree(index_entry, old_entry)
            != IndexChangeType::None
            && self
                .inspector
                .check_index_against_head_tree(index_entry, new_entry)
                != IndexChangeType::None
    }

    fn record_change(&mut self, path: &Path, change: &TreeChangeType) {
        let parents = path
            .ancestors()
            .skip(1)
            .filter(|ancestor| !ancestor.as_os_str().is_empty())
            .map(Path::to_path_buf);

        let (action, entry) = match change {
            TreeChangeType::Added(new) => {
                self.mkdirs.extend(parents);
                (ActionType::Add, new)
            }
            TreeChangeType::Deleted(old) => {
                self.rmdirs.extend(parents);
                (ActionType::Delete, old)
            }
            TreeChangeType::Modified { new, .. } => {
                self.mkdirs.extend(parents);
                (ActionType::Modify, new)
            }
        };

        self.actions
            .entry(action)
            .or_default()
            .push((path.to_path_buf(), Some(entry.clone())));
    }

    fn update_index(&mut self) -> anyhow::Result<()> {
        for (file_path, _) in self.actions.get(&ActionType::Delete).into_iter().flatten() {
            self.index.unstage(file_path);
        }

        let updates = [ActionType::Add, ActionType::Modify]
            .iter()
            .flat_map(|action| self.actions.get(action).into_iter().flatten())
            .cloned()
            .collect::<Vec<_>>();

        for (file_path, entry) in updates {
            let Some(entry) = entry else {
                anyhow::bail!("missing target entry for {:?}", file_path);
            };

            if entry.is_gitlink() {
                self.index.add(IndexEntry::gitlink(file_path, entry.oid));
                continue;
            }

            let stat = self.repository.workspace().stat_file(&file_path)?;
            self.index.add(IndexEntry::new(
                file_path,
                entry.oid,
                EntryMetadata {
                    mode: entry.mode,
                    ..stat
                },
            ));
        }

        Ok(())
    }

    pub fn load_blob_data(&self, object_id: &ObjectId) -> anyhow::Result<Bytes> {
        Ok(self
            .repository
            .database()
            .parse_object_as_blob(object_id)?
            .into_content())
    }
}
