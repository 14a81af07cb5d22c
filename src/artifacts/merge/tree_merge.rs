//! Three-way merge of flattened trees
//!
//! Every path is resolved on its own from its base, ours and theirs entries:
//!
//! | base | ours | theirs | result |
//! |------|------|--------|--------|
//! | x    | x    | y      | y      |
//! | x    | y    | x      | y      |
//! | any  | y    | y      | y      |
//! | x    | y    | z      | conflict |
//!
//! A missing entry takes part like any other value, so a deletion on one side
//! against an untouched other side is a clean deletion. Content is never merged
//! line by line: two different edits of the same path are a conflict.

use crate::areas::database::Database;
use crate::artifacts::database::database_entry::DatabaseEntry;
use crate::artifacts::objects::object::Object;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::tree::Tree;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

pub type FlatTree = BTreeMap<PathBuf, DatabaseEntry>;

/// The three sides of a path the merge could not resolve
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictSides {
    pub base: Option<DatabaseEntry>,
    pub ours: Option<DatabaseEntry>,
    pub theirs: Option<DatabaseEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreeMerge {
    pub merged: FlatTree,
    pub conflicts: BTreeMap<PathBuf, ConflictSides>,
}

impl TreeMerge {
    pub fn merge(base: &FlatTree, ours: &FlatTree, theirs: &FlatTree) -> Self {
        let paths = base
            .keys()
            .chain(ours.keys())
            .chain(theirs.keys())
            .collect::<BTreeSet<_>>();
        let mut result = TreeMerge::default();

        for path in paths {
            let (base_entry, our_entry, their_entry) =
                (base.get(path), ours.get(path), theirs.get(path));

            let resolved = if our_entry == their_entry || base_entry == their_entry {
                our_entry
            } else if base_entry == our_entry {
                their_entry
            } else {
                result.conflicts.insert(
                    path.clone(),
                    ConflictSides {
                        base: base_entry.cloned(),
                        ours: our_entry.cloned(),
                        theirs: their_entry.cloned(),
                    },
                );
                continue;
            };

            if let Some(entry) = resolved {
                result.merged.insert(path.clone(), entry.clone());
            }
        }

        result.flag_file_directory_clashes(ours, theirs);
        result
    }

    /// A file on one side where the other side put a directory
    fn flag_file_directory_clashes(&mut self, ours: &FlatTree, theirs: &FlatTree) {
        let clashing = self
            .merged
            .keys()
            .filter(|path| {
                self.merged
                    .range::<Path, _>((
                        std::ops::Bound::Excluded(path.as_path()),
                        std::ops::Bound::Unbounded,
                    ))
                    .next()
                    .is_some_and(|(next, _)| next.starts_with(path))
            })
            .cloned()
            .collect::<Vec<_>>();

        for path in clashing {
            self.merged.remove(&path);
            self.conflicts.insert(
                path.clone(),
                ConflictSides {
                    base: None,
                    ours: ours.get(&path).cloned(),
                    theirs: theirs.get(&path).cloned(),
                },
            );
        }
    }

    pub fn is_clean(&self) -> bool {
        self.conflicts.is_empty()
    }

    pub fn conflicted_paths(&self) -> Vec<PathBuf> {
        self.conflicts.keys().cloned().collect()
    }

    /// Store the merged tree, with `ours` standing in for every conflicted path
    pub fn write_tree(&self, database: &Database) -> anyhow::Result<ObjectId> {
        let entries = self
            .merged
            .iter()
            .map(|(path, entry)| (path.as_path(), entry.clone()))
            .chain(self.conflicts.iter().filter_map(|(path, sides)| {
                sides.ours.clone().map(|entry| (path.as_path(), entry))
            }))
            .collect::<BTreeMap<_, _>>();

        let tree = Tree::build(entries)?;
        tree.traverse(&|tree| database.store(tree).map(|_| ()))?;

        tree.object_id()
    }
}

impl Database {
    /// Merge the trees of three commits; `base` is absent for unrelated histories
    pub fn merge_commits(
        &self,
        base: Option<&ObjectId>,
        ours: &ObjectId,
        theirs: &ObjectId,
    ) -> anyhow::Result<TreeMerge> {
        let base = self.commit_files(base)?;
        let ours = self.commit_files(Some(ours))?;
        let theirs = self.commit_files(Some(theirs))?;

        Ok(TreeMerge::merge(&base, &ours, &theirs))
    }
}
