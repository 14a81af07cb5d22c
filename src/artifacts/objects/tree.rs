//! Tree object
//!
//! Trees are directory snapshots: named entries pointing at blobs, subtrees or
//! (for gitlinks) commits of nested repositories.
//!
//! ## Format
//!
//! On disk: `tree <size>\0<entries>`
//! Each entry: `<mode> <name>\0<20-byte-sha1>`
//!
//! ## Ordering
//!
//! Entries are sorted byte-wise with directory names compared as if they ended
//! in `/`. Keys of directory entries carry that trailing slash in memory so a
//! plain `BTreeMap` yields the canonical order.

use crate::artifacts::database::database_entry::DatabaseEntry;
use crate::artifacts::index::entry_mode::EntryMode;
use crate::artifacts::objects::object::{Object, Packable, Unpackable, frame};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use anyhow::Context;
use bytes::Bytes;
use std::collections::BTreeMap;
use std::io::{BufRead, Write};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
enum TreeEntry {
    /// Blob, gitlink or an already stored subtree
    Leaf(DatabaseEntry),
    /// Subtree being built
    Directory(Tree),
}

impl TreeEntry {
    fn mode(&self) -> EntryMode {
        match self {
            TreeEntry::Leaf(entry) => entry.mode,
            TreeEntry::Directory(_) => EntryMode::Directory,
        }
    }

    fn oid(&self) -> anyhow::Result<ObjectId> {
        match self {
            TreeEntry::Leaf(entry) => Ok(entry.oid.clone()),
            TreeEntry::Directory(tree) => tree.object_id(),
        }
    }
}

/// Reject names that would escape their directory or reach into `.git`
pub fn validate_entry_name(name: &str) -> anyhow::Result<()> {
    let reserved = name.is_empty()
        || name == "."
        || name == ".."
        || name.eq_ignore_ascii_case(".git")
        || name.contains(['/', '\\', '\0']);
    if reserved {
        anyhow::bail!("invalid tree entry name {name:?}");
    }

    Ok(())
}

fn sort_key(name: &str, mode: EntryMode) -> String {
    match mode {
        EntryMode::Directory => format!("{name}/"),
        _ => name.to_string(),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tree {
    entries: BTreeMap<String, TreeEntry>,
}

impl Tree {
    /// Build a tree hierarchy from flat `(path, entry)` pairs
    ///
    /// Intermediate directories are created as needed. Two entries claiming the
    /// same name (including a file and a directory) are rejected.
    pub fn build<'p>(
        entries: impl IntoIterator<Item = (&'p Path, DatabaseEntry)>,
    ) -> anyhow::Result<Self> {
        let mut root = Self::default();

        for (path, entry) in entries {
            let components = path
                .components()
                .map(|component| {
                    let name = component
                        .as_os_str()
                        .to_str()
                        .with_context(|| format!("Invalid path {}", path.display()))?;
                    validate_entry_name(name)?;
                    Ok(name)
                })
                .collect::<anyhow::Result<Vec<_>>>()?;
            root.add_entry(&components, entry)
                .with_context(|| format!("Cannot place {} in tree", path.display()))?;
        }

        Ok(root)
    }

    fn add_entry(&mut self, components: &[&str], entry: DatabaseEntry) -> anyhow::Result<()> {
        let Some((name, rest)) = components.split_first() else {
            anyhow::bail!("empty path");
        };

        if rest.is_empty() {
            let key = sort_key(name, entry.mode);
            let clashing_key = match entry.mode {
                EntryMode::Directory => name.to_string(),
                _ => format!("{name}/"),
            };
            if self.entries.contains_key(&key) || self.entries.contains_key(&clashing_key) {
                anyhow::bail!("duplicate entry name '{name}'");
            }
            self.entries.insert(key, TreeEntry::Leaf(entry));
            return Ok(());
        }

        if self.entries.contains_key(*name) {
            anyhow::bail!("'{name}' is both a file and a directory");
        }
        let subtree = self
            .entries
            .entry(format!("{name}/"))
            .or_insert_with(|| TreeEntry::Directory(Tree::default()));

        match subtree {
            TreeEntry::Directory(tree) => tree.add_entry(rest, entry),
            TreeEntry::Leaf(_) => anyhow::bail!("duplicate entry name '{name}'"),
        }
    }

    /// Visit subtrees before their parents
    ///
    /// Child ids must exist before a parent referencing them is stored.
    pub fn traverse<F>(&self, func: &F) -> anyhow::Result<()>
    where
        F: Fn(&Tree) -> anyhow::Result<()>,
    {
        for entry in self.entries.values() {
            if let TreeEntry::Directory(tree) = entry {
                tree.traverse(func)?;
            }
        }
        func(self)
    }

    /// Entries of a tree loaded from the database, names without the sort suffix
    pub fn entries(&self) -> impl Iterator<Item = (&str, &DatabaseEntry)> {
        self.entries.iter().filter_map(|(name, entry)| match entry {
            TreeEntry::Leaf(entry) => Some((name.trim_end_matches('/'), entry)),
            TreeEntry::Directory(_) => None,
        })
    }

    pub fn into_entries(self) -> impl Iterator<Item = (String, DatabaseEntry)> {
        self.entries
            .into_iter()
            .filter_map(|(name, entry)| match entry {
                TreeEntry::Leaf(entry) => Some((name.trim_end_matches('/').to_string(), entry)),
                TreeEntry::Directory(_) => None,
            })
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn payload(&self) -> anyhow::Result<Vec<u8>> {
        let mut content = Vec::new();

        for (name, tree_entry) in &self.entries {
            let name = name.trim_end_matches('/');
            write!(content, "{} {}", tree_entry.mode().as_str(), name)?;
            content.push(0);
            tree_entry.oid()?.write_h40_to(&mut content)?;
        }

        Ok(content)
    }
}

impl Packable for Tree {
    fn serialize(&self) -> anyhow::Result<Bytes> {
        frame(self.object_type(), &self.payload()?)
    }
}

impl Unpackable for Tree {
    fn deserialize(mut reader: impl BufRead) -> anyhow::Result<Self> {
        let mut entries = BTreeMap::new();

        // Reuse scratch buffers to reduce allocs
        let mut mode_bytes = Vec::new();
        let mut name_bytes = Vec::new();

        loop {
            mode_bytes.clear();
            let n = reader.read_until(b' ', &mut mode_bytes)?;
            if n == 0 {
                break;
            }
            if mode_bytes.pop() != Some(b' ') {
                return Err(anyhow::anyhow!("unexpected EOF in mode"));
            }
            let mode = EntryMode::from_octal_str(std::str::from_utf8(&mode_bytes)?)?;

            name_bytes.clear();
            reader.read_until(b'\0', &mut name_bytes)?;
            if name_bytes.pop() != Some(b'\0') {
                return Err(anyhow::anyhow!("unexpected EOF in name"));
            }
            let name = std::str::from_utf8(&name_bytes)?;
            validate_entry_name(name)?;

            let oid =
                ObjectId::read_h40_from(&mut reader).context("unexpected EOF in object id")?;

            entries.insert(
                sort_key(name, mode),
                TreeEntry::Leaf(DatabaseEntry::new(oid, mode)),
            );
        }

        Ok(Tree { entries })
    }
}

impl Object for Tree {
    fn object_type(&self) -> ObjectType {
        ObjectType::Tree
    }

    fn display(&self) -> String {
        self.entries
            .iter()
            .map(|(name, tree_entry)| {
                format!(
                    "{:0>6} {} {}\t{}",
                    tree_entry.mode().as_str(),
                    tree_entry.mode().object_type(),
                    tree_entry.oid().unwrap_or_default(),
                    name.trim_end_matches('/')
                )
            })
            .collect::<Vec<String>>()
            .join("\n")
    }
}
