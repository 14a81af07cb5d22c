//! Working tree
//!
//! Paths handed in and out of the workspace are relative to its root. The `.git`
//! directory is never listed, and a directory holding its own `.git` is a nested
//! repository: it is listed as a single path and never descended into.

use crate::artifacts::checkout::migration::{ActionType, Migration};
use crate::artifacts::index::entry_mode::EntryMode;
use crate::artifacts::index::index_entry::EntryMetadata;
use crate::artifacts::objects::blob::Blob;
use crate::errors::RepositoryError;
use anyhow::Context;
use bytes::Bytes;
use std::io::Write;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const GIT_DIR: &str = ".git";

#[derive(Debug)]
pub struct Workspace {
    path: Box<Path>,
}

impl Workspace {
    pub fn new(path: Box<Path>) -> Self {
        Workspace { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn parse_blob(&self, path: &Path) -> anyhow::Result<Blob> {
        Ok(Blob::new(self.read_file(path)?))
    }

    /// Whether `path` is the root of another repository inside this one
    pub fn is_nested_repository(&self, path: &Path) -> bool {
        !path.as_os_str().is_empty() && self.path.join(path).join(GIT_DIR).exists()
    }

    /// Direct children of a directory, `.git` excluded
    pub fn list_dir(&self, dir_path: Option<&Path>) -> anyhow::Result<Vec<PathBuf>> {
        let dir_path = match dir_path {
            Some(path) => self.path.join(path),
            None => self.path.to_path_buf(),
        };

        if !dir_path.is_dir() {
            anyhow::bail!("the specified path is not a directory: {:?}", dir_path);
        }

        let mut children = std::fs::read_dir(&dir_path)?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_name() != GIT_DIR)
            .filter_map(|entry| self.relative(&entry.path()))
            .collect::<Vec<_>>();
        children.sort();

        Ok(children)
    }

    /// Files below `root` (the whole tree by default), nested repositories as leaves
    ///
    /// Fails with `NotFound` when `root` does not exist.
    pub fn list_files(&self, root: Option<&Path>) -> anyhow::Result<Vec<PathBuf>> {
        let root = match root {
            Some(path) => self.path.join(path),
            None => self.path.to_path_buf(),
        };

        if !root.exists() {
            return Err(RepositoryError::not_found("path", root.display().to_string()).into());
        }

        let mut files = Vec::new();
        let mut walker = WalkDir::new(&root).sort_by_file_name().into_iter();

        while let Some(entry) = walker.next() {
            let entry = entry?;

            if entry.file_name() == GIT_DIR {
                if entry.file_type().is_dir() {
                    walker.skip_current_dir();
                }
                continue;
            }

            if entry.file_type().is_dir() {
                if entry.path() != self.path.as_ref() && entry.path().join(GIT_DIR).exists() {
                    files.extend(self.relative(entry.path()));
                    walker.skip_current_dir();
                }
                continue;
            }

            files.extend(self.relative(entry.path()));
        }

        Ok(files)
    }

    fn relative(&self, path: &Path) -> Option<PathBuf> {
        path.strip_prefix(self.path.as_ref())
            .ok()
            .map(Path::to_path_buf)
    }

    pub fn read_file(&self, file_path: &Path) -> anyhow::Result<Bytes> {
        let content = std::fs::read(self.path.join(file_path))
            .with_context(|| format!("failed to read {:?}", file_path))?;

        Ok(content.into())
    }

    pub fn stat_file(&self, file_path: &Path) -> anyhow::Result<EntryMetadata> {
        let absolute_path = self.path.join(file_path);
        let metadata = std::fs::metadata(&absolute_path)
            .with_context(|| format!("failed to stat {:?}", file_path))?;

        (absolute_path.as_path(), metadata).try_into()
    }

    pub fn exists(&self, path: &Path) -> bool {
        self.path.join(path).exists()
    }

    /// Write a file, creating its parent directories, and apply the entry's mode
    pub fn write_file(&self, file_path: &Path, data: &[u8], mode: EntryMode) -> anyhow::Result<()> {
        let path = self.path.join(file_path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .with_context(|| format!("failed to open file: {:?}", file_path))?;
        file.write_all(data)
            .with_context(|| format!("failed to write to file: {:?}", file_path))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let permissions = std::fs::Permissions::from_mode(match mode {
                EntryMode::File(_) => mode.as_u32() & 0o777,
                _ => 0o644,
            });
            std::fs::set_permissions(&path, permissions)
                .with_context(|| format!("failed to set permissions for file: {:?}", file_path))?;
        }

        Ok(())
    }

    /// Delete a file and every directory it leaves empty
    pub fn remove_file(&self, file_path: &Path) -> anyhow::Result<()> {
        let path = self.path.join(file_path);
        if path.is_dir() {
            std::fs::remove_dir_all(&path)?;
        } else if path.exists() {
            std::fs::remove_file(&path)
                .with_context(|| format!("failed to remove file: {:?}", file_path))?;
        }

        for parent in file_path.ancestors().skip(1) {
            if parent.as_os_str().is_empty() {
                break;
            }
            let dir = self.path.join(parent);
            if !dir.is_dir() || dir.read_dir()?.next().is_some() {
                break;
            }
            std::fs::remove_dir(&dir)?;
        }

        Ok(())
    }

    /// Apply a checkout migration to the working tree
    ///
    /// Deletions go first, then emptied directories deepest first, then new
    /// directories shallowest first, then modified and added files. Gitlinks only
    /// ever get a directory: their content belongs to the nested repository.
    pub fn apply_migration(&self, migration: &Migration) -> anyhow::Result<()> {
        self.apply_migration_action_set(migration, ActionType::Delete)?;

        for dir_path in migration.rmdirs().iter().rev() {
            self.remove_directory(dir_path)?;
        }
        for dir_path in migration.mkdirs() {
            self.make_directory(dir_path)?;
        }

        self.apply_migration_action_set(migration, ActionType::Modify)?;
        self.apply_migration_action_set(migration, ActionType::Add)?;

        Ok(())
    }

    fn apply_migration_action_set(
        &self,
        migration: &Migration,
        action: ActionType,
    ) -> anyhow::Result<()> {
        for (file_path, entry) in migration.actions(action) {
            let path = self.path.join(file_path);

            match (action, entry) {
                (ActionType::Delete, Some(entry)) if entry.is_gitlink() => {}
                (ActionType::Delete, _) => {
                    if path.is_dir() {
                        std::fs::remove_dir_all(&path).with_context(|| {
                            format!("failed to remove existing directory: {:?}", file_path)
                        })?;
                    } else if path.exists() {
                        std::fs::remove_file(&path)
                            .with_context(|| format!("failed to remove file: {:?}", file_path))?;
                    }
                }
                (ActionType::Add | ActionType::Modify, Some(entry)) if entry.is_gitlink() => {
                    if path.is_file() {
                        std::fs::remove_file(&path)?;
                    }
                    std::fs::create_dir_all(&path)?;
                }
                (ActionType::Add | ActionType::Modify, Some(entry)) => {
                    if path.is_dir() {
                        std::fs::remove_dir_all(&path)?;
                    }
                    let data = migration.load_blob_data(&entry.oid)?;
                    self.write_file(file_path, &data, entry.mode)?;
                }
                (_, None) => anyhow::bail!("missing target entry for {:?}", file_path),
            }
        }

        Ok(())
    }

    fn remove_directory(&self, dir_path: &Path) -> anyhow::Result<()> {
        let dir_path = self.path.join(dir_path);

        // only directories left empty by the deletions go away
        if dir_path.is_dir() && dir_path.read_dir()?.next().is_none() {
            std::fs::remove_dir(dir_path)?;
        }

        Ok(())
    }

    fn make_directory(&self, dir_path: &Path) -> anyhow::Result<()> {
        let dir_path = self.path.join(dir_path);

        if dir_path.is_file() {
            std::fs::remove_file(&dir_path)?;
        }
        if !dir_path.is_dir() {
            std::fs::create_dir_all(&dir_path)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::TempDir;
    use assert_fs::prelude::*;
    use pretty_assertions::assert_eq;

    fn workspace(dir: &TempDir) -> Workspace {
        Workspace::new(dir.path().to_path_buf().into_boxed_path())
    }

    #[test]
    fn listing_skips_the_git_directory() {
        let dir = TempDir::new().unwrap();
        dir.child(".git/HEAD").write_str("ref: refs/heads/master\n").unwrap();
        dir.child("a.txt").write_str("a").unwrap();
        dir.child("nested/b.txt").write_str("b").unwrap();

        let files = workspace(&dir).list_files(None).unwrap();

        assert_eq!(files, vec![PathBuf::from("a.txt"), PathBuf::from("nested/b.txt")]);
    }

    #[test]
    fn nested_repositories_are_listed_as_single_paths() {
        let dir = TempDir::new().unwrap();
        dir.child("lib/.git/HEAD").write_str("ref: refs/heads/master\n").unwrap();
        dir.child("lib/src/main.rs").write_str("fn main() {}").unwrap();
        dir.child("readme.md").write_str("hi").unwrap();

        let workspace = workspace(&dir);
        let files = workspace.list_files(None).unwrap();

        assert_eq!(files, vec![PathBuf::from("lib"), PathBuf::from("readme.md")]);
        assert!(workspace.is_nested_repository(Path::new("lib")));
        assert_eq!(
            workspace.list_files(Some(Path::new("lib"))).unwrap(),
            vec![PathBuf::from("lib")]
        );
    }

    #[test]
    fn listing_a_missing_path_is_not_found() {
        let dir = TempDir::new().unwrap();

        let error = workspace(&dir)
            .list_files(Some(Path::new("missing")))
            .unwrap_err();

        assert!(matches!(
            crate::errors::classify(&error),
            Some(RepositoryError::NotFound { kind: "path", .. })
        ));
    }

    #[test]
    fn removing_a_file_prunes_empty_parents() {
        let dir = TempDir::new().unwrap();
        dir.child("a/b/c.txt").write_str("c").unwrap();
        dir.child("a/keep.txt").write_str("keep").unwrap();

        workspace(&dir).remove_file(Path::new("a/b/c.txt")).unwrap();

        assert!(!dir.child("a/b").exists());
        assert!(dir.child("a/keep.txt").exists());
    }

    #[test]
    fn binary_content_round_trips() {
        let dir = TempDir::new().unwrap();
        let workspace = workspace(&dir);
        let data = [0u8, 159, 146, 150, 255];

        workspace
            .write_file(Path::new("bin/data"), &data, EntryMode::default())
            .unwrap();

        assert_eq!(workspace.read_file(Path::new("bin/data")).unwrap().as_ref(), &data);
    }
}
