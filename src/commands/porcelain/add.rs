use crate::areas::index::Index;
use crate::areas::refs::Refs;
use crate::areas::repository::{GIT_DIR, Repository};
use crate::artifacts::index::index_entry::IndexEntry;
use crate::errors::RepositoryError;
use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};

/// What `add` did with the requested paths
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddResult {
    pub staged: Vec<PathBuf>,
    /// Tracked paths that vanished from the working tree
    pub removed: Vec<PathBuf>,
    /// Paths inside a nested repository, or nested repositories without a commit
    pub skipped: Vec<PathBuf>,
}

impl Repository {
    /// Stage files, expanding directories
    ///
    /// A directory holding its own `.git` is staged as a gitlink pinned at that
    /// repository's HEAD; nothing inside it ever reaches this index. Paths below
    /// a nested repository are skipped. A path that is neither on disk nor
    /// tracked fails with `NotFound`.
    pub async fn add(&self, paths: &[PathBuf]) -> anyhow::Result<AddResult> {
        let index = self.index();
        let mut index = index.lock().await;
        index.rehydrate()?;

        let mut result = AddResult::default();

        for path in paths {
            let path = self.relative_path(path)?;

            if self.is_inside_nested_repository(&path, &index) {
                tracing::debug!(path = %path.display(), "skipping path inside a nested repository");
                result.skipped.push(path);
                continue;
            }

            if !self.workspace().exists(&path) {
                let tracked = index.entries_under_path(&path);
                if tracked.is_empty() {
                    return Err(RepositoryError::not_found("path", path.display().to_string()).into());
                }
                index.unstage(&path);
                result.removed.extend(tracked);
                continue;
            }

            let files = self.workspace().list_files(Some(&path))?;
            let listed = files.iter().cloned().collect::<BTreeSet<_>>();

            for file in files {
                if self.workspace().is_nested_repository(&file) {
                    self.stage_gitlink(&mut index, file, &mut result)?;
                } else {
                    self.stage_file(&mut index, file, &mut result)?;
                }
            }

            for tracked in index.entries_under_path(&path) {
                if !listed.contains(&tracked) && !self.workspace().exists(&tracked) {
                    index.unstage(&tracked);
                    result.removed.push(tracked);
                }
            }
        }

        index.write_updates()?;

        Ok(result)
    }

    fn stage_file(&self, index: &mut Index, path: PathBuf, result: &mut AddResult) -> anyhow::Result<()> {
        let content = self.workspace().read_file(&path)?;
        let stat = self.workspace().stat_file(&path)?;

        index.stage(self.database(), &path, content, stat)?;
        result.staged.push(path);

        Ok(())
    }

    fn stage_gitlink(&self, index: &mut Index, path: PathBuf, result: &mut AddResult) -> anyhow::Result<()> {
        let nested_refs = Refs::new(self.workspace().path().join(&path).join(GIT_DIR).into_boxed_path());

        match nested_refs.read_head()? {
            Some(head) => {
                tracing::debug!(path = %path.display(), head = %head.to_short_oid(), "staging gitlink");
                index.add(IndexEntry::gitlink(path.clone(), head));
                result.staged.push(path);
            }
            None => {
                tracing::warn!(path = %path.display(), "nested repository has no commit checked out");
                result.skipped.push(path);
            }
        }

        Ok(())
    }

    /// Whether `path` lies strictly below a gitlink or a nested repository root
    fn is_inside_nested_repository(&self, path: &Path, index: &Index) -> bool {
        let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) else {
            return false;
        };

        index.gitlink_containing(parent).is_some()
            || parent
                .ancestors()
                .filter(|ancestor| !ancestor.as_os_str().is_empty())
                .any(|ancestor| self.workspace().is_nested_repository(ancestor))
    }

    /// `path` relative to the working tree root
    ///
    /// Absolute paths must lie inside the working tree. `..` may only climb back
    /// out of a directory the path itself entered, and nothing under `.git` is
    /// ever addressed.
    pub(crate) fn relative_path(&self, path: &Path) -> anyhow::Result<PathBuf> {
        let outside = || {
            anyhow::anyhow!(
                "{} is outside repository at {}",
                path.display(),
                self.path().display()
            )
        };

        let relative = if path.is_relative() {
            path.to_path_buf()
        } else {
            let absolute = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
            absolute
                .strip_prefix(self.path())
                .map(Path::to_path_buf)
                .map_err(|_| outside())?
        };

        let mut cleaned = PathBuf::new();
        for component in relative.components() {
            match component {
                Component::CurDir => {}
                Component::ParentDir if cleaned.pop() => {}
                Component::Normal(name) if name != GIT_DIR => cleaned.push(name),
                _ => return Err(outside()),
            }
        }

        Ok(cleaned)
    }
}
