use crate::areas::repository::Repository;
use crate::artifacts::index::index_entry::IndexEntry;
use crate::errors::RepositoryError;
use std::path::PathBuf;

impl Repository {
    /// Untrack paths, deleting them from the working tree unless `cached`
    ///
    /// Nested repositories behind gitlinks are left on disk. Fails with
    /// `NotFound`, before anything changes, when a path is not tracked.
    pub async fn rm(&self, paths: &[PathBuf], cached: bool) -> anyhow::Result<Vec<PathBuf>> {
        let index = self.index();
        let mut index = index.lock().await;
        index.rehydrate()?;

        let mut targets = Vec::with_capacity(paths.len());
        for path in paths {
            let path = self.relative_path(path)?;
            let tracked = index.entries_under_path(&path);
            if tracked.is_empty() {
                return Err(RepositoryError::not_found("path", path.display().to_string()).into());
            }
            targets.push((path, tracked));
        }

        let mut removed = Vec::new();
        for (path, tracked) in targets {
            if !cached {
                for file in &tracked {
                    let is_gitlink = index.entry_by_path(file).is_some_and(IndexEntry::is_gitlink);
                    if !is_gitlink && self.workspace().exists(file) {
                        self.workspace().remove_file(file)?;
                    }
                }
            }

            index.unstage(&path);
            removed.extend(tracked);
        }

        index.write_updates()?;
        tracing::debug!(count = removed.len(), cached, "removed paths from the index");

        Ok(removed)
    }
}
