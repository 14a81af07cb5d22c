use crate::areas::repository::{GIT_DIR, Repository};
use crate::artifacts::index::index_entry::IndexEntry;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::submodule::{
    GITMODULES_FILE, GitModules, SubmoduleRecord, SubmoduleStatus, SubmoduleStatusType,
};
use crate::artifacts::transport::Credentials;
use crate::commands::sync::remote::DEFAULT_REMOTE;
use crate::errors::RepositoryError;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

impl Repository {
    /// Clone `url` into `path` and register it as a submodule
    ///
    /// `.gitmodules` gains the entry and both it and the gitlink pinning the
    /// clone's HEAD are staged; committing is left to the caller. Urls starting
    /// with `./` or `../` are relative to this working tree.
    pub async fn submodule_add(
        &self,
        path: &Path,
        url: &str,
        credentials: Option<&Credentials>,
    ) -> anyhow::Result<SubmoduleRecord> {
        let path = self.relative_path(path)?;
        if self.gitlink_pins().await?.contains_key(&path) {
            anyhow::bail!("'{}' is already a submodule", path.display());
        }

        let nested = Repository::clone_from(
            &self.resolve_submodule_url(url),
            self.path().join(&path),
            self.transport(),
            credentials,
        )
        .await?;
        let pinned = nested.refs().read_head()?;

        let mut modules = GitModules::load(self.path())?;
        modules.add(&path, url);
        modules.save()?;

        self.add(&[PathBuf::from(GITMODULES_FILE), path.clone()]).await?;

        tracing::info!(path = %path.display(), url, "added submodule");
        Ok(SubmoduleRecord {
            path,
            url: url.to_string(),
            pinned,
        })
    }

    /// State of every submodule declared in `.gitmodules`
    pub async fn submodule_status(&self) -> anyhow::Result<BTreeMap<PathBuf, SubmoduleStatus>> {
        let records = GitModules::load(self.path())?.records(&self.gitlink_pins().await?);
        let mut statuses = BTreeMap::new();

        for record in records {
            let (status, head) = match self.open_submodule(&record.path)? {
                None => (SubmoduleStatusType::Uninitialized, None),
                Some(nested) => {
                    let head = nested.refs().read_head()?;
                    let status = if head != record.pinned {
                        SubmoduleStatusType::RevCheckedOut
                    } else if !nested.status().await?.is_clean() {
                        SubmoduleStatusType::Modified
                    } else {
                        SubmoduleStatusType::Initialized
                    };
                    (status, head)
                }
            };

            statuses.insert(
                record.path.clone(),
                SubmoduleStatus {
                    record,
                    status,
                    head,
                },
            );
        }

        Ok(statuses)
    }

    /// Clone missing submodules and check each out at its pinned commit
    ///
    /// Nested HEADs end up detached at the pin; pins the nested repository does
    /// not have are fetched from its `origin` first. Returns the updated paths.
    pub async fn submodule_update(
        &self,
        only: Option<&Path>,
        credentials: Option<&Credentials>,
    ) -> anyhow::Result<Vec<(PathBuf, ObjectId)>> {
        let only = only.map(|path| self.relative_path(path)).transpose()?;
        let records = GitModules::load(self.path())?.records(&self.gitlink_pins().await?);
        let mut updated = Vec::new();

        for record in records {
            if only.as_ref().is_some_and(|only| only != &record.path) {
                continue;
            }
            let Some(pinned) = record.pinned else {
                tracing::warn!(path = %record.path.display(), "submodule has no pinned commit, skipping");
                continue;
            };

            let nested = match self.open_submodule(&record.path)? {
                Some(nested) => nested,
                None => {
                    Repository::clone_from(
                        &self.resolve_submodule_url(&record.url),
                        self.path().join(&record.path),
                        self.transport(),
                        credentials,
                    )
                    .await?
                }
            };

            if !nested.database().contains(&pinned) {
                nested.fetch(DEFAULT_REMOTE, credentials).await?;
            }
            if nested.refs().read_head()?.as_ref() != Some(&pinned) {
                nested.checkout(pinned.as_ref()).await?;
            }

            updated.push((record.path, pinned));
        }

        Ok(updated)
    }

    /// Stage the gitlink at `path`, pinning `commit` or the nested HEAD
    pub async fn submodule_record_pin(
        &self,
        path: &Path,
        commit: Option<ObjectId>,
    ) -> anyhow::Result<ObjectId> {
        let path = self.relative_path(path)?;
        let pin = match commit {
            Some(commit) => commit,
            None => self
                .open_submodule(&path)?
                .ok_or_else(|| RepositoryError::not_found("submodule", path.display().to_string()))?
                .refs()
                .read_head()?
                .ok_or_else(|| RepositoryError::not_found("revision", format!("{}/HEAD", path.display())))?,
        };

        let index = self.index();
        let mut index = index.lock().await;
        index.rehydrate()?;
        index.add(IndexEntry::gitlink(path.clone(), pin.clone()));
        index.write_updates()?;

        tracing::debug!(path = %path.display(), pin = %pin.to_short_oid(), "recorded submodule pin");
        Ok(pin)
    }

    async fn gitlink_pins(&self) -> anyhow::Result<BTreeMap<PathBuf, ObjectId>> {
        let index = self.index();
        let mut index = index.lock().await;
        index.rehydrate()?;

        Ok(index
            .merged_entries()
            .filter(|entry| entry.is_gitlink())
            .map(|entry| (entry.name.clone(), entry.oid.clone()))
            .collect())
    }

    fn open_submodule(&self, path: &Path) -> anyhow::Result<Option<Repository>> {
        let root = self.path().join(path);
        if !root.join(GIT_DIR).is_dir() {
            return Ok(None);
        }

        Ok(Some(Repository::open(root)?.with_transport(self.transport())))
    }

    fn resolve_submodule_url(&self, url: &str) -> String {
        if url.starts_with("./") || url.starts_with("../") {
            let joined = self.path().join(url);
            joined
                .canonicalize()
                .unwrap_or(joined)
                .display()
                .to_string()
        } else {
            url.to_string()
        }
    }
}
