use crate::areas::database::Database;
use crate::areas::index::Index;
use crate::areas::refs::Refs;
use crate::areas::workspace::Workspace;
use crate::artifacts::config::Config;
use crate::artifacts::status::status_info::Status;
use crate::artifacts::transport::Transport;
use crate::artifacts::transport::local::LocalTransport;
use crate::errors::RepositoryError;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

pub const GIT_DIR: &str = ".git";

/// A working tree together with its `.git` directory
///
/// Ref-mutating commands hold `ref_lock` for their whole read-check-write
/// sequence; the index sits behind its own async mutex. Nested repositories
/// are separate `Repository` values with separate locks.
pub struct Repository {
    path: Box<Path>,
    git_dir: Box<Path>,
    index: Arc<Mutex<Index>>,
    database: Database,
    workspace: Workspace,
    refs: Refs,
    ref_lock: Arc<Mutex<()>>,
    transport: Arc<dyn Transport>,
}

impl Repository {
    /// Repository rooted at `path`, creating the directory when missing
    pub fn new(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            std::fs::create_dir_all(path)?;
        }
        let path = path.canonicalize()?;
        let git_dir = path.join(GIT_DIR);

        Ok(Repository {
            index: Arc::new(Mutex::new(Index::new(
                git_dir.join("index").into_boxed_path(),
            ))),
            database: Database::new(git_dir.join("objects").into_boxed_path()),
            workspace: Workspace::new(path.clone().into_boxed_path()),
            refs: Refs::new(git_dir.clone().into_boxed_path()),
            ref_lock: Arc::new(Mutex::new(())),
            transport: Arc::new(LocalTransport),
            git_dir: git_dir.into_boxed_path(),
            path: path.into_boxed_path(),
        })
    }

    /// Existing repository at `path`; `NotFound` when there is no `.git` directory
    pub fn open(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if !path.join(GIT_DIR).is_dir() {
            return Err(RepositoryError::not_found("repository", path.display().to_string()).into());
        }

        Self::new(path)
    }

    /// Nearest repository at or above `path`
    pub fn discover(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let start = path.as_ref().canonicalize()?;

        match start.ancestors().find(|dir| dir.join(GIT_DIR).is_dir()) {
            Some(root) => Self::new(root),
            None => Err(RepositoryError::not_found("repository", start.display().to_string()).into()),
        }
    }

    pub fn with_transport(self, transport: Arc<dyn Transport>) -> Self {
        Repository { transport, ..self }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn git_path(&self) -> &Path {
        &self.git_dir
    }

    pub fn config_path(&self) -> PathBuf {
        self.git_dir.join("config")
    }

    /// Fresh read of `.git/config`
    pub fn config(&self) -> anyhow::Result<Config> {
        Config::load(self.config_path().into_boxed_path())
    }

    pub fn index(&self) -> Arc<Mutex<Index>> {
        self.index.clone()
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn refs(&self) -> &Refs {
        &self.refs
    }

    pub fn ref_lock(&self) -> Arc<Mutex<()>> {
        self.ref_lock.clone()
    }

    pub fn transport(&self) -> Arc<dyn Transport> {
        self.transport.clone()
    }

    pub fn status_inspector(&'_ self) -> Status<'_> {
        Status::new(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::classify;
    use assert_fs::TempDir;

    #[test]
    fn opening_a_plain_directory_is_not_found() {
        let dir = TempDir::new().unwrap();

        let error = Repository::open(dir.path()).err().unwrap();

        assert!(matches!(
            classify(&error),
            Some(RepositoryError::NotFound { kind: "repository", .. })
        ));
    }

    #[test]
    fn discovery_walks_up_to_the_working_tree_root() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join(".git")).unwrap();
        std::fs::create_dir_all(dir.path().join("src/deep")).unwrap();

        let repository = Repository::discover(dir.path().join("src/deep")).unwrap();

        assert_eq!(repository.path(), dir.path().canonicalize().unwrap());
    }
}
