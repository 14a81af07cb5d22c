use crate::areas::database::Database;
use crate::areas::refs::Refs;
use crate::artifacts::branch::branch_name::{HEADS_PREFIX, SymRefName, TAGS_PREFIX};
use crate::artifacts::objects::object::RawObject;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::transport::{
    Advertisement, Credentials, RefUpdate, RefUpdateOutcome, RefUpdateStatus, Transport,
};
use crate::errors::{RepositoryError, classify};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Serves repositories reachable through the filesystem
///
/// Accepts plain paths and `file://` uris, pointing at a working repository or
/// at a bare git directory. Filesystem work runs on the blocking pool so
/// callers can bound it with a timeout.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalTransport;

struct RemoteStore {
    database: Database,
    refs: Refs,
}

impl RemoteStore {
    fn open(uri: &str) -> anyhow::Result<Self> {
        let git_dir = Self::resolve_git_dir(uri)?;

        Ok(RemoteStore {
            database: Database::new(git_dir.join("objects").into_boxed_path()),
            refs: Refs::new(git_dir.into_boxed_path()),
        })
    }

    fn resolve_git_dir(uri: &str) -> anyhow::Result<PathBuf> {
        let path = match uri.split_once("://") {
            Some(("file", path)) => PathBuf::from(path),
            Some((scheme, _)) => {
                return Err(
                    RepositoryError::transport(uri, format!("unsupported scheme '{scheme}'")).into(),
                );
            }
            None => PathBuf::from(uri),
        };

        if !path.exists() {
            return Err(RepositoryError::transport(uri, "no such repository").into());
        }
        if path.join(".git").is_dir() {
            return Ok(path.join(".git"));
        }
        if Self::is_git_dir(&path) {
            return Ok(path);
        }

        Err(RepositoryError::transport(uri, "not a repository").into())
    }

    fn is_git_dir(path: &Path) -> bool {
        path.join("HEAD").is_file() && path.join("objects").is_dir() && path.join("refs").is_dir()
    }

    fn advertise(&self) -> anyhow::Result<Advertisement> {
        let mut advertisement = Advertisement::default();

        for prefix in [HEADS_PREFIX, TAGS_PREFIX] {
            for (name, oid) in self.refs.list_refs(prefix)? {
                advertisement.refs.insert(name.to_string(), oid);
            }
        }
        if let Some(head) = self.refs.read_head()? {
            advertisement.refs.insert(SymRefName::head().to_string(), head);
        }
        advertisement.head_symref = self.refs.head_target()?.map(|target| target.to_string());

        Ok(advertisement)
    }

    fn objects_for(&self, wants: &[ObjectId], haves: &[ObjectId]) -> anyhow::Result<Vec<RawObject>> {
        self.database
            .reachable_objects(wants, haves)?
            .iter()
            .map(|oid| self.database.get(oid))
            .collect()
    }

    fn receive(
        &self,
        objects: Vec<RawObject>,
        updates: Vec<RefUpdate>,
    ) -> anyhow::Result<Vec<RefUpdateOutcome>> {
        for object in objects {
            self.database.put(object.kind, object.payload)?;
        }

        updates
            .into_iter()
            .map(|update| self.apply_update(update))
            .collect()
    }

    fn apply_update(&self, update: RefUpdate) -> anyhow::Result<RefUpdateOutcome> {
        let name = SymRefName::new(update.name.clone());
        let current = self.refs.read_oid(&name)?;
        let outcome = |status| RefUpdateOutcome {
            name: update.name.clone(),
            status,
            old: current.clone(),
            new: update.new.clone(),
        };

        if current == update.new {
            return Ok(outcome(RefUpdateStatus::UpToDate));
        }
        if current != update.expected {
            return Ok(outcome(RefUpdateStatus::RejectedStale));
        }

        let Some(new) = &update.new else {
            return match self.refs.delete_ref(&name, current.as_ref()) {
                Ok(()) => Ok(outcome(RefUpdateStatus::Ok)),
                Err(error) if is_ref_conflict(&error) => Ok(outcome(RefUpdateStatus::RejectedStale)),
                Err(error) => Err(error),
            };
        };

        if !self.database.missing_objects(std::slice::from_ref(new), &[])?.is_empty() {
            return Ok(outcome(RefUpdateStatus::RejectedMissingObjects));
        }
        if let Some(current) = &current
            && !update.force
            && !self.is_fast_forward(current, new)?
        {
            return Ok(outcome(RefUpdateStatus::RejectedNonFastForward));
        }

        match self.refs.update_ref(&name, current.as_ref(), new) {
            Ok(()) => Ok(outcome(RefUpdateStatus::Ok)),
            Err(error) if is_ref_conflict(&error) => Ok(outcome(RefUpdateStatus::RejectedStale)),
            Err(error) => Err(error),
        }
    }

    /// Tags and other non-commit objects only move with `force`
    fn is_fast_forward(&self, current: &ObjectId, new: &ObjectId) -> anyhow::Result<bool> {
        let (Ok(current), Ok(new)) = (
            self.database.peel_to_commit(current),
            self.database.peel_to_commit(new),
        ) else {
            return Ok(false);
        };

        self.database.is_ancestor(&current, &new)
    }
}

fn is_ref_conflict(error: &anyhow::Error) -> bool {
    matches!(classify(error), Some(RepositoryError::RefConflict { .. }))
}

/// Run `work` against the remote on the blocking pool
async fn with_remote<T, F>(uri: &str, work: F) -> anyhow::Result<T>
where
    T: Send + 'static,
    F: FnOnce(RemoteStore) -> anyhow::Result<T> + Send + 'static,
{
    let owned_uri = uri.to_string();
    tokio::task::spawn_blocking(move || work(RemoteStore::open(&owned_uri)?))
        .await
        .map_err(|error| RepositoryError::transport(uri, error))?
}

#[async_trait]
impl Transport for LocalTransport {
    async fn list_refs(
        &self,
        uri: &str,
        credentials: Option<&Credentials>,
    ) -> anyhow::Result<Advertisement> {
        tracing::debug!(uri, authenticated = credentials.is_some(), "listing remote refs");

        with_remote(uri, |remote| remote.advertise()).await
    }

    async fn fetch_objects(
        &self,
        uri: &str,
        wants: &[ObjectId],
        haves: &[ObjectId],
        credentials: Option<&Credentials>,
    ) -> anyhow::Result<Vec<RawObject>> {
        tracing::debug!(uri, wants = wants.len(), haves = haves.len(), authenticated = credentials.is_some(), "fetching objects");

        let (wants, haves) = (wants.to_vec(), haves.to_vec());
        with_remote(uri, move |remote| remote.objects_for(&wants, &haves)).await
    }

    async fn push_objects(
        &self,
        uri: &str,
        objects: Vec<RawObject>,
        updates: Vec<RefUpdate>,
        credentials: Option<&Credentials>,
    ) -> anyhow::Result<Vec<RefUpdateOutcome>> {
        tracing::debug!(uri, objects = objects.len(), updates = updates.len(), authenticated = credentials.is_some(), "pushing");

        with_remote(uri, move |remote| remote.receive(objects, updates)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::objects::blob::Blob;
    use crate::artifacts::objects::commit::{Author, Commit};
    use crate::artifacts::objects::object::Object;
    use crate::artifacts::objects::tree::Tree;
    use assert_fs::TempDir;
    use pretty_assertions::assert_eq;

    struct Remote {
        dir: TempDir,
        store: RemoteStore,
    }

    impl Remote {
        fn bare() -> Self {
            let dir = TempDir::new().unwrap();
            std::fs::create_dir_all(dir.path().join("objects")).unwrap();
            std::fs::create_dir_all(dir.path().join("refs/heads")).unwrap();
            std::fs::write(dir.path().join("HEAD"), "ref: refs/heads/master\n").unwrap();
            let store = RemoteStore::open(dir.path().to_str().unwrap()).unwrap();
            Remote { dir, store }
        }

        fn uri(&self) -> String {
            format!("file://{}", self.dir.path().display())
        }

        fn commit(&self, message: &str, parents: Vec<ObjectId>) -> ObjectId {
            let blob = self.store.database.store(&Blob::new(message.to_string())).unwrap();
            let tree = Tree::build([(
                Path::new("file.txt"),
                crate::artifacts::database::database_entry::DatabaseEntry::new(
                    blob,
                    Default::default(),
                ),
            )])
            .unwrap();
            let tree = self.store.database.store(&tree).unwrap();
            let author = Author::new("Ada".into(), "ada@example.com".into());
            let commit = Commit::new(parents, tree, author.clone(), author, message.into());
            self.store.database.store(&commit).unwrap()
        }
    }

    #[tokio::test]
    async fn advertises_branches_and_head() {
        let remote = Remote::bare();
        let tip = remote.commit("first", vec![]);
        remote
            .store
            .refs
            .write_ref(&SymRefName::new("refs/heads/master".into()), &tip)
            .unwrap();

        let advertisement = LocalTransport.list_refs(&remote.uri(), None).await.unwrap();

        assert_eq!(advertisement.get("refs/heads/master"), Some(&tip));
        assert_eq!(advertisement.get("HEAD"), Some(&tip));
        assert_eq!(advertisement.head_symref.as_deref(), Some("refs/heads/master"));
    }

    #[tokio::test]
    async fn fetch_skips_what_the_client_has() {
        let remote = Remote::bare();
        let first = remote.commit("first", vec![]);
        let second = remote.commit("second", vec![first.clone()]);

        let objects = LocalTransport
            .fetch_objects(&remote.uri(), &[second.clone()], &[first.clone()], None)
            .await
            .unwrap();
        let ids = objects
            .iter()
            .map(|object| object.object_id().unwrap())
            .collect::<Vec<_>>();

        assert!(ids.contains(&second));
        assert!(!ids.contains(&first));
        assert_eq!(objects.len(), 3);
    }

    #[tokio::test]
    async fn each_update_is_judged_on_its_own() {
        let remote = Remote::bare();
        let base = remote.commit("base", vec![]);
        let ahead = remote.commit("ahead", vec![base.clone()]);
        let sideways = remote.commit("sideways", vec![base.clone()]);
        for branch in ["master", "topic"] {
            remote
                .store
                .refs
                .write_ref(&SymRefName::new(format!("refs/heads/{branch}")), &ahead)
                .unwrap();
        }
        let descendant = remote.commit("descendant", vec![ahead.clone()]);

        let outcomes = LocalTransport
            .push_objects(
                &remote.uri(),
                vec![],
                vec![
                    RefUpdate {
                        name: "refs/heads/master".into(),
                        expected: Some(ahead.clone()),
                        new: Some(descendant.clone()),
                        force: false,
                    },
                    RefUpdate {
                        name: "refs/heads/topic".into(),
                        expected: Some(ahead.clone()),
                        new: Some(sideways.clone()),
                        force: false,
                    },
                    RefUpdate {
                        name: "refs/heads/stale".into(),
                        expected: Some(base.clone()),
                        new: Some(ahead.clone()),
                        force: false,
                    },
                ],
                None,
            )
            .await
            .unwrap();

        let statuses = outcomes.iter().map(|outcome| outcome.status).collect::<Vec<_>>();
        assert_eq!(
            statuses,
            vec![
                RefUpdateStatus::Ok,
                RefUpdateStatus::RejectedNonFastForward,
                RefUpdateStatus::RejectedStale,
            ]
        );
    }

    #[tokio::test]
    async fn updates_to_unknown_objects_are_rejected() {
        let remote = Remote::bare();

        let outcomes = LocalTransport
            .push_objects(
                &remote.uri(),
                vec![],
                vec![RefUpdate {
                    name: "refs/heads/master".into(),
                    expected: None,
                    new: Some(ObjectId::hash(b"nowhere")),
                    force: false,
                }],
                None,
            )
            .await
            .unwrap();

        assert_eq!(outcomes[0].status, RefUpdateStatus::RejectedMissingObjects);
    }

    #[tokio::test]
    async fn other_schemes_are_transport_errors() {
        let error = LocalTransport
            .list_refs("ssh://example.com/repo.git", None)
            .await
            .unwrap_err();

        assert!(matches!(
            classify(&error),
            Some(RepositoryError::Transport { reason, .. }) if reason.contains("unsupported scheme")
        ));
    }
}
