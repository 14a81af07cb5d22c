use assert_fs::TempDir;
use async_trait::async_trait;
use grove::Repository;
use grove::artifacts::objects::object::RawObject;
use grove::artifacts::objects::object_id::ObjectId;
use grove::artifacts::branch::branch_name::SymRefName;
use grove::artifacts::transport::local::LocalTransport;
use grove::artifacts::transport::{
    Advertisement, Credentials, RefUpdate, RefUpdateOutcome, RefUpdateStatus, Transport,
};
use grove::commands::porcelain::commit::CommitOptions;
use grove::commands::porcelain::merge::MergeOutcome;
use grove::commands::sync::fetch::TrackingUpdate;
use grove::commands::sync::push::PushOptions;
use grove::errors::{RepositoryError, classify};
use pretty_assertions::assert_eq;
use rstest::rstest;
use std::sync::Arc;
use std::time::Duration;

mod common;
use common::{commit_files, head, init_repository, set_identity, uri_of, workspace_dir};

/// An upstream repository with one commit and a clone of it
async fn upstream_and_clone(root: &TempDir) -> (Repository, Repository) {
    let upstream = init_repository(&root.path().join("upstream")).await;
    commit_files(&upstream, &[("README.md", "# grove"), ("src/lib.rs", "")], "initial").await;

    let clone = Repository::clone_from(
        &uri_of(&upstream),
        root.path().join("clone"),
        Arc::new(LocalTransport),
        None,
    )
    .await
    .unwrap();
    set_identity(&clone);

    (upstream, clone)
}

fn remote_branch(repository: &Repository, branch: &str) -> Option<ObjectId> {
    repository
        .refs()
        .read_oid(&SymRefName::new(format!("refs/heads/{branch}")))
        .unwrap()
}

fn tracking(repository: &Repository, branch: &str) -> Option<ObjectId> {
    repository
        .refs()
        .read_oid(&SymRefName::new(format!("refs/remotes/origin/{branch}")))
        .unwrap()
}

#[rstest]
#[tokio::test]
async fn clone_checks_out_the_remote_head_branch(workspace_dir: TempDir) {
    let (upstream, clone) = upstream_and_clone(&workspace_dir).await;

    assert_eq!(head(&clone), head(&upstream));
    assert_eq!(tracking(&clone, "master"), head(&upstream));
    assert_eq!(
        clone.refs().current_branch().unwrap().unwrap().as_ref(),
        "master"
    );
    assert_eq!(
        std::fs::read_to_string(clone.path().join("README.md")).unwrap(),
        "# grove"
    );
    assert!(clone.status().await.unwrap().is_clean());

    let upstream_config = clone.upstream_of(&clone.refs().current_branch().unwrap().unwrap()).unwrap().unwrap();
    assert_eq!(upstream_config.remote, "origin");
    assert_eq!(upstream_config.merge, "refs/heads/master");
}

#[rstest]
#[tokio::test]
async fn cloning_an_empty_repository_leaves_an_unborn_head(workspace_dir: TempDir) {
    let upstream = init_repository(&workspace_dir.path().join("empty")).await;

    let clone = Repository::clone_from(
        &uri_of(&upstream),
        workspace_dir.path().join("clone"),
        Arc::new(LocalTransport),
        None,
    )
    .await
    .unwrap();

    assert_eq!(head(&clone), None);
    assert_eq!(clone.remote("origin").unwrap().url, uri_of(&upstream));
}

#[rstest]
#[tokio::test]
async fn cloning_into_a_populated_directory_is_refused(workspace_dir: TempDir) {
    let upstream = init_repository(&workspace_dir.path().join("upstream")).await;
    common::write_file(workspace_dir.path(), "taken/file.txt", "occupied");

    let result = Repository::clone_from(
        &uri_of(&upstream),
        workspace_dir.path().join("taken"),
        Arc::new(LocalTransport),
        None,
    )
    .await;

    assert!(result.is_err());
}

#[rstest]
#[tokio::test]
async fn fetch_moves_tracking_refs_only(workspace_dir: TempDir) {
    let (upstream, clone) = upstream_and_clone(&workspace_dir).await;
    let before = head(&clone);
    let advanced = commit_files(&upstream, &[("README.md", "# grove, now with docs")], "docs").await;

    let fetched = clone.fetch("origin", None).await.unwrap();

    let master = fetched
        .updates
        .iter()
        .find(|update| update.local == "refs/remotes/origin/master")
        .unwrap();
    assert_eq!(master.update, TrackingUpdate::FastForward);
    assert_eq!(master.old, before);
    assert_eq!(master.new, advanced);
    assert!(fetched.objects_received > 0);
    assert_eq!(head(&clone), before);

    let again = clone.fetch("origin", None).await.unwrap();
    assert_eq!(again.changed().count(), 0);
    assert_eq!(again.objects_received, 0);
}

#[rstest]
#[tokio::test]
async fn fetching_an_unknown_remote_is_not_found(workspace_dir: TempDir) {
    let repository = init_repository(workspace_dir.path()).await;

    let error = repository.fetch("nowhere", None).await.unwrap_err();

    assert!(matches!(classify(&error), Some(RepositoryError::NotFound { kind: "remote", .. })));
}

#[rstest]
#[tokio::test]
async fn push_reports_each_ref_on_its_own(workspace_dir: TempDir) {
    let (upstream, clone) = upstream_and_clone(&workspace_dir).await;
    let remote_master = commit_files(&upstream, &[("upstream.txt", "remote work")], "remote").await;

    commit_files(&clone, &[("local.txt", "local work")], "local").await;
    clone.branch_create("feature", None, false, false).await.unwrap();
    let feature = clone.refs().read_ref("feature").unwrap().unwrap();

    let result = clone
        .push(
            PushOptions {
                refspecs: vec!["master".to_string(), "feature".to_string()],
                ..PushOptions::default()
            },
            None,
        )
        .await
        .unwrap();

    let statuses = result
        .outcomes
        .iter()
        .map(|outcome| (outcome.name.as_str(), outcome.status))
        .collect::<Vec<_>>();
    assert_eq!(
        statuses,
        vec![
            ("refs/heads/master", RefUpdateStatus::RejectedNonFastForward),
            ("refs/heads/feature", RefUpdateStatus::Ok),
        ]
    );
    assert!(!result.is_success());
    assert_eq!(remote_branch(&upstream, "master"), Some(remote_master));
    assert_eq!(remote_branch(&upstream, "feature"), Some(feature.clone()));
    assert_eq!(tracking(&clone, "feature"), Some(feature));
}

#[rstest]
#[tokio::test]
async fn forced_push_rewrites_the_remote_branch(workspace_dir: TempDir) {
    let (upstream, clone) = upstream_and_clone(&workspace_dir).await;
    commit_files(&upstream, &[("upstream.txt", "remote work")], "remote").await;
    let local = commit_files(&clone, &[("local.txt", "local work")], "local").await;

    let result = clone
        .push(
            PushOptions {
                force: true,
                ..PushOptions::default()
            },
            None,
        )
        .await
        .unwrap();

    assert!(result.is_success());
    assert_eq!(remote_branch(&upstream, "master"), Some(local.clone()));
    assert_eq!(tracking(&clone, "master"), Some(local));
}

#[rstest]
#[tokio::test]
async fn pull_fast_forwards_a_clean_branch(workspace_dir: TempDir) {
    let (upstream, clone) = upstream_and_clone(&workspace_dir).await;
    let advanced = commit_files(&upstream, &[("CHANGELOG.md", "- first entry")], "changelog").await;

    let pulled = clone.pull(None).await.unwrap();

    assert!(matches!(pulled.merge, MergeOutcome::FastForward { ref to, .. } if to == &advanced));
    assert_eq!(head(&clone), Some(advanced));
    assert!(clone.path().join("CHANGELOG.md").exists());
}

#[rstest]
#[tokio::test]
async fn pull_merges_disjoint_changes(workspace_dir: TempDir) {
    let (upstream, clone) = upstream_and_clone(&workspace_dir).await;
    let theirs = commit_files(&upstream, &[("upstream.txt", "remote work")], "remote").await;
    let ours = commit_files(&clone, &[("local.txt", "local work")], "local").await;

    let pulled = clone.pull(None).await.unwrap();

    let MergeOutcome::Merged { oid } = pulled.merge else {
        panic!("expected a merge commit, got {:?}", pulled.merge);
    };
    let merge = clone.database().parse_object_as_commit(&oid).unwrap();
    assert_eq!(merge.parents(), &[ours, theirs]);
    assert!(clone.path().join("upstream.txt").exists());
    assert!(clone.path().join("local.txt").exists());
}

#[rstest]
#[tokio::test]
async fn pull_refuses_conflicting_histories(workspace_dir: TempDir) {
    let (upstream, clone) = upstream_and_clone(&workspace_dir).await;
    commit_files(&upstream, &[("README.md", "# grove upstream")], "remote").await;
    let ours = commit_files(&clone, &[("README.md", "# grove local")], "local").await;

    let error = clone.pull(None).await.unwrap_err();

    assert!(matches!(
        classify(&error),
        Some(RepositoryError::DivergedHistory { branch, .. }) if branch == "master"
    ));
    assert_eq!(head(&clone), Some(ours));
    assert_eq!(
        std::fs::read_to_string(clone.path().join("README.md")).unwrap(),
        "# grove local"
    );
    assert!(clone.status().await.unwrap().is_clean());
}

#[rstest]
#[tokio::test]
async fn pull_without_upstream_is_not_found(workspace_dir: TempDir) {
    let repository = init_repository(workspace_dir.path()).await;
    commit_files(&repository, &[("a.txt", "a")], "first").await;

    let error = repository.pull(None).await.unwrap_err();

    assert!(matches!(classify(&error), Some(RepositoryError::NotFound { kind: "upstream", .. })));
}

#[rstest]
#[tokio::test]
async fn concurrent_commits_on_one_repository_all_land(workspace_dir: TempDir) {
    let repository = init_repository(workspace_dir.path()).await;
    let base = commit_files(&repository, &[("a.txt", "a")], "base").await;

    let outcomes = futures::future::join_all((0..4).map(|n| {
        repository.commit(CommitOptions {
            allow_empty: true,
            ..CommitOptions::with_message(format!("concurrent {n}"))
        })
    }))
    .await
    .into_iter()
    .collect::<anyhow::Result<Vec<_>>>()
    .unwrap();

    let history = repository
        .log(&[])
        .unwrap()
        .map(|step| step.unwrap().0)
        .collect::<Vec<_>>();
    assert_eq!(history.len(), 5);
    assert_eq!(history.last(), Some(&base));
    for outcome in &outcomes {
        assert!(history.contains(&outcome.oid));
        assert_eq!(outcome.commit.parents().len(), 1);
    }
}

#[rstest]
#[tokio::test]
async fn stale_ref_updates_are_rejected(workspace_dir: TempDir) {
    let repository = init_repository(workspace_dir.path()).await;
    let first = commit_files(&repository, &[("a.txt", "a")], "first").await;
    let second = commit_files(&repository, &[("a.txt", "b")], "second").await;

    let error = repository
        .refs()
        .update_ref(&SymRefName::head(), Some(&first), &first)
        .unwrap_err();

    assert!(matches!(classify(&error), Some(RepositoryError::RefConflict { .. })));
    assert_eq!(head(&repository), Some(second));
}

/// Answers nothing for an hour
struct StalledTransport;

#[async_trait]
impl Transport for StalledTransport {
    async fn list_refs(&self, _: &str, _: Option<&Credentials>) -> anyhow::Result<Advertisement> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(Advertisement::default())
    }

    async fn fetch_objects(
        &self,
        _: &str,
        _: &[ObjectId],
        _: &[ObjectId],
        _: Option<&Credentials>,
    ) -> anyhow::Result<Vec<RawObject>> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(vec![])
    }

    async fn push_objects(
        &self,
        _: &str,
        _: Vec<RawObject>,
        _: Vec<RefUpdate>,
        _: Option<&Credentials>,
    ) -> anyhow::Result<Vec<RefUpdateOutcome>> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(vec![])
    }
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn a_stalled_remote_times_out(workspace_dir: TempDir) {
    let repository = init_repository(workspace_dir.path())
        .await
        .with_transport(Arc::new(StalledTransport));
    repository.remote_add("origin", "file:///srv/stalled").unwrap();
    let before = repository.refs().list_refs("refs/").unwrap();

    let error = repository.fetch("origin", None).await.unwrap_err();

    assert!(matches!(
        classify(&error),
        Some(RepositoryError::Transport { uri, .. }) if uri == "file:///srv/stalled"
    ));
    assert_eq!(repository.refs().list_refs("refs/").unwrap(), before);
}

/// Serves the remote faithfully but delivers only the first object of a fetch
struct TruncatingTransport(LocalTransport);

#[async_trait]
impl Transport for TruncatingTransport {
    async fn list_refs(
        &self,
        uri: &str,
        credentials: Option<&Credentials>,
    ) -> anyhow::Result<Advertisement> {
        self.0.list_refs(uri, credentials).await
    }

    async fn fetch_objects(
        &self,
        uri: &str,
        wants: &[ObjectId],
        haves: &[ObjectId],
        credentials: Option<&Credentials>,
    ) -> anyhow::Result<Vec<RawObject>> {
        let mut objects = self.0.fetch_objects(uri, wants, haves, credentials).await?;
        objects.truncate(1);
        Ok(objects)
    }

    async fn push_objects(
        &self,
        uri: &str,
        objects: Vec<RawObject>,
        updates: Vec<RefUpdate>,
        credentials: Option<&Credentials>,
    ) -> anyhow::Result<Vec<RefUpdateOutcome>> {
        self.0.push_objects(uri, objects, updates, credentials).await
    }
}

#[rstest]
#[tokio::test]
async fn incomplete_fetch_moves_no_refs(workspace_dir: TempDir) {
    let upstream = init_repository(&workspace_dir.path().join("upstream")).await;
    commit_files(&upstream, &[("README.md", "# grove"), ("src/lib.rs", "")], "initial").await;
    upstream.tag("v1.0", None, None, false).await.unwrap();
    let repository = init_repository(&workspace_dir.path().join("local"))
        .await
        .with_transport(Arc::new(TruncatingTransport(LocalTransport)));
    repository.remote_add("origin", &uri_of(&upstream)).unwrap();

    let error = repository.fetch("origin", None).await.unwrap_err();

    assert!(matches!(
        classify(&error),
        Some(RepositoryError::Transport { reason, .. }) if reason.contains("incomplete transfer")
    ));
    assert_eq!(repository.refs().list_refs("refs/").unwrap(), vec![]);
    assert_eq!(tracking(&repository, "master"), None);
}
