use assert_fs::TempDir;
use grove::errors::{RepositoryError, classify};
use pretty_assertions::assert_eq;
use rstest::rstest;

use crate::common::{commit_files, init_repository, workspace_dir};

#[rstest]
#[tokio::test]
async fn branch_create_respects_force(workspace_dir: TempDir) {
    let repository = init_repository(workspace_dir.path()).await;
    let first = commit_files(&repository, &[("1.txt", "one")], "first").await;
    let second = commit_files(&repository, &[("1.txt", "two")], "second").await;

    repository.branch_create("topic", Some("HEAD^"), false, false).await.unwrap();
    let error = repository
        .branch_create("topic", None, false, false)
        .await
        .unwrap_err();
    assert!(matches!(classify(&error), Some(RepositoryError::RefExists(_))));

    let moved = repository.branch_create("topic", Some(second.as_ref()), false, true).await.unwrap();

    assert_eq!(moved, second);
    assert_eq!(repository.refs().read_ref("topic").unwrap(), Some(second));
    assert_ne!(moved, first);
}

#[rstest]
#[tokio::test]
async fn local_start_point_sets_a_dot_upstream(workspace_dir: TempDir) {
    let repository = init_repository(workspace_dir.path()).await;
    commit_files(&repository, &[("1.txt", "one")], "first").await;

    repository.branch_create("topic", Some("master"), true, false).await.unwrap();

    let topic = repository
        .branch_list()
        .unwrap()
        .into_iter()
        .find(|branch| branch.name.as_ref() == "topic")
        .unwrap();
    let upstream = topic.upstream.unwrap();
    assert_eq!(upstream.remote, ".");
    assert_eq!(upstream.merge, "refs/heads/master");
    assert!(!topic.is_current);
}
