use assert_fs::TempDir;
use grove::errors::{RepositoryError, classify};
use pretty_assertions::assert_eq;
use rstest::rstest;
use std::collections::BTreeSet;

use crate::common::{commit_files, init_repository, workspace_dir};

#[rstest]
#[tokio::test]
async fn log_walks_diamonds_once(workspace_dir: TempDir) {
    let repository = init_repository(workspace_dir.path()).await;
    commit_files(&repository, &[("base.txt", "base")], "base").await;
    repository.branch_create("side", None, false, false).await.unwrap();
    commit_files(&repository, &[("left.txt", "left")], "left").await;
    repository.checkout("side").await.unwrap();
    commit_files(&repository, &[("right.txt", "right")], "right").await;
    repository.checkout("master").await.unwrap();
    repository.merge("side", None).await.unwrap();

    let commits = repository
        .log(&[])
        .unwrap()
        .collect::<anyhow::Result<Vec<_>>>()
        .unwrap();

    let ids = commits.iter().map(|(oid, _)| oid.clone()).collect::<BTreeSet<_>>();
    assert_eq!(commits.len(), 4);
    assert_eq!(ids.len(), 4);
    assert!(commits[0].1.is_merge());
}

#[rstest]
#[tokio::test]
async fn history_of_a_missing_commit_is_an_error(workspace_dir: TempDir) {
    let repository = init_repository(workspace_dir.path()).await;
    commit_files(&repository, &[("base.txt", "base")], "base").await;
    let missing = "0123456789abcdef0123456789abcdef01234567";
    std::fs::write(repository.git_path().join("refs/heads/master"), format!("{missing}\n")).unwrap();

    let error = repository.log(&[]).err().unwrap();

    assert!(matches!(
        classify(&error),
        Some(RepositoryError::NotFound { kind: "object", name }) if name == missing
    ));
}
