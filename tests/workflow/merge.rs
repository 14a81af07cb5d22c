use assert_fs::TempDir;
use grove::commands::porcelain::commit::CommitOptions;
use grove::commands::porcelain::merge::MergeOutcome;
use grove::errors::{RepositoryError, classify};
use pretty_assertions::assert_eq;
use rstest::rstest;
use std::path::PathBuf;

use crate::common::{commit_files, init_repository, workspace_dir, write_file};

#[rstest]
#[tokio::test]
async fn merge_fast_forwards_then_merges_cleanly(workspace_dir: TempDir) {
    let repository = init_repository(workspace_dir.path()).await;
    let base = commit_files(&repository, &[("shared.txt", "base")], "base").await;
    repository.branch_create("topic", None, false, false).await.unwrap();

    repository.checkout("topic").await.unwrap();
    let topic = commit_files(&repository, &[("topic.txt", "topic work")], "topic").await;
    repository.checkout("master").await.unwrap();

    let outcome = repository.merge("topic", None).await.unwrap();
    assert_eq!(
        outcome,
        MergeOutcome::FastForward {
            from: Some(base),
            to: topic.clone()
        }
    );

    repository.checkout("topic").await.unwrap();
    commit_files(&repository, &[("topic.txt", "more topic work")], "topic 2").await;
    repository.checkout("master").await.unwrap();
    commit_files(&repository, &[("master.txt", "master work")], "master").await;

    let MergeOutcome::Merged { oid } = repository.merge("topic", None).await.unwrap() else {
        panic!("expected a merge commit");
    };

    let merge = repository.database().parse_object_as_commit(&oid).unwrap();
    assert_eq!(merge.parents().len(), 2);
    assert_eq!(
        std::fs::read_to_string(repository.path().join("topic.txt")).unwrap(),
        "more topic work"
    );
    assert!(repository.path().join("master.txt").exists());
    assert_eq!(repository.merge("topic", None).await.unwrap(), MergeOutcome::AlreadyUpToDate);
}

#[rstest]
#[tokio::test]
async fn conflicting_merge_blocks_commit_until_resolved(workspace_dir: TempDir) {
    let repository = init_repository(workspace_dir.path()).await;
    commit_files(&repository, &[("shared.txt", "base")], "base").await;
    repository.branch_create("topic", None, false, false).await.unwrap();
    repository.checkout("topic").await.unwrap();
    let topic = commit_files(&repository, &[("shared.txt", "theirs")], "topic").await;
    repository.checkout("master").await.unwrap();
    let ours = commit_files(&repository, &[("shared.txt", "ours")], "master").await;

    let outcome = repository.merge("topic", None).await.unwrap();
    assert_eq!(
        outcome,
        MergeOutcome::Conflicted {
            paths: vec![PathBuf::from("shared.txt")]
        }
    );

    let error = repository.write_tree().await.unwrap_err();
    assert!(matches!(classify(&error), Some(RepositoryError::UnresolvedConflict { .. })));

    write_file(repository.path(), "shared.txt", "resolved");
    repository.add(&[PathBuf::from("shared.txt")]).await.unwrap();
    let resolved = repository
        .commit(CommitOptions::with_message("resolve"))
        .await
        .unwrap();

    assert_eq!(resolved.commit.parents(), &[ours, topic]);
}
