use assert_fs::TempDir;
use grove::artifacts::objects::commit::Author;
use grove::commands::porcelain::commit::CommitOptions;
use grove::errors::{RepositoryError, classify};
use pretty_assertions::assert_eq;
use rstest::rstest;
use std::path::PathBuf;

use crate::common::{commit_files, head, init_repository, workspace_dir, write_file};

#[rstest]
#[tokio::test]
async fn committing_an_unchanged_tree_is_an_empty_commit(workspace_dir: TempDir) {
    let repository = init_repository(workspace_dir.path()).await;
    commit_files(&repository, &[("1.txt", "one")], "first").await;

    let error = repository
        .commit(CommitOptions::with_message("again"))
        .await
        .unwrap_err();

    assert!(matches!(classify(&error), Some(RepositoryError::EmptyCommit { .. })));

    let allowed = repository
        .commit(CommitOptions {
            allow_empty: true,
            ..CommitOptions::with_message("again")
        })
        .await
        .unwrap();
    assert_eq!(head(&repository), Some(allowed.oid));
}

#[rstest]
#[tokio::test]
async fn explicit_author_leaves_the_configured_committer(workspace_dir: TempDir) {
    let repository = init_repository(workspace_dir.path()).await;
    write_file(repository.path(), "a.txt", "content");
    repository.add(&[PathBuf::from("a.txt")]).await.unwrap();

    let outcome = repository
        .commit(CommitOptions {
            author: Some(Author::new("John Locke".to_string(), "john.locke@815.com".to_string())),
            ..CommitOptions::with_message("the island")
        })
        .await
        .unwrap();

    assert_eq!(outcome.commit.author().name(), "John Locke");
    assert_eq!(outcome.commit.author().email(), "john.locke@815.com");
    assert_ne!(outcome.commit.committer(), outcome.commit.author());
    assert!(outcome.is_root);
}
