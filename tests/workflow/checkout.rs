use assert_fs::TempDir;
use grove::commands::porcelain::checkout::CheckoutTarget;
use grove::errors::{RepositoryError, classify};
use pretty_assertions::assert_eq;
use rstest::rstest;

use crate::common::{commit_files, head, init_repository, workspace_dir, write_file};

#[rstest]
#[tokio::test]
async fn checkout_switches_files_and_head(workspace_dir: TempDir) {
    let repository = init_repository(workspace_dir.path()).await;
    let first = commit_files(&repository, &[("1.txt", "one")], "first").await;
    repository.branch_create("old", None, false, false).await.unwrap();
    commit_files(&repository, &[("1.txt", "two"), ("2.txt", "second file")], "second").await;

    let target = repository.checkout("old").await.unwrap();

    assert!(matches!(target, CheckoutTarget::Branch(ref branch) if branch.as_ref() == "old"));
    assert_eq!(std::fs::read_to_string(repository.path().join("1.txt")).unwrap(), "one");
    assert!(!repository.path().join("2.txt").exists());
    assert_eq!(head(&repository), Some(first.clone()));

    let detached = repository.checkout("master").await.unwrap();
    assert!(matches!(detached, CheckoutTarget::Branch(_)));
    let detached = repository.checkout(first.as_ref()).await.unwrap();
    assert_eq!(detached, CheckoutTarget::Detached(first));
}

#[rstest]
#[tokio::test]
async fn checkout_refuses_to_clobber_local_edits(workspace_dir: TempDir) {
    let repository = init_repository(workspace_dir.path()).await;
    commit_files(&repository, &[("1.txt", "one")], "first").await;
    repository.branch_create("old", None, false, false).await.unwrap();
    commit_files(&repository, &[("1.txt", "two")], "second").await;
    write_file(repository.path(), "1.txt", "local edit that is longer");

    let error = repository.checkout("old").await.unwrap_err();

    assert!(matches!(
        classify(&error),
        Some(RepositoryError::LocalChangesWouldBeOverwritten { .. })
    ));
    assert_eq!(
        std::fs::read_to_string(repository.path().join("1.txt")).unwrap(),
        "local edit that is longer"
    );
}
