use assert_fs::TempDir;
use grove::errors::{RepositoryError, classify};
use pretty_assertions::assert_eq;
use rstest::rstest;
use std::collections::BTreeSet;
use std::path::PathBuf;

use crate::common::{commit_files, init_repository, workspace_dir, write_file};

#[rstest]
#[tokio::test]
async fn rm_untracks_and_deletes_unless_cached(workspace_dir: TempDir) {
    let repository = init_repository(workspace_dir.path()).await;
    commit_files(&repository, &[("a.txt", "a"), ("b.txt", "b")], "first").await;

    repository.rm(&[PathBuf::from("a.txt")], false).await.unwrap();
    repository.rm(&[PathBuf::from("b.txt")], true).await.unwrap();

    assert!(!repository.path().join("a.txt").exists());
    assert!(repository.path().join("b.txt").exists());
    let report = repository.status().await.unwrap();
    assert_eq!(
        report.removed,
        BTreeSet::from([PathBuf::from("a.txt"), PathBuf::from("b.txt")])
    );

    let error = repository.rm(&[PathBuf::from("never.txt")], false).await.unwrap_err();
    assert!(matches!(classify(&error), Some(RepositoryError::NotFound { .. })));
}

#[rstest]
#[tokio::test]
async fn adding_a_missing_path_fails_without_staging_anything(workspace_dir: TempDir) {
    let repository = init_repository(workspace_dir.path()).await;

    let error = repository
        .add(&[PathBuf::from("does-not-exist.txt")])
        .await
        .unwrap_err();

    assert!(matches!(classify(&error), Some(RepositoryError::NotFound { kind: "path", .. })));
}

#[rstest]
#[tokio::test]
async fn paths_outside_the_working_tree_are_refused(workspace_dir: TempDir) {
    let repository = init_repository(&workspace_dir.path().join("repo")).await;
    write_file(workspace_dir.path(), "outside.txt", "not ours");
    write_file(repository.path(), "inside.txt", "ours");

    for path in ["../outside.txt", "sub/../../outside.txt", ".git/config"] {
        let result = repository.add(&[PathBuf::from(path)]).await;
        assert!(result.is_err(), "{path} was accepted");
    }
    let absolute = workspace_dir.path().join("outside.txt");
    assert!(repository.add(&[absolute]).await.is_err());

    let staged = repository
        .add(&[PathBuf::from("sub/../inside.txt")])
        .await
        .unwrap()
        .staged;
    assert_eq!(staged, vec![PathBuf::from("inside.txt")]);
    let report = repository.status().await.unwrap();
    assert_eq!(report.added, BTreeSet::from([PathBuf::from("inside.txt")]));
}
