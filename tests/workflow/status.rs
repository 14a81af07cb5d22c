use assert_fs::TempDir;
use pretty_assertions::assert_eq;
use rstest::rstest;
use std::collections::BTreeSet;
use std::path::PathBuf;

use crate::common::{commit_files, init_repository, workspace_dir, write_file};

#[rstest]
#[tokio::test]
async fn status_reports_every_category(workspace_dir: TempDir) {
    let repository = init_repository(workspace_dir.path()).await;
    commit_files(
        &repository,
        &[("kept.txt", "kept"), ("edited.txt", "before"), ("gone.txt", "gone")],
        "first",
    )
    .await;

    write_file(repository.path(), "edited.txt", "after, and longer");
    std::fs::remove_file(repository.path().join("gone.txt")).unwrap();
    write_file(repository.path(), "new.txt", "new");
    repository.add(&[PathBuf::from("new.txt")]).await.unwrap();
    write_file(repository.path(), "scratch/notes.txt", "untracked");

    let report = repository.status().await.unwrap();

    assert_eq!(report.added, BTreeSet::from([PathBuf::from("new.txt")]));
    assert_eq!(report.changed_in_workspace, BTreeSet::from([PathBuf::from("edited.txt")]));
    assert_eq!(report.missing, BTreeSet::from([PathBuf::from("gone.txt")]));
    assert_eq!(report.untracked, BTreeSet::from([PathBuf::from("scratch/")]));
    assert!(report.modified.is_empty());
}

#[rstest]
#[tokio::test]
async fn same_size_edits_are_found_by_content(workspace_dir: TempDir) {
    let repository = init_repository(workspace_dir.path()).await;
    commit_files(&repository, &[("1.txt", "one")], "first").await;

    let path = write_file(repository.path(), "1.txt", "two");
    let later = filetime::FileTime::from_unix_time(filetime::FileTime::now().unix_seconds() + 60, 0);
    filetime::set_file_mtime(&path, later).unwrap();

    let report = repository.status().await.unwrap();

    assert_eq!(report.changed_in_workspace, BTreeSet::from([PathBuf::from("1.txt")]));
}
