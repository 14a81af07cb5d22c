use assert_fs::TempDir;
use grove::Repository;
use grove::artifacts::submodule::SubmoduleStatusType;
use grove::artifacts::transport::local::LocalTransport;
use grove::commands::porcelain::commit::CommitOptions;
use grove::commands::porcelain::merge::MergeOutcome;
use grove::commands::sync::push::PushOptions;
use pretty_assertions::assert_eq;
use rstest::rstest;
use std::path::{Path, PathBuf};
use std::sync::Arc;

mod common;
use common::{commit_files, head, init_repository, set_identity, uri_of, workspace_dir, write_file};

const LIBRARY_PATH: &str = "recipes-common";

/// A parent repository with `library` committed as a submodule
async fn parent_with_submodule(root: &TempDir) -> (Repository, Repository) {
    let library = init_repository(&root.path().join("library")).await;
    commit_files(&library, &[("lib.rs", "pub fn answer() -> u32 { 42 }")], "library").await;

    let parent = init_repository(&root.path().join("parent")).await;
    commit_files(&parent, &[("main.rs", "fn main() {}")], "parent").await;
    parent
        .submodule_add(Path::new(LIBRARY_PATH), &uri_of(&library), None)
        .await
        .unwrap();
    parent
        .commit(CommitOptions::with_message("add library"))
        .await
        .unwrap();

    (library, parent)
}

fn open_nested(parent: &Repository) -> Repository {
    let nested = Repository::open(parent.path().join(LIBRARY_PATH)).unwrap();
    set_identity(&nested);
    nested
}

async fn status_of(parent: &Repository) -> SubmoduleStatusType {
    parent.submodule_status().await.unwrap()[Path::new(LIBRARY_PATH)].status
}

#[rstest]
#[tokio::test]
async fn added_submodule_is_pinned_at_its_head(workspace_dir: TempDir) {
    let (library, parent) = parent_with_submodule(&workspace_dir).await;

    let statuses = parent.submodule_status().await.unwrap();
    let library_status = &statuses[Path::new(LIBRARY_PATH)];

    assert_eq!(library_status.status, SubmoduleStatusType::Initialized);
    assert_eq!(library_status.record.pinned, head(&library));
    assert_eq!(library_status.record.url, uri_of(&library));
    assert!(parent.status().await.unwrap().is_clean());
    assert!(
        std::fs::read_to_string(parent.path().join(".gitmodules"))
            .unwrap()
            .contains(LIBRARY_PATH)
    );
}

#[rstest]
#[tokio::test]
async fn staging_inside_a_submodule_stays_in_the_submodule(workspace_dir: TempDir) {
    let (_library, parent) = parent_with_submodule(&workspace_dir).await;
    let nested = open_nested(&parent);

    write_file(nested.path(), "extra.rs", "pub fn extra() {}");
    nested.add(&[PathBuf::from("extra.rs")]).await.unwrap();

    let nested_report = nested.status().await.unwrap();
    assert_eq!(
        nested_report.added.into_iter().collect::<Vec<_>>(),
        vec![PathBuf::from("extra.rs")]
    );

    let parent_report = parent.status().await.unwrap();
    assert!(parent_report.is_clean());
    assert!(parent_report.untracked.is_empty());
    assert_eq!(status_of(&parent).await, SubmoduleStatusType::Modified);
}

#[rstest]
#[tokio::test]
async fn parent_add_never_reaches_into_a_submodule(workspace_dir: TempDir) {
    let (_library, parent) = parent_with_submodule(&workspace_dir).await;
    write_file(&parent.path().join(LIBRARY_PATH), "inner.rs", "// inner");

    let result = parent
        .add(&[PathBuf::from(LIBRARY_PATH).join("inner.rs")])
        .await
        .unwrap();

    assert!(result.staged.is_empty());
    assert_eq!(result.skipped, vec![PathBuf::from(LIBRARY_PATH).join("inner.rs")]);
}

#[rstest]
#[tokio::test]
async fn advancing_a_submodule_needs_a_recorded_pin(workspace_dir: TempDir) {
    let (_library, parent) = parent_with_submodule(&workspace_dir).await;
    let nested = open_nested(&parent);
    let advanced = commit_files(&nested, &[("lib.rs", "pub fn answer() -> u32 { 43 }")], "bump").await;

    let parent_head = head(&parent);
    assert_eq!(status_of(&parent).await, SubmoduleStatusType::RevCheckedOut);
    assert_eq!(head(&parent), parent_head);
    assert!(
        parent
            .status()
            .await
            .unwrap()
            .changed_in_workspace
            .contains(Path::new(LIBRARY_PATH))
    );

    let pin = parent
        .submodule_record_pin(Path::new(LIBRARY_PATH), None)
        .await
        .unwrap();
    parent
        .commit(CommitOptions::with_message("bump library"))
        .await
        .unwrap();

    assert_eq!(pin, advanced);
    assert_ne!(head(&parent), parent_head);
    let statuses = parent.submodule_status().await.unwrap();
    assert_eq!(statuses.len(), 1);
    assert_eq!(statuses[Path::new(LIBRARY_PATH)].record.pinned, head(&nested));
    assert_eq!(status_of(&parent).await, SubmoduleStatusType::Initialized);
    assert!(parent.status().await.unwrap().is_clean());
}

#[rstest]
#[tokio::test]
async fn update_checks_out_the_pin_in_a_fresh_clone(workspace_dir: TempDir) {
    let (library, parent) = parent_with_submodule(&workspace_dir).await;
    let nested = open_nested(&parent);
    let pinned = commit_files(&nested, &[("lib.rs", "pub fn answer() -> u32 { 43 }")], "bump").await;
    let pushed = nested.push(PushOptions::default(), None).await.unwrap();
    assert!(pushed.is_success());
    parent
        .submodule_record_pin(Path::new(LIBRARY_PATH), None)
        .await
        .unwrap();
    parent
        .commit(CommitOptions::with_message("bump library"))
        .await
        .unwrap();
    commit_files(&library, &[("lib.rs", "pub fn answer() -> u32 { 44 }")], "ahead of the pin").await;

    let fresh = Repository::clone_from(
        &uri_of(&parent),
        workspace_dir.path().join("fresh"),
        Arc::new(LocalTransport),
        None,
    )
    .await
    .unwrap();
    assert_eq!(status_of(&fresh).await, SubmoduleStatusType::Uninitialized);

    let updated = fresh.submodule_update(None, None).await.unwrap();

    assert_eq!(updated, vec![(PathBuf::from(LIBRARY_PATH), pinned.clone())]);
    let fresh_nested = Repository::open(fresh.path().join(LIBRARY_PATH)).unwrap();
    assert_eq!(head(&fresh_nested), Some(pinned));
    assert_eq!(fresh_nested.refs().current_branch().unwrap(), None);
    assert_eq!(
        std::fs::read_to_string(fresh_nested.path().join("lib.rs")).unwrap(),
        "pub fn answer() -> u32 { 43 }"
    );
    assert_eq!(status_of(&fresh).await, SubmoduleStatusType::Initialized);
}

#[rstest]
#[tokio::test]
async fn a_path_can_only_be_added_once(workspace_dir: TempDir) {
    let (library, parent) = parent_with_submodule(&workspace_dir).await;

    let result = parent
        .submodule_add(Path::new(LIBRARY_PATH), &uri_of(&library), None)
        .await;

    assert!(result.is_err());
}

#[rstest]
#[tokio::test]
async fn update_restores_the_pin_until_a_new_one_is_recorded(workspace_dir: TempDir) {
    let (library, parent) = parent_with_submodule(&workspace_dir).await;
    let original_pin = head(&library).unwrap();
    let parent_head = head(&parent);
    let nested = open_nested(&parent);
    let advanced = commit_files(&nested, &[("lib.rs", "pub fn answer() -> u32 { 43 }")], "bump").await;

    let updated = parent
        .submodule_update(Some(Path::new(LIBRARY_PATH)), None)
        .await
        .unwrap();

    assert_eq!(updated, vec![(PathBuf::from(LIBRARY_PATH), original_pin.clone())]);
    assert_eq!(head(&nested), Some(original_pin.clone()));
    assert_eq!(
        parent.submodule_status().await.unwrap()[Path::new(LIBRARY_PATH)].record.pinned,
        Some(original_pin.clone())
    );
    assert_eq!(head(&parent), parent_head);

    nested.checkout("master").await.unwrap();
    let pin = parent
        .submodule_record_pin(Path::new(LIBRARY_PATH), None)
        .await
        .unwrap();
    parent
        .commit(CommitOptions::with_message("bump library"))
        .await
        .unwrap();

    assert_eq!(pin, advanced);
    assert_ne!(head(&parent), parent_head);
    assert_eq!(
        parent.submodule_status().await.unwrap()[Path::new(LIBRARY_PATH)].record.pinned,
        Some(advanced)
    );
}

#[rstest]
#[tokio::test]
async fn pulling_inside_a_submodule_then_adding_it_moves_the_pin(workspace_dir: TempDir) {
    let (library, parent) = parent_with_submodule(&workspace_dir).await;
    let parent_head = head(&parent);
    let upstream_commit =
        commit_files(&library, &[("lib.rs", "pub fn answer() -> u32 { 44 }")], "upstream work").await;

    let nested = open_nested(&parent);
    let pulled = nested.pull(None).await.unwrap();
    assert!(matches!(
        pulled.merge,
        MergeOutcome::FastForward { ref to, .. } if to == &upstream_commit
    ));

    let added = parent.add(&[PathBuf::from(LIBRARY_PATH)]).await.unwrap();
    assert_eq!(added.staged, vec![PathBuf::from(LIBRARY_PATH)]);
    parent
        .commit(CommitOptions::with_message("follow library"))
        .await
        .unwrap();

    assert_ne!(head(&parent), parent_head);
    assert_eq!(head(&nested), Some(upstream_commit.clone()));
    assert_eq!(
        parent.submodule_status().await.unwrap()[Path::new(LIBRARY_PATH)].record.pinned,
        Some(upstream_commit)
    );
    assert_eq!(status_of(&parent).await, SubmoduleStatusType::Initialized);
}
