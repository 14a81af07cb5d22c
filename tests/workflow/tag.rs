use assert_fs::TempDir;
use grove::errors::{RepositoryError, classify};
use pretty_assertions::assert_eq;
use rstest::rstest;

use crate::common::{commit_files, init_repository, workspace_dir};

#[rstest]
#[tokio::test]
async fn annotated_tags_peel_to_their_commit(workspace_dir: TempDir) {
    let repository = init_repository(workspace_dir.path()).await;
    let commit = commit_files(&repository, &[("1.txt", "one")], "first").await;

    let tag_object = repository.tag("v1.0", None, Some("first release"), false).await.unwrap();
    let lightweight = repository.tag("latest", None, None, false).await.unwrap();

    assert_ne!(tag_object, commit);
    assert_eq!(lightweight, commit);
    assert_eq!(repository.database().peel_to_commit(&tag_object).unwrap(), commit);
    assert_eq!(
        repository.tag_list().unwrap().into_iter().map(|(name, _)| name).collect::<Vec<_>>(),
        vec!["latest".to_string(), "v1.0".to_string()]
    );
    let error = repository.tag("v1.0", None, None, false).await.unwrap_err();
    assert!(matches!(classify(&error), Some(RepositoryError::RefExists(_))));
}
