#![allow(dead_code)]

use assert_cmd::Command;
use assert_fs::TempDir;
use fake::Fake;
use fake::faker::lorem::en::Words;
use grove::Repository;
use grove::artifacts::objects::object_id::ObjectId;
use grove::commands::porcelain::commit::CommitOptions;
use rstest::fixture;
use std::path::{Path, PathBuf};

pub const USER_NAME: &str = "Kate Austen";
pub const USER_EMAIL: &str = "kate.austen@815.com";

/// A fresh repository with an identity configured
pub async fn init_repository(path: &Path) -> Repository {
    let repository = Repository::new(path).expect("failed to create repository");
    repository.init().await.expect("failed to init repository");
    set_identity(&repository);

    repository
}

pub fn set_identity(repository: &Repository) {
    let mut config = repository.config().expect("failed to read config");
    config.set("user", None, "name", USER_NAME);
    config.set("user", None, "email", USER_EMAIL);
    config.save().expect("failed to save config");
}

pub fn write_file(root: &Path, relative: &str, content: &str) -> PathBuf {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("failed to create parent dirs");
    }
    std::fs::write(&path, content).expect("failed to write file");

    path
}

pub fn random_content() -> String {
    Words(5..10).fake::<Vec<String>>().join(" ")
}

/// Write `files`, stage everything and commit
pub async fn commit_files(repository: &Repository, files: &[(&str, &str)], message: &str) -> ObjectId {
    for (path, content) in files {
        write_file(repository.path(), path, content);
    }
    repository
        .add(&[PathBuf::from(".")])
        .await
        .expect("failed to stage files");

    repository
        .commit(CommitOptions::with_message(message))
        .await
        .expect("failed to commit")
        .oid
}

pub fn head(repository: &Repository) -> Option<ObjectId> {
    repository.refs().read_head().expect("failed to read HEAD")
}

pub fn uri_of(repository: &Repository) -> String {
    repository.path().display().to_string()
}

#[fixture]
pub fn workspace_dir() -> TempDir {
    TempDir::new().expect("failed to create temp dir")
}

pub fn run_grove_command(dir: &Path, args: &[&str]) -> Command {
    let mut cmd = Command::cargo_bin("grove").expect("failed to find grove binary");
    cmd.envs(vec![
        ("NO_PAGER", "1"),
        ("NO_COLOR", "1"),
        ("GIT_AUTHOR_NAME", USER_NAME),
        ("GIT_AUTHOR_EMAIL", USER_EMAIL),
        ("GIT_COMMITTER_NAME", USER_NAME),
        ("GIT_COMMITTER_EMAIL", USER_EMAIL),
    ]);
    cmd.env_remove("GROVE_LOG");
    cmd.current_dir(dir);
    for arg in args {
        cmd.arg(arg);
    }
    cmd
}
