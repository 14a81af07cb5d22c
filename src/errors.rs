//! Typed failures surfaced by repository operations
//!
//! Operations return `anyhow::Result` so call sites can attach context, but every
//! failure a caller may want to react to is raised as a [`RepositoryError`] and can
//! be classified with `error.downcast_ref::<RepositoryError>()`.

use crate::artifacts::objects::object_id::ObjectId;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RepositoryError {
    /// A missing object, ref, remote or repository.
    #[error("{kind} not found: {name}")]
    NotFound { kind: &'static str, name: String },

    /// Stored bytes do not hash to the id they were stored under, or do not
    /// decode into a well-formed object.
    #[error("object {oid} is corrupt: {actual}")]
    Integrity { oid: ObjectId, actual: String },

    /// Compare-and-swap on a ref lost against a concurrent update.
    #[error(
        "ref {name} was updated concurrently: expected {}, found {}",
        describe_oid(.expected.as_ref()),
        describe_oid(.actual.as_ref())
    )]
    RefConflict {
        name: String,
        expected: Option<ObjectId>,
        actual: Option<ObjectId>,
    },

    #[error("cannot write tree with unmerged paths: {}", join_paths(.paths))]
    UnresolvedConflict { paths: Vec<PathBuf> },

    #[error("nothing to commit, tree {tree} is unchanged")]
    EmptyCommit { tree: ObjectId },

    #[error(
        "branch '{branch}' has diverged from '{upstream}' and cannot be merged cleanly: {}",
        join_paths(.conflicts)
    )]
    DivergedHistory {
        branch: String,
        upstream: String,
        conflicts: Vec<PathBuf>,
    },

    #[error("transport failure for '{uri}': {reason}")]
    Transport { uri: String, reason: String },

    #[error("a ref named '{0}' already exists")]
    RefExists(String),

    #[error("local changes would be overwritten: {}", join_paths(.paths))]
    LocalChangesWouldBeOverwritten { paths: Vec<PathBuf> },
}

impl RepositoryError {
    pub fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        RepositoryError::NotFound {
            kind,
            name: name.into(),
        }
    }

    pub fn transport(uri: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        RepositoryError::Transport {
            uri: uri.into(),
            reason: reason.to_string(),
        }
    }
}

fn describe_oid(oid: Option<&ObjectId>) -> String {
    oid.map(|oid| oid.to_string())
        .unwrap_or_else(|| "nothing".to_string())
}

fn join_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|path| path.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Classify an error chain, looking through any context layers.
pub fn classify(error: &anyhow::Error) -> Option<&RepositoryError> {
    error.downcast_ref::<RepositoryError>()
}
