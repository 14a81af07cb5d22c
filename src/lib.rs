//! grove
//!
//! A content-addressed version-control core: object database, index, refs with
//! remote tracking, submodule linkage and a sync engine running over a pluggable
//! transport. Layout:
//!
//! - `areas`: the on-disk areas of a repository (database, index, refs, workspace)
//! - `artifacts`: data structures and algorithms operating on those areas
//! - `commands`: plumbing and porcelain operations exposed on [`Repository`]
//! - `errors`: the typed failure taxonomy

pub mod areas;
pub mod artifacts;
pub mod commands;
pub mod errors;

pub use areas::repository::Repository;
pub use errors::RepositoryError;
