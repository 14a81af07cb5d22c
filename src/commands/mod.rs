//! Repository operations
//!
//! Every command is a method on [`Repository`](crate::areas::repository::Repository)
//! returning a typed result; presentation is left to the caller.
//!
//! - `plumbing`: direct object and tree manipulation (cat-file, hash-object,
//!   ls-tree, write-tree, commit-tree)
//! - `porcelain`: local workflows (init, add, rm, commit, status, branch, tag,
//!   checkout, log, merge)
//! - `sync`: working with remotes (fetch, push, pull, clone, submodules)

pub mod plumbing;
pub mod porcelain;
pub mod sync;
