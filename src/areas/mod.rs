//! Core repository components
//!
//! - `database`: content-addressed object store
//! - `index`: staging area with merge stages
//! - `refs`: branches, tags, remote-tracking refs and HEAD
//! - `repository`: ties the areas of one working tree together
//! - `workspace`: working directory file system operations

pub mod database;
pub mod index;
pub mod refs;
pub mod repository;
pub mod workspace;
