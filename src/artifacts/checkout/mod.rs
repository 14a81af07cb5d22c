//! Moving a working tree and its index between two trees
//!
//! Checkout, merge, pull, clone and submodule update all go through
//! [`migration::Migration`]. Every clash with local work is collected before
//! the first file is written, so a refused move leaves the tree as it was.

pub mod conflict;
pub mod migration;
