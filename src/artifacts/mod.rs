//! Git data structures and algorithms
//!
//! - `branch`: ref names and revision parsing
//! - `checkout`: working tree migrations and conflict detection
//! - `config`: git-style INI files and identity resolution
//! - `database`: database entry types
//! - `diff`: tree to tree comparison
//! - `index`: index entry format
//! - `log`: commit history traversal
//! - `merge`: merge bases and three-way tree merges
//! - `objects`: blob, tree, commit and tag objects
//! - `status`: working tree status inspection
//! - `submodule`: `.gitmodules` records and submodule status
//! - `transport`: moving objects and refs between repositories

pub mod branch;
pub mod checkout;
pub mod config;
pub mod database;
pub mod diff;
pub mod index;
pub mod log;
pub mod merge;
pub mod objects;
pub mod status;
pub mod submodule;
pub mod transport;
