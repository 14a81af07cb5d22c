//! Merge support
//!
//! - `bca_finder`: best common ancestor search and ancestry checks
//! - `tree_merge`: path-level three-way merge of flattened trees

pub mod bca_finder;
pub mod tree_merge;
