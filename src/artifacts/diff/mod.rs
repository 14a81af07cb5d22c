//! Tree comparison
//!
//! - `tree_diff`: file-level changes between two trees, used by checkout,
//!   merge and fetch reporting

pub mod tree_diff;
