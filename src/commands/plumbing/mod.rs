//! Plumbing commands (low-level operations)
//!
//! Direct access to the object database and trees, used by scripts and as the
//! building blocks of the porcelain.
//!
//! ## Commands
//!
//! - `cat-file`: read an object by full or abbreviated id
//! - `hash-object`: compute a file's blob id and optionally store it
//! - `ls-tree`: list the entries of a tree or commit
//! - `write-tree` / `write-commit`: store the index as a tree, store commits

pub mod cat_file;
pub mod hash_object;
pub mod ls_tree;
pub mod write_commit;
