//! Local workflows
//!
//! - `init`: create the `.git` layout
//! - `add`, `rm`: stage and unstage paths, nested repositories as gitlinks
//! - `commit`: record the index on top of HEAD
//! - `status`: HEAD, index and working tree compared
//! - `branch`, `tag`: manage refs, including upstream configuration
//! - `checkout`: switch the working tree to another revision
//! - `log`: commit history
//! - `merge`: fast-forward or three-way tree merge

pub mod add;
pub mod branch;
pub mod checkout;
pub mod commit;
pub mod init;
pub mod log;
pub mod merge;
pub mod rm;
pub mod status;
pub mod tag;
