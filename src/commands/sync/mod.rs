//! Sync engine: moving history between repositories
//!
//! - `remote`: named remotes kept in `.git/config`
//! - `fetch`: download missing objects, then move remote-tracking refs
//! - `push`: upload objects, then compare-and-swap each remote ref
//! - `pull`: fetch the upstream and merge it, refusing conflicting histories
//! - `clone`: a fresh repository populated from a remote
//! - `submodule`: nested repositories pinned by gitlinks
//!
//! Remotes are only reached through the repository's [`Transport`], every call
//! bounded by the transport timeout.
//!
//! [`Transport`]: crate::artifacts::transport::Transport

pub mod clone;
pub mod fetch;
pub mod pull;
pub mod push;
pub mod remote;
pub mod submodule;
