//! Working tree status inspection
//!
//! Compares the working directory against the index and the index against the
//! HEAD commit.
//!
//! ## Components
//!
//! - `file_change`: change categories and their status codes
//! - `inspector`: per-entry comparisons, nested repositories included
//! - `status_info`: the scan producing a `StatusReport`

pub mod file_change;
pub mod inspector;
pub mod status_info;
