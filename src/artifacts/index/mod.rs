//! On-disk index layout (version 2)
//!
//! ```text
//! "DIRC" | version: u32 = 2 | entry count: u32
//! entries, sorted by (path, stage), each padded with NULs to 8 bytes
//! SHA-1 of everything above
//! ```
//!
//! Gitlink entries carry mode 160000 and the pinned commit id; conflict
//! stages 1 to 3 share the path of the entry they replace.

pub mod checksum;
pub mod entry_mode;
pub mod index_entry;
pub mod index_header;

pub const CHECKSUM_SIZE: usize = 20;

/// Signature, version and entry count
pub const HEADER_SIZE: usize = 12;

pub const SIGNATURE: &str = "DIRC";

pub const VERSION: u32 = 2;
