//! The four object kinds and their canonical encodings
//!
//! An object is stored as `<kind> <size>\0<payload>` and named by the SHA-1 of
//! that whole byte string. Gitlink tree entries point at commits that live in
//! another repository and are never loaded from this one.

pub mod blob;
pub mod commit;
pub mod object;
pub mod object_id;
pub mod object_type;
pub mod tag;
pub mod tree;

/// Hex digits in a full object id
pub const OBJECT_ID_LENGTH: usize = 40;
