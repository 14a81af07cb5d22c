//! Commit history traversal
//!
//! `rev_list` walks the commit graph lazily from one or more tips, newest
//! committer time first, yielding every reachable commit exactly once.

pub mod rev_list;
