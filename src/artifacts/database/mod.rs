//! Tree entries as the object database hands them back: an id plus the mode
//! that says whether it names a blob, a subtree or a gitlink.

pub mod database_entry;
