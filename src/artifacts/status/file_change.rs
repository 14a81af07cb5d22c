use std::fmt;

/// How the working tree copy of a path differs from its index entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum WorkspaceChangeType {
    #[default]
    None,
    Untracked,
    Modified,
    Deleted,
}

impl WorkspaceChangeType {
    pub fn code(&self) -> char {
        match self {
            WorkspaceChangeType::None => ' ',
            WorkspaceChangeType::Untracked => '?',
            WorkspaceChangeType::Modified => 'M',
            WorkspaceChangeType::Deleted => 'D',
        }
    }
}

/// How the index entry of a path differs from HEAD's tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum IndexChangeType {
    #[default]
    None,
    Added,
    Modified,
    Deleted,
    /// Conflict stages are recorded for the path
    Unmerged,
}

impl IndexChangeType {
    pub fn code(&self) -> char {
        match self {
            IndexChangeType::None => ' ',
            IndexChangeType::Added => 'A',
            IndexChangeType::Modified => 'M',
            IndexChangeType::Deleted => 'D',
            IndexChangeType::Unmerged => 'U',
        }
    }
}

/// Both sides of a path's status; displays as the two-letter porcelain code
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct FileChange {
    pub index_change: IndexChangeType,
    pub workspace_change: WorkspaceChangeType,
}

impl fmt::Display for FileChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.index_change.code(), self.workspace_change.code())
    }
}
