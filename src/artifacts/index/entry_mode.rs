use crate::artifacts::objects::object_type::ObjectType;

#[derive(Debug, Clone, Copy, Eq, Hash, Ord, Default, PartialEq, PartialOrd)]
pub enum FileMode {
    #[default]
    Regular,
    Executable,
}

/// Mode of a tree or index entry
///
/// `Gitlink` entries pin a commit of a nested repository; the id they carry
/// never resolves in the enclosing object store.
#[derive(Debug, Clone, Copy, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum EntryMode {
    File(FileMode),
    Directory,
    Gitlink,
}

impl Default for EntryMode {
    fn default() -> Self {
        EntryMode::File(FileMode::Regular)
    }
}

impl EntryMode {
    pub fn as_str(&self) -> &str {
        match self {
            EntryMode::File(FileMode::Regular) => "100644",
            EntryMode::File(FileMode::Executable) => "100755",
            EntryMode::Directory => "40000",
            EntryMode::Gitlink => "160000",
        }
    }

    pub fn as_u32(&self) -> u32 {
        match self {
            EntryMode::File(FileMode::Regular) => 0o100644,
            EntryMode::File(FileMode::Executable) => 0o100755,
            EntryMode::Directory => 0o40000,
            EntryMode::Gitlink => 0o160000,
        }
    }

    pub fn from_octal_str(value: &str) -> anyhow::Result<Self> {
        let mode = u32::from_str_radix(value, 8)
            .map_err(|_| anyhow::anyhow!("Invalid entry mode {value}"))?;
        Self::try_from(mode)
    }

    pub fn is_tree(&self) -> bool {
        matches!(self, EntryMode::Directory)
    }

    pub fn is_gitlink(&self) -> bool {
        matches!(self, EntryMode::Gitlink)
    }

    /// Kind of object the entry id names
    pub fn object_type(&self) -> ObjectType {
        match self {
            EntryMode::File(_) => ObjectType::Blob,
            EntryMode::Directory => ObjectType::Tree,
            EntryMode::Gitlink => ObjectType::Commit,
        }
    }
}

impl TryFrom<u32> for EntryMode {
    type Error = anyhow::Error;

    fn try_from(mode: u32) -> anyhow::Result<Self> {
        match mode {
            0o100644 | 0o100664 => Ok(EntryMode::File(FileMode::Regular)),
            0o100755 => Ok(EntryMode::File(FileMode::Executable)),
            0o40000 => Ok(EntryMode::Directory),
            0o160000 => Ok(EntryMode::Gitlink),
            _ => Err(anyhow::anyhow!("Invalid entry mode {mode:o}")),
        }
    }
}

impl From<FileMode> for EntryMode {
    fn from(mode: FileMode) -> Self {
        EntryMode::File(mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("100644", EntryMode::File(FileMode::Regular))]
    #[case("100755", EntryMode::File(FileMode::Executable))]
    #[case("40000", EntryMode::Directory)]
    #[case("160000", EntryMode::Gitlink)]
    fn octal_modes_parse(#[case] value: &str, #[case] expected: EntryMode) {
        let mode = EntryMode::from_octal_str(value).unwrap();

        assert_eq!(mode, expected);
        assert_eq!(mode.as_str(), value);
    }

    #[test]
    fn unknown_mode_is_an_error() {
        assert!(EntryMode::from_octal_str("120777").is_err());
        assert!(EntryMode::from_octal_str("not-octal").is_err());
    }
}
