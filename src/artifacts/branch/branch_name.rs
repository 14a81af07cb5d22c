use crate::artifacts::branch::INVALID_BRANCH_NAME_REGEX;
use anyhow::Context;
use derive_new::new;

pub const HEADS_PREFIX: &str = "refs/heads/";
pub const TAGS_PREFIX: &str = "refs/tags/";
pub const REMOTES_PREFIX: &str = "refs/remotes/";

/// Full name of a ref, relative to the git directory (`HEAD`, `refs/heads/master`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, PartialOrd, Ord, new)]
pub struct SymRefName(String);

impl SymRefName {
    pub fn head() -> Self {
        SymRefName("HEAD".to_string())
    }

    pub fn branch(name: &BranchName) -> Self {
        SymRefName(format!("{HEADS_PREFIX}{name}"))
    }

    pub fn tag(name: &BranchName) -> Self {
        SymRefName(format!("{TAGS_PREFIX}{name}"))
    }

    pub fn remote_tracking(remote: &str, name: &BranchName) -> Self {
        SymRefName(format!("{REMOTES_PREFIX}{remote}/{name}"))
    }

    pub fn is_detached_head(&self) -> bool {
        self.0 == "HEAD"
    }

    pub fn is_branch(&self) -> bool {
        self.0.starts_with(HEADS_PREFIX)
    }

    pub fn as_ref_path(&self) -> &str {
        &self.0
    }

    /// `master` for `refs/heads/master`, `origin/master` for `refs/remotes/origin/master`
    pub fn short_name(&self) -> &str {
        [HEADS_PREFIX, TAGS_PREFIX, REMOTES_PREFIX]
            .iter()
            .find_map(|prefix| self.0.strip_prefix(prefix))
            .unwrap_or(&self.0)
    }
}

impl std::fmt::Display for SymRefName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A validated branch (or tag, or remote) name
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct BranchName(String);

impl BranchName {
    pub fn try_parse(name: String) -> anyhow::Result<Self> {
        if name.is_empty() {
            anyhow::bail!("branch name cannot be empty");
        }

        let re = regex::Regex::new(INVALID_BRANCH_NAME_REGEX)
            .with_context(|| format!("invalid branch name regex: {INVALID_BRANCH_NAME_REGEX}"))?;

        if re.is_match(&name) {
            anyhow::bail!("invalid branch name: {}", name);
        } else {
            Ok(Self(name))
        }
    }

    /// Branch named by a `refs/heads/` ref
    pub fn try_parse_sym_ref_name(sym_ref_name: &SymRefName) -> anyhow::Result<Self> {
        let name = sym_ref_name
            .as_ref_path()
            .strip_prefix(HEADS_PREFIX)
            .with_context(|| {
                format!("'{sym_ref_name}' is not a branch ref, expected '{HEADS_PREFIX}…'")
            })?;

        Self::try_parse(name.to_string())
    }
}

impl AsRef<str> for BranchName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BranchName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
