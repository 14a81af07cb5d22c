use crate::areas::repository::Repository;
use crate::artifacts::branch::branch_name::{BranchName, SymRefName};
use anyhow::Context;
use std::fs;

pub const DEFAULT_BRANCH: &str = "master";

impl Repository {
    /// Create the `.git` layout; re-running on an existing repository keeps
    /// its HEAD, refs and config
    pub async fn init(&self) -> anyhow::Result<()> {
        fs::create_dir_all(self.database().objects_path())
            .context("Failed to create .git/objects directory")?;

        fs::create_dir_all(self.refs().heads_path())
            .context("Failed to create .git/refs/heads directory")?;

        fs::create_dir_all(self.refs().refs_path().join("tags"))
            .context("Failed to create .git/refs/tags directory")?;

        if !self.refs().head_path().exists() {
            let default_branch = BranchName::try_parse(DEFAULT_BRANCH.to_string())?;
            self.refs()
                .set_head_symbolic(&SymRefName::branch(&default_branch))
                .context("Failed to create initial HEAD reference")?;
        }

        let mut config = self.config()?;
        if config.get("core", None, "bare").is_none() {
            config.set("core", None, "repositoryformatversion", "0");
            config.set("core", None, "bare", "false");
            config.save().context("Failed to write .git/config")?;
        }

        tracing::info!(path = %self.path().display(), "initialized repository");
        Ok(())
    }
}
