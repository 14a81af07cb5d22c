use crate::areas::repository::Repository;
use crate::artifacts::branch::branch_name::SymRefName;
use crate::artifacts::transport::Credentials;
use crate::commands::porcelain::merge::{ConflictPolicy, MergeOutcome};
use crate::commands::sync::fetch::FetchResult;
use crate::errors::RepositoryError;
use anyhow::Context;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullResult {
    /// `None` when the upstream is a local branch
    pub fetch: Option<FetchResult>,
    pub merge: MergeOutcome,
}

impl Repository {
    /// Fetch the current branch's upstream and merge it in
    ///
    /// Fails with `NotFound` when no upstream is configured. Histories that
    /// cannot be merged without conflicts fail with `DivergedHistory` and leave
    /// the branch, the index and the working tree untouched.
    pub async fn pull(&self, credentials: Option<&Credentials>) -> anyhow::Result<PullResult> {
        let branch = self
            .refs()
            .current_branch()?
            .context("HEAD is detached, check out a branch to pull into")?;
        let upstream = self
            .upstream_of(&branch)?
            .ok_or_else(|| RepositoryError::not_found("upstream", branch.to_string()))?;

        let fetch = if upstream.is_local() {
            None
        } else {
            Some(self.fetch(&upstream.remote, credentials).await?)
        };

        let tracking_ref = upstream.tracking_ref();
        let theirs = self
            .refs()
            .read_oid(&SymRefName::new(tracking_ref.clone()))?
            .ok_or_else(|| RepositoryError::not_found("ref", tracking_ref.clone()))?;

        let label = SymRefName::new(tracking_ref).short_name().to_string();
        let message = match &fetch {
            Some(fetch) => format!(
                "Merge branch '{}' of {}",
                upstream.branch_name(),
                fetch.remote.url
            ),
            None => format!("Merge branch '{}'", upstream.branch_name()),
        };

        let ref_lock = self.ref_lock();
        let _ref_guard = ref_lock.lock().await;
        let merge = self
            .merge_into_head(&theirs, &label, message, ConflictPolicy::Refuse)
            .await?;

        tracing::info!(branch = %branch, upstream = %label, outcome = ?merge, "pulled");
        Ok(PullResult { fetch, merge })
    }
}
