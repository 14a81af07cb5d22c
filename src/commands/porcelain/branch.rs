use crate::areas::repository::Repository;
use crate::artifacts::branch::branch_name::{BranchName, HEADS_PREFIX, REMOTES_PREFIX, SymRefName};
use crate::artifacts::branch::revision::Revision;
use crate::artifacts::config::Config;
use crate::artifacts::objects::object_id::ObjectId;
use crate::errors::RepositoryError;

/// Remote and branch a local branch follows, as kept in `.git/config`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upstream {
    /// A configured remote, or `.` for a local branch
    pub remote: String,
    /// Full ref name on that remote, e.g. `refs/heads/master`
    pub merge: String,
}

impl Upstream {
    pub fn is_local(&self) -> bool {
        self.remote == "."
    }

    pub fn branch_name(&self) -> &str {
        self.merge.strip_prefix(HEADS_PREFIX).unwrap_or(&self.merge)
    }

    /// The ref that holds what is known of the upstream locally
    pub fn tracking_ref(&self) -> String {
        if self.is_local() {
            self.merge.clone()
        } else {
            format!("{REMOTES_PREFIX}{}/{}", self.remote, self.branch_name())
        }
    }

    pub fn read(config: &Config, branch: &BranchName) -> Option<Self> {
        let remote = config.get("branch", Some(branch.as_ref()), "remote")?;
        let merge = config.get("branch", Some(branch.as_ref()), "merge")?;

        Some(Upstream {
            remote: remote.to_string(),
            merge: merge.to_string(),
        })
    }

    pub fn write(&self, config: &mut Config, branch: &BranchName) {
        config.set("branch", Some(branch.as_ref()), "remote", &self.remote);
        config.set("branch", Some(branch.as_ref()), "merge", &self.merge);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchInfo {
    pub name: BranchName,
    pub oid: ObjectId,
    pub is_current: bool,
    pub upstream: Option<Upstream>,
}

impl Repository {
    /// Create a branch at `start` (HEAD by default)
    ///
    /// With `set_upstream`, a remote-tracking start point (`origin/master`)
    /// makes the new branch follow that remote branch and a local start point
    /// makes it follow the local branch. An existing branch is only moved with
    /// `force`; otherwise the call fails with `RefExists`.
    pub async fn branch_create(
        &self,
        name: &str,
        start: Option<&str>,
        set_upstream: bool,
        force: bool,
    ) -> anyhow::Result<ObjectId> {
        let ref_lock = self.ref_lock();
        let _ref_guard = ref_lock.lock().await;

        let branch = BranchName::try_parse(name.to_string())?;
        let start_oid = match start {
            Some(start) => Revision::try_parse(start)?.resolve(self)?,
            None => self
                .refs()
                .read_head()?
                .ok_or_else(|| RepositoryError::not_found("revision", "HEAD"))?,
        };

        if force && self.refs().is_current_branch(&branch)? {
            anyhow::bail!("cannot force-update the checked out branch '{branch}'");
        }
        self.refs().create_branch(&branch, &start_oid, force)?;

        if set_upstream && let Some(start) = start {
            match self.upstream_for_start_point(start)? {
                Some(upstream) => {
                    let mut config = self.config()?;
                    upstream.write(&mut config, &branch);
                    config.save()?;
                    tracing::debug!(branch = %branch, remote = %upstream.remote, merge = %upstream.merge, "configured upstream");
                }
                None => tracing::warn!(branch = %branch, start, "start point is not a branch, no upstream set"),
            }
        }

        Ok(start_oid)
    }

    /// Delete a branch other than the checked out one; returns where it pointed
    pub async fn branch_delete(&self, name: &str) -> anyhow::Result<ObjectId> {
        let ref_lock = self.ref_lock();
        let _ref_guard = ref_lock.lock().await;

        let branch = BranchName::try_parse(name.to_string())?;
        if self.refs().is_current_branch(&branch)? {
            anyhow::bail!("cannot delete the checked out branch '{branch}'");
        }

        let oid = self.refs().delete_branch(&branch)?;

        let mut config = self.config()?;
        config.remove_section("branch", Some(branch.as_ref()));
        config.save()?;

        Ok(oid)
    }

    pub fn branch_list(&self) -> anyhow::Result<Vec<BranchInfo>> {
        let config = self.config()?;
        let current = self.refs().current_branch()?;

        self.refs()
            .list_refs(HEADS_PREFIX)?
            .into_iter()
            .map(|(sym_ref, oid)| {
                let name = BranchName::try_parse_sym_ref_name(&sym_ref)?;
                Ok(BranchInfo {
                    is_current: current.as_ref() == Some(&name),
                    upstream: Upstream::read(&config, &name),
                    name,
                    oid,
                })
            })
            .collect()
    }

    /// Upstream configured for `branch`
    pub fn upstream_of(&self, branch: &BranchName) -> anyhow::Result<Option<Upstream>> {
        Ok(Upstream::read(&self.config()?, branch))
    }

    fn upstream_for_start_point(&self, start: &str) -> anyhow::Result<Option<Upstream>> {
        let Some(sym_ref) = self.refs().find_ref(start)? else {
            return Ok(None);
        };
        let full_name = sym_ref.as_ref_path();

        if let Some(local) = full_name.strip_prefix(HEADS_PREFIX) {
            return Ok(Some(Upstream {
                remote: ".".to_string(),
                merge: format!("{HEADS_PREFIX}{local}"),
            }));
        }

        if let Some(remote_branch) = full_name.strip_prefix(REMOTES_PREFIX)
            && let Some((remote, branch)) = remote_branch.split_once('/')
            && branch != "HEAD"
        {
            return Ok(Some(Upstream {
                remote: remote.to_string(),
                merge: format!("{HEADS_PREFIX}{branch}"),
            }));
        }

        Ok(None)
    }
}
