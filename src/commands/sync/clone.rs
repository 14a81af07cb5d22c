use crate::areas::repository::Repository;
use crate::artifacts::branch::branch_name::{BranchName, HEADS_PREFIX, SymRefName};
use crate::artifacts::transport::{Advertisement, Credentials, Transport};
use crate::commands::porcelain::branch::Upstream;
use crate::commands::porcelain::init::DEFAULT_BRANCH;
use crate::commands::sync::remote::DEFAULT_REMOTE;
use std::path::Path;
use std::sync::Arc;

impl Repository {
    /// Clone `uri` into `destination` through `transport`
    ///
    /// The remote is recorded as `origin`, every remote branch gets a local
    /// branch following it, and the remote's HEAD branch is checked out. An
    /// empty remote leaves an empty repository on the unborn default branch.
    pub async fn clone_from(
        uri: &str,
        destination: impl AsRef<Path>,
        transport: Arc<dyn Transport>,
        credentials: Option<&Credentials>,
    ) -> anyhow::Result<Repository> {
        let destination = destination.as_ref();
        if destination.exists() && destination.read_dir()?.next().is_some() {
            anyhow::bail!("destination path {} already exists and is not empty", destination.display());
        }

        let repository = Repository::new(destination)?.with_transport(transport);
        repository.init().await?;
        repository.remote_add(DEFAULT_REMOTE, uri)?;

        let fetched = repository.fetch(DEFAULT_REMOTE, credentials).await?;
        let Some(default_branch) = Self::default_branch(&fetched.advertisement) else {
            tracing::info!(uri, "cloned an empty repository");
            return Ok(repository);
        };

        let default_oid = fetched
            .advertisement
            .get(&format!("{HEADS_PREFIX}{default_branch}"))
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("remote advertised no tip for '{default_branch}'"))?;
        repository.migrate_to(&default_oid).await?;

        let ref_lock = repository.ref_lock();
        let _ref_guard = ref_lock.lock().await;
        let mut config = repository.config()?;

        for (branch, oid) in fetched.advertisement.branches() {
            let branch = BranchName::try_parse(branch.to_string())?;
            repository.refs().create_branch(&branch, oid, true)?;
            Upstream {
                remote: DEFAULT_REMOTE.to_string(),
                merge: SymRefName::branch(&branch).to_string(),
            }
            .write(&mut config, &branch);
        }
        config.save()?;

        let default_branch = BranchName::try_parse(default_branch)?;
        repository
            .refs()
            .set_head_symbolic(&SymRefName::branch(&default_branch))?;

        tracing::info!(uri, branch = %default_branch, "cloned");
        Ok(repository)
    }

    /// The branch the remote's HEAD names, else the one at HEAD's commit, else
    /// `master`, else the first branch
    fn default_branch(advertisement: &Advertisement) -> Option<String> {
        let branches = advertisement
            .branches()
            .map(|(name, oid)| (name.to_string(), oid.clone()))
            .collect::<Vec<_>>();

        let from_symref = advertisement
            .head_symref
            .as_deref()
            .and_then(|target| target.strip_prefix(HEADS_PREFIX))
            .filter(|name| branches.iter().any(|(branch, _)| branch == name))
            .map(str::to_string);
        let from_head = advertisement.get("HEAD").and_then(|head| {
            branches
                .iter()
                .find(|(_, oid)| oid == head)
                .map(|(name, _)| name.clone())
        });
        let fallback = branches
            .iter()
            .find(|(name, _)| name == DEFAULT_BRANCH)
            .or(branches.first())
            .map(|(name, _)| name.clone());

        from_symref.or(from_head).or(fallback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::objects::object_id::ObjectId;
    use pretty_assertions::assert_eq;

    fn advertisement(branches: &[(&str, &str)], head: Option<&str>, symref: Option<&str>) -> Advertisement {
        let mut advertisement = Advertisement::default();
        for (name, content) in branches {
            advertisement
                .refs
                .insert(format!("{HEADS_PREFIX}{name}"), ObjectId::hash(content.as_bytes()));
        }
        if let Some(head) = head {
            advertisement.refs.insert("HEAD".to_string(), ObjectId::hash(head.as_bytes()));
        }
        advertisement.head_symref = symref.map(str::to_string);

        advertisement
    }

    #[test]
    fn remote_head_symref_picks_the_branch() {
        let advertisement = advertisement(
            &[("master", "a"), ("trunk", "b")],
            Some("b"),
            Some("refs/heads/trunk"),
        );

        assert_eq!(Repository::default_branch(&advertisement).as_deref(), Some("trunk"));
    }

    #[test]
    fn detached_remote_head_matches_by_commit() {
        let advertisement = advertisement(&[("develop", "a"), ("release", "b")], Some("b"), None);

        assert_eq!(Repository::default_branch(&advertisement).as_deref(), Some("release"));
    }

    #[test]
    fn without_head_master_wins_over_order() {
        let advertisement = advertisement(&[("alpha", "a"), ("master", "b")], None, None);

        assert_eq!(Repository::default_branch(&advertisement).as_deref(), Some("master"));
    }

    #[test]
    fn empty_remote_has_no_default_branch() {
        assert_eq!(Repository::default_branch(&Advertisement::default()), None);
    }
}
