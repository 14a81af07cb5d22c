use crate::areas::repository::Repository;
use crate::artifacts::branch::branch_name::SymRefName;
use crate::artifacts::branch::revision::Revision;
use crate::artifacts::objects::object_id::ObjectId;
use crate::commands::porcelain::commit::CommitOptions;
use crate::errors::RepositoryError;
use std::path::PathBuf;

const MERGE_HEAD: &str = "MERGE_HEAD";
const MERGE_MSG: &str = "MERGE_MSG";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    AlreadyUpToDate,
    FastForward {
        from: Option<ObjectId>,
        to: ObjectId,
    },
    Merged {
        oid: ObjectId,
    },
    /// Conflicting sides were staged and `MERGE_HEAD` records the merge in progress
    Conflicted {
        paths: Vec<PathBuf>,
    },
}

/// How a merge reacts to conflicting changes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ConflictPolicy {
    /// Stage the conflict and leave the merge pending
    Record,
    /// Fail with `DivergedHistory` before touching anything
    Refuse,
}

impl Repository {
    /// Merge `target` into HEAD
    ///
    /// Fast-forwards when HEAD is unborn or an ancestor of `target`. Otherwise
    /// the trees of HEAD, `target` and their best common ancestor are merged path
    /// by path: a clean result is committed with both parents, a conflicting one
    /// is staged (HEAD's side in the working tree) for the user to resolve.
    pub async fn merge(&self, target: &str, message: Option<&str>) -> anyhow::Result<MergeOutcome> {
        let ref_lock = self.ref_lock();
        let _ref_guard = ref_lock.lock().await;

        let theirs = Revision::try_parse(target)?.resolve(self)?;
        let message = message
            .map(str::to_string)
            .unwrap_or_else(|| format!("Merge {target}"));

        self.merge_into_head(&theirs, target, message, ConflictPolicy::Record)
            .await
    }

    /// Merge `theirs` into HEAD; callers hold the ref lock
    pub(crate) async fn merge_into_head(
        &self,
        theirs: &ObjectId,
        label: &str,
        message: String,
        policy: ConflictPolicy,
    ) -> anyhow::Result<MergeOutcome> {
        if self.pending_merge_head()?.is_some() {
            anyhow::bail!("a merge is in progress, commit or abort it first");
        }

        let Some(ours) = self.refs().read_head()? else {
            self.migrate_to(theirs).await?;
            self.refs().update_ref(&SymRefName::head(), None, theirs)?;
            return Ok(MergeOutcome::FastForward {
                from: None,
                to: theirs.clone(),
            });
        };

        if &ours == theirs || self.database().is_ancestor(theirs, &ours)? {
            return Ok(MergeOutcome::AlreadyUpToDate);
        }

        if self.database().is_ancestor(&ours, theirs)? {
            self.migrate_to(theirs).await?;
            self.refs()
                .update_ref(&SymRefName::head(), Some(&ours), theirs)?;

            tracing::info!(from = %ours.to_short_oid(), to = %theirs.to_short_oid(), "fast-forwarded");
            return Ok(MergeOutcome::FastForward {
                from: Some(ours),
                to: theirs.clone(),
            });
        }

        let base = self.database().merge_base(&ours, theirs)?;
        let tree_merge = self.database().merge_commits(base.as_ref(), &ours, theirs)?;
        tracing::debug!(
            base = ?base.as_ref().map(ObjectId::to_short_oid),
            conflicts = tree_merge.conflicts.len(),
            "merged trees"
        );

        if !tree_merge.is_clean() && policy == ConflictPolicy::Refuse {
            let branch = self
                .refs()
                .current_branch()?
                .map(|branch| branch.to_string())
                .unwrap_or_else(|| "HEAD".to_string());

            return Err(RepositoryError::DivergedHistory {
                branch,
                upstream: label.to_string(),
                conflicts: tree_merge.conflicted_paths(),
            }
            .into());
        }

        let merged_tree = tree_merge.write_tree(self.database())?;
        self.migrate_to(&merged_tree).await?;

        let index = self.index();
        let mut index = index.lock().await;
        index.rehydrate()?;

        if !tree_merge.is_clean() {
            for (path, sides) in &tree_merge.conflicts {
                index.add_conflict(
                    path,
                    sides.base.clone(),
                    sides.ours.clone(),
                    sides.theirs.clone(),
                );
            }
            index.write_updates()?;
            self.write_pending_merge(theirs, &message)?;

            let paths = tree_merge.conflicted_paths();
            tracing::warn!(count = paths.len(), "merge stopped on conflicts");
            return Ok(MergeOutcome::Conflicted { paths });
        }

        let outcome = self.commit_index(
            &index,
            vec![ours, theirs.clone()],
            CommitOptions::with_message(message),
        )?;

        Ok(MergeOutcome::Merged { oid: outcome.oid })
    }

    pub(crate) fn pending_merge_head(&self) -> anyhow::Result<Option<ObjectId>> {
        self.refs().read_oid(&SymRefName::new(MERGE_HEAD.to_string()))
    }

    fn write_pending_merge(&self, theirs: &ObjectId, message: &str) -> anyhow::Result<()> {
        self.refs()
            .write_ref(&SymRefName::new(MERGE_HEAD.to_string()), theirs)?;
        std::fs::write(self.git_path().join(MERGE_MSG), format!("{message}\n"))?;

        Ok(())
    }

    pub(crate) fn clear_pending_merge(&self) -> anyhow::Result<()> {
        for file in [MERGE_HEAD, MERGE_MSG] {
            let path = self.git_path().join(file);
            if path.exists() {
                std::fs::remove_file(&path)?;
            }
        }

        Ok(())
    }
}
