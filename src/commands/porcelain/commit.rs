use crate::areas::index::Index;
use crate::areas::repository::Repository;
use crate::artifacts::branch::branch_name::SymRefName;
use crate::artifacts::config::identity::{Role, resolve_identity};
use crate::artifacts::objects::commit::{Author, Commit};
use crate::artifacts::objects::object_id::ObjectId;

#[derive(Debug, Clone, Default)]
pub struct CommitOptions {
    pub message: String,
    /// Overrides the configured author
    pub author: Option<Author>,
    /// Overrides the configured committer
    pub committer: Option<Author>,
    pub allow_empty: bool,
}

impl CommitOptions {
    pub fn with_message(message: impl Into<String>) -> Self {
        CommitOptions {
            message: message.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct CommitOutcome {
    pub oid: ObjectId,
    pub commit: Commit,
    pub is_root: bool,
}

impl Repository {
    /// Commit the index and advance HEAD's branch (or a detached HEAD)
    ///
    /// A pending merge contributes `MERGE_HEAD` as second parent and is cleared
    /// once the commit lands. HEAD moves by compare-and-swap against the parent
    /// read at the start, so a concurrent commit makes this one fail with
    /// `RefConflict` instead of being lost.
    pub async fn commit(&self, options: CommitOptions) -> anyhow::Result<CommitOutcome> {
        let ref_lock = self.ref_lock();
        let _ref_guard = ref_lock.lock().await;
        let index = self.index();
        let mut index = index.lock().await;
        index.rehydrate()?;

        let mut parents = self.refs().read_head()?.into_iter().collect::<Vec<_>>();
        if let Some(merge_head) = self.pending_merge_head()? {
            parents.push(merge_head);
        }

        let outcome = self.commit_index(&index, parents, options)?;
        self.clear_pending_merge()?;

        Ok(outcome)
    }

    /// Write `index` as a commit on top of `parents` and move HEAD
    ///
    /// Callers hold the ref lock and the index lock.
    pub(crate) fn commit_index(
        &self,
        index: &Index,
        parents: Vec<ObjectId>,
        options: CommitOptions,
    ) -> anyhow::Result<CommitOutcome> {
        let config = self.config()?;
        let author = resolve_identity(&config, Role::Author, options.author.as_ref())?;
        let committer = resolve_identity(&config, Role::Committer, options.committer.as_ref())?;

        let tree_oid = index.build_tree(self.database())?;
        let head = parents.first().cloned();
        let message = options.message.trim().to_string();

        let (oid, commit) = self.write_commit(
            tree_oid,
            parents,
            author,
            committer,
            message,
            options.allow_empty,
        )?;
        self.refs()
            .update_ref(&SymRefName::head(), head.as_ref(), &oid)?;

        tracing::info!(commit = %oid.to_short_oid(), root = head.is_none(), "committed");
        Ok(CommitOutcome {
            oid,
            commit,
            is_root: head.is_none(),
        })
    }
}
