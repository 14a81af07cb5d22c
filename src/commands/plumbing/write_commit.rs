use crate::areas::repository::Repository;
use crate::artifacts::objects::commit::{Author, Commit};
use crate::artifacts::objects::object_id::ObjectId;
use crate::errors::RepositoryError;

impl Repository {
    /// Store the current index as a tree
    ///
    /// Fails with `UnresolvedConflict` while the index has unmerged paths.
    pub async fn write_tree(&self) -> anyhow::Result<ObjectId> {
        let index = self.index();
        let mut index = index.lock().await;
        index.rehydrate()?;

        index.build_tree(self.database())
    }

    /// Store a commit object; no ref is moved
    ///
    /// A single-parent commit whose tree equals its parent's fails with
    /// `EmptyCommit` unless `allow_empty` is set. Root and merge commits are
    /// always written.
    pub fn write_commit(
        &self,
        tree_oid: ObjectId,
        parents: Vec<ObjectId>,
        author: Author,
        committer: Author,
        message: String,
        allow_empty: bool,
    ) -> anyhow::Result<(ObjectId, Commit)> {
        if let [parent] = parents.as_slice()
            && !allow_empty
            && self.database().parse_object_as_commit(parent)?.tree_oid() == &tree_oid
        {
            return Err(RepositoryError::EmptyCommit { tree: tree_oid }.into());
        }

        let commit = Commit::new(parents, tree_oid, author, committer, message);
        let commit_oid = self.database().store(&commit)?;

        tracing::debug!(commit = %commit_oid.to_short_oid(), parents = commit.parents().len(), "wrote commit");
        Ok((commit_oid, commit))
    }
}
