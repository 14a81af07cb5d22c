use crate::areas::repository::Repository;
use crate::artifacts::branch::branch_name::{BranchName, SymRefName};
use crate::artifacts::branch::revision::Revision;
use crate::artifacts::checkout::migration::Migration;
use crate::artifacts::objects::object_id::ObjectId;

/// Where HEAD ended up after a checkout
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutTarget {
    Branch(BranchName),
    Detached(ObjectId),
}

impl Repository {
    /// Move the working tree, the index and HEAD to `target`
    ///
    /// A local branch name attaches HEAD to that branch; any other revision
    /// detaches it. Local changes that the move would clobber abort the checkout
    /// with `LocalChangesWouldBeOverwritten` before any file is touched.
    pub async fn checkout(&self, target: &str) -> anyhow::Result<CheckoutTarget> {
        let ref_lock = self.ref_lock();
        let _ref_guard = ref_lock.lock().await;

        let target_oid = Revision::try_parse(target)?.resolve(self)?;
        let branch = BranchName::try_parse(target.to_string())
            .ok()
            .filter(|branch| {
                self.refs()
                    .read_oid(&SymRefName::branch(branch))
                    .ok()
                    .flatten()
                    .is_some()
            });

        self.migrate_to(&target_oid).await?;

        let checked_out = match branch {
            Some(branch) => {
                self.refs().set_head_symbolic(&SymRefName::branch(&branch))?;
                CheckoutTarget::Branch(branch)
            }
            None => {
                self.refs().set_head_detached(&target_oid)?;
                CheckoutTarget::Detached(target_oid)
            }
        };

        tracing::info!(target, head = ?checked_out, "checked out");
        Ok(checked_out)
    }

    /// Bring the working tree and index from HEAD's commit to `target_oid`
    ///
    /// HEAD itself is not moved.
    pub(crate) async fn migrate_to(&self, target_oid: &ObjectId) -> anyhow::Result<()> {
        let current_oid = self.refs().read_head()?;

        let index = self.index();
        let mut index = index.lock().await;
        index.rehydrate()?;

        let changes = self.database().tree_diff(current_oid.as_ref(), Some(target_oid))?;
        let mut migration = Migration::new(self, &mut index, changes);
        migration.apply_changes()?;

        index.write_updates()?;
        Ok(())
    }
}
