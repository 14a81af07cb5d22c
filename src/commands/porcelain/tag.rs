use crate::areas::repository::Repository;
use crate::artifacts::branch::branch_name::{BranchName, SymRefName, TAGS_PREFIX};
use crate::artifacts::branch::revision::Revision;
use crate::artifacts::config::identity::{Role, resolve_identity};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::artifacts::objects::tag::Tag;
use crate::errors::RepositoryError;

impl Repository {
    /// Create `refs/tags/<name>` at `target` (HEAD by default)
    ///
    /// With a message the tag is annotated: a tag object signed by the committer
    /// identity is stored and the ref points at it. Returns what the ref points at.
    pub async fn tag(
        &self,
        name: &str,
        target: Option<&str>,
        message: Option<&str>,
        force: bool,
    ) -> anyhow::Result<ObjectId> {
        let ref_lock = self.ref_lock();
        let _ref_guard = ref_lock.lock().await;

        let tag_name = BranchName::try_parse(name.to_string())?;
        let tag_ref = SymRefName::tag(&tag_name);
        let existing = self.refs().read_oid(&tag_ref)?;
        if existing.is_some() && !force {
            return Err(RepositoryError::RefExists(tag_ref.to_string()).into());
        }

        let target_oid = match target {
            Some(target) => Revision::try_parse(target)?.resolve(self)?,
            None => self
                .refs()
                .read_head()?
                .ok_or_else(|| RepositoryError::not_found("revision", "HEAD"))?,
        };

        let ref_target = match message {
            Some(message) => {
                let tagger = resolve_identity(&self.config()?, Role::Committer, None)?;
                let tag = Tag::new(
                    target_oid,
                    ObjectType::Commit,
                    tag_name.to_string(),
                    tagger,
                    format!("{}\n", message.trim()),
                );
                self.database().store(&tag)?
            }
            None => target_oid,
        };

        self.refs().update_ref(&tag_ref, existing.as_ref(), &ref_target)?;
        Ok(ref_target)
    }

    /// Tags sorted by name, with the object each ref points at
    pub fn tag_list(&self) -> anyhow::Result<Vec<(String, ObjectId)>> {
        Ok(self
            .refs()
            .list_refs(TAGS_PREFIX)?
            .into_iter()
            .map(|(name, oid)| (name.short_name().to_string(), oid))
            .collect())
    }
}
