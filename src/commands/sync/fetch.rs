use crate::areas::repository::Repository;
use crate::artifacts::branch::branch_name::{BranchName, SymRefName, TAGS_PREFIX};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::transport::{Advertisement, Credentials, bounded, transport_timeout};
use crate::commands::sync::remote::Remote;
use crate::errors::RepositoryError;
use std::collections::BTreeSet;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingUpdate {
    New,
    FastForward,
    /// The remote branch was rewritten
    Forced,
    UpToDate,
}

impl fmt::Display for TrackingUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TrackingUpdate::New => "new",
            TrackingUpdate::FastForward => "updated",
            TrackingUpdate::Forced => "forced update",
            TrackingUpdate::UpToDate => "up to date",
        };
        write!(f, "{label}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedRef {
    /// Local ref written, e.g. `refs/remotes/origin/master` or `refs/tags/v1`
    pub local: String,
    pub old: Option<ObjectId>,
    pub new: ObjectId,
    pub update: TrackingUpdate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResult {
    pub remote: Remote,
    pub advertisement: Advertisement,
    pub updates: Vec<FetchedRef>,
    pub objects_received: usize,
}

impl FetchResult {
    pub fn changed(&self) -> impl Iterator<Item = &FetchedRef> {
        self.updates
            .iter()
            .filter(|update| update.update != TrackingUpdate::UpToDate)
    }
}

impl Repository {
    /// Download what `remote` has and this repository lacks, then move the
    /// remote-tracking refs
    ///
    /// Refs are only touched once every advertised tip is complete locally; an
    /// incomplete transfer fails with `Transport` and leaves every ref as it was.
    /// Tags are fetched when absent locally and never moved.
    pub async fn fetch(
        &self,
        remote_name: &str,
        credentials: Option<&Credentials>,
    ) -> anyhow::Result<FetchResult> {
        let remote = self.remote(remote_name)?;
        let transport = self.transport();
        let timeout = transport_timeout();

        let advertisement =
            bounded(&remote.url, timeout, transport.list_refs(&remote.url, credentials)).await?;

        let tips = advertisement
            .refs
            .iter()
            .filter(|(name, _)| name.as_str() != "HEAD")
            .map(|(_, oid)| oid.clone())
            .collect::<BTreeSet<_>>();
        let wants = tips
            .iter()
            .filter(|oid| !self.database().contains(oid))
            .cloned()
            .collect::<Vec<_>>();
        let haves = self.local_tips()?;

        let mut objects_received = 0;
        if !wants.is_empty() {
            let objects = bounded(
                &remote.url,
                timeout,
                transport.fetch_objects(&remote.url, &wants, &haves, credentials),
            )
            .await?;

            objects_received = objects.len();
            for object in &objects {
                self.database().store(object)?;
            }
        }

        let tips = tips.into_iter().collect::<Vec<_>>();
        let missing = self.database().missing_objects(&tips, &haves)?;
        if let Some(first) = missing.first() {
            return Err(RepositoryError::transport(
                &remote.url,
                format!("incomplete transfer, {} objects missing starting at {first}", missing.len()),
            )
            .into());
        }

        let ref_lock = self.ref_lock();
        let _ref_guard = ref_lock.lock().await;
        let updates = self.update_tracking_refs(&remote, &advertisement)?;

        tracing::info!(
            remote = %remote.name,
            objects = objects_received,
            refs = updates.len(),
            "fetched"
        );
        Ok(FetchResult {
            remote,
            advertisement,
            updates,
            objects_received,
        })
    }

    fn update_tracking_refs(
        &self,
        remote: &Remote,
        advertisement: &Advertisement,
    ) -> anyhow::Result<Vec<FetchedRef>> {
        let mut updates = Vec::new();

        for (branch, new) in advertisement.branches() {
            let tracking = SymRefName::remote_tracking(&remote.name, &BranchName::try_parse(branch.to_string())?);
            let old = self.refs().read_oid(&tracking)?;

            let update = match &old {
                None => TrackingUpdate::New,
                Some(old) if old == new => TrackingUpdate::UpToDate,
                Some(old) if self.database().is_ancestor(old, new)? => TrackingUpdate::FastForward,
                Some(_) => TrackingUpdate::Forced,
            };
            if update != TrackingUpdate::UpToDate {
                self.refs().write_ref(&tracking, new)?;
            }

            updates.push(FetchedRef {
                local: tracking.to_string(),
                old,
                new: new.clone(),
                update,
            });
        }

        for (name, oid) in &advertisement.refs {
            if !name.starts_with(TAGS_PREFIX) {
                continue;
            }

            let tag_ref = SymRefName::new(name.clone());
            if self.refs().read_oid(&tag_ref)?.is_none() {
                self.refs().update_ref(&tag_ref, None, oid)?;
                updates.push(FetchedRef {
                    local: name.clone(),
                    old: None,
                    new: oid.clone(),
                    update: TrackingUpdate::New,
                });
            }
        }

        Ok(updates)
    }

    /// Every id a local ref points at
    pub(crate) fn local_tips(&self) -> anyhow::Result<Vec<ObjectId>> {
        let mut tips = self
            .refs()
            .list_refs("refs/")?
            .into_iter()
            .map(|(_, oid)| oid)
            .collect::<BTreeSet<_>>();
        tips.extend(self.refs().read_head()?);

        Ok(tips.into_iter().collect())
    }
}
