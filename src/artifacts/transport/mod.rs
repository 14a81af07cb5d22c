//! Moving objects and refs between repositories
//!
//! The sync engine talks to remotes only through [`Transport`]:
//!
//! 1. `list_refs` advertises the remote's refs and where its HEAD points
//! 2. `fetch_objects` returns every object reachable from the wanted tips that
//!    is not reachable from the haves
//! 3. `push_objects` stores objects on the remote, then applies each ref update
//!    as its own compare-and-swap and reports one outcome per ref
//!
//! Every call made by the sync engine is bounded by [`transport_timeout`].

pub mod local;

use crate::artifacts::objects::object::RawObject;
use crate::artifacts::objects::object_id::ObjectId;
use crate::errors::RepositoryError;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::time::Duration;

pub const TIMEOUT_ENV: &str = "GROVE_TRANSPORT_TIMEOUT_SECS";
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Opaque credentials handed to the transport untouched
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub secret: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Refs a remote advertises
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Advertisement {
    /// Full ref names (`refs/heads/master`, `HEAD`, ...) to ids
    pub refs: BTreeMap<String, ObjectId>,
    /// The branch the remote's HEAD is attached to
    pub head_symref: Option<String>,
}

impl Advertisement {
    pub fn branches(&self) -> impl Iterator<Item = (&str, &ObjectId)> {
        self.refs.iter().filter_map(|(name, oid)| {
            name.strip_prefix(crate::artifacts::branch::branch_name::HEADS_PREFIX)
                .map(|branch| (branch, oid))
        })
    }

    pub fn get(&self, name: &str) -> Option<&ObjectId> {
        self.refs.get(name)
    }
}

/// One ref change requested by a push
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefUpdate {
    pub name: String,
    /// Value the pusher last saw on the remote
    pub expected: Option<ObjectId>,
    /// `None` deletes the ref
    pub new: Option<ObjectId>,
    pub force: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefUpdateStatus {
    Ok,
    UpToDate,
    RejectedNonFastForward,
    /// The remote ref moved after it was advertised
    RejectedStale,
    RejectedMissingObjects,
}

impl RefUpdateStatus {
    pub fn is_rejected(&self) -> bool {
        !matches!(self, RefUpdateStatus::Ok | RefUpdateStatus::UpToDate)
    }
}

impl fmt::Display for RefUpdateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RefUpdateStatus::Ok => "ok",
            RefUpdateStatus::UpToDate => "up to date",
            RefUpdateStatus::RejectedNonFastForward => "rejected (non-fast-forward)",
            RefUpdateStatus::RejectedStale => "rejected (stale info)",
            RefUpdateStatus::RejectedMissingObjects => "rejected (missing objects)",
        };
        write!(f, "{label}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefUpdateOutcome {
    pub name: String,
    pub status: RefUpdateStatus,
    /// Remote value before the update was attempted
    pub old: Option<ObjectId>,
    pub new: Option<ObjectId>,
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn list_refs(
        &self,
        uri: &str,
        credentials: Option<&Credentials>,
    ) -> anyhow::Result<Advertisement>;

    async fn fetch_objects(
        &self,
        uri: &str,
        wants: &[ObjectId],
        haves: &[ObjectId],
        credentials: Option<&Credentials>,
    ) -> anyhow::Result<Vec<RawObject>>;

    async fn push_objects(
        &self,
        uri: &str,
        objects: Vec<RawObject>,
        updates: Vec<RefUpdate>,
        credentials: Option<&Credentials>,
    ) -> anyhow::Result<Vec<RefUpdateOutcome>>;
}

/// Timeout for a single transport call, from `GROVE_TRANSPORT_TIMEOUT_SECS`
pub fn transport_timeout() -> Duration {
    let seconds = std::env::var(TIMEOUT_ENV)
        .ok()
        .and_then(|value| value.trim().parse::<u64>().ok())
        .unwrap_or(DEFAULT_TIMEOUT_SECS);

    Duration::from_secs(seconds)
}

/// Run a transport call, turning an expired deadline into a `Transport` error
pub async fn bounded<T>(
    uri: &str,
    timeout: Duration,
    call: impl Future<Output = anyhow::Result<T>>,
) -> anyhow::Result<T> {
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(RepositoryError::transport(
            uri,
            format!("timed out after {}s", timeout.as_secs_f32()),
        )
        .into()),
    }
}
