use crate::areas::repository::Repository;
use crate::artifacts::branch::branch_name::{BranchName, HEADS_PREFIX, SymRefName};
use crate::artifacts::branch::revision::Revision;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::transport::{
    Credentials, RefUpdate, RefUpdateOutcome, bounded, transport_timeout,
};
use crate::commands::sync::remote::DEFAULT_REMOTE;
use anyhow::Context;
use std::collections::BTreeSet;

#[derive(Debug, Clone)]
pub struct PushOptions {
    pub remote: String,
    /// `[+]<src>[:<dst>]`; an empty `<src>` deletes `<dst>`. Defaults to the
    /// current branch.
    pub refspecs: Vec<String>,
    /// Force every refspec, as if each had a leading `+`
    pub force: bool,
}

impl Default for PushOptions {
    fn default() -> Self {
        PushOptions {
            remote: DEFAULT_REMOTE.to_string(),
            refspecs: vec![],
            force: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushResult {
    pub outcomes: Vec<RefUpdateOutcome>,
}

impl PushResult {
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(|outcome| !outcome.status.is_rejected())
    }

    pub fn rejected(&self) -> impl Iterator<Item = &RefUpdateOutcome> {
        self.outcomes.iter().filter(|outcome| outcome.status.is_rejected())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct PushSpec {
    source: Option<String>,
    destination: String,
    force: bool,
}

impl PushSpec {
    fn parse(spec: &str, force_all: bool) -> anyhow::Result<Self> {
        let (force, spec) = match spec.strip_prefix('+') {
            Some(rest) => (true, rest),
            None => (force_all, spec),
        };
        let (source, destination) = match spec.split_once(':') {
            Some((source, destination)) => (source, destination),
            None => (spec, spec),
        };

        if destination.is_empty() {
            anyhow::bail!("refspec '{spec}' names no destination");
        }

        Ok(PushSpec {
            source: (!source.is_empty()).then(|| source.to_string()),
            destination: Self::qualify(destination)?,
            force,
        })
    }

    fn qualify(name: &str) -> anyhow::Result<String> {
        if name.starts_with("refs/") {
            return Ok(name.to_string());
        }

        Ok(SymRefName::branch(&BranchName::try_parse(name.to_string())?).to_string())
    }
}

impl Repository {
    /// Send local refs and the objects they need to a remote
    ///
    /// Each ref update is a separate compare-and-swap on the remote against the
    /// value it advertised, so one rejected ref never blocks the others. Every
    /// accepted branch moves the matching remote-tracking ref.
    pub async fn push(
        &self,
        options: PushOptions,
        credentials: Option<&Credentials>,
    ) -> anyhow::Result<PushResult> {
        let remote = self.remote(&options.remote)?;
        let transport = self.transport();
        let timeout = transport_timeout();

        let specs = self.push_specs(&options)?;
        let advertisement =
            bounded(&remote.url, timeout, transport.list_refs(&remote.url, credentials)).await?;

        let mut updates = Vec::with_capacity(specs.len());
        for spec in &specs {
            let new = match &spec.source {
                Some(source) => Some(Revision::try_parse(source)?.resolve(self)?),
                None => None,
            };
            updates.push(RefUpdate {
                expected: advertisement.get(&spec.destination).cloned(),
                name: spec.destination.clone(),
                new,
                force: spec.force,
            });
        }

        let wants = updates
            .iter()
            .filter_map(|update| update.new.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect::<Vec<_>>();
        let haves = advertisement.refs.values().cloned().collect::<Vec<_>>();
        let objects = self
            .database()
            .reachable_objects(&wants, &haves)?
            .iter()
            .map(|oid| self.database().get(oid))
            .collect::<anyhow::Result<Vec<_>>>()?;

        tracing::debug!(remote = %remote.name, objects = objects.len(), refs = updates.len(), "pushing");
        let outcomes = bounded(
            &remote.url,
            timeout,
            transport.push_objects(&remote.url, objects, updates, credentials),
        )
        .await?;

        let ref_lock = self.ref_lock();
        let _ref_guard = ref_lock.lock().await;
        for outcome in outcomes.iter().filter(|outcome| !outcome.status.is_rejected()) {
            self.record_pushed_ref(&remote.name, &outcome.name, outcome.new.as_ref())?;
        }

        for outcome in outcomes.iter().filter(|outcome| outcome.status.is_rejected()) {
            tracing::warn!(name = %outcome.name, status = %outcome.status, "push rejected");
        }

        Ok(PushResult { outcomes })
    }

    fn push_specs(&self, options: &PushOptions) -> anyhow::Result<Vec<PushSpec>> {
        if options.refspecs.is_empty() {
            let branch = self
                .refs()
                .current_branch()?
                .context("HEAD is detached, name what to push")?;
            return Ok(vec![PushSpec::parse(branch.as_ref(), options.force)?]);
        }

        options
            .refspecs
            .iter()
            .map(|spec| PushSpec::parse(spec, options.force))
            .collect()
    }

    fn record_pushed_ref(
        &self,
        remote: &str,
        name: &str,
        new: Option<&ObjectId>,
    ) -> anyhow::Result<()> {
        let Some(branch) = name.strip_prefix(HEADS_PREFIX) else {
            return Ok(());
        };
        let tracking = SymRefName::remote_tracking(remote, &BranchName::try_parse(branch.to_string())?);

        match new {
            Some(new) => self.refs().write_ref(&tracking, new),
            None => match self.refs().read_oid(&tracking)? {
                Some(old) => self.refs().delete_ref(&tracking, Some(&old)),
                None => Ok(()),
            },
        }
    }
}
