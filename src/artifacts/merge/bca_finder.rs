//! Best common ancestor search over the commit graph
//!
//! The search runs in two phases:
//!
//! 1. Walk both histories newest first, marking each commit with the side(s) it
//!    was reached from. A commit reached from both sides is a common ancestor and
//!    everything below it is marked stale.
//! 2. Drop every common ancestor that is itself an ancestor of another one.
//!
//! What is left are the best common ancestors. Criss-cross histories can leave
//! more than one; the newest is picked, ties broken by id, so the answer is
//! stable between runs.
//!
//! Commits are loaded through a caller-supplied loader and memoized, so the
//! finder works over the object database as well as over in-memory graphs.

use crate::areas::database::Database;
use crate::artifacts::objects::object_id::ObjectId;
use bitflags::bitflags;
use chrono::{DateTime, FixedOffset};
use std::cell::RefCell;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::fmt;
use std::rc::Rc;

bitflags! {
    #[derive(Clone, Copy, PartialEq, Eq, Hash)]
    struct VisitState: u8 {
        const NONE = 0b00;
        const VISITED_FROM_SOURCE = 0b01;
        const VISITED_FROM_TARGET = 0b10;
        const VISITED_FROM_BOTH = Self::VISITED_FROM_SOURCE.bits() | Self::VISITED_FROM_TARGET.bits();
        const STALE = 0b100;
        const RESULT = 0b1000;
    }
}

impl fmt::Debug for VisitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut flags = Vec::new();
        if self.contains(VisitState::VISITED_FROM_SOURCE) {
            flags.push("SOURCE");
        }
        if self.contains(VisitState::VISITED_FROM_TARGET) {
            flags.push("TARGET");
        }
        if self.contains(VisitState::STALE) {
            flags.push("STALE");
        }
        if self.contains(VisitState::RESULT) {
            flags.push("RESULT");
        }
        if flags.is_empty() {
            write!(f, "NONE")
        } else {
            write!(f, "{}", flags.join("|"))
        }
    }
}

/// The parts of a commit the graph walk needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitNode {
    pub oid: ObjectId,
    pub parents: Vec<ObjectId>,
    pub timestamp: DateTime<FixedOffset>,
}

pub struct BCAFinder<CommitLoaderFn>
where
    CommitLoaderFn: Fn(&ObjectId) -> anyhow::Result<CommitNode>,
{
    commit_loader: CommitLoaderFn,
    cache: RefCell<HashMap<ObjectId, Rc<CommitNode>>>,
}

impl<CommitLoaderFn> BCAFinder<CommitLoaderFn>
where
    CommitLoaderFn: Fn(&ObjectId) -> anyhow::Result<CommitNode>,
{
    pub fn new(commit_loader: CommitLoaderFn) -> Self {
        Self {
            commit_loader,
            cache: RefCell::new(HashMap::new()),
        }
    }

    fn load(&self, oid: &ObjectId) -> anyhow::Result<Rc<CommitNode>> {
        if let Some(node) = self.cache.borrow().get(oid) {
            return Ok(node.clone());
        }

        let node = Rc::new((self.commit_loader)(oid)?);
        self.cache.borrow_mut().insert(oid.clone(), node.clone());

        Ok(node)
    }

    /// Common ancestors of `source` and any of `targets`, stale ones excluded
    fn find_common_ancestors(
        &self,
        source_commit_id: &ObjectId,
        target_commit_ids: &HashSet<&ObjectId>,
    ) -> anyhow::Result<HashMap<ObjectId, VisitState>> {
        if target_commit_ids.contains(source_commit_id) {
            return Ok(HashMap::from([(
                source_commit_id.clone(),
                VisitState::RESULT | VisitState::VISITED_FROM_BOTH,
            )]));
        }

        let mut ancestors_states = HashMap::<ObjectId, VisitState>::new();
        let mut priority_queue = BinaryHeap::new();

        let source_commit = self.load(source_commit_id)?;
        ancestors_states.insert(source_commit.oid.clone(), VisitState::VISITED_FROM_SOURCE);
        priority_queue.push((source_commit.timestamp, source_commit.oid.clone()));

        for &target_commit_id in target_commit_ids {
            let target_commit = self.load(target_commit_id)?;
            ancestors_states.insert(target_commit_id.clone(), VisitState::VISITED_FROM_TARGET);
            priority_queue.push((target_commit.timestamp, target_commit.oid.clone()));
        }

        while let Some((_, commit_id)) = priority_queue.pop() {
            let current_state = ancestors_states
                .get(&commit_id)
                .copied()
                .unwrap_or(VisitState::NONE);

            tracing::trace!(commit = %commit_id, state = ?current_state, "merge base walk");

            if current_state.contains(VisitState::STALE) {
                continue;
            }

            let is_common_ancestor = current_state.contains(VisitState::VISITED_FROM_BOTH);
            if is_common_ancestor {
                ancestors_states
                    .entry(commit_id.clone())
                    .and_modify(|state| *state |= VisitState::RESULT);
            }

            let current_commit = self.load(&commit_id)?;
            for parent_id in &current_commit.parents {
                let parent_commit = self.load(parent_id)?;
                let parent_state = ancestors_states
                    .get(parent_id)
                    .copied()
                    .unwrap_or(VisitState::NONE);

                let mut new_state = parent_state | current_state.difference(VisitState::RESULT);
                if is_common_ancestor {
                    new_state |= VisitState::STALE;
                }

                if new_state != parent_state {
                    ancestors_states.insert(parent_id.clone(), new_state);
                    priority_queue.push((parent_commit.timestamp, parent_id.clone()));
                }
            }
        }

        Ok(ancestors_states
            .into_iter()
            .filter(|(_, state)| {
                !state.contains(VisitState::STALE) && state.contains(VisitState::RESULT)
            })
            .collect())
    }

    /// Every best common ancestor of the two commits
    ///
    /// A best common ancestor is a common ancestor that is not an ancestor of
    /// any other common ancestor. Unrelated histories have none.
    pub fn find_best_common_ancestors(
        &self,
        source_commit_id: &ObjectId,
        target_commit_id: &ObjectId,
    ) -> anyhow::Result<Vec<ObjectId>> {
        let common_ancestors = self
            .find_common_ancestors(source_commit_id, &HashSet::from([target_commit_id]))?
            .into_keys()
            .collect::<HashSet<_>>();

        let mut redundant_ancestors = HashSet::<ObjectId>::new();
        for commit in &common_ancestors {
            if redundant_ancestors.contains(commit) {
                continue;
            }

            let others = common_ancestors
                .iter()
                .filter(|other| *other != commit && !redundant_ancestors.contains(*other))
                .collect::<HashSet<_>>();
            if others.is_empty() {
                continue;
            }

            let states = self.find_reachability(commit, &others)?;
            if states
                .get(commit)
                .is_some_and(|state| state.contains(VisitState::VISITED_FROM_TARGET))
            {
                redundant_ancestors.insert(commit.clone());
            }
            for other in others {
                if states
                    .get(other)
                    .is_some_and(|state| state.contains(VisitState::VISITED_FROM_SOURCE))
                {
                    redundant_ancestors.insert(other.clone());
                }
            }
        }

        let mut best = common_ancestors
            .into_iter()
            .filter(|commit| !redundant_ancestors.contains(commit))
            .map(|oid| Ok((self.load(&oid)?.timestamp, oid)))
            .collect::<anyhow::Result<Vec<_>>>()?;
        best.sort_by(|a, b| b.cmp(a));

        Ok(best.into_iter().map(|(_, oid)| oid).collect())
    }

    pub fn find_best_common_ancestor(
        &self,
        source_commit_id: &ObjectId,
        target_commit_id: &ObjectId,
    ) -> anyhow::Result<Option<ObjectId>> {
        Ok(self
            .find_best_common_ancestors(source_commit_id, target_commit_id)?
            .into_iter()
            .next())
    }

    /// Whether `ancestor` is reachable from `descendant` (a commit is its own ancestor)
    pub fn is_ancestor(&self, ancestor: &ObjectId, descendant: &ObjectId) -> anyhow::Result<bool> {
        if ancestor == descendant {
            return Ok(true);
        }

        let states = self.find_reachability(ancestor, &HashSet::from([descendant]))?;

        Ok(states
            .get(ancestor)
            .is_some_and(|state| state.contains(VisitState::VISITED_FROM_TARGET)))
    }

    /// Full walk from `source` and `targets` without pruning, recording which
    /// side reached each commit
    fn find_reachability(
        &self,
        source_commit_id: &ObjectId,
        target_commit_ids: &HashSet<&ObjectId>,
    ) -> anyhow::Result<HashMap<ObjectId, VisitState>> {
        let mut states = HashMap::<ObjectId, VisitState>::new();
        let mut priority_queue = BinaryHeap::new();

        let source_commit = self.load(source_commit_id)?;
        states.insert(source_commit_id.clone(), VisitState::VISITED_FROM_SOURCE);
        priority_queue.push((source_commit.timestamp, source_commit_id.clone()));

        for &target_commit_id in target_commit_ids {
            let target_commit = self.load(target_commit_id)?;
            *states.entry(target_commit_id.clone()).or_insert(VisitState::NONE) |=
                VisitState::VISITED_FROM_TARGET;
            priority_queue.push((target_commit.timestamp, target_commit_id.clone()));
        }

        while let Some((_, commit_id)) = priority_queue.pop() {
            let current_state = states.get(&commit_id).copied().unwrap_or(VisitState::NONE);
            let current_commit = self.load(&commit_id)?;

            for parent_id in &current_commit.parents {
                let parent_state = states.get(parent_id).copied().unwrap_or(VisitState::NONE);
                let new_state = parent_state | current_state;

                if new_state != parent_state {
                    let parent_commit = self.load(parent_id)?;
                    states.insert(parent_id.clone(), new_state);
                    priority_queue.push((parent_commit.timestamp, parent_id.clone()));
                }
            }
        }

        Ok(states)
    }
}

impl Database {
    fn commit_node(&self, oid: &ObjectId) -> anyhow::Result<CommitNode> {
        let commit = self.parse_object_as_commit(oid)?;

        Ok(CommitNode {
            oid: oid.clone(),
            parents: commit.parents().to_vec(),
            timestamp: commit.timestamp(),
        })
    }

    pub fn merge_base(&self, a: &ObjectId, b: &ObjectId) -> anyhow::Result<Option<ObjectId>> {
        BCAFinder::new(|oid| self.commit_node(oid)).find_best_common_ancestor(a, b)
    }

    pub fn is_ancestor(&self, ancestor: &ObjectId, descendant: &ObjectId) -> anyhow::Result<bool> {
        BCAFinder::new(|oid| self.commit_node(oid)).is_ancestor(ancestor, descendant)
    }
}
