use crate::areas::database::Database;
use crate::artifacts::objects::commit::Commit;
use crate::artifacts::objects::object_id::ObjectId;
use anyhow::Context;
use chrono::{DateTime, FixedOffset};
use std::collections::{BinaryHeap, HashSet};

/// Lazy walk over the history below a set of tips
///
/// Commits come out newest committer time first. Equal times pop the most
/// recently discovered commit, so a first parent is walked before its siblings.
/// Each commit is yielded once however many paths lead to it.
pub struct RevList<'r> {
    database: &'r Database,
    queue: BinaryHeap<(DateTime<FixedOffset>, u64, ObjectId)>,
    seen: HashSet<ObjectId>,
    discovered: u64,
    failed: bool,
}

impl<'r> RevList<'r> {
    /// Start a walk at `tips`
    ///
    /// Every tip must name a readable commit; the first one that does not fails
    /// the whole walk.
    pub fn new(
        database: &'r Database,
        tips: impl IntoIterator<Item = ObjectId>,
    ) -> anyhow::Result<Self> {
        let mut rev_list = RevList {
            database,
            queue: BinaryHeap::new(),
            seen: HashSet::new(),
            discovered: 0,
            failed: false,
        };
        for tip in tips {
            rev_list
                .discover(tip.clone())
                .with_context(|| format!("cannot start history walk at {tip}"))?;
        }

        Ok(rev_list)
    }

    fn discover(&mut self, oid: ObjectId) -> anyhow::Result<()> {
        if !self.seen.insert(oid.clone()) {
            return Ok(());
        }

        let timestamp = self.database.parse_object_as_commit(&oid)?.committer().timestamp();
        self.discovered += 1;
        self.queue.push((timestamp, self.discovered, oid));

        Ok(())
    }
}

impl Iterator for RevList<'_> {
    type Item = anyhow::Result<(ObjectId, Commit)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        let (_, _, oid) = self.queue.pop()?;
        let step = self.database.parse_object_as_commit(&oid).and_then(|commit| {
            for parent in commit.parents().iter().rev() {
                self.discover(parent.clone())?;
            }
            Ok((oid, commit))
        });

        if step.is_err() {
            self.failed = true;
        }
        Some(step)
    }
}
