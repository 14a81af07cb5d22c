use crate::areas::repository::Repository;
use crate::artifacts::branch::revision::Revision;
use crate::artifacts::log::rev_list::RevList;

impl Repository {
    /// History reachable from `revisions` (HEAD when empty), newest first
    ///
    /// An unborn HEAD yields an empty history; a tip naming a missing or
    /// corrupt commit is an error.
    pub fn log(&self, revisions: &[String]) -> anyhow::Result<RevList<'_>> {
        let tips = if revisions.is_empty() {
            self.refs().read_head()?.into_iter().collect::<Vec<_>>()
        } else {
            revisions
                .iter()
                .map(|revision| Revision::try_parse(revision)?.resolve(self))
                .collect::<anyhow::Result<Vec<_>>>()?
        };

        RevList::new(self.database(), tips)
    }
}
