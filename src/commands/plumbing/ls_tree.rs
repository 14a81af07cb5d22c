use crate::areas::repository::Repository;
use crate::artifacts::branch::revision::Revision;
use crate::artifacts::database::database_entry::DatabaseEntry;
use crate::artifacts::objects::object::ObjectBox;
use crate::artifacts::objects::object_id::ObjectId;
use std::path::{Path, PathBuf};

impl Repository {
    /// Entries of the tree named by `revision` (a commit, tag or tree)
    ///
    /// Subtrees are listed as entries, or expanded when `recursive` is set.
    pub fn ls_tree(
        &self,
        revision: &str,
        recursive: bool,
    ) -> anyhow::Result<Vec<(PathBuf, DatabaseEntry)>> {
        let oid = match ObjectId::try_parse(revision.to_string()) {
            Ok(oid) => oid,
            Err(_) => Revision::try_parse(revision)?.resolve(self)?,
        };
        let tree_oid = match self.database().load(&oid)? {
            ObjectBox::Tree(_) => oid,
            _ => {
                let commit = self.database().peel_to_commit(&oid)?;
                self.database()
                    .parse_object_as_commit(&commit)?
                    .tree_oid()
                    .clone()
            }
        };

        let mut listing = Vec::new();
        self.list_tree(&tree_oid, Path::new(""), recursive, &mut listing)?;

        Ok(listing)
    }

    fn list_tree(
        &self,
        oid: &ObjectId,
        prefix: &Path,
        recursive: bool,
        listing: &mut Vec<(PathBuf, DatabaseEntry)>,
    ) -> anyhow::Result<()> {
        let tree = self.database().parse_object_as_tree(oid)?;

        for (name, entry) in tree.into_entries() {
            let path = prefix.join(name);

            if entry.is_tree() && recursive {
                self.list_tree(&entry.oid, &path, recursive, listing)?;
            } else {
                listing.push((path, entry));
            }
        }

        Ok(())
    }
}
