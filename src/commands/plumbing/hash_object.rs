use crate::areas::repository::Repository;
use crate::artifacts::objects::blob::Blob;
use crate::artifacts::objects::object::Object;
use crate::artifacts::objects::object_id::ObjectId;
use std::path::Path;

impl Repository {
    pub fn hash_object(&self, object_path: &Path, write: bool) -> anyhow::Result<ObjectId> {
        let data = std::fs::read(object_path)?;
        let blob = Blob::new(data);

        if write {
            return self.database().store(&blob);
        }

        blob.object_id()
    }
}
