use crate::areas::repository::Repository;
use crate::artifacts::branch::revision::Revision;
use crate::artifacts::objects::object::RawObject;
use crate::artifacts::objects::object_id::ObjectId;
use crate::errors::RepositoryError;

impl Repository {
    /// Read an object by id, abbreviated id or revision
    pub fn cat_file(&self, object: &str) -> anyhow::Result<(ObjectId, RawObject)> {
        let oid = self.resolve_object(object)?;
        let raw = self.database().get(&oid)?;

        Ok((oid, raw))
    }

    fn resolve_object(&self, object: &str) -> anyhow::Result<ObjectId> {
        if let Ok(oid) = ObjectId::try_parse(object.to_string()) {
            return Ok(oid);
        }

        if object.len() >= 4 && object.chars().all(|c| c.is_ascii_hexdigit()) {
            match self.database().find_objects_by_prefix(object)?.as_slice() {
                [oid] => return Ok(oid.clone()),
                [] => {}
                _ => anyhow::bail!("short object id {object} is ambiguous"),
            }
        }

        match Revision::try_parse(object) {
            Ok(revision) => revision.resolve(self),
            Err(_) => Err(RepositoryError::not_found("object", object).into()),
        }
    }
}
