use crate::artifacts::objects::blob::Blob;
use crate::artifacts::objects::commit::Commit;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::artifacts::objects::tag::Tag;
use crate::artifacts::objects::tree::Tree;
use anyhow::Result;
use bytes::Bytes;
use std::io::{BufRead, Write};
use std::path::PathBuf;

/// Serialize to the canonical `<type> <size>\0<payload>` form.
pub trait Packable {
    fn serialize(&self) -> Result<Bytes>;
}

pub trait Unpackable {
    fn deserialize(reader: impl BufRead) -> Result<Self>
    where
        Self: Sized;
}

pub trait Object: Packable {
    fn object_type(&self) -> ObjectType;

    fn display(&self) -> String;

    fn object_id(&self) -> Result<ObjectId> {
        Ok(ObjectId::hash(&self.serialize()?))
    }

    fn object_path(&self) -> Result<PathBuf> {
        Ok(self.object_id()?.to_path())
    }
}

/// Prepend the object header to a payload.
pub fn frame(object_type: ObjectType, payload: &[u8]) -> Result<Bytes> {
    let mut bytes = Vec::with_capacity(payload.len() + 32);
    write!(bytes, "{} {}\0", object_type.as_str(), payload.len())?;
    bytes.write_all(payload)?;

    Ok(Bytes::from(bytes))
}

/// An object as it is stored and transferred: a kind tag and its payload bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawObject {
    pub kind: ObjectType,
    pub payload: Bytes,
}

impl RawObject {
    pub fn new(kind: ObjectType, payload: impl Into<Bytes>) -> Self {
        RawObject {
            kind,
            payload: payload.into(),
        }
    }

    /// Decode the payload into its typed form.
    pub fn parse(&self) -> Result<ObjectBox> {
        let reader = std::io::Cursor::new(self.payload.clone());

        Ok(match self.kind {
            ObjectType::Blob => ObjectBox::Blob(Box::new(Blob::deserialize(reader)?)),
            ObjectType::Tree => ObjectBox::Tree(Box::new(Tree::deserialize(reader)?)),
            ObjectType::Commit => ObjectBox::Commit(Box::new(Commit::deserialize(reader)?)),
            ObjectType::Tag => ObjectBox::Tag(Box::new(Tag::deserialize(reader)?)),
        })
    }
}

impl Packable for RawObject {
    fn serialize(&self) -> Result<Bytes> {
        frame(self.kind, &self.payload)
    }
}

impl Object for RawObject {
    fn object_type(&self) -> ObjectType {
        self.kind
    }

    fn display(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }
}

pub enum ObjectBox {
    Blob(Box<Blob>),
    Tree(Box<Tree>),
    Commit(Box<Commit>),
    Tag(Box<Tag>),
}

impl ObjectBox {
    pub fn display(&self) -> String {
        match self {
            ObjectBox::Blob(blob) => blob.display(),
            ObjectBox::Tree(tree) => tree.display(),
            ObjectBox::Commit(commit) => commit.display(),
            ObjectBox::Tag(tag) => tag.display(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_object_id_covers_header_and_payload() {
        let object = RawObject::new(ObjectType::Blob, Bytes::from_static(b"hello\n"));

        pretty_assertions::assert_eq!(
            object.object_id().unwrap().as_ref(),
            "ce013625030ba8dba906f756967f9e9ca394464a"
        );
    }
}
