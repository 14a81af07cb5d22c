//! Annotated tag object
//!
//! ```text
//! tag <size>\0
//! object <target-sha>
//! type <target-type>
//! tag <name>
//! tagger <name> <email> <timestamp> <timezone>
//!
//! <message>
//! ```

use crate::artifacts::objects::commit::{Author, split_headers};
use crate::artifacts::objects::object::{Object, Packable, Unpackable, frame};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use anyhow::Context;
use bytes::Bytes;
use derive_new::new;
use std::io::BufRead;

#[derive(Debug, Clone, PartialEq, Eq, new)]
pub struct Tag {
    target: ObjectId,
    target_type: ObjectType,
    name: String,
    tagger: Author,
    message: String,
}

impl Tag {
    pub fn target(&self) -> &ObjectId {
        &self.target
    }

    pub fn target_type(&self) -> ObjectType {
        self.target_type
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tagger(&self) -> &Author {
        &self.tagger
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    fn payload(&self) -> String {
        format!(
            "object {}\ntype {}\ntag {}\ntagger {}\n\n{}",
            self.target,
            self.target_type,
            self.name,
            self.tagger.display(),
            self.message
        )
    }
}

impl Packable for Tag {
    fn serialize(&self) -> anyhow::Result<Bytes> {
        frame(self.object_type(), self.payload().as_bytes())
    }
}

impl Unpackable for Tag {
    fn deserialize(mut reader: impl BufRead) -> anyhow::Result<Self> {
        let mut content = String::new();
        reader.read_to_string(&mut content)?;

        let (headers, message) = split_headers(&content);
        let mut target = None;
        let mut target_type = None;
        let mut name = None;
        let mut tagger = None;

        for line in headers.lines() {
            let Some((key, value)) = line.split_once(' ') else {
                continue;
            };
            match key {
                "object" => target = Some(ObjectId::try_parse(value.to_string())?),
                "type" => target_type = Some(ObjectType::try_from(value)?),
                "tag" => name = Some(value.to_string()),
                "tagger" => tagger = Some(Author::try_from(value)?),
                _ => {}
            }
        }

        Ok(Tag::new(
            target.context("Invalid tag object: missing object line")?,
            target_type.context("Invalid tag object: missing type line")?,
            name.context("Invalid tag object: missing tag line")?,
            tagger.context("Invalid tag object: missing tagger line")?,
            message.to_string(),
        ))
    }
}

impl Object for Tag {
    fn object_type(&self) -> ObjectType {
        ObjectType::Tag
    }

    fn display(&self) -> String {
        self.payload()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_headers_are_parsed_back() {
        let tagger = Author::try_from("Ben Linus <ben@others.org> 1200000000 +0100").unwrap();
        let tag = Tag::new(
            ObjectId::hash(b"target"),
            ObjectType::Commit,
            "v1.0".to_string(),
            tagger,
            "first release\n".to_string(),
        );

        let parsed = Tag::deserialize(std::io::Cursor::new(tag.display())).unwrap();

        pretty_assertions::assert_eq!(parsed, tag);
    }
}
