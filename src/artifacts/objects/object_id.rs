use crate::artifacts::objects::OBJECT_ID_LENGTH;
use sha1::{Digest, Sha1};
use std::fmt;
use std::io;
use std::path::PathBuf;

const SHORT_LENGTH: usize = 7;

/// Lowercase hex SHA-1 naming an object
///
/// Stored loose under `objects/<2 hex>/<38 hex>`; trees and the index carry the
/// 20 raw bytes instead of the hex form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct ObjectId(String);

impl ObjectId {
    pub fn try_parse(id: String) -> anyhow::Result<Self> {
        anyhow::ensure!(
            id.len() == OBJECT_ID_LENGTH,
            "object id '{id}' has {} characters, expected {OBJECT_ID_LENGTH}",
            id.len()
        );
        anyhow::ensure!(
            id.bytes().all(|byte| byte.is_ascii_hexdigit()),
            "object id '{id}' is not hexadecimal"
        );

        Ok(ObjectId(id.to_ascii_lowercase()))
    }

    /// Id of a fully framed object (`<kind> <size>\0<payload>`)
    pub fn hash(framed: &[u8]) -> Self {
        ObjectId(format!("{:x}", Sha1::digest(framed)))
    }

    pub fn write_h40_to<W: io::Write>(&self, writer: &mut W) -> anyhow::Result<()> {
        let raw = (0..OBJECT_ID_LENGTH)
            .step_by(2)
            .map(|at| u8::from_str_radix(&self.0[at..at + 2], 16))
            .collect::<Result<Vec<_>, _>>()?;
        writer.write_all(&raw)?;

        Ok(())
    }

    pub fn read_h40_from<R: io::Read + ?Sized>(reader: &mut R) -> anyhow::Result<Self> {
        let mut raw = [0u8; OBJECT_ID_LENGTH / 2];
        reader.read_exact(&mut raw)?;

        Ok(ObjectId(raw.iter().map(|byte| format!("{byte:02x}")).collect()))
    }

    /// Loose object location relative to the objects directory
    pub fn to_path(&self) -> PathBuf {
        let (fan_out, rest) = self.0.split_at(2);
        [fan_out, rest].iter().collect()
    }

    pub fn to_short_oid(&self) -> String {
        self.0[..SHORT_LENGTH].to_string()
    }
}

impl AsRef<str> for ObjectId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::proptest;
    use std::io::Cursor;

    #[test]
    fn hash_matches_known_empty_blob_id() {
        let oid = ObjectId::hash(b"blob 0\0");

        pretty_assertions::assert_eq!(oid.as_ref(), "e69de29bb2d1d6434b8b29ae775ad8c2e48c5391");
    }

    #[test]
    fn to_path_splits_fan_out_directory() {
        let oid = ObjectId::hash(b"blob 0\0");

        assert_eq!(
            oid.to_path(),
            PathBuf::from("e6").join("9de29bb2d1d6434b8b29ae775ad8c2e48c5391")
        );
    }

    proptest! {
        #[test]
        fn binary_form_preserves_the_id(id in "[0-9a-f]{40}") {
            let oid = ObjectId::try_parse(id.clone()).unwrap();
            let mut bytes = Vec::new();
            oid.write_h40_to(&mut bytes).unwrap();

            assert_eq!(bytes.len(), 20);
            let decoded = ObjectId::read_h40_from(&mut Cursor::new(bytes)).unwrap();
            assert_eq!(decoded.as_ref(), id.as_str());
        }

        #[test]
        fn rejects_wrong_lengths(id in "[0-9a-f]{1,39}") {
            assert!(ObjectId::try_parse(id).is_err());
        }
    }
}
