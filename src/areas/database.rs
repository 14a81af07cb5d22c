//! Content-addressed object store
//!
//! Objects live as zlib-compressed loose files under `objects/xx/yyyy…`, named by
//! the SHA-1 of their framed content. Writes go through a temp file and a rename
//! so readers never observe a partial object; storing the same content twice is
//! a no-op. Every read re-hashes the bytes it returns.

use crate::artifacts::database::database_entry::DatabaseEntry;
use crate::artifacts::objects::blob::Blob;
use crate::artifacts::objects::commit::Commit;
use crate::artifacts::objects::object::{Object, ObjectBox, RawObject, Unpackable};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::artifacts::objects::tag::Tag;
use crate::artifacts::objects::tree::Tree;
use crate::errors::RepositoryError;
use anyhow::Context;
use bytes::Bytes;
use fake::rand;
use std::collections::{BTreeMap, HashSet};
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub struct Database {
    path: Box<Path>,
}

/// Result of walking the object graph from a set of tips
#[derive(Debug, Default)]
pub struct ObjectWalk {
    /// Present objects, in discovery order
    pub reachable: Vec<ObjectId>,
    /// Referenced objects absent from the store
    pub missing: Vec<ObjectId>,
}

impl Database {
    pub fn new(path: Box<Path>) -> Self {
        Database { path }
    }

    pub fn objects_path(&self) -> &Path {
        &self.path
    }

    /// Store raw payload bytes under the given kind
    pub fn put(&self, kind: ObjectType, payload: impl Into<Bytes>) -> anyhow::Result<ObjectId> {
        self.store(&RawObject::new(kind, payload))
    }

    /// Store an object unless it already exists, returning its id
    pub fn store(&self, object: &impl Object) -> anyhow::Result<ObjectId> {
        let object_content = object.serialize()?;
        let oid = ObjectId::hash(&object_content);
        let object_path = self.path.join(oid.to_path());

        if !object_path.exists() {
            std::fs::create_dir_all(
                object_path
                    .parent()
                    .context(format!("Invalid object path {}", object_path.display()))?,
            )
            .context(format!(
                "Unable to create object directory {}",
                object_path.display()
            ))?;

            self.write_object(&object_path, object_content)?;
            tracing::debug!(oid = %oid, kind = %object.object_type(), "stored object");
        }

        Ok(oid)
    }

    pub fn contains(&self, object_id: &ObjectId) -> bool {
        self.path.join(object_id.to_path()).is_file()
    }

    /// Read and verify an object
    ///
    /// Fails with `NotFound` when the object is absent and with `Integrity` when
    /// its bytes no longer hash to `object_id`.
    pub fn get(&self, object_id: &ObjectId) -> anyhow::Result<RawObject> {
        let object_path = self.path.join(object_id.to_path());
        if !object_path.is_file() {
            return Err(RepositoryError::not_found("object", object_id.as_ref()).into());
        }

        let object_content = std::fs::read(&object_path).context(format!(
            "Unable to read object file {}",
            object_path.display()
        ))?;

        let object_content = Self::decompress(object_content.into()).map_err(|_| {
            RepositoryError::Integrity {
                oid: object_id.clone(),
                actual: "undecodable zlib stream".to_string(),
            }
        })?;

        let actual = ObjectId::hash(&object_content);
        if &actual != object_id {
            return Err(RepositoryError::Integrity {
                oid: object_id.clone(),
                actual: format!("content hashes to {actual}"),
            }
            .into());
        }

        let mut object_reader = Cursor::new(object_content);
        let (kind, size) = ObjectType::parse_header(&mut object_reader)?;
        let header_length = object_reader.position() as usize;
        let payload = object_reader.into_inner().slice(header_length..);

        if payload.len() != size {
            return Err(RepositoryError::Integrity {
                oid: object_id.clone(),
                actual: format!("payload of {} bytes, header declares {size}", payload.len()),
            }
            .into());
        }

        Ok(RawObject::new(kind, payload))
    }

    pub fn load(&self, object_id: &ObjectId) -> anyhow::Result<ObjectBox> {
        self.get(object_id)?
            .parse()
            .map_err(|error| Self::malformed(object_id, error))
    }

    fn malformed(object_id: &ObjectId, error: anyhow::Error) -> anyhow::Error {
        RepositoryError::Integrity {
            oid: object_id.clone(),
            actual: format!("{error:#}"),
        }
        .into()
    }

    pub fn get_object_type(&self, object_id: &ObjectId) -> anyhow::Result<ObjectType> {
        Ok(self.get(object_id)?.kind)
    }

    fn payload_of(&self, object_id: &ObjectId, expected: ObjectType) -> anyhow::Result<Cursor<Bytes>> {
        let object = self.get(object_id)?;
        if object.kind != expected {
            anyhow::bail!("object {object_id} is a {}, not a {expected}", object.kind);
        }

        Ok(Cursor::new(object.payload))
    }

    pub fn parse_object_as_blob(&self, object_id: &ObjectId) -> anyhow::Result<Blob> {
        Blob::deserialize(self.payload_of(object_id, ObjectType::Blob)?)
    }

    pub fn parse_object_as_tree(&self, object_id: &ObjectId) -> anyhow::Result<Tree> {
        Tree::deserialize(self.payload_of(object_id, ObjectType::Tree)?)
            .map_err(|error| Self::malformed(object_id, error))
    }

    pub fn parse_object_as_commit(&self, object_id: &ObjectId) -> anyhow::Result<Commit> {
        Commit::deserialize(self.payload_of(object_id, ObjectType::Commit)?)
    }

    pub fn parse_object_as_tag(&self, object_id: &ObjectId) -> anyhow::Result<Tag> {
        Tag::deserialize(self.payload_of(object_id, ObjectType::Tag)?)
    }

    /// Follow annotated tags until a commit is reached
    pub fn peel_to_commit(&self, object_id: &ObjectId) -> anyhow::Result<ObjectId> {
        let mut current = object_id.clone();

        loop {
            match self.get_object_type(&current)? {
                ObjectType::Commit => return Ok(current),
                ObjectType::Tag => current = self.parse_object_as_tag(&current)?.target().clone(),
                other => anyhow::bail!("object {object_id} is a {other}, not a commit"),
            }
        }
    }

    /// Flatten a tree into `path -> entry` for every blob and gitlink below it
    ///
    /// Gitlinks are leaves: the commits they pin live in another repository.
    pub fn flatten_tree(
        &self,
        tree_oid: Option<&ObjectId>,
    ) -> anyhow::Result<BTreeMap<PathBuf, DatabaseEntry>> {
        let mut flattened = BTreeMap::new();
        if let Some(tree_oid) = tree_oid {
            self.flatten_into(tree_oid, Path::new(""), &mut flattened)?;
        }

        Ok(flattened)
    }

    fn flatten_into(
        &self,
        tree_oid: &ObjectId,
        prefix: &Path,
        flattened: &mut BTreeMap<PathBuf, DatabaseEntry>,
    ) -> anyhow::Result<()> {
        let tree = self.parse_object_as_tree(tree_oid)?;

        for (name, entry) in tree.into_entries() {
            let path = prefix.join(name);
            if entry.is_tree() {
                self.flatten_into(&entry.oid, &path, flattened)?;
            } else {
                flattened.insert(path, entry);
            }
        }

        Ok(())
    }

    /// Flattened tree of a commit
    pub fn commit_files(
        &self,
        commit_oid: Option<&ObjectId>,
    ) -> anyhow::Result<BTreeMap<PathBuf, DatabaseEntry>> {
        match commit_oid {
            None => Ok(BTreeMap::new()),
            Some(commit_oid) => {
                let commit = self.parse_object_as_commit(commit_oid)?;
                self.flatten_tree(Some(commit.tree_oid()))
            }
        }
    }

    /// Walk the object graph from `tips`, never descending below `stop`
    ///
    /// Commits lead to their tree and parents, trees to their entries (gitlinks
    /// excepted) and tags to their target. Blobs are only checked for presence.
    pub fn walk_objects(
        &self,
        tips: impl IntoIterator<Item = ObjectId>,
        stop: &HashSet<ObjectId>,
    ) -> anyhow::Result<ObjectWalk> {
        let mut walk = ObjectWalk::default();
        let mut seen = HashSet::new();
        let mut pending = tips
            .into_iter()
            .map(|oid| (oid, None))
            .collect::<Vec<(ObjectId, Option<ObjectType>)>>();

        while let Some((oid, kind_hint)) = pending.pop() {
            if stop.contains(&oid) || !seen.insert(oid.clone()) {
                continue;
            }
            if !self.contains(&oid) {
                walk.missing.push(oid);
                continue;
            }

            if kind_hint == Some(ObjectType::Blob) {
                walk.reachable.push(oid);
                continue;
            }

            let object = self.get(&oid)?;
            match object.parse()? {
                ObjectBox::Commit(commit) => {
                    pending.push((commit.tree_oid().clone(), Some(ObjectType::Tree)));
                    pending.extend(
                        commit
                            .parents()
                            .iter()
                            .map(|parent| (parent.clone(), Some(ObjectType::Commit))),
                    );
                }
                ObjectBox::Tree(tree) => {
                    pending.extend(
                        tree.entries()
                            .filter(|(_, entry)| !entry.is_gitlink())
                            .map(|(_, entry)| (entry.oid.clone(), Some(entry.mode.object_type()))),
                    );
                }
                ObjectBox::Tag(tag) => pending.push((tag.target().clone(), Some(tag.target_type()))),
                ObjectBox::Blob(_) => {}
            }
            walk.reachable.push(oid);
        }

        Ok(walk)
    }

    /// Objects reachable from `wants` but not from `haves`
    ///
    /// Haves absent from this store are ignored. Fails with `NotFound` if the
    /// history below `wants` is incomplete.
    pub fn reachable_objects(
        &self,
        wants: &[ObjectId],
        haves: &[ObjectId],
    ) -> anyhow::Result<Vec<ObjectId>> {
        let known = self
            .walk_objects(
                haves.iter().filter(|oid| self.contains(oid)).cloned(),
                &HashSet::new(),
            )?
            .reachable
            .into_iter()
            .collect::<HashSet<_>>();

        let walk = self.walk_objects(wants.iter().cloned(), &known)?;
        if let Some(missing) = walk.missing.first() {
            return Err(RepositoryError::not_found("object", missing.as_ref()).into());
        }

        Ok(walk.reachable)
    }

    /// Objects referenced below `tips` that the store lacks
    pub fn missing_objects(
        &self,
        tips: &[ObjectId],
        complete: &[ObjectId],
    ) -> anyhow::Result<Vec<ObjectId>> {
        let stop = complete.iter().cloned().collect::<HashSet<_>>();
        Ok(self.walk_objects(tips.iter().cloned(), &stop)?.missing)
    }

    fn write_object(&self, object_path: &Path, object_content: Bytes) -> anyhow::Result<()> {
        let object_dir = object_path
            .parent()
            .context(format!("Invalid object path {}", object_path.display()))?;
        let temp_object_path = object_dir.join(Self::generate_temp_name());

        let object_content = Self::compress(object_content)?;

        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&temp_object_path)
            .context(format!(
                "Unable to open object file {}",
                temp_object_path.display()
            ))?;

        file.write_all(&object_content).context(format!(
            "Unable to write object file {}",
            temp_object_path.display()
        ))?;

        // rename is atomic, a concurrent writer of the same object simply wins
        std::fs::rename(&temp_object_path, object_path).context(format!(
            "Unable to rename object file to {}",
            object_path.display()
        ))?;

        Ok(())
    }

    fn compress(data: Bytes) -> anyhow::Result<Bytes> {
        let mut encoder =
            flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
        encoder
            .write_all(&data)
            .context("Unable to compress object content")?;

        encoder
            .finish()
            .map(|compressed_content| compressed_content.into())
            .context("Unable to finish compressing object content")
    }

    fn decompress(data: Bytes) -> anyhow::Result<Bytes> {
        let mut decoder = flate2::read::ZlibDecoder::new(&*data);
        let mut decompressed_content = Vec::new();
        decoder
            .read_to_end(&mut decompressed_content)
            .context("Unable to decompress object content")?;

        Ok(decompressed_content.into())
    }

    fn generate_temp_name() -> String {
        format!("tmp-obj-{}", rand::random::<u32>())
    }

    /// All objects whose id starts with `prefix`, for abbreviated ids
    ///
    /// More than one match means the prefix is ambiguous.
    pub fn find_objects_by_prefix(&self, prefix: &str) -> anyhow::Result<Vec<ObjectId>> {
        let prefix = prefix.to_ascii_lowercase();
        let mut matches = Vec::new();

        let directories = if prefix.len() >= 2 {
            vec![prefix[..2].to_string()]
        } else {
            (0..=255u8).map(|i| format!("{i:02x}")).collect()
        };

        for dir_name in directories {
            let dir_path = self.path.join(&dir_name);
            if !dir_path.is_dir() {
                continue;
            }

            for entry in std::fs::read_dir(&dir_path)? {
                let file_name = entry?.file_name();
                let full_oid = format!("{}{}", dir_name, file_name.to_string_lossy());

                if full_oid.starts_with(&prefix)
                    && let Ok(oid) = ObjectId::try_parse(full_oid)
                {
                    matches.push(oid);
                }
            }
        }

        Ok(matches)
    }
}
