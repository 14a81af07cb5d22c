//! References (branches, tags, remote-tracking refs, HEAD)
//!
//! References are human-readable names pointing to objects. They can be:
//! - Direct: containing a 40-character object id
//! - Symbolic: `ref: <name>` pointing at another reference (HEAD -> refs/heads/master)
//!
//! ## Namespaces
//!
//! - `HEAD`: the current branch, or a commit when detached
//! - `refs/heads/*`: local branches
//! - `refs/tags/*`: tags
//! - `refs/remotes/<remote>/*`: last known state of a remote's branches
//!
//! ## Updates
//!
//! A writer first creates `<ref>.lock` exclusively, then writes the new value
//! there and renames it over the ref. Updates through [`Refs::update_ref`] are
//! compare-and-swap: the caller states the value it expects to replace and the
//! write fails with `RefConflict` if the ref holds anything else.

use crate::artifacts::branch::branch_name::{BranchName, HEADS_PREFIX, SymRefName};
use crate::artifacts::objects::object_id::ObjectId;
use crate::errors::RepositoryError;
use anyhow::Context;
use derive_new::new;
use std::collections::HashMap;
use std::fs::File;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use walkdir::WalkDir;

#[derive(Debug, new)]
pub struct Refs {
    /// Path to the git directory (typically `.git`)
    path: Box<Path>,
}

/// Regex pattern for parsing symbolic references
const SYMREF_REGEX: &str = r"^ref: (.+)$";

pub const HEAD_REF_NAME: &str = "HEAD";

/// Upper bound on symbolic indirections, guarding against cycles
const MAX_SYMREF_DEPTH: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
enum SymRefOrOid {
    SymRef { sym_ref_name: SymRefName },
    Oid(ObjectId),
}

impl SymRefOrOid {
    fn parse(content: &str) -> anyhow::Result<Option<SymRefOrOid>> {
        let content = content.trim();

        if content.is_empty() {
            return Ok(None);
        }

        if let Some(symref_match) = regex::Regex::new(SYMREF_REGEX)?.captures(content) {
            Ok(Some(SymRefOrOid::SymRef {
                sym_ref_name: SymRefName::new(symref_match[1].to_string()),
            }))
        } else {
            Ok(Some(SymRefOrOid::Oid(ObjectId::try_parse(
                content.to_string(),
            )?)))
        }
    }

    fn read(path: &Path) -> anyhow::Result<Option<SymRefOrOid>> {
        if !path.is_file() {
            return Ok(None);
        }

        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(None),
            Err(error) => {
                return Err(error).with_context(|| format!("failed to read ref file at {:?}", path));
            }
        };
        Self::parse(&content).with_context(|| format!("corrupt ref file at {:?}", path))
    }
}

const LOCK_SUFFIX: &str = ".lock";

/// How long a writer waits for another writer's `.lock` file to go away
const LOCK_TIMEOUT: Duration = Duration::from_secs(5);
const LOCK_RETRY_INTERVAL: Duration = Duration::from_millis(2);

/// `<ref>.lock`, created exclusively and removed on drop unless committed
///
/// Holding it excludes every other writer of the same ref, in this process or
/// another one.
struct RefLock {
    target: PathBuf,
    lock_path: PathBuf,
    file: Option<File>,
}

impl RefLock {
    fn acquire(target: &Path) -> anyhow::Result<Self> {
        let mut lock_path = target.as_os_str().to_owned();
        lock_path.push(LOCK_SUFFIX);
        let lock_path = PathBuf::from(lock_path);
        let deadline = Instant::now() + LOCK_TIMEOUT;

        loop {
            match std::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&lock_path)
            {
                Ok(file) => {
                    return Ok(RefLock {
                        target: target.to_path_buf(),
                        lock_path,
                        file: Some(file),
                    });
                }
                Err(error) if error.kind() == ErrorKind::AlreadyExists && Instant::now() < deadline => {
                    std::thread::sleep(LOCK_RETRY_INTERVAL);
                }
                Err(error) => {
                    return Err(error)
                        .with_context(|| format!("failed to lock ref file {:?}", lock_path));
                }
            }
        }
    }

    /// Write `content` and rename the lock file over the ref
    fn commit(mut self, content: &str) -> anyhow::Result<()> {
        let Some(mut file) = self.file.take() else {
            anyhow::bail!("ref lock {:?} already released", self.lock_path);
        };
        let written = file
            .write_all(content.as_bytes())
            .and_then(|()| file.sync_all());
        drop(file);

        let result = written.and_then(|()| std::fs::rename(&self.lock_path, &self.target));
        if result.is_err() {
            let _ = std::fs::remove_file(&self.lock_path);
        }
        result.with_context(|| format!("failed to move {:?} into place", self.lock_path))
    }
}

impl Drop for RefLock {
    fn drop(&mut self) {
        if self.file.take().is_some() {
            let _ = std::fs::remove_file(&self.lock_path);
        }
    }
}

impl Refs {
    pub fn git_path(&self) -> &Path {
        &self.path
    }

    fn ref_path(&self, name: &SymRefName) -> PathBuf {
        self.path.join(name.as_ref_path())
    }

    /// Final ref of the symbolic chain starting at `source` (HEAD by default)
    ///
    /// A detached HEAD resolves to `HEAD` itself; an attached HEAD on an unborn
    /// branch resolves to that branch.
    pub fn current_ref(&self, source: Option<SymRefName>) -> anyhow::Result<SymRefName> {
        let mut current = source.unwrap_or_else(SymRefName::head);

        for _ in 0..MAX_SYMREF_DEPTH {
            match SymRefOrOid::read(&self.ref_path(&current))? {
                Some(SymRefOrOid::SymRef { sym_ref_name }) => current = sym_ref_name,
                Some(SymRefOrOid::Oid(_)) | None => return Ok(current),
            }
        }

        anyhow::bail!("too many levels of symbolic refs at {current}")
    }

    /// Branch HEAD is attached to, if any
    pub fn current_branch(&self) -> anyhow::Result<Option<BranchName>> {
        let current = self.current_ref(None)?;
        if current.is_branch() {
            Ok(Some(BranchName::try_parse_sym_ref_name(&current)?))
        } else {
            Ok(None)
        }
    }

    pub fn is_current_branch(&self, branch_name: &BranchName) -> anyhow::Result<bool> {
        Ok(self.current_ref(None)? == SymRefName::branch(branch_name))
    }

    /// Read the id a fully-qualified ref resolves to, following symbolic refs
    pub fn read_oid(&self, sym_ref_name: &SymRefName) -> anyhow::Result<Option<ObjectId>> {
        let target = self.current_ref(Some(sym_ref_name.clone()))?;

        match SymRefOrOid::read(&self.ref_path(&target))? {
            Some(SymRefOrOid::Oid(oid)) => Ok(Some(oid)),
            _ => Ok(None),
        }
    }

    pub fn read_head(&self) -> anyhow::Result<Option<ObjectId>> {
        self.read_oid(&SymRefName::head())
    }

    /// Resolve a short or full ref name
    ///
    /// Candidates are tried in order: `<name>` (only for upper-case names such as
    /// `HEAD` or `MERGE_HEAD`), `refs/<name>`, `refs/tags/<name>`,
    /// `refs/heads/<name>`, `refs/remotes/<name>`, `refs/remotes/<name>/HEAD`.
    pub fn find_ref(&self, name: &str) -> anyhow::Result<Option<SymRefName>> {
        let is_pseudo_ref = name.chars().all(|c| c.is_ascii_uppercase() || c == '_');
        let candidates = [
            is_pseudo_ref.then(|| name.to_string()),
            Some(format!("refs/{name}")),
            Some(format!("refs/tags/{name}")),
            Some(format!("refs/heads/{name}")),
            Some(format!("refs/remotes/{name}")),
            Some(format!("refs/remotes/{name}/HEAD")),
        ];

        Ok(candidates
            .into_iter()
            .flatten()
            .map(SymRefName::new)
            .find(|candidate| self.ref_path(candidate).is_file()))
    }

    pub fn read_ref(&self, name: &str) -> anyhow::Result<Option<ObjectId>> {
        match self.find_ref(name)? {
            Some(sym_ref_name) => self.read_oid(&sym_ref_name),
            None => Ok(None),
        }
    }

    /// Compare-and-swap the ref `name` (or the ref its symbolic chain ends at)
    ///
    /// `expected = None` requires the ref not to exist yet. On mismatch the ref is
    /// left untouched and `RefConflict` reports what was found.
    pub fn update_ref(
        &self,
        name: &SymRefName,
        expected: Option<&ObjectId>,
        new: &ObjectId,
    ) -> anyhow::Result<()> {
        let target = self.current_ref(Some(name.clone()))?;
        self.locked_write(&target, Some(expected), &format!("{new}\n"))?;

        tracing::debug!(name = %target, old = ?expected.map(ObjectId::to_short_oid), new = %new.to_short_oid(), "updated ref");
        Ok(())
    }

    /// Point `name` at `new` regardless of its current value
    pub fn write_ref(&self, name: &SymRefName, new: &ObjectId) -> anyhow::Result<()> {
        let target = self.current_ref(Some(name.clone()))?;
        self.locked_write(&target, None, &format!("{new}\n"))?;

        tracing::debug!(name = %target, new = %new.to_short_oid(), "wrote ref");
        Ok(())
    }

    pub fn set_head_symbolic(&self, target: &SymRefName) -> anyhow::Result<()> {
        self.locked_write(&SymRefName::head(), None, &format!("ref: {target}\n"))
    }

    pub fn set_head_detached(&self, oid: &ObjectId) -> anyhow::Result<()> {
        self.locked_write(&SymRefName::head(), None, &format!("{oid}\n"))
    }

    /// Target of a symbolic HEAD, `None` when detached
    pub fn head_target(&self) -> anyhow::Result<Option<SymRefName>> {
        match SymRefOrOid::read(&self.ref_path(&SymRefName::head()))? {
            Some(SymRefOrOid::SymRef { sym_ref_name }) => Ok(Some(sym_ref_name)),
            _ => Ok(None),
        }
    }

    /// Write `content` to the ref file while holding its `.lock` file
    ///
    /// With `check = Some(expected)` the current direct value must equal
    /// `expected` first. The new content lands in the lock file and is renamed
    /// over the ref, so readers see either the old or the new value.
    fn locked_write(
        &self,
        name: &SymRefName,
        check: Option<Option<&ObjectId>>,
        content: &str,
    ) -> anyhow::Result<()> {
        let path = self.ref_path(name);
        std::fs::create_dir_all(path.parent().with_context(|| {
            format!("failed to create parent directories for ref file at {:?}", path)
        })?)?;

        let lock = RefLock::acquire(&path)?;
        if let Some(expected) = check {
            let actual = Self::read_direct(&path)?;
            if actual.as_ref() != expected {
                return Err(RepositoryError::RefConflict {
                    name: name.to_string(),
                    expected: expected.cloned(),
                    actual,
                }
                .into());
            }
        }

        lock.commit(content)
    }

    fn read_direct(path: &Path) -> anyhow::Result<Option<ObjectId>> {
        match SymRefOrOid::read(path)? {
            Some(SymRefOrOid::Oid(oid)) => Ok(Some(oid)),
            _ => Ok(None),
        }
    }

    /// Delete a ref if it still holds `expected`
    pub fn delete_ref(&self, name: &SymRefName, expected: Option<&ObjectId>) -> anyhow::Result<()> {
        let path = self.ref_path(name);
        if !path.is_file() {
            return Err(RepositoryError::not_found("ref", name.to_string()).into());
        }

        let lock = RefLock::acquire(&path)?;
        if let Some(expected) = expected {
            let actual = Self::read_direct(&path)?;
            if actual.as_ref() != Some(expected) {
                return Err(RepositoryError::RefConflict {
                    name: name.to_string(),
                    expected: Some(expected.clone()),
                    actual,
                }
                .into());
            }
        }

        match std::fs::remove_file(&path) {
            Ok(()) => {}
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                return Err(RepositoryError::not_found("ref", name.to_string()).into());
            }
            Err(error) => {
                return Err(error).with_context(|| format!("failed to delete ref file at {:?}", path));
            }
        }
        drop(lock);
        self.prune_empty_parent_dirs(&path)?;

        tracing::debug!(name = %name, "deleted ref");
        Ok(())
    }

    /// Create `refs/heads/<name>` at `oid`
    ///
    /// Fails with `RefExists` when the branch exists, unless `force` is set.
    pub fn create_branch(&self, name: &BranchName, oid: &ObjectId, force: bool) -> anyhow::Result<()> {
        let branch_ref = SymRefName::branch(name);

        if force {
            return self.write_ref(&branch_ref, oid);
        }

        if self.ref_path(&branch_ref).exists() {
            return Err(RepositoryError::RefExists(name.to_string()).into());
        }
        self.update_ref(&branch_ref, None, oid)
    }

    pub fn delete_branch(&self, name: &BranchName) -> anyhow::Result<ObjectId> {
        let branch_ref = SymRefName::branch(name);
        let oid = self
            .read_oid(&branch_ref)?
            .ok_or_else(|| RepositoryError::not_found("branch", name.to_string()))?;

        self.delete_ref(&branch_ref, Some(&oid))?;
        Ok(oid)
    }

    pub fn list_branches(&self) -> anyhow::Result<Vec<SymRefName>> {
        Ok(self
            .list_refs(HEADS_PREFIX)?
            .into_iter()
            .map(|(name, _)| name)
            .collect())
    }

    /// Direct refs whose full name starts with `prefix`, sorted by name
    pub fn list_refs(&self, prefix: &str) -> anyhow::Result<Vec<(SymRefName, ObjectId)>> {
        let refs_path = self.refs_path();
        if !refs_path.exists() {
            return Ok(vec![]);
        }

        let mut refs = Vec::new();
        for entry in WalkDir::new(&refs_path).sort_by_file_name() {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }

            let Ok(relative_path) = entry.path().strip_prefix(self.path.as_ref()) else {
                continue;
            };
            let name = relative_path.to_string_lossy().replace('\\', "/");
            if !name.starts_with(prefix) || name.ends_with(LOCK_SUFFIX) {
                continue;
            }

            if let Some(SymRefOrOid::Oid(oid)) = SymRefOrOid::read(entry.path())? {
                refs.push((SymRefName::new(name), oid));
            }
        }

        Ok(refs)
    }

    /// Refs grouped by the id they point at, for decorating history output
    pub fn reverse_refs(&self) -> anyhow::Result<HashMap<ObjectId, Vec<SymRefName>>> {
        let mut reversed: HashMap<ObjectId, Vec<SymRefName>> = HashMap::new();

        for (name, oid) in self.list_refs("refs/")? {
            reversed.entry(oid).or_default().push(name);
        }
        if let Some(head) = self.read_head()? {
            reversed.entry(head).or_default().push(SymRefName::head());
        }

        Ok(reversed)
    }

    fn prune_empty_parent_dirs(&self, path: &Path) -> anyhow::Result<()> {
        let refs_path = self.refs_path();
        let mut parent = path.parent();

        while let Some(dir) = parent
            && dir.starts_with(&refs_path)
            && dir != refs_path.as_path()
            && dir != self.heads_path().as_path()
            && dir.read_dir()?.next().is_none()
        {
            std::fs::remove_dir(dir)
                .with_context(|| format!("failed to remove empty ref directory at {:?}", dir))?;
            parent = dir.parent();
        }

        Ok(())
    }

    pub fn head_path(&self) -> PathBuf {
        self.path.join(HEAD_REF_NAME)
    }

    pub fn refs_path(&self) -> PathBuf {
        self.path.join("refs")
    }

    pub fn heads_path(&self) -> PathBuf {
        self.refs_path().join("heads")
    }
}
