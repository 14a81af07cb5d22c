//! Submodule records and their status
//!
//! A submodule is split across two places in the parent repository:
//!
//! - `.gitmodules` names its path and the url it is cloned from
//! - a gitlink entry (mode `160000`) in the index and tree pins the commit the
//!   nested repository should be at
//!
//! The nested repository keeps its own objects; the parent only ever stores the
//! pinned commit id.

use crate::artifacts::config::Config;
use crate::artifacts::objects::object_id::ObjectId;
use colored::Colorize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

pub const GITMODULES_FILE: &str = ".gitmodules";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmoduleRecord {
    pub path: PathBuf,
    pub url: String,
    /// Gitlink id in the parent index; `None` until the path is staged
    pub pinned: Option<ObjectId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmoduleStatusType {
    /// Nothing checked out at the path
    Uninitialized,
    /// Checked out at the pinned commit with a clean index and working tree
    Initialized,
    /// Checked out at a different commit than the pin
    RevCheckedOut,
    /// At the pinned commit, with staged or unstaged changes inside
    Modified,
}

impl fmt::Display for SubmoduleStatusType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SubmoduleStatusType::Uninitialized => "uninitialized".yellow(),
            SubmoduleStatusType::Initialized => "initialized".green(),
            SubmoduleStatusType::RevCheckedOut => "rev checked out".cyan(),
            SubmoduleStatusType::Modified => "modified".red(),
        };
        write!(f, "{label}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmoduleStatus {
    pub record: SubmoduleRecord,
    pub status: SubmoduleStatusType,
    /// HEAD of the nested repository, when there is one
    pub head: Option<ObjectId>,
}

/// The `.gitmodules` file of a working tree
pub struct GitModules {
    config: Config,
}

impl GitModules {
    pub fn load(workspace_path: &Path) -> anyhow::Result<Self> {
        let config = Config::load(workspace_path.join(GITMODULES_FILE).into_boxed_path())?;

        Ok(GitModules { config })
    }

    /// Submodule names are their paths
    pub fn add(&mut self, path: &Path, url: &str) {
        let name = path.to_string_lossy();
        self.config.set("submodule", Some(&name), "path", &name);
        self.config.set("submodule", Some(&name), "url", url);
    }

    pub fn save(&self) -> anyhow::Result<()> {
        self.config.save()
    }

    pub fn url_of(&self, path: &Path) -> Option<&str> {
        self.entries()
            .find(|(entry_path, _)| entry_path == path)
            .map(|(_, url)| url)
    }

    /// `(path, url)` of every declared submodule, in file order
    pub fn entries(&self) -> impl Iterator<Item = (PathBuf, &str)> {
        self.config
            .subsections("submodule")
            .into_iter()
            .filter_map(|name| {
                let path = self.config.get("submodule", Some(name), "path")?;
                let url = self.config.get("submodule", Some(name), "url")?;
                Some((PathBuf::from(path), url))
            })
    }

    pub fn records(&self, pins: &BTreeMap<PathBuf, ObjectId>) -> Vec<SubmoduleRecord> {
        self.entries()
            .map(|(path, url)| SubmoduleRecord {
                pinned: pins.get(&path).cloned(),
                url: url.to_string(),
                path,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::TempDir;
    use pretty_assertions::assert_eq;

    #[test]
    fn added_submodules_survive_a_reload() {
        let dir = TempDir::new().unwrap();
        let mut modules = GitModules::load(dir.path()).unwrap();

        modules.add(Path::new("recipes-common"), "/srv/recipes-common");
        modules.add(Path::new("vendor/lib"), "file:///srv/lib");
        modules.save().unwrap();

        let modules = GitModules::load(dir.path()).unwrap();
        assert_eq!(
            modules.entries().collect::<Vec<_>>(),
            vec![
                (PathBuf::from("recipes-common"), "/srv/recipes-common"),
                (PathBuf::from("vendor/lib"), "file:///srv/lib"),
            ]
        );
        assert_eq!(modules.url_of(Path::new("vendor/lib")), Some("file:///srv/lib"));
    }

    #[test]
    fn records_pick_up_pins_by_path() {
        let dir = TempDir::new().unwrap();
        let mut modules = GitModules::load(dir.path()).unwrap();
        modules.add(Path::new("recipes-common"), "/srv/recipes-common");
        let pin = ObjectId::hash(b"pin");

        let records = modules.records(&BTreeMap::from([(PathBuf::from("recipes-common"), pin.clone())]));

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].pinned, Some(pin));
    }
}
