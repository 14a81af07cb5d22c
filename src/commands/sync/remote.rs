use crate::areas::repository::Repository;
use crate::artifacts::config::Config;
use crate::errors::RepositoryError;

pub const DEFAULT_REMOTE: &str = "origin";

/// A named remote from `.git/config`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Remote {
    pub name: String,
    pub url: String,
    /// Only the default `+refs/heads/*:refs/remotes/<name>/*` mapping is honoured
    pub fetch: String,
}

impl Remote {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        let name = name.into();
        Remote {
            fetch: format!("+refs/heads/*:refs/remotes/{name}/*"),
            url: url.into(),
            name,
        }
    }

    pub fn read(config: &Config, name: &str) -> anyhow::Result<Self> {
        let url = config
            .get("remote", Some(name), "url")
            .ok_or_else(|| RepositoryError::not_found("remote", name))?;
        let mut remote = Remote::new(name, url);
        if let Some(fetch) = config.get("remote", Some(name), "fetch") {
            remote.fetch = fetch.to_string();
        }

        Ok(remote)
    }

    pub fn write(&self, config: &mut Config) {
        config.set("remote", Some(&self.name), "url", &self.url);
        config.set("remote", Some(&self.name), "fetch", &self.fetch);
    }
}

impl Repository {
    /// Add or repoint a remote
    pub fn remote_add(&self, name: &str, url: &str) -> anyhow::Result<Remote> {
        let remote = Remote::new(name, url);
        let mut config = self.config()?;
        remote.write(&mut config);
        config.save()?;

        Ok(remote)
    }

    pub fn remote(&self, name: &str) -> anyhow::Result<Remote> {
        Remote::read(&self.config()?, name)
    }

    pub fn remote_list(&self) -> anyhow::Result<Vec<Remote>> {
        let config = self.config()?;

        config
            .subsections("remote")
            .into_iter()
            .map(|name| Remote::read(&config, name))
            .collect()
    }
}
