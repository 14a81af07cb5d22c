//! Git-style INI configuration files
//!
//! Used for the repository's `.git/config` and for `.gitmodules`:
//!
//! ```text
//! [user]
//!     name = Ada Lovelace
//! [remote "origin"]
//!     url = /srv/repos/cookbook
//!     fetch = +refs/heads/*:refs/remotes/origin/*
//! ```
//!
//! Section and key names are case-insensitive, subsection names are not. When a
//! key repeats, the last value wins for `get`. Sections keep their file order
//! on save, so untouched parts of a file survive a round trip.

pub mod identity;

use anyhow::Context;
use file_guard::Lock;
use std::io::Write;
use std::ops::DerefMut;
use std::path::Path;

const SECTION_REGEX: &str = r#"^\[\s*([A-Za-z0-9.-]+)(?:\s+"((?:[^"\\]|\\.)*)")?\s*\]$"#;
const ENTRY_REGEX: &str = r"^([A-Za-z][A-Za-z0-9-]*)\s*(?:=\s*(.*))?$";

#[derive(Debug, Clone, PartialEq, Eq)]
struct Section {
    name: String,
    subsection: Option<String>,
    entries: Vec<(String, String)>,
}

impl Section {
    fn matches(&self, name: &str, subsection: Option<&str>) -> bool {
        self.name.eq_ignore_ascii_case(name) && self.subsection.as_deref() == subsection
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    path: Box<Path>,
    sections: Vec<Section>,
}

impl Config {
    pub fn new(path: Box<Path>) -> Self {
        Config {
            path,
            sections: Vec::new(),
        }
    }

    /// Read a configuration file; a missing file is an empty configuration
    pub fn load(path: Box<Path>) -> anyhow::Result<Self> {
        let mut config = Config::new(path);
        if !config.path.exists() {
            return Ok(config);
        }

        let content = std::fs::read_to_string(&config.path)
            .with_context(|| format!("failed to read config file {:?}", config.path))?;
        config.sections = Self::parse(&content)
            .with_context(|| format!("invalid config file {:?}", config.path))?;

        Ok(config)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn parse(content: &str) -> anyhow::Result<Vec<Section>> {
        let section_regex = regex::Regex::new(SECTION_REGEX)?;
        let entry_regex = regex::Regex::new(ENTRY_REGEX)?;
        let mut sections: Vec<Section> = Vec::new();

        for (line_number, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }

            if let Some(caps) = section_regex.captures(line) {
                sections.push(Section {
                    name: caps[1].to_ascii_lowercase(),
                    subsection: caps.get(2).map(|sub| unescape(sub.as_str())),
                    entries: Vec::new(),
                });
                continue;
            }

            let caps = entry_regex
                .captures(line)
                .with_context(|| format!("line {}: cannot parse '{line}'", line_number + 1))?;
            let section = sections
                .last_mut()
                .with_context(|| format!("line {}: entry outside of a section", line_number + 1))?;

            let value = caps
                .get(2)
                .map(|value| parse_value(value.as_str()))
                .unwrap_or_else(|| "true".to_string());
            section.entries.push((caps[1].to_ascii_lowercase(), value));
        }

        Ok(sections)
    }

    pub fn get(&self, section: &str, subsection: Option<&str>, key: &str) -> Option<&str> {
        self.get_all(section, subsection, key).pop()
    }

    pub fn get_all(&self, section: &str, subsection: Option<&str>, key: &str) -> Vec<&str> {
        self.sections
            .iter()
            .filter(|candidate| candidate.matches(section, subsection))
            .flat_map(|candidate| candidate.entries.iter())
            .filter(|(name, _)| name.eq_ignore_ascii_case(key))
            .map(|(_, value)| value.as_str())
            .collect()
    }

    /// Replace every value of `key` with a single `value`
    pub fn set(&mut self, section: &str, subsection: Option<&str>, key: &str, value: &str) {
        let key = key.to_ascii_lowercase();
        self.unset(section, subsection, &key);

        match self
            .sections
            .iter_mut()
            .find(|candidate| candidate.matches(section, subsection))
        {
            Some(candidate) => candidate.entries.push((key, value.to_string())),
            None => self.sections.push(Section {
                name: section.to_ascii_lowercase(),
                subsection: subsection.map(str::to_string),
                entries: vec![(key, value.to_string())],
            }),
        }
    }

    pub fn unset(&mut self, section: &str, subsection: Option<&str>, key: &str) {
        for candidate in self
            .sections
            .iter_mut()
            .filter(|candidate| candidate.matches(section, subsection))
        {
            candidate
                .entries
                .retain(|(name, _)| !name.eq_ignore_ascii_case(key));
        }
    }

    pub fn remove_section(&mut self, section: &str, subsection: Option<&str>) {
        self.sections
            .retain(|candidate| !candidate.matches(section, subsection));
    }

    /// Subsection names of `section`, in file order without repeats
    pub fn subsections(&self, section: &str) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for candidate in &self.sections {
            if let Some(subsection) = candidate.subsection.as_deref()
                && candidate.name.eq_ignore_ascii_case(section)
                && !names.contains(&subsection)
            {
                names.push(subsection);
            }
        }

        names
    }

    fn render(&self) -> String {
        let mut content = String::new();

        for section in &self.sections {
            match &section.subsection {
                Some(subsection) => {
                    content.push_str(&format!("[{} \"{}\"]\n", section.name, escape(subsection)))
                }
                None => content.push_str(&format!("[{}]\n", section.name)),
            }
            for (key, value) in &section.entries {
                content.push_str(&format!("\t{key} = {}\n", quote_value(value)));
            }
        }

        content
    }

    /// Write the configuration back under an exclusive lock
    pub fn save(&self) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut config_file = std::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)
            .with_context(|| format!("failed to open config file {:?}", self.path))?;
        let mut lock = file_guard::lock(&mut config_file, Lock::Exclusive, 0, 1)?;
        lock.set_len(0)?;
        lock.deref_mut().write_all(self.render().as_bytes())?;

        Ok(())
    }
}

fn parse_value(raw: &str) -> String {
    let mut value = String::new();
    let mut in_quotes = false;
    let mut chars = raw.chars();

    while let Some(c) = chars.next() {
        match c {
            '"' => in_quotes = !in_quotes,
            '\\' => match chars.next() {
                Some('n') => value.push('\n'),
                Some('t') => value.push('\t'),
                Some(other) => value.push(other),
                None => {}
            },
            '#' | ';' if !in_quotes => break,
            c => value.push(c),
        }
    }

    if raw.trim_end().ends_with('"') {
        value
    } else {
        value.trim_end().to_string()
    }
}

fn unescape(value: &str) -> String {
    value.replace("\\\"", "\"").replace("\\\\", "\\")
}

fn escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

fn quote_value(value: &str) -> String {
    let needs_quotes = value.starts_with(' ')
        || value.ends_with(' ')
        || value.contains('#')
        || value.contains(';');
    let escaped = escape(value).replace('\n', "\\n").replace('\t', "\\t");

    if needs_quotes {
        format!("\"{escaped}\"")
    } else {
        escaped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::TempDir;
    use assert_fs::prelude::*;
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = r#"
# written by hand
[core]
	bare = false
[remote "origin"]
	url = /srv/repos/cookbook
	fetch = +refs/heads/*:refs/remotes/origin/*
[branch "master"]
	remote = origin
	merge = refs/heads/master
[User]
	Name = "Ada Lovelace" ; inline comment
	email = ada@example.com
"#;

    fn sample(dir: &TempDir) -> Config {
        let file = dir.child("config");
        file.write_str(SAMPLE).unwrap();
        Config::load(file.path().to_path_buf().into_boxed_path()).unwrap()
    }

    #[test]
    fn values_are_read_by_section_and_subsection() {
        let dir = TempDir::new().unwrap();
        let config = sample(&dir);

        assert_eq!(config.get("remote", Some("origin"), "url"), Some("/srv/repos/cookbook"));
        assert_eq!(config.get("branch", Some("master"), "merge"), Some("refs/heads/master"));
        assert_eq!(config.get("user", None, "name"), Some("Ada Lovelace"));
        assert_eq!(config.get("remote", Some("upstream"), "url"), None);
    }

    #[test]
    fn subsections_are_listed_in_file_order() {
        let dir = TempDir::new().unwrap();
        let config = sample(&dir);

        assert_eq!(config.subsections("remote"), vec!["origin"]);
        assert_eq!(config.subsections("branch"), vec!["master"]);
    }

    #[test]
    fn set_replaces_and_save_round_trips() {
        let dir = TempDir::new().unwrap();
        let mut config = sample(&dir);

        config.set("user", None, "email", "john.locke@815.com");
        config.set("branch", Some("topic"), "remote", ".");
        config.save().unwrap();

        let reloaded = Config::load(config.path().to_path_buf().into_boxed_path()).unwrap();
        assert_eq!(reloaded.get("user", None, "email"), Some("john.locke@815.com"));
        assert_eq!(reloaded.get_all("user", None, "email").len(), 1);
        assert_eq!(reloaded.get("branch", Some("topic"), "remote"), Some("."));
        assert_eq!(reloaded.get("core", None, "bare"), Some("false"));
    }

    #[test]
    fn unset_and_remove_section_drop_values() {
        let dir = TempDir::new().unwrap();
        let mut config = sample(&dir);

        config.unset("user", None, "email");
        config.remove_section("remote", Some("origin"));

        assert_eq!(config.get("user", None, "email"), None);
        assert!(config.subsections("remote").is_empty());
    }

    #[test]
    fn values_needing_quotes_survive_a_save() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::new(dir.path().join("config").into_boxed_path());

        config.set("user", None, "name", " padded #1 ");
        config.save().unwrap();

        let reloaded = Config::load(config.path().to_path_buf().into_boxed_path()).unwrap();
        assert_eq!(reloaded.get("user", None, "name"), Some(" padded #1 "));
    }

    #[test]
    fn entries_outside_sections_are_rejected() {
        let dir = TempDir::new().unwrap();
        let file = dir.child("config");
        file.write_str("name = orphan\n").unwrap();

        assert!(Config::load(file.path().to_path_buf().into_boxed_path()).is_err());
    }
}
