use crate::areas::repository::Repository;
use crate::artifacts::branch::branch_name::BranchName;
use crate::artifacts::branch::{ANCESTOR_REGEX, PARENT_REGEX, REF_ALIASES};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::errors::RepositoryError;
use anyhow::Context;

/// A revision expression naming a commit
///
/// Supported forms:
/// - Ref names: `master`, `origin/master`, `v1.0`, `HEAD`, `@`
/// - Full or abbreviated (4+ hex characters) object ids, tried when no ref matches
/// - Parent: `<revision>^`
/// - Ancestor: `<revision>~<n>`
///
/// Refs win over ids when a name could be either.
#[derive(Debug, Clone)]
pub enum Revision {
    Ref(BranchName),
    Ancestor(Box<Revision>, usize),
    Parent(Box<Revision>),
}

impl Revision {
    pub fn try_parse(revision: &str) -> anyhow::Result<Revision> {
        let parent_regex = regex::Regex::new(PARENT_REGEX)
            .with_context(|| format!("invalid parent regex: {PARENT_REGEX}"))?;
        let ancestor_regex = regex::Regex::new(ANCESTOR_REGEX)
            .with_context(|| format!("invalid ancestor regex: {ANCESTOR_REGEX}"))?;

        if let Some(caps) = parent_regex.captures(revision) {
            Ok(Revision::Parent(Box::new(Self::try_parse(&caps[1])?)))
        } else if let Some(caps) = ancestor_regex.captures(revision) {
            let generations: usize = caps[2]
                .parse()
                .with_context(|| format!("failed to parse generations in revision: {revision}"))?;

            Ok(Revision::Ancestor(
                Box::new(Self::try_parse(&caps[1])?),
                generations,
            ))
        } else {
            let resolved_name = *REF_ALIASES.get(revision).unwrap_or(&revision);
            Ok(Revision::Ref(BranchName::try_parse(resolved_name.to_string())?))
        }
    }

    /// Resolve to a commit id
    ///
    /// Annotated tags are peeled. Fails with `NotFound` for unknown names and for
    /// walking past the root commit.
    pub fn resolve(&self, repository: &Repository) -> anyhow::Result<ObjectId> {
        match self {
            Revision::Ref(name) => {
                let oid = match repository.refs().read_ref(name.as_ref())? {
                    Some(oid) => oid,
                    None if Self::looks_like_oid(name.as_ref()) => {
                        Self::resolve_oid(name.as_ref(), repository)?
                    }
                    None => {
                        return Err(RepositoryError::not_found("revision", name.as_ref()).into());
                    }
                };

                repository.database().peel_to_commit(&oid)
            }
            Revision::Parent(base) => Self::nth_parent(base.resolve(repository)?, 1, repository),
            Revision::Ancestor(base, generations) => {
                Self::nth_parent(base.resolve(repository)?, *generations, repository)
            }
        }
    }

    fn nth_parent(
        mut oid: ObjectId,
        generations: usize,
        repository: &Repository,
    ) -> anyhow::Result<ObjectId> {
        for _ in 0..generations {
            let commit = repository.database().parse_object_as_commit(&oid)?;
            oid = commit
                .parent()
                .cloned()
                .ok_or_else(|| RepositoryError::not_found("parent commit", format!("{oid}^")))?;
        }

        Ok(oid)
    }

    fn resolve_oid(oid_str: &str, repository: &Repository) -> anyhow::Result<ObjectId> {
        let matches = repository.database().find_objects_by_prefix(oid_str)?;

        let commit_matches = matches
            .iter()
            .filter(|oid| {
                repository
                    .database()
                    .get_object_type(oid)
                    .map(|object_type| matches!(object_type, ObjectType::Commit | ObjectType::Tag))
                    .unwrap_or(false)
            })
            .collect::<Vec<_>>();

        match commit_matches.as_slice() {
            [] if matches.is_empty() => Err(RepositoryError::not_found("revision", oid_str).into()),
            [] => anyhow::bail!("object {oid_str} does not name a commit"),
            [oid] => Ok((*oid).clone()),
            candidates => {
                let mut error_msg = format!(
                    "short SHA1 {} is ambiguous\nhint: The candidates are:",
                    oid_str
                );
                for oid in candidates {
                    error_msg.push_str(&format!("\nhint:   {} commit", oid.to_short_oid()));
                }
                anyhow::bail!(error_msg)
            }
        }
    }

    fn looks_like_oid(s: &str) -> bool {
        s.len() >= 4 && s.len() <= 40 && s.chars().all(|c| c.is_ascii_hexdigit())
    }
}
