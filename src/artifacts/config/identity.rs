use crate::artifacts::config::Config;
use crate::artifacts::objects::commit::{Author, parse_offset};
use crate::errors::RepositoryError;
use chrono::{DateTime, FixedOffset};

/// Which side of a commit an identity is resolved for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Author,
    Committer,
}

impl Role {
    fn env_prefix(&self) -> &'static str {
        match self {
            Role::Author => "GIT_AUTHOR",
            Role::Committer => "GIT_COMMITTER",
        }
    }
}

/// Resolve an identity from the process environment and `config`
pub fn resolve_identity(
    config: &Config,
    role: Role,
    explicit: Option<&Author>,
) -> anyhow::Result<Author> {
    resolve_identity_with(config, role, explicit, |key| std::env::var(key).ok())
}

/// Resolve an identity with `lookup` standing in for the environment
///
/// An explicit identity wins, then `GIT_<ROLE>_NAME` / `GIT_<ROLE>_EMAIL`, then
/// `user.name` / `user.email`. `GIT_<ROLE>_DATE` replaces the clock reading of
/// whatever identity is picked.
pub fn resolve_identity_with(
    config: &Config,
    role: Role,
    explicit: Option<&Author>,
    lookup: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<Author> {
    let prefix = role.env_prefix();
    let timestamp = match lookup(&format!("{prefix}_DATE")) {
        Some(date) => Some(parse_date(&date)?),
        None => None,
    };

    if let Some(explicit) = explicit {
        return Ok(explicit.clone());
    }

    let name = lookup(&format!("{prefix}_NAME"))
        .or_else(|| config.get("user", None, "name").map(str::to_string))
        .ok_or_else(|| RepositoryError::not_found("identity", "user.name"))?;
    let email = lookup(&format!("{prefix}_EMAIL"))
        .or_else(|| config.get("user", None, "email").map(str::to_string))
        .ok_or_else(|| RepositoryError::not_found("identity", "user.email"))?;

    Ok(match timestamp {
        Some(timestamp) => Author::new_with_timestamp(name, email, timestamp),
        None => Author::new(name, email),
    })
}

/// RFC 2822, `%Y-%m-%d %H:%M:%S %z`, or git's raw `<unix-seconds> <+hhmm>`
fn parse_date(value: &str) -> anyhow::Result<DateTime<FixedOffset>> {
    if let Ok(timestamp) = DateTime::parse_from_rfc2822(value)
        .or_else(|_| DateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S %z"))
    {
        return Ok(timestamp);
    }

    let (seconds, offset) = value
        .trim()
        .split_once(' ')
        .ok_or_else(|| anyhow::anyhow!("Invalid date {value}"))?;
    let offset = parse_offset(offset)?;
    let seconds = seconds
        .trim_start_matches('@')
        .parse::<i64>()
        .map_err(|_| anyhow::anyhow!("Invalid date {value}"))?;

    Ok(DateTime::from_timestamp(seconds, 0)
        .ok_or_else(|| anyhow::anyhow!("Invalid date {value}"))?
        .with_timezone(&offset))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::classify;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use std::path::Path;

    fn config_with_user() -> Config {
        let mut config = Config::new(Path::new("/nonexistent/config").into());
        config.set("user", None, "name", "John Locke");
        config.set("user", None, "email", "john.locke@815.com");
        config
    }

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect::<HashMap<_, _>>();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn config_identity_is_the_fallback() {
        let author =
            resolve_identity_with(&config_with_user(), Role::Author, None, env(&[])).unwrap();

        assert_eq!(author.display_name(), "John Locke <john.locke@815.com>");
    }

    #[test]
    fn environment_beats_config_per_role() {
        let lookup = env(&[
            ("GIT_COMMITTER_NAME", "Kate Austen"),
            ("GIT_COMMITTER_EMAIL", "kate@815.com"),
        ]);
        let config = config_with_user();

        let author = resolve_identity_with(&config, Role::Author, None, &lookup).unwrap();
        let committer = resolve_identity_with(&config, Role::Committer, None, &lookup).unwrap();

        assert_eq!(author.name(), "John Locke");
        assert_eq!(committer.display_name(), "Kate Austen <kate@815.com>");
    }

    #[test]
    fn explicit_identity_beats_everything() {
        let explicit = Author::new("Jack Shephard".into(), "jack@815.com".into());
        let lookup = env(&[("GIT_AUTHOR_NAME", "Ignored"), ("GIT_AUTHOR_EMAIL", "x@y.z")]);

        let author =
            resolve_identity_with(&config_with_user(), Role::Author, Some(&explicit), lookup)
                .unwrap();

        assert_eq!(author, explicit);
    }

    #[test]
    fn date_variables_set_the_timestamp() {
        let lookup = env(&[("GIT_AUTHOR_DATE", "1700000000 +0200")]);

        let author = resolve_identity_with(&config_with_user(), Role::Author, None, lookup).unwrap();

        assert_eq!(author.timestamp().timestamp(), 1_700_000_000);
        assert_eq!(author.timestamp().offset().local_minus_utc(), 7200);
    }

    #[test]
    fn missing_identity_is_not_found() {
        let config = Config::new(Path::new("/nonexistent/config").into());

        let error = resolve_identity_with(&config, Role::Committer, None, env(&[])).unwrap_err();

        assert!(matches!(
            classify(&error),
            Some(RepositoryError::NotFound { .. })
        ));
    }
}
