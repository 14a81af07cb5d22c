mod cli;

use anyhow::Context;
use clap::Parser;
use cli::pager::Output;
use cli::render;
use cli::{Cli, Commands, RemoteCommands, SubmoduleCommands};
use grove::Repository;
use grove::artifacts::objects::commit::Author;
use grove::artifacts::transport::Credentials;
use grove::artifacts::transport::local::LocalTransport;
use grove::commands::porcelain::checkout::CheckoutTarget;
use grove::commands::porcelain::commit::CommitOptions;
use grove::commands::sync::push::PushOptions;
use std::io::{Write, stdout};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "GROVE_LOG";
const USERNAME_ENV: &str = "GROVE_USERNAME";
const PASSWORD_ENV: &str = "GROVE_PASSWORD";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cwd = match &cli.directory {
        Some(directory) => directory.clone(),
        None => std::env::current_dir()?,
    };

    run(cli.command, &cwd).await
}

async fn run(command: Commands, cwd: &Path) -> anyhow::Result<()> {
    let mut out = stdout();
    let credentials = credentials_from_env();

    match command {
        Commands::Init { path } => {
            let path = path.map(|path| cwd.join(path)).unwrap_or_else(|| cwd.to_path_buf());
            let repository = Repository::new(&path)?;
            repository.init().await?;
            writeln!(out, "Initialized empty repository in {}", repository.git_path().display())?;
        }
        Commands::Clone { uri, directory } => {
            let directory = match directory {
                Some(directory) => cwd.join(directory),
                None => cwd.join(default_clone_dir(&uri)?),
            };
            writeln!(out, "Cloning into '{}'...", directory.display())?;
            Repository::clone_from(&uri, &directory, Arc::new(LocalTransport), credentials.as_ref()).await?;
        }
        command => {
            let repository = Repository::discover(cwd)?;
            run_in_repository(&repository, command, credentials.as_ref(), &mut out).await?;
        }
    }

    Ok(())
}

async fn run_in_repository(
    repository: &Repository,
    command: Commands,
    credentials: Option<&Credentials>,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    match command {
        Commands::CatFile { object } => {
            let (_, object) = repository.cat_file(&object)?;
            out.write_all(&object.payload)?;
        }
        Commands::HashObject { write, file } => {
            writeln!(out, "{}", repository.hash_object(&file, write)?)?;
        }
        Commands::LsTree { recursive, revision } => {
            for (path, entry) in repository.ls_tree(&revision, recursive)? {
                writeln!(
                    out,
                    "{} {} {}\t{}",
                    entry.mode.as_str(),
                    entry.mode.object_type(),
                    entry.oid,
                    path.display()
                )?;
            }
        }
        Commands::WriteTree => writeln!(out, "{}", repository.write_tree().await?)?,
        Commands::Add { paths } => {
            let result = repository.add(&paths).await?;
            for path in result.skipped {
                eprintln!("skipped '{}': inside or without a commit in a nested repository", path.display());
            }
        }
        Commands::Rm { cached, paths } => {
            for path in repository.rm(&paths, cached).await? {
                writeln!(out, "rm '{}'", path.display())?;
            }
        }
        Commands::Commit {
            message,
            author,
            allow_empty,
        } => {
            let options = CommitOptions {
                message,
                author: author.as_deref().map(parse_author).transpose()?,
                committer: None,
                allow_empty,
            };
            let outcome = repository.commit(options).await?;
            let root = if outcome.is_root { "(root-commit) " } else { "" };
            writeln!(
                out,
                "[{root}{}] {}",
                outcome.oid.to_short_oid(),
                outcome.commit.short_message()
            )?;
        }
        Commands::Status { porcelain } => {
            let report = repository.status().await?;
            if porcelain {
                render::status_porcelain(&report, out)?;
            } else {
                let branch = repository.refs().current_branch()?.map(|branch| branch.to_string());
                render::status_long(&report, branch.as_deref(), out)?;
            }
        }
        Commands::Branch {
            name: None, ..
        } => {
            for branch in repository.branch_list()? {
                let marker = if branch.is_current { "*" } else { " " };
                let upstream = branch
                    .upstream
                    .map(|upstream| format!(" [{}]", upstream.tracking_ref()))
                    .unwrap_or_default();
                writeln!(out, "{marker} {} {}{upstream}", branch.name, branch.oid.to_short_oid())?;
            }
        }
        Commands::Branch {
            name: Some(name),
            delete: true,
            ..
        } => {
            let oid = repository.branch_delete(&name).await?;
            writeln!(out, "Deleted branch {name} (was {}).", oid.to_short_oid())?;
        }
        Commands::Branch {
            name: Some(name),
            start,
            force,
            track,
            ..
        } => {
            repository
                .branch_create(&name, start.as_deref(), track, force)
                .await?;
        }
        Commands::Tag { name: None, .. } => {
            for (name, _) in repository.tag_list()? {
                writeln!(out, "{name}")?;
            }
        }
        Commands::Tag {
            name: Some(name),
            target,
            message,
            force,
        } => {
            repository
                .tag(&name, target.as_deref(), message.as_deref(), force)
                .await?;
        }
        Commands::Checkout { target } => match repository.checkout(&target).await? {
            CheckoutTarget::Branch(branch) => writeln!(out, "Switched to branch '{branch}'")?,
            CheckoutTarget::Detached(oid) => writeln!(out, "HEAD is now at {}", oid.to_short_oid())?,
        },
        Commands::Log { oneline, revisions } => {
            let mut pager = Output::for_long_output();
            for entry in repository.log(&revisions)? {
                let (oid, commit) = entry?;
                if oneline {
                    render::commit_oneline(&oid, &commit, &mut pager)?;
                } else {
                    render::commit_medium(&oid, &commit, &mut pager)?;
                }
            }
            pager.finish()?;
        }
        Commands::Merge { target, message } => {
            let outcome = repository.merge(&target, message.as_deref()).await?;
            render::merge_outcome(&outcome, out)?;
        }
        Commands::Remote { command } => match command {
            Some(RemoteCommands::Add { name, url }) => {
                repository.remote_add(&name, &url)?;
            }
            Some(RemoteCommands::List) | None => {
                for remote in repository.remote_list()? {
                    writeln!(out, "{}\t{}", remote.name, remote.url)?;
                }
            }
        },
        Commands::Fetch { remote } => {
            let result = repository.fetch(&remote, credentials).await?;
            render::fetch_result(&result, out)?;
        }
        Commands::Push {
            remote,
            refspecs,
            force,
        } => {
            let url = repository.remote(&remote)?.url;
            let result = repository
                .push(PushOptions { remote, refspecs, force }, credentials)
                .await?;
            render::push_result(&result, &url, out)?;
            if !result.is_success() {
                anyhow::bail!("failed to push some refs to '{url}'");
            }
        }
        Commands::Pull => {
            let result = repository.pull(credentials).await?;
            if let Some(fetch) = &result.fetch {
                render::fetch_result(fetch, out)?;
            }
            render::merge_outcome(&result.merge, out)?;
        }
        Commands::Submodule { command } => match command {
            Some(SubmoduleCommands::Add { url, path }) => {
                let record = repository.submodule_add(&path, &url, credentials).await?;
                writeln!(out, "Added submodule '{}' from {}", record.path.display(), record.url)?;
            }
            Some(SubmoduleCommands::Status) | None => {
                for (path, status) in repository.submodule_status().await? {
                    let head = status
                        .head
                        .as_ref()
                        .map(|head| head.to_string())
                        .unwrap_or_else(|| "-".repeat(40));
                    writeln!(out, "{head} {} ({})", path.display(), status.status)?;
                }
            }
            Some(SubmoduleCommands::Update { path }) => {
                for (path, pin) in repository.submodule_update(path.as_deref(), credentials).await? {
                    writeln!(out, "Submodule path '{}': checked out '{pin}'", path.display())?;
                }
            }
            Some(SubmoduleCommands::RecordPin { path }) => {
                let pin = repository.submodule_record_pin(&path, None).await?;
                writeln!(out, "{} {}", pin.to_short_oid(), path.display())?;
            }
        },
        Commands::Init { .. } | Commands::Clone { .. } => unreachable!("handled before opening a repository"),
    }

    Ok(())
}

/// `Name <email>` as given to `--author`
fn parse_author(value: &str) -> anyhow::Result<Author> {
    let (name, rest) = value
        .split_once('<')
        .with_context(|| format!("author '{value}' is not in 'Name <email>' form"))?;
    let email = rest
        .strip_suffix('>')
        .with_context(|| format!("author '{value}' is not in 'Name <email>' form"))?;

    Ok(Author::new(name.trim().to_string(), email.trim().to_string()))
}

fn credentials_from_env() -> Option<Credentials> {
    Some(Credentials {
        username: std::env::var(USERNAME_ENV).ok()?,
        secret: std::env::var(PASSWORD_ENV).ok()?,
    })
}

/// Last path component of the uri, without a `.git` suffix
fn default_clone_dir(uri: &str) -> anyhow::Result<PathBuf> {
    let name = uri
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .map(|name| name.trim_end_matches(".git"))
        .filter(|name| !name.is_empty())
        .with_context(|| format!("cannot derive a directory name from '{uri}'"))?;

    Ok(PathBuf::from(name))
}
