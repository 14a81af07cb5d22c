use colored::Colorize;
use grove::artifacts::objects::commit::Commit;
use grove::artifacts::objects::object_id::ObjectId;
use grove::artifacts::status::file_change::{IndexChangeType, WorkspaceChangeType};
use grove::artifacts::status::status_info::StatusReport;
use grove::artifacts::transport::RefUpdateStatus;
use grove::commands::porcelain::merge::MergeOutcome;
use grove::commands::sync::fetch::{FetchResult, TrackingUpdate};
use grove::commands::sync::push::PushResult;
use std::io::Write;

const INDENT: &str = "        ";

pub fn status_porcelain(report: &StatusReport, out: &mut impl Write) -> anyhow::Result<()> {
    for (path, change) in report.changes() {
        writeln!(out, "{change} {}", path.display())?;
    }
    for path in &report.untracked {
        writeln!(out, "?? {}", path.display())?;
    }

    Ok(())
}

pub fn status_long(report: &StatusReport, branch: Option<&str>, out: &mut impl Write) -> anyhow::Result<()> {
    match branch {
        Some(branch) => writeln!(out, "On branch {branch}")?,
        None => writeln!(out, "{}", "HEAD detached".red())?,
    }

    let changes = report.changes();

    let staged = changes
        .iter()
        .filter(|(_, change)| !matches!(change.index_change, IndexChangeType::None))
        .collect::<Vec<_>>();
    if !staged.is_empty() {
        writeln!(out, "\nChanges to be committed:")?;
        for (path, change) in staged {
            let label = match change.index_change {
                IndexChangeType::Added => "new file:",
                IndexChangeType::Deleted => "deleted:",
                IndexChangeType::Unmerged => "both modified:",
                IndexChangeType::Modified | IndexChangeType::None => "modified:",
            };
            let label = match change.index_change {
                IndexChangeType::Unmerged => format!("{label:<15}").red(),
                _ => format!("{label:<15}").green(),
            };
            writeln!(out, "{INDENT}{label}{}", path.display())?;
        }
    }

    let unstaged = changes
        .iter()
        .filter(|(_, change)| !matches!(change.workspace_change, WorkspaceChangeType::None))
        .collect::<Vec<_>>();
    if !unstaged.is_empty() {
        writeln!(out, "\nChanges not staged for commit:")?;
        for (path, change) in unstaged {
            let label = match change.workspace_change {
                WorkspaceChangeType::Deleted => "deleted:",
                _ => "modified:",
            };
            writeln!(out, "{INDENT}{}{}", format!("{label:<15}").red(), path.display())?;
        }
    }

    if !report.untracked.is_empty() {
        writeln!(out, "\nUntracked files:")?;
        for path in &report.untracked {
            writeln!(out, "{INDENT}{}", path.display().to_string().red())?;
        }
    }

    if report.is_clean() && report.untracked.is_empty() {
        writeln!(out, "nothing to commit, working tree clean")?;
    }

    Ok(())
}

pub fn commit_medium(oid: &ObjectId, commit: &Commit, out: &mut impl Write) -> anyhow::Result<()> {
    writeln!(out, "{}", format!("commit {oid}").yellow())?;
    if commit.is_merge() {
        let parents = commit
            .parents()
            .iter()
            .map(ObjectId::to_short_oid)
            .collect::<Vec<_>>()
            .join(" ");
        writeln!(out, "Merge: {parents}")?;
    }
    writeln!(out, "Author: {}", commit.author().display_name())?;
    writeln!(out, "Date:   {}", commit.author().readable_timestamp())?;
    writeln!(out)?;
    for line in commit.message().lines() {
        writeln!(out, "    {line}")?;
    }
    writeln!(out)?;

    Ok(())
}

pub fn commit_oneline(oid: &ObjectId, commit: &Commit, out: &mut impl Write) -> anyhow::Result<()> {
    writeln!(out, "{} {}", oid.to_short_oid().yellow(), commit.short_message())?;
    Ok(())
}

pub fn merge_outcome(outcome: &MergeOutcome, out: &mut impl Write) -> anyhow::Result<()> {
    match outcome {
        MergeOutcome::AlreadyUpToDate => writeln!(out, "Already up to date.")?,
        MergeOutcome::FastForward { from, to } => {
            let from = from
                .as_ref()
                .map(ObjectId::to_short_oid)
                .unwrap_or_else(|| "(unborn)".to_string());
            writeln!(out, "Updating {from}..{}\nFast-forward", to.to_short_oid())?;
        }
        MergeOutcome::Merged { oid } => {
            writeln!(out, "Merge made by the three-way strategy: {}", oid.to_short_oid())?
        }
        MergeOutcome::Conflicted { paths } => {
            for path in paths {
                writeln!(out, "{} {}", "CONFLICT".red(), path.display())?;
            }
            writeln!(out, "Automatic merge failed; fix conflicts and then commit the result.")?;
        }
    }

    Ok(())
}

pub fn fetch_result(result: &FetchResult, out: &mut impl Write) -> anyhow::Result<()> {
    let changed = result.changed().collect::<Vec<_>>();
    if changed.is_empty() {
        return Ok(());
    }

    writeln!(out, "From {}", result.remote.url)?;
    for update in changed {
        let label = match update.update {
            TrackingUpdate::New => format!("* [{}]", update.update).green(),
            TrackingUpdate::Forced => format!("+ [{}]", update.update).yellow(),
            _ => format!("  [{}]", update.update).normal(),
        };
        writeln!(out, " {label} {}", update.local)?;
    }

    Ok(())
}

pub fn push_result(result: &PushResult, url: &str, out: &mut impl Write) -> anyhow::Result<()> {
    writeln!(out, "To {url}")?;
    for outcome in &result.outcomes {
        let status = match outcome.status {
            RefUpdateStatus::Ok | RefUpdateStatus::UpToDate => outcome.status.to_string().green(),
            _ => outcome.status.to_string().red(),
        };
        writeln!(out, " {} {status}", outcome.name)?;
    }

    Ok(())
}
