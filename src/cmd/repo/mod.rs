// gitdock: Multi-repository Git sync engine
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Repository commands.
//!
//! ```text
//! RepoCommand --> Engine::from_config --> open(PATH, account)
//!             --> engine operation --> text (stdout/stderr) | JSON (stdout)
//!             --> Ok(true) only for a successful outcome
//! ```


use anyhow::bail;
use serde::Serialize;
use std::sync::Arc;

use crate::activity::TracingSink;
use crate::cli::repo::RepoCommand;
use crate::config::Config;
use crate::engine::Engine;
use crate::engine::types::{
    FileStatus, OperationOutcome, ReflogEntry, RepoStatus, RepositoryHandle, SyncResult,
};
use crate::error::Result;

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Prints `outcome`; `done` is the success line.
fn report(outcome: &OperationOutcome, json: bool, done: &str) -> Result<bool> {
    if json {
        print_json(outcome)?;
    } else if outcome.is_success() {
        println!("{done}");
    } else {
        eprintln!("{outcome}");
    }
    Ok(outcome.is_success())
}

const fn status_label(status: FileStatus) -> &'static str {
    match status {
        FileStatus::Added => "added",
        FileStatus::Modified => "modified",
        FileStatus::Deleted => "deleted",
        FileStatus::Renamed => "renamed",
        FileStatus::Untracked => "untracked",
        FileStatus::Conflict => "conflict",
    }
}

/// Human-readable status, one line per entry.
pub(crate) fn format_status(status: &RepoStatus) -> Vec<String> {
    let mut lines = Vec::with_capacity(status.files.len() + 1);
    let branch = status.branch.as_deref().unwrap_or("(detached HEAD)");
    lines.push(match &status.upstream {
        Some(upstream) => format!(
            "On {branch} tracking {upstream} (ahead {}, behind {})",
            status.ahead, status.behind
        ),
        None => format!("On {branch} (no upstream)"),
    });
    for entry in &status.files {
        let side = if entry.staged { "staged" } else { "worktree" };
        let path = entry.old_path.as_ref().map_or_else(
            || entry.path.clone(),
            |old| format!("{old} -> {}", entry.path),
        );
        lines.push(format!("  {side:<8} {:<9} {path}", status_label(entry.status)));
    }
    lines
}

/// Human-readable reflog listing.
pub(crate) fn format_history(entries: &[ReflogEntry]) -> Vec<String> {
    entries
        .iter()
        .map(|e| {
            let short = e.commit_hash.get(..10).unwrap_or(&e.commit_hash);
            format!(
                "{:<10} {short} {} {}",
                e.selector,
                e.timestamp.format("%Y-%m-%d %H:%M"),
                e.subject
            )
        })
        .collect()
}

fn report_sync(result: &SyncResult, json: bool) -> Result<bool> {
    if json {
        print_json(result)?;
    } else if result.success {
        let text = match (result.pulled, result.pushed) {
            (false, false) => "already up to date",
            (true, false) => "pulled",
            (false, true) => "pushed",
            (true, true) => "pulled and pushed",
        };
        println!("{text}");
    } else {
        eprintln!("{}", OperationOutcome::from(result));
    }
    Ok(result.success)
}

fn print_status(handle: &RepositoryHandle, status: &RepoStatus, json: bool) -> Result<()> {
    if json {
        #[derive(Serialize)]
        struct Report<'a> {
            repository: &'a RepositoryHandle,
            status: &'a RepoStatus,
        }
        return print_json(&Report {
            repository: handle,
            status,
        });
    }
    println!("{}", handle.path.display());
    if let Some(url) = &handle.remote_url {
        println!("  remote   {url}");
    }
    for line in format_status(status) {
        println!("{line}");
    }
    Ok(())
}

/// Runs one repository command.
///
/// Returns whether the operation succeeded. Ctrl+C does not cut a git
/// sequence short: the command waits for the running operation to finish or
/// abort, prints its outcome, then fails as interrupted.
///
/// # Errors
///
/// Returns an error if git cannot be found, the path is not a repository,
/// a query fails, output cannot be written, or the command is interrupted.
pub async fn run_repo_command(command: &RepoCommand, config: &Config) -> Result<bool> {
    let engine = Engine::from_config(config, Arc::new(TracingSink))?;
    let operation = dispatch(&engine, command);
    tokio::pin!(operation);
    tokio::select! {
        result = &mut operation => result,
        Ok(()) = tokio::signal::ctrl_c() => {
            tracing::warn!("Received Ctrl+C, waiting for the running git operation to finish...");
            operation.await?;
            bail!("interrupted")
        }
    }
}

async fn dispatch(engine: &Engine, command: &RepoCommand) -> Result<bool> {
    let args = command.repo();
    let handle = engine.open(&args.path, args.account.clone()).await?;
    let json = args.json;

    match command {
        RepoCommand::Status(_) => {
            let status = engine.refresh_status(&handle).await?;
            print_status(&handle, &status, json)?;
            Ok(true)
        }
        RepoCommand::Sync(_) => report_sync(&engine.sync(&handle).await, json),
        RepoCommand::Stash(_) => report(&engine.stash(&handle).await, json, "changes stashed"),
        RepoCommand::PopStash(_) => {
            report(&engine.pop_stash(&handle).await, json, "stash applied")
        }
        RepoCommand::Commit(args) => report(
            &engine.commit_and_push(&handle, &args.message).await,
            json,
            "committed and pushed",
        ),
        RepoCommand::Push(_) => report(&engine.push_only(&handle).await, json, "pushed"),
        RepoCommand::Undo(_) => report(
            &engine.undo_last_commit(&handle).await,
            json,
            "last commit undone; its changes are staged",
        ),
        RepoCommand::Revert(_) => report(
            &engine.revert_last_commit(&handle).await,
            json,
            "last commit reverted",
        ),
        RepoCommand::DeleteLast(args) => {
            if !args.yes {
                bail!("delete-last discards the last commit; pass --yes to confirm");
            }
            report(
                &engine.delete_last_commit(&handle).await,
                json,
                "last commit deleted; `gitdock history` lists it for restore",
            )
        }
        RepoCommand::History(args) => {
            let mut entries = engine.list_history(&handle).await?;
            if let Some(count) = args.count {
                entries.truncate(count);
            }
            if json {
                print_json(&entries)?;
            } else {
                for line in format_history(&entries) {
                    println!("{line}");
                }
            }
            Ok(true)
        }
        RepoCommand::Restore(args) => {
            let outcome = match &args.expect {
                Some(hash) => {
                    let entry = ReflogEntry {
                        selector: args.selector.clone(),
                        commit_hash: hash.clone(),
                        subject: String::new(),
                        timestamp: chrono::DateTime::default(),
                    };
                    engine.restore_entry(&handle, &entry).await
                }
                None => engine.restore(&handle, &args.selector).await,
            };
            report(&outcome, json, &format!("restored {}", args.selector))
        }
    }
}
