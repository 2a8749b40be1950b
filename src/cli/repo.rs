// gitdock: Multi-repository Git sync engine
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Repository command arguments.
//!
//! Every command works on one repository: PATH (default `.`), the account
//! whose token is used for fetch and push, and `--json` for machine output.

use clap::{Args, Subcommand};
use std::path::PathBuf;

/// Options shared by every repository command.
#[derive(Debug, Clone, Args)]
pub struct RepoArgs {
    /// Repository path; any directory inside the work tree.
    #[arg(value_name = "PATH", default_value = ".")]
    pub path: PathBuf,

    /// Account whose token authenticates fetch and push.
    #[arg(short = 'a', long, env = "GITDOCK_ACCOUNT")]
    pub account: Option<String>,

    /// Prints the result as JSON on stdout.
    #[arg(long)]
    pub json: bool,
}

/// Arguments for `commit`.
#[derive(Debug, Clone, Args)]
pub struct CommitArgs {
    #[command(flatten)]
    pub repo: RepoArgs,

    /// Commit message.
    #[arg(short = 'm', long, required = true)]
    pub message: String,
}

/// Arguments for `delete-last`.
#[derive(Debug, Clone, Args)]
pub struct DeleteLastArgs {
    #[command(flatten)]
    pub repo: RepoArgs,

    /// Confirms discarding the last commit (and force-pushing it away if it
    /// was published).
    #[arg(long)]
    pub yes: bool,
}

/// Arguments for `history`.
#[derive(Debug, Clone, Args)]
pub struct HistoryArgs {
    #[command(flatten)]
    pub repo: RepoArgs,

    /// Shows at most COUNT entries.
    #[arg(short = 'n', long = "count", value_name = "COUNT")]
    pub count: Option<usize>,
}

/// Arguments for `restore`.
#[derive(Debug, Clone, Args)]
pub struct RestoreArgs {
    /// Reflog selector (`HEAD@{2}`) or commit hash.
    #[arg(value_name = "SELECTOR")]
    pub selector: String,

    /// Commit hash the selector must still resolve to; abbreviations as
    /// printed by `history` are accepted.
    #[arg(long = "expect", value_name = "HASH")]
    pub expect: Option<String>,

    #[command(flatten)]
    pub repo: RepoArgs,
}

/// Repository commands.
#[derive(Debug, Clone, Subcommand)]
pub enum RepoCommand {
    /// Shows branch, upstream and changed files.
    Status(RepoArgs),

    /// Fetches, rebases onto the upstream and pushes.
    Sync(RepoArgs),

    /// Stashes worktree and index changes.
    Stash(RepoArgs),

    /// Applies and drops the newest stash.
    #[command(name = "pop-stash")]
    PopStash(RepoArgs),

    /// Commits the staged changes and pushes.
    Commit(CommitArgs),

    /// Pushes the current branch.
    Push(RepoArgs),

    /// Undoes the last commit, keeping its changes staged.
    Undo(RepoArgs),

    /// Adds a commit that reverts the last one.
    Revert(RepoArgs),

    /// Discards the last commit and force-pushes if it was published.
    #[command(name = "delete-last")]
    DeleteLast(DeleteLastArgs),

    /// Lists the HEAD reflog, newest first.
    History(HistoryArgs),

    /// Resets the current branch to a reflog entry.
    Restore(RestoreArgs),
}

impl RepoCommand {
    /// The repository options of any command.
    #[must_use]
    pub const fn repo(&self) -> &RepoArgs {
        match self {
            Self::Status(args)
            | Self::Sync(args)
            | Self::Stash(args)
            | Self::PopStash(args)
            | Self::Push(args)
            | Self::Undo(args)
            | Self::Revert(args) => args,
            Self::Commit(args) => &args.repo,
            Self::DeleteLast(args) => &args.repo,
            Self::History(args) => &args.repo,
            Self::Restore(args) => &args.repo,
        }
    }
}
