// gitdock: Multi-repository Git sync engine
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! CLI module for gitdock using clap derive.
//!
//! # Command Structure
//!
//! ```text
//! gitdock [global options] <command>
//! version | options | inis
//! status     [PATH]
//! sync       [PATH]
//! stash      [PATH]
//! pop-stash  [PATH]
//! commit     [PATH] -m MESSAGE
//! push       [PATH]
//! undo       [PATH]
//! revert     [PATH]
//! delete-last [PATH] --yes
//! history    [PATH] [-n COUNT]
//! restore    SELECTOR [PATH] [--expect HASH]
//! ```

pub mod global;
pub mod repo;


use crate::cli::global::GlobalOptions;
use crate::cli::repo::RepoCommand;
use clap::{Parser, Subcommand};

/// Multi-repository git sync engine.
#[derive(Debug, Parser)]
#[command(
    name = "gitdock",
    author,
    version,
    about = "Multi-repository git sync and safe history edits",
    long_about = "gitdock Copyright (C) 2026 Romeo Ahmed\n\
                  This program comes with ABSOLUTELY NO WARRANTY\n\
                  This is free software, and you are welcome to redistribute it\n\
                  under certain conditions; see LICENSE for details.\n\n\
                  Synchronizes local repositories with their upstreams\n\
                  (fetch, rebase, push) and performs history edits that can\n\
                  be recovered through the reflog. See `gitdock <command> --help`\n\
                  for more information about a command.",
    after_help = "CONFIGURATION:\n\n\
                  gitdock reads `gitdock.toml` from the current directory if it\n\
                  exists, then every file given with --ini, then GITDOCK_*\n\
                  environment variables (GITDOCK_LOCK__WAIT_MS=500), then --set\n\
                  overrides. Tokens are read from the variable configured in\n\
                  [accounts.<name>].token_env, GITDOCK_TOKEN_<NAME> by default."
)]
pub struct Cli {
    /// Global options shared by all commands
    #[command(flatten)]
    pub global: GlobalOptions,

    /// Command to execute
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Shows the version.
    #[command(visible_alias = "-v")]
    Version,

    /// Lists all options and their effective values.
    Options,

    /// Lists the configuration files in use.
    Inis,

    #[command(flatten)]
    Repo(RepoCommand),
}

/// Parses command-line arguments.
#[must_use]
pub fn parse() -> Cli {
    Cli::parse()
}

/// Parses command-line arguments from an iterator.
pub fn parse_from<I, T>(iter: I) -> Cli
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    Cli::parse_from(iter)
}

/// Tries to parse command-line arguments, returning an error on failure.
///
/// # Errors
///
/// Returns a `clap::Error` if the arguments are invalid or if help/version information
/// was requested.
pub fn try_parse() -> Result<Cli, clap::Error> {
    Cli::try_parse()
}
