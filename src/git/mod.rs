// gitdock: Multi-repository Git sync engine
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Git command primitive and runners.
//!
//! ```text
//!   engine components
//!          |
//!          v  GitCommand { args, credential?, timeout?, stdin? }
//!   ,-----------------,
//!   | CommandRunner   |  (trait, async)
//!   '---+---------+---'
//!       |         |
//!       v         v
//!    GitCli    test doubles
//!  (git CLI,   (scripted)
//!   tokio)
//! ```
//!
//! Arguments always travel as a discrete list, never as shell text.
//! Repository discovery for path normalization uses `gix` (no subprocess).

pub mod runner;


use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::auth::Credential;
use crate::error::DockResult;

pub use runner::GitCli;

/// One git invocation.
#[derive(Debug, Clone, Default)]
pub struct GitCommand {
    args: Vec<String>,
    credential: Option<Credential>,
    timeout: Option<Duration>,
    stdin: Option<String>,
}

impl GitCommand {
    pub fn new<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Attaches the account credential for a remote-touching step.
    #[must_use]
    pub fn with_credential(mut self, credential: Option<&Credential>) -> Self {
        self.credential = credential.cloned();
        self
    }

    /// Bounds the invocation; `None` leaves it unbounded.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Feeds `input` to git's stdin.
    #[must_use]
    pub fn with_stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    #[must_use]
    pub const fn credential(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }

    #[must_use]
    pub const fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    #[must_use]
    pub fn stdin(&self) -> Option<&str> {
        self.stdin.as_deref()
    }

    /// `git <args>` for logs and activity records.
    ///
    /// Secrets never enter the argument list, so the summary is safe to show.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut out = String::from("git");
        for arg in &self.args {
            out.push(' ');
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                out.push('"');
                out.push_str(arg);
                out.push('"');
            } else {
                out.push_str(arg);
            }
        }
        out
    }
}

/// Result of one git invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    /// Killed after exceeding the command's timeout.
    pub timed_out: bool,
}

impl CommandOutput {
    /// Successful exit with `stdout`.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            ..Self::default()
        }
    }

    /// Failed exit with `stderr`.
    pub fn failed(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stderr: stderr.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn success(&self) -> bool {
        self.exit_code == 0 && !self.timed_out
    }
}

/// Executes git commands inside a repository.
///
/// A non-zero exit is not an error at this level; only failing to run the
/// program at all is.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the program cannot be spawned or awaited.
    async fn run(&self, repo: &Path, command: &GitCommand) -> DockResult<CommandOutput>;
}

/// Work tree root of the repository containing `path`, if any.
#[must_use]
pub fn discover_workdir(path: &Path) -> Option<PathBuf> {
    let repo = gix::discover(path).ok()?;
    repo.workdir().map(Path::to_path_buf)
}
