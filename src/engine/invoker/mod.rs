// gitdock: Multi-repository Git sync engine
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Issues git primitives and maps failures onto [`EngineError`].
//!
//! ```text
//! output()  raw CommandOutput, any exit code
//! check()   exit 0 --> stdout | otherwise --> classify()
//! probe()   exit 0 --> true | exit 1 --> false | otherwise --> classify()
//!
//! classify():
//!   timed out                                   --> NetworkOrRemoteRejected
//!   authentication failure                      --> AuthMissing
//!   rejected / stale / unreachable remote       --> NetworkOrRemoteRejected
//!   anything else                               --> CommandFailed (redacted)
//! ```


use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, trace};

use crate::auth::{Credential, redact};
use crate::error::EngineError;
use crate::git::{CommandOutput, CommandRunner, GitCommand};

/// Stderr fragments git prints when the remote refused our credentials.
const AUTH_PATTERNS: &[&str] = &[
    "authentication failed",
    "could not read username",
    "could not read password",
    "invalid username or password",
    "terminal prompts disabled",
    "the requested url returned error: 401",
    "the requested url returned error: 403",
    "permission denied (publickey",
];

/// Fragments of rejected, stale or unreachable remote operations.
const REMOTE_PATTERNS: &[&str] = &[
    "[rejected]",
    "[remote rejected]",
    "non-fast-forward",
    "fetch first",
    "stale info",
    "failed to push some refs",
    "could not resolve host",
    "unable to access",
    "connection refused",
    "connection timed out",
    "could not read from remote repository",
    "does not appear to be a git repository",
];

/// Shared handle used by every engine component to run git.
#[derive(Clone)]
pub struct CommandInvoker {
    runner: Arc<dyn CommandRunner>,
    network_timeout: Option<Duration>,
}

impl std::fmt::Debug for CommandInvoker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandInvoker")
            .field("network_timeout", &self.network_timeout)
            .finish_non_exhaustive()
    }
}

impl CommandInvoker {
    #[must_use]
    pub fn new(runner: Arc<dyn CommandRunner>, network_timeout: Option<Duration>) -> Self {
        Self {
            runner,
            network_timeout,
        }
    }

    /// A local step: no credential, no timeout.
    pub fn local<I, S>(args: I) -> GitCommand
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        GitCommand::new(args)
    }

    /// A remote-touching step: carries the credential and the network timeout.
    pub fn network<I, S>(&self, args: I, credential: Option<&Credential>) -> GitCommand
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        GitCommand::new(args)
            .with_credential(credential)
            .with_timeout(self.network_timeout)
    }

    /// Runs `command` and returns its output whatever the exit code.
    ///
    /// # Errors
    ///
    /// Returns `CommandFailed` if git could not be run at all.
    pub async fn output(
        &self,
        repo: &Path,
        command: &GitCommand,
    ) -> Result<CommandOutput, EngineError> {
        debug!(cmd = %command.summary(), cwd = %repo.display(), "git");
        let output = self.runner.run(repo, command).await.map_err(|e| {
            let err = EngineError::from(e);
            debug!(cmd = %command.summary(), error = %err, "git could not be run");
            err
        })?;
        if !output.stdout.is_empty() {
            trace!(cmd = %command.summary(), stdout = %redact_for(command, &output.stdout), "stdout");
        }
        if !output.stderr.is_empty() {
            trace!(cmd = %command.summary(), stderr = %redact_for(command, &output.stderr), "stderr");
        }
        Ok(output)
    }

    /// Runs `command`, returning stdout on exit 0.
    ///
    /// # Errors
    ///
    /// Any other exit is classified by [`classify`].
    pub async fn check(&self, repo: &Path, command: &GitCommand) -> Result<String, EngineError> {
        let output = self.output(repo, command).await?;
        if output.success() {
            Ok(output.stdout)
        } else {
            let err = classify(command, &output);
            debug!(cmd = %command.summary(), exit_code = output.exit_code, kind = err.category(), "git failed");
            Err(err)
        }
    }

    /// Shorthand for [`check`](Self::check) on a local step.
    ///
    /// # Errors
    ///
    /// See [`check`](Self::check).
    pub async fn git<I, S>(&self, repo: &Path, args: I) -> Result<String, EngineError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.check(repo, &Self::local(args)).await
    }

    /// Runs a yes/no query: exit 0 is `true`, exit 1 is `false`.
    ///
    /// # Errors
    ///
    /// Any other exit is classified by [`classify`].
    pub async fn probe<I, S>(&self, repo: &Path, args: I) -> Result<bool, EngineError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let command = Self::local(args);
        let output = self.output(repo, &command).await?;
        match output.exit_code {
            0 if !output.timed_out => Ok(true),
            1 => Ok(false),
            _ => Err(classify(&command, &output)),
        }
    }
}

fn redact_for(command: &GitCommand, text: &str) -> String {
    let secret = command.credential().map(Credential::expose_secret);
    redact(text, secret.as_slice())
}

/// Maps a failed invocation onto the error taxonomy.
#[must_use]
pub fn classify(command: &GitCommand, output: &CommandOutput) -> EngineError {
    let summary = command.summary();
    if output.timed_out {
        let after = command
            .timeout()
            .map_or_else(String::new, |t| format!(" after {}s", t.as_secs()));
        return EngineError::rejected(format!("`{summary}` timed out{after}"));
    }

    let stderr = redact_for(command, output.stderr.trim());
    let stdout = redact_for(command, output.stdout.trim());
    let haystack = format!("{stderr}\n{stdout}").to_lowercase();

    if AUTH_PATTERNS.iter().any(|p| haystack.contains(p)) {
        return EngineError::AuthMissing {
            account: command
                .credential()
                .map_or_else(|| "<unassigned>".to_string(), |c| c.account().to_string()),
        };
    }

    if REMOTE_PATTERNS.iter().any(|p| haystack.contains(p)) {
        return EngineError::rejected(remote_message(&stderr, &stdout));
    }

    EngineError::CommandFailed {
        command: summary,
        exit_code: output.exit_code,
        stderr,
    }
}

/// Keeps the lines that explain a remote refusal, dropping `hint:` noise.
fn remote_message(stderr: &str, stdout: &str) -> String {
    let lines: Vec<&str> = stderr
        .lines()
        .chain(stdout.lines())
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with("hint:") && !l.starts_with("To "))
        .collect();
    if lines.is_empty() {
        "remote refused the operation".to_string()
    } else {
        lines.join("\n")
    }
}
