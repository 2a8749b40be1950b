// gitdock: Multi-repository Git sync engine
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Child process configuration.
//!
//! ```text
//! ProcessBuilder
//!  • new(path) / which(name)   which() resolves through PATH once, cached
//!  • args, cwd, env, env_remove, stdin, name, timeout_opt
//!  • run()                     always captures stdout and stderr
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::{OnceLock, PoisonError, RwLock};
use std::time::Duration;

use crate::error::ProcessError;

/// PATH lookups already answered, keyed by program name.
static RESOLVED: OnceLock<RwLock<BTreeMap<String, PathBuf>>> = OnceLock::new();

fn resolved() -> &'static RwLock<BTreeMap<String, PathBuf>> {
    RESOLVED.get_or_init(RwLock::default)
}

/// Exit status and captured streams of a finished child.
#[derive(Debug, Clone, Default)]
pub struct ProcessOutput {
    exit_code: i32,
    stdout: String,
    stderr: String,
    timed_out: bool,
}

impl ProcessOutput {
    pub(super) const fn new(exit_code: i32, stdout: String, stderr: String, timed_out: bool) -> Self {
        Self {
            exit_code,
            stdout,
            stderr,
            timed_out,
        }
    }

    /// Exit code; -1 when the child ended by signal.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        self.exit_code
    }

    /// `(stdout, stderr)`.
    #[must_use]
    pub fn into_streams(self) -> (String, String) {
        (self.stdout, self.stderr)
    }

    /// Whether the child was killed for running past its timeout.
    #[must_use]
    pub const fn timed_out(&self) -> bool {
        self.timed_out
    }
}

/// One child process to run.
///
/// `env` adds to the inherited environment; `env_remove` strips from it.
/// A non-zero exit is not an error here: callers read [`ProcessOutput`].
#[derive(Debug)]
pub struct ProcessBuilder {
    program: PathBuf,
    args: Vec<String>,
    cwd: Option<PathBuf>,
    envs: BTreeMap<String, String>,
    env_remove: BTreeSet<String>,
    stdin: Option<String>,
    name: Option<String>,
    timeout: Option<Duration>,
}

impl ProcessBuilder {
    /// Runs `program` as given; a bare name is looked up by the OS at spawn.
    pub fn new(program: impl AsRef<Path>) -> Self {
        Self {
            program: program.as_ref().to_path_buf(),
            args: Vec::new(),
            cwd: None,
            envs: BTreeMap::new(),
            env_remove: BTreeSet::new(),
            stdin: None,
            name: None,
            timeout: None,
        }
    }

    /// Resolves `program` through PATH up front.
    ///
    /// # Errors
    ///
    /// Returns `ProcessError::ExecutableNotFound` if PATH has no such program.
    pub fn which(program: &str) -> Result<Self, ProcessError> {
        Self::lookup(program)
            .map(Self::new)
            .ok_or_else(|| ProcessError::ExecutableNotFound {
                name: program.to_string(),
            })
    }

    fn lookup(program: &str) -> Option<PathBuf> {
        let cached = resolved()
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(program)
            .cloned();
        if cached.is_some() {
            return cached;
        }
        let path = which::which(program).ok()?;
        resolved()
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(program.to_string(), path.clone());
        Some(path)
    }

    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_string_lossy().into_owned()));
        self
    }

    #[must_use]
    pub fn cwd(mut self, dir: impl AsRef<Path>) -> Self {
        self.cwd = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Sets one variable for the child. Values are never logged.
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        self.env_remove.remove(&key);
        self.envs.insert(key, value.into());
        self
    }

    /// Hides an inherited variable from the child.
    #[must_use]
    pub fn env_remove(mut self, key: impl Into<String>) -> Self {
        let key = key.into();
        self.envs.remove(&key);
        self.env_remove.insert(key);
        self
    }

    /// Text written to the child's stdin, which is then closed.
    #[must_use]
    pub fn stdin(mut self, content: impl Into<String>) -> Self {
        self.stdin = Some(content.into());
        self
    }

    /// Name used in log events instead of the program file name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Kills the child after `duration`; `None` waits indefinitely.
    #[must_use]
    pub const fn timeout_opt(mut self, duration: Option<Duration>) -> Self {
        self.timeout = duration;
        self
    }

    #[must_use]
    pub const fn program(&self) -> &PathBuf {
        &self.program
    }

    pub(super) fn arguments(&self) -> &[String] {
        &self.args
    }

    pub(super) const fn working_dir(&self) -> Option<&PathBuf> {
        self.cwd.as_ref()
    }

    pub(super) const fn env_overrides(&self) -> &BTreeMap<String, String> {
        &self.envs
    }

    pub(super) const fn env_removals(&self) -> &BTreeSet<String> {
        &self.env_remove
    }

    pub(super) fn stdin_content(&self) -> Option<&str> {
        self.stdin.as_deref()
    }

    pub(super) fn display_name(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => self
                .program
                .file_stem()
                .map_or_else(|| "process".to_string(), |s| s.to_string_lossy().into_owned()),
        }
    }

    pub(super) const fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}
