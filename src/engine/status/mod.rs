// gitdock: Multi-repository Git sync engine
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Read-only repository queries. Nothing here takes the lease or changes the
//! repository; every call re-reads git.
//!
//! ```text
//! refresh()               status --porcelain=v2 --branch -z --untracked-files=all
//! upstream_of(branch)     config --get branch.<b>.remote / branch.<b>.merge
//! remote_url(remote)      remote get-url <remote>
//! operation_in_progress() <git-dir>/{rebase-merge,rebase-apply,MERGE_HEAD,...}
//! unmerged_paths()        diff --name-only --diff-filter=U -z
//! stash_count()           stash list
//! ```

pub mod porcelain;


use std::path::{Path, PathBuf};

use tracing::debug;

use super::invoker::CommandInvoker;
use super::types::{RepoStatus, RepositoryHandle};
use crate::auth::redact;
use crate::error::EngineError;
use crate::git::{CommandOutput, discover_workdir};

/// Markers of an unfinished operation, relative to the git dir.
const IN_PROGRESS_MARKERS: &[(&str, &str)] = &[
    ("rebase-merge", "rebase"),
    ("rebase-apply", "rebase"),
    ("MERGE_HEAD", "merge"),
    ("REVERT_HEAD", "revert"),
    ("CHERRY_PICK_HEAD", "cherry-pick"),
];

/// Tracking configuration of a branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upstream {
    pub remote: String,
    /// Full ref on the remote, e.g. `refs/heads/main`.
    pub merge_ref: String,
}

/// Splits NUL-separated path output.
pub(crate) fn split_paths(raw: &str) -> Vec<String> {
    raw.split('\0')
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone)]
pub struct StatusTracker {
    invoker: CommandInvoker,
}

impl StatusTracker {
    #[must_use]
    pub const fn new(invoker: CommandInvoker) -> Self {
        Self { invoker }
    }

    /// Current branch, upstream counts and changed paths.
    ///
    /// # Errors
    ///
    /// Returns an error if git fails or prints output that cannot be parsed.
    pub async fn refresh(&self, repo: &Path) -> Result<RepoStatus, EngineError> {
        let raw = self
            .invoker
            .git(
                repo,
                [
                    "status",
                    "--porcelain=v2",
                    "--branch",
                    "-z",
                    "--untracked-files=all",
                ],
            )
            .await?;
        let status = porcelain::parse(&raw)?;
        debug!(
            repo = %repo.display(),
            branch = status.branch.as_deref().unwrap_or("(detached)"),
            files = status.files.len(),
            ahead = status.ahead,
            behind = status.behind,
            "status"
        );
        Ok(status)
    }

    /// Reads one config value; `None` when unset.
    async fn config_value(&self, repo: &Path, key: &str) -> Result<Option<String>, EngineError> {
        let command = CommandInvoker::local(["config", "--get", key]);
        let output = self.invoker.output(repo, &command).await?;
        match output.exit_code {
            0 => Ok(Some(output.stdout.trim().to_string()).filter(|v| !v.is_empty())),
            1 => Ok(None),
            _ => Err(super::invoker::classify(&command, &output)),
        }
    }

    /// Tracking configuration of `branch`. A `.` remote (local tracking) is
    /// treated as no upstream.
    ///
    /// # Errors
    ///
    /// Returns an error if git config cannot be read.
    pub async fn upstream_of(
        &self,
        repo: &Path,
        branch: &str,
    ) -> Result<Option<Upstream>, EngineError> {
        let remote = self
            .config_value(repo, &format!("branch.{branch}.remote"))
            .await?;
        let Some(remote) = remote.filter(|r| r != ".") else {
            return Ok(None);
        };
        let merge_ref = self
            .config_value(repo, &format!("branch.{branch}.merge"))
            .await?;
        Ok(merge_ref.map(|merge_ref| Upstream { remote, merge_ref }))
    }

    /// URL of `remote`, `None` if the remote does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if git fails for another reason.
    pub async fn remote_url(&self, repo: &Path, remote: &str) -> Result<Option<String>, EngineError> {
        let command = CommandInvoker::local(["remote", "get-url", remote]);
        let output: CommandOutput = self.invoker.output(repo, &command).await?;
        if output.success() {
            Ok(Some(output.stdout.trim().to_string()))
        } else if output.stderr.contains("No such remote") {
            Ok(None)
        } else {
            Err(super::invoker::classify(&command, &output))
        }
    }

    /// Name of the unfinished operation, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the git dir cannot be located.
    pub async fn operation_in_progress(
        &self,
        repo: &Path,
    ) -> Result<Option<&'static str>, EngineError> {
        let git_dir = self.invoker.git(repo, ["rev-parse", "--git-dir"]).await?;
        let git_dir: PathBuf = repo.join(git_dir.trim());
        Ok(IN_PROGRESS_MARKERS
            .iter()
            .find(|(marker, _)| git_dir.join(marker).exists())
            .map(|(_, name)| *name))
    }

    /// Refuses to continue on top of an unfinished operation.
    ///
    /// # Errors
    ///
    /// Returns `Precondition` naming the operation in progress.
    pub async fn ensure_idle(&self, repo: &Path) -> Result<(), EngineError> {
        match self.operation_in_progress(repo).await? {
            Some(operation) => Err(EngineError::precondition(format!(
                "a {operation} is in progress"
            ))),
            None => Ok(()),
        }
    }

    /// Paths with unresolved conflicts.
    ///
    /// # Errors
    ///
    /// Returns an error if git fails.
    pub async fn unmerged_paths(&self, repo: &Path) -> Result<Vec<String>, EngineError> {
        let raw = self
            .invoker
            .git(repo, ["diff", "--name-only", "--diff-filter=U", "-z"])
            .await?;
        Ok(split_paths(&raw))
    }

    /// Number of stash entries.
    ///
    /// # Errors
    ///
    /// Returns an error if git fails.
    pub async fn stash_count(&self, repo: &Path) -> Result<usize, EngineError> {
        let raw = self.invoker.git(repo, ["stash", "list"]).await?;
        Ok(raw.lines().filter(|l| !l.trim().is_empty()).count())
    }

    /// Fresh handle for the repository containing `path`.
    ///
    /// The remote URL comes from the branch upstream, else `fallback_remote`,
    /// and is stored with any userinfo redacted.
    ///
    /// # Errors
    ///
    /// Returns `Precondition` if `path` is not inside a git work tree.
    pub async fn open(
        &self,
        path: &Path,
        account: Option<String>,
        fallback_remote: &str,
    ) -> Result<RepositoryHandle, EngineError> {
        let root = discover_workdir(path)
            .ok_or_else(|| EngineError::precondition("not a git repository"))?;
        let status = self.refresh(&root).await?;

        let upstream = match &status.branch {
            Some(branch) => self.upstream_of(&root, branch).await?,
            None => None,
        };
        let remote = upstream
            .as_ref()
            .map_or(fallback_remote, |u| u.remote.as_str());
        let remote_url = self
            .remote_url(&root, remote)
            .await?
            .map(|url| redact(&url, &[]));

        Ok(RepositoryHandle {
            path: root,
            branch: status.branch,
            dirty: status.dirty,
            remote_url,
            account,
        })
    }
}
