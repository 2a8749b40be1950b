// gitdock: Multi-repository Git sync engine
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Pull-rebase-then-push.
//!
//! ```text
//! attempt:
//!   status --> detached / no commits / conflicts / in progress --> Precondition
//!   upstream_of(branch)          none --> Precondition
//!   fetch <remote>               (network)
//!   rev-list --left-right --count HEAD...@{upstream}
//!     0 / 0 --> (pulled=false, pushed=false)
//!   behind:
//!     dirty? diff HEAD...@{upstream} ∩ local paths --> Conflict (untouched)
//!     rebase @{upstream}
//!       conflict  --> rebase --abort --> Conflict(paths)
//!       refused   --> Precondition("uncommitted changes block rebase")
//!   ahead (recounted):
//!     push <remote> HEAD:<merge_ref> (network)
//!
//! sync: attempt, retried while the push is rejected as non-fast-forward
//!       and retries remain
//! ```


use std::collections::BTreeSet;
use std::path::Path;

use tracing::{debug, info, warn};

use super::invoker::{CommandInvoker, classify};
use super::lock::RepoLease;
use super::push::{Force, PushStep};
use super::status::{StatusTracker, Upstream, split_paths};
use super::types::RepoStatus;
use crate::auth::Credential;
use crate::error::EngineError;

/// Messages of a rebase git refused to start because of local changes.
const REFUSAL_PATTERNS: &[&str] = &[
    "uncommitted changes",
    "unstaged changes",
    "please commit or stash",
    "would be overwritten",
];

#[derive(Debug, Clone)]
pub struct SyncOrchestrator {
    invoker: CommandInvoker,
    tracker: StatusTracker,
    push: PushStep,
    push_retries: u32,
    autostash: bool,
}

impl SyncOrchestrator {
    #[must_use]
    pub const fn new(
        invoker: CommandInvoker,
        tracker: StatusTracker,
        push: PushStep,
        push_retries: u32,
        autostash: bool,
    ) -> Self {
        Self {
            invoker,
            tracker,
            push,
            push_retries,
            autostash,
        }
    }

    /// Reconciles the current branch with its upstream.
    ///
    /// Returns `(pulled, pushed)`.
    ///
    /// # Errors
    ///
    /// `Conflict` after the repository was restored, `Precondition` when the
    /// repository cannot be synced, or the failure of the last attempt.
    pub async fn sync(
        &self,
        lease: &RepoLease,
        credential: Option<&Credential>,
    ) -> Result<(bool, bool), EngineError> {
        let repo = lease.path();
        let mut pulled = false;
        let mut retries_left = self.push_retries;
        loop {
            match self.attempt(repo, credential, &mut pulled).await {
                Err(err) if err.is_non_fast_forward() && retries_left > 0 => {
                    retries_left -= 1;
                    warn!(repo = %repo.display(), error = %err, "push rejected, syncing again");
                }
                Ok(pushed) => return Ok((pulled, pushed)),
                Err(err) => return Err(err),
            }
        }
    }

    async fn attempt(
        &self,
        repo: &Path,
        credential: Option<&Credential>,
        pulled: &mut bool,
    ) -> Result<bool, EngineError> {
        let status = self.tracker.refresh(repo).await?;
        let (branch, upstream) = self.preflight(repo, &status).await?;

        let fetch = self
            .invoker
            .network(["fetch", "--quiet", upstream.remote.as_str()], credential);
        self.invoker.check(repo, &fetch).await?;

        let (mut ahead, behind) = self.divergence(repo).await?;
        debug!(repo = %repo.display(), ahead, behind, "divergence");
        if ahead == 0 && behind == 0 {
            return Ok(false);
        }

        if behind > 0 {
            if status.dirty {
                self.check_overlap(repo, &status).await?;
            }
            self.rebase(repo).await?;
            *pulled = true;
            info!(repo = %repo.display(), commits = behind, "rebased onto upstream");
            (ahead, _) = self.divergence(repo).await?;
        }

        if ahead == 0 {
            return Ok(false);
        }
        let plan = self.push.plan(Some(&branch), Some(&upstream))?;
        self.push.execute(repo, &plan, &Force::No, credential).await?;
        Ok(true)
    }

    async fn preflight(
        &self,
        repo: &Path,
        status: &RepoStatus,
    ) -> Result<(String, Upstream), EngineError> {
        let branch = status
            .branch
            .clone()
            .ok_or_else(|| EngineError::precondition("HEAD is detached"))?;
        if status.head.is_none() {
            return Err(EngineError::precondition("repository has no commits"));
        }
        if !status.conflicted_paths().is_empty() {
            return Err(EngineError::precondition("unresolved conflicts"));
        }
        self.tracker.ensure_idle(repo).await?;
        let upstream = self
            .tracker
            .upstream_of(repo, &branch)
            .await?
            .ok_or_else(|| EngineError::precondition(format!("branch '{branch}' has no upstream")))?;
        Ok((branch, upstream))
    }

    /// `(ahead, behind)` relative to the upstream.
    async fn divergence(&self, repo: &Path) -> Result<(u32, u32), EngineError> {
        let raw = self
            .invoker
            .git(
                repo,
                ["rev-list", "--left-right", "--count", "HEAD...@{upstream}"],
            )
            .await?;
        let mut counts = raw.split_whitespace().map(str::parse::<u32>);
        match (counts.next(), counts.next()) {
            (Some(Ok(ahead)), Some(Ok(behind))) => Ok((ahead, behind)),
            _ => Err(EngineError::CommandFailed {
                command: "git rev-list --left-right --count HEAD...@{upstream}".to_string(),
                exit_code: 0,
                stderr: format!("unexpected output: {}", raw.trim()),
            }),
        }
    }

    /// Refuses up front when upstream commits touch locally changed paths.
    async fn check_overlap(&self, repo: &Path, status: &RepoStatus) -> Result<(), EngineError> {
        let raw = self
            .invoker
            .git(
                repo,
                ["diff", "--name-only", "--no-renames", "-z", "HEAD...@{upstream}"],
            )
            .await?;
        let incoming: BTreeSet<String> = split_paths(&raw).into_iter().collect();
        let overlap: Vec<String> = status
            .changed_paths()
            .intersection(&incoming)
            .cloned()
            .collect();
        if overlap.is_empty() {
            Ok(())
        } else {
            info!(repo = %repo.display(), paths = ?overlap, "local changes overlap upstream");
            Err(EngineError::Conflict { paths: overlap })
        }
    }

    async fn rebase(&self, repo: &Path) -> Result<(), EngineError> {
        let autostash = if self.autostash {
            "--autostash"
        } else {
            "--no-autostash"
        };
        let command = CommandInvoker::local(["rebase", autostash, "@{upstream}"]);
        let output = self.invoker.output(repo, &command).await?;
        if output.success() {
            return Ok(());
        }

        let conflicts = self.tracker.unmerged_paths(repo).await?;
        if self.tracker.operation_in_progress(repo).await?.is_some() {
            self.invoker.git(repo, ["rebase", "--abort"]).await?;
            info!(repo = %repo.display(), "rebase aborted, repository restored");
        }
        if !conflicts.is_empty() {
            return Err(EngineError::Conflict { paths: conflicts });
        }

        let text = format!("{}\n{}", output.stderr, output.stdout).to_lowercase();
        if REFUSAL_PATTERNS.iter().any(|p| text.contains(p)) {
            return Err(EngineError::precondition("uncommitted changes block rebase"));
        }
        Err(classify(&command, &output))
    }
}
