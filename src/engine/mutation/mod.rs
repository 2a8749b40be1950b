// gitdock: Multi-repository Git sync engine
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! History edits with recoverability guarantees.
//!
//! ```text
//! stash()              stash push [--include-untracked]
//! pop_stash()          stash create --> stash apply --index stash@{0} --> stash drop stash@{0}
//!                        conflict --> reset --hard, clean stashed untracked,
//!                                     reapply snapshot; stash kept, Conflict(paths)
//! commit_and_push()    commit -F - --> push step (failure keeps the commit)
//! push_only()          push step
//! undo_last_commit()   reset --soft HEAD~1               (local only)
//! revert_last_commit() revert --no-edit HEAD             (conflict --> revert --abort)
//! delete_last_commit() reset --hard HEAD~1 --> push --force-with-lease
//!                        (push skipped if the commit was never published)
//! ```
//!
//! Every method takes a [`RepoLease`]. State is re-read from git before each
//! operation; nothing from the caller's handle is trusted.

#[cfg(test)]
mod tests;

use std::collections::BTreeSet;
use std::path::Path;

use tracing::{info, warn};

use super::invoker::{CommandInvoker, classify};
use super::lock::RepoLease;
use super::push::{Force, PushStep};
use super::status::{StatusTracker, split_paths};
use super::types::{FileStatus, RepoStatus};
use crate::auth::Credential;
use crate::error::EngineError;

const NEWEST_STASH: &str = "stash@{0}";
const NEWEST_STASH_UNTRACKED: &str = "stash@{0}^3";

/// Stash and push policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MutationPolicy {
    pub include_untracked: bool,
    /// Keep the stash entry when applying it conflicts.
    pub retain_on_conflict: bool,
    pub force_with_lease: bool,
}

impl Default for MutationPolicy {
    fn default() -> Self {
        Self {
            include_untracked: true,
            retain_on_conflict: true,
            force_with_lease: true,
        }
    }
}

/// Paths git lists under "would be overwritten" errors.
fn overwritten_paths(stderr: &str) -> Vec<String> {
    let mut paths = Vec::new();
    let mut listing = false;
    for line in stderr.lines() {
        if line.contains("would be overwritten") {
            listing = true;
        } else if listing && line.starts_with('\t') {
            paths.push(line.trim().to_string());
        } else {
            listing = false;
        }
    }
    paths
}

fn refuse_conflicts(status: &RepoStatus) -> Result<(), EngineError> {
    if status.conflicted_paths().is_empty() {
        Ok(())
    } else {
        Err(EngineError::precondition("unresolved conflicts"))
    }
}

fn refuse_tracked_changes(status: &RepoStatus) -> Result<(), EngineError> {
    if status.has_tracked_changes() {
        Err(EngineError::precondition(
            "tracked changes present; commit or stash them first",
        ))
    } else {
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct SafeMutationOps {
    invoker: CommandInvoker,
    tracker: StatusTracker,
    push: PushStep,
    policy: MutationPolicy,
}

impl SafeMutationOps {
    #[must_use]
    pub const fn new(
        invoker: CommandInvoker,
        tracker: StatusTracker,
        push: PushStep,
        policy: MutationPolicy,
    ) -> Self {
        Self {
            invoker,
            tracker,
            push,
            policy,
        }
    }

    /// Saves worktree and index changes as the newest stash entry.
    ///
    /// # Errors
    ///
    /// `Precondition` when there is nothing to stash or conflicts are unresolved.
    pub async fn stash(&self, lease: &RepoLease) -> Result<(), EngineError> {
        let repo = lease.path();
        let status = self.tracker.refresh(repo).await?;
        refuse_conflicts(&status)?;
        if !status.dirty {
            return Err(EngineError::precondition("nothing to stash"));
        }

        let mut args = vec!["stash", "push"];
        if self.policy.include_untracked {
            args.push("--include-untracked");
        }
        let command = CommandInvoker::local(args);
        let output = self.invoker.output(repo, &command).await?;
        if output.stdout.contains("No local changes to save")
            || output.stderr.contains("No local changes to save")
        {
            return Err(EngineError::precondition("nothing to stash"));
        }
        if !output.success() {
            return Err(classify(&command, &output));
        }
        info!(repo = %repo.display(), "changes stashed");
        Ok(())
    }

    /// Applies the newest stash entry and drops it once applied cleanly.
    ///
    /// # Errors
    ///
    /// `Precondition` without a stash entry; `Conflict` when applying
    /// collides with the worktree. On conflict the worktree and index are
    /// put back as they were and the entry is kept unless the policy says
    /// otherwise.
    pub async fn pop_stash(&self, lease: &RepoLease) -> Result<(), EngineError> {
        let repo = lease.path();
        if self.tracker.stash_count(repo).await? == 0 {
            return Err(EngineError::precondition("no stash to pop"));
        }
        let status = self.tracker.refresh(repo).await?;
        refuse_conflicts(&status)?;
        let snapshot = if status.has_tracked_changes() {
            self.snapshot(repo).await?
        } else {
            None
        };

        let mut command = CommandInvoker::local(["stash", "apply", "--index", NEWEST_STASH]);
        let mut output = self.invoker.output(repo, &command).await?;
        if !output.success() && output.stderr.to_lowercase().contains("try without --index") {
            warn!(repo = %repo.display(), "staged stash changes conflict, applying without --index");
            command = CommandInvoker::local(["stash", "apply", NEWEST_STASH]);
            output = self.invoker.output(repo, &command).await?;
        }

        if output.success() {
            self.invoker.git(repo, ["stash", "drop", NEWEST_STASH]).await?;
            info!(repo = %repo.display(), "stash applied and dropped");
            return Ok(());
        }

        let unmerged = self.tracker.unmerged_paths(repo).await?;
        if !unmerged.is_empty() {
            let untracked_before: BTreeSet<String> = status
                .files
                .iter()
                .filter(|f| f.status == FileStatus::Untracked)
                .map(|f| f.path.clone())
                .collect();
            self.undo_apply(repo, snapshot.as_deref(), &untracked_before)
                .await?;
            if self.policy.retain_on_conflict {
                info!(repo = %repo.display(), paths = ?unmerged, "stash conflicts, tree restored, entry kept");
            } else {
                self.invoker.git(repo, ["stash", "drop", NEWEST_STASH]).await?;
                warn!(repo = %repo.display(), paths = ?unmerged, "stash conflicts, tree restored, entry dropped");
            }
            return Err(EngineError::Conflict { paths: unmerged });
        }

        // Nothing was applied, so the entry always stays.
        let overwritten = overwritten_paths(&output.stderr);
        if overwritten.is_empty() {
            Err(classify(&command, &output))
        } else {
            info!(repo = %repo.display(), paths = ?overwritten, "stash would overwrite local changes");
            Err(EngineError::Conflict { paths: overwritten })
        }
    }

    /// Records tracked worktree and index changes as a dangling stash commit
    /// without touching either.
    async fn snapshot(&self, repo: &Path) -> Result<Option<String>, EngineError> {
        let hash = self.invoker.git(repo, ["stash", "create"]).await?;
        Ok(Some(hash.trim().to_string()).filter(|h| !h.is_empty()))
    }

    /// Puts the tree back after a conflicting stash apply: hard reset, remove
    /// untracked files the stash brought in, reapply the pre-apply snapshot.
    async fn undo_apply(
        &self,
        repo: &Path,
        snapshot: Option<&str>,
        untracked_before: &BTreeSet<String>,
    ) -> Result<(), EngineError> {
        self.invoker
            .git(repo, ["reset", "--hard", "--quiet", "HEAD"])
            .await?;

        if self
            .invoker
            .probe(repo, ["rev-parse", "-q", "--verify", NEWEST_STASH_UNTRACKED])
            .await?
        {
            let listed = self
                .invoker
                .git(
                    repo,
                    ["ls-tree", "-r", "-z", "--name-only", NEWEST_STASH_UNTRACKED],
                )
                .await?;
            let introduced: Vec<String> = split_paths(&listed)
                .into_iter()
                .filter(|p| !untracked_before.contains(p))
                .collect();
            if !introduced.is_empty() {
                let mut args = vec!["clean".to_string(), "-f".into(), "-q".into(), "--".into()];
                args.extend(introduced);
                self.invoker.git(repo, args).await?;
            }
        }

        if let Some(snapshot) = snapshot {
            self.invoker
                .git(repo, ["stash", "apply", "--index", snapshot])
                .await?;
        }
        Ok(())
    }

    /// Commits the staged changes, then pushes.
    ///
    /// # Errors
    ///
    /// `Precondition` before anything is written; a push failure after the
    /// commit leaves the commit in place for [`push_only`](Self::push_only).
    pub async fn commit_and_push(
        &self,
        lease: &RepoLease,
        message: &str,
        credential: Option<&Credential>,
    ) -> Result<(), EngineError> {
        let repo = lease.path();
        if message.trim().is_empty() {
            return Err(EngineError::precondition("commit message is empty"));
        }
        let status = self.tracker.refresh(repo).await?;
        refuse_conflicts(&status)?;
        if !status.has_staged() {
            return Err(EngineError::precondition("nothing staged to commit"));
        }
        self.tracker.ensure_idle(repo).await?;
        let upstream = match &status.branch {
            Some(branch) => self.tracker.upstream_of(repo, branch).await?,
            None => None,
        };
        let plan = self.push.plan(status.branch.as_deref(), upstream.as_ref())?;

        let commit = CommandInvoker::local(["commit", "--quiet", "-F", "-"]).with_stdin(message);
        self.invoker.check(repo, &commit).await?;
        info!(repo = %repo.display(), "committed");

        self.push
            .execute(repo, &plan, &Force::No, credential)
            .await
            .inspect_err(|e| {
                warn!(repo = %repo.display(), error = %e, "push failed, commit kept locally");
            })
    }

    /// Pushes the current branch without touching history.
    ///
    /// # Errors
    ///
    /// `Precondition` on a detached HEAD or unpublishable branch, or the
    /// classified push failure.
    pub async fn push_only(
        &self,
        lease: &RepoLease,
        credential: Option<&Credential>,
    ) -> Result<(), EngineError> {
        let repo = lease.path();
        let status = self.tracker.refresh(repo).await?;
        if status.head.is_none() {
            return Err(EngineError::precondition("repository has no commits"));
        }
        let upstream = match &status.branch {
            Some(branch) => self.tracker.upstream_of(repo, branch).await?,
            None => None,
        };
        let plan = self.push.plan(status.branch.as_deref(), upstream.as_ref())?;
        self.push.execute(repo, &plan, &Force::No, credential).await
    }

    async fn has_parent(&self, repo: &Path) -> Result<bool, EngineError> {
        self.invoker
            .probe(repo, ["rev-parse", "-q", "--verify", "HEAD~1^{commit}"])
            .await
    }

    /// Whether `commit` is reachable from the upstream tip.
    async fn is_published(&self, repo: &Path, commit: &str) -> Result<bool, EngineError> {
        self.invoker
            .probe(repo, ["merge-base", "--is-ancestor", commit, "@{upstream}"])
            .await
    }

    /// Moves the branch back one commit, keeping its changes staged.
    ///
    /// # Errors
    ///
    /// `Precondition` without a parent commit or during another operation.
    pub async fn undo_last_commit(&self, lease: &RepoLease) -> Result<(), EngineError> {
        let repo = lease.path();
        let status = self.tracker.refresh(repo).await?;
        refuse_conflicts(&status)?;
        self.tracker.ensure_idle(repo).await?;
        if status.head.is_none() || !self.has_parent(repo).await? {
            return Err(EngineError::precondition("no parent commit to undo to"));
        }

        if let Some(branch) = &status.branch
            && self.tracker.upstream_of(repo, branch).await?.is_some()
            && self.is_published(repo, "HEAD").await?
        {
            warn!(repo = %repo.display(), "undoing a commit that was already pushed");
        }

        self.invoker.git(repo, ["reset", "--soft", "HEAD~1"]).await?;
        info!(repo = %repo.display(), "last commit undone, changes staged");
        Ok(())
    }

    /// Adds a commit inverting the last one.
    ///
    /// # Errors
    ///
    /// `Precondition` for merges, a dirty tree or an unfinished operation;
    /// `Conflict` after an aborted conflicting revert.
    pub async fn revert_last_commit(&self, lease: &RepoLease) -> Result<(), EngineError> {
        let repo = lease.path();
        let status = self.tracker.refresh(repo).await?;
        if status.head.is_none() {
            return Err(EngineError::precondition("repository has no commits"));
        }
        refuse_tracked_changes(&status)?;
        self.tracker.ensure_idle(repo).await?;
        if self
            .invoker
            .probe(repo, ["rev-parse", "-q", "--verify", "HEAD^2"])
            .await?
        {
            return Err(EngineError::precondition("last commit is a merge"));
        }

        let command = CommandInvoker::local(["revert", "--no-edit", "HEAD"]);
        let output = self.invoker.output(repo, &command).await?;
        if output.success() {
            info!(repo = %repo.display(), "last commit reverted");
            return Ok(());
        }

        let unmerged = self.tracker.unmerged_paths(repo).await?;
        if unmerged.is_empty() {
            return Err(classify(&command, &output));
        }
        self.invoker.git(repo, ["revert", "--abort"]).await?;
        info!(repo = %repo.display(), paths = ?unmerged, "revert conflicted and was aborted");
        Err(EngineError::Conflict { paths: unmerged })
    }

    /// Discards the last commit and, if it was published, force-pushes.
    ///
    /// Returns the discarded hash. The reflog is the only way back.
    ///
    /// # Errors
    ///
    /// `Precondition` for a dirty tree, a root commit or a detached HEAD. A
    /// failed force-push is returned after the local reset; it is not undone.
    pub async fn delete_last_commit(
        &self,
        lease: &RepoLease,
        credential: Option<&Credential>,
    ) -> Result<String, EngineError> {
        let repo = lease.path();
        let status = self.tracker.refresh(repo).await?;
        refuse_tracked_changes(&status)?;
        self.tracker.ensure_idle(repo).await?;
        let branch = status
            .branch
            .as_deref()
            .ok_or_else(|| EngineError::precondition("HEAD is detached"))?;
        if status.head.is_none() || !self.has_parent(repo).await? {
            return Err(EngineError::precondition("no parent commit to delete back to"));
        }

        let discarded = self
            .invoker
            .git(repo, ["rev-parse", "HEAD"])
            .await?
            .trim()
            .to_string();
        let upstream = self.tracker.upstream_of(repo, branch).await?;
        let published = match &upstream {
            Some(_) => self.is_published(repo, &discarded).await?,
            None => false,
        };
        let force = if published {
            let tip = self
                .invoker
                .git(repo, ["rev-parse", "@{upstream}"])
                .await?
                .trim()
                .to_string();
            if tip != discarded {
                return Err(EngineError::precondition(
                    "upstream has commits on top of the last commit; sync first",
                ));
            }
            if self.policy.force_with_lease {
                Force::WithLease { expected: tip }
            } else {
                Force::Always
            }
        } else {
            Force::No
        };

        self.invoker.git(repo, ["reset", "--hard", "HEAD~1"]).await?;
        warn!(
            repo = %repo.display(),
            commit = %discarded,
            "commit deleted; recover it with `restore HEAD@{{1}}`"
        );

        if published {
            let plan = self.push.plan(Some(branch), upstream.as_ref())?;
            self.push.execute(repo, &plan, &force, credential).await?;
        } else {
            info!(repo = %repo.display(), "commit was never pushed, remote untouched");
        }
        Ok(discarded)
    }
}
