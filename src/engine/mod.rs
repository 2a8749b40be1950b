// gitdock: Multi-repository Git sync engine
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Synchronization and safe-mutation engine.
//!
//! ```text
//!                     Engine (facade)
//!  activity start --> lease --> token? --> component --> activity finish
//!                       |                     |
//!        RepoMutex -----'                     v
//!                        SyncOrchestrator  SafeMutationOps  TimeMachine
//!                                 \             |             /
//!                                  StatusTracker    PushStep
//!                                          \          /
//!                                        CommandInvoker
//!                                              |
//!                                        CommandRunner (git)
//! ```
//!
//! Expected failures are values: mutations return [`OperationOutcome`],
//! `sync` returns [`SyncResult`]. A started git sequence runs on its own
//! task, so dropping an operation future never cuts it short. Queries (`refresh_status`, `list_history`,
//! `open`) take no lease and record no activity.

pub mod history;
pub mod invoker;
pub mod lock;
pub mod mutation;
pub mod push;
pub mod status;
pub mod sync;
pub mod types;

#[cfg(test)]
pub(crate) mod test_utils;
#[cfg(test)]
mod tests;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use bon::Builder;
use tracing::{info, warn};

use crate::activity::{Activity, ActivitySink};
use crate::auth::{Credential, EnvTokenProvider, TokenProvider, redact};
use crate::config::Config;
use crate::error::{DockResult, EngineError};
use crate::git::{CommandRunner, GitCli};

use history::TimeMachine;
use invoker::CommandInvoker;
use lock::{RepoLease, RepoMutex};
use mutation::{MutationPolicy, SafeMutationOps};
use push::PushStep;
use status::StatusTracker;
use sync::SyncOrchestrator;
use types::{OperationOutcome, ReflogEntry, RepoStatus, RepositoryHandle, SyncResult};

/// Engine policy knobs.
#[derive(Debug, Clone, Builder)]
pub struct EngineOptions {
    /// Bounded wait for a held lease. Zero fails fast with `Busy`.
    #[builder(setters(name = with_lock_wait), default = Duration::ZERO)]
    lock_wait: Duration,
    /// Bound for fetch and push. `None` leaves them unbounded.
    #[builder(setters(name = with_network_timeout))]
    network_timeout: Option<Duration>,
    #[builder(setters(name = with_push_retries), default = 1)]
    push_retries: u32,
    #[builder(setters(name = with_autostash), default = false)]
    autostash: bool,
    #[builder(setters(name = with_include_untracked), default = true)]
    include_untracked: bool,
    #[builder(setters(name = with_retain_on_conflict), default = true)]
    retain_on_conflict: bool,
    #[builder(setters(name = with_default_remote), into, default = "origin".to_string())]
    default_remote: String,
    #[builder(setters(name = with_force_with_lease), default = true)]
    force_with_lease: bool,
    #[builder(setters(name = with_publish_new_branches), default = true)]
    publish_new_branches: bool,
    #[builder(setters(name = with_history_limit), default = 100)]
    history_limit: usize,
}

impl From<&Config> for EngineOptions {
    fn from(config: &Config) -> Self {
        Self::builder()
            .with_lock_wait(config.lock_wait())
            .maybe_with_network_timeout(config.network_timeout())
            .with_push_retries(config.sync.push_retries)
            .with_autostash(config.sync.autostash)
            .with_include_untracked(config.stash.include_untracked)
            .with_retain_on_conflict(config.stash.retain_on_conflict)
            .with_default_remote(config.push.default_remote.clone())
            .with_force_with_lease(config.push.force_with_lease)
            .with_publish_new_branches(config.push.publish_new_branches)
            .with_history_limit(config.history.limit)
            .build()
    }
}

/// What a mutation holds while it runs.
struct Session {
    lease: RepoLease,
    credential: Option<Credential>,
}

impl Session {
    fn credential(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }
}

/// Entry point for every repository operation.
pub struct Engine {
    mutex: RepoMutex,
    tracker: StatusTracker,
    sync: SyncOrchestrator,
    mutations: SafeMutationOps,
    history: TimeMachine,
    tokens: Arc<dyn TokenProvider>,
    activity: Arc<dyn ActivitySink>,
    default_remote: String,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("mutex", &self.mutex)
            .field("default_remote", &self.default_remote)
            .finish_non_exhaustive()
    }
}

impl Engine {
    #[must_use]
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        tokens: Arc<dyn TokenProvider>,
        activity: Arc<dyn ActivitySink>,
        options: &EngineOptions,
    ) -> Self {
        let invoker = CommandInvoker::new(runner, options.network_timeout);
        let tracker = StatusTracker::new(invoker.clone());
        let push = PushStep::new(
            invoker.clone(),
            options.default_remote.clone(),
            options.publish_new_branches,
        );
        let policy = MutationPolicy {
            include_untracked: options.include_untracked,
            retain_on_conflict: options.retain_on_conflict,
            force_with_lease: options.force_with_lease,
        };
        Self {
            mutex: RepoMutex::new(options.lock_wait),
            sync: SyncOrchestrator::new(
                invoker.clone(),
                tracker.clone(),
                push.clone(),
                options.push_retries,
                options.autostash,
            ),
            mutations: SafeMutationOps::new(invoker.clone(), tracker.clone(), push, policy),
            history: TimeMachine::new(invoker, tracker.clone(), options.history_limit),
            tracker,
            tokens,
            activity,
            default_remote: options.default_remote.clone(),
        }
    }

    /// Engine driving the configured git binary with tokens from the
    /// environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the git executable cannot be found.
    pub fn from_config(config: &Config, activity: Arc<dyn ActivitySink>) -> DockResult<Self> {
        let runner = GitCli::new(&config.git.program)?;
        let tokens = EnvTokenProvider::new(config.accounts.clone());
        Ok(Self::new(
            Arc::new(runner),
            Arc::new(tokens),
            activity,
            &EngineOptions::from(config),
        ))
    }

    // --- queries ---

    /// Fresh handle for the repository containing `path`.
    ///
    /// # Errors
    ///
    /// `Precondition` outside a git work tree, or a git failure.
    pub async fn open(
        &self,
        path: impl AsRef<Path>,
        account: Option<String>,
    ) -> Result<RepositoryHandle, EngineError> {
        self.tracker
            .open(path.as_ref(), account, &self.default_remote)
            .await
    }

    /// Current working tree status.
    ///
    /// # Errors
    ///
    /// Returns the git failure.
    pub async fn refresh_status(&self, handle: &RepositoryHandle) -> Result<RepoStatus, EngineError> {
        self.tracker.refresh(&handle.path).await
    }

    /// HEAD reflog, newest first.
    ///
    /// # Errors
    ///
    /// Returns the git failure.
    pub async fn list_history(
        &self,
        handle: &RepositoryHandle,
    ) -> Result<Vec<ReflogEntry>, EngineError> {
        self.history.list_history(&handle.path).await
    }

    // --- plumbing ---

    async fn resolve_credential(
        &self,
        handle: &RepositoryHandle,
    ) -> Result<Credential, EngineError> {
        let account = handle
            .account
            .as_deref()
            .ok_or_else(|| EngineError::AuthMissing {
                account: "<unassigned>".to_string(),
            })?;
        self.tokens
            .token(account)
            .await
            .ok_or_else(|| EngineError::AuthMissing {
                account: account.to_string(),
            })
    }

    /// Lease first, then the token, before any git command runs.
    async fn open_session(
        &self,
        handle: &RepositoryHandle,
        remote: bool,
    ) -> Result<Session, EngineError> {
        let lease = self.mutex.acquire(&handle.path).await?;
        let credential = if remote {
            Some(self.resolve_credential(handle).await?)
        } else {
            None
        };
        Ok(Session { lease, credential })
    }

    fn start(&self, handle: &RepositoryHandle, command: &str) -> Activity {
        Activity::start(self.activity.as_ref(), &handle.path, command)
    }

    /// Takes the session, then runs `step` on its own task.
    ///
    /// Once the session is held the sequence no longer depends on the
    /// caller: dropping the returned future leaves it running to completion
    /// or to its abort path. The final activity record and the lease release
    /// happen on that task.
    async fn run<T, F, Fut>(
        &self,
        handle: &RepositoryHandle,
        command: &str,
        remote: bool,
        step: F,
    ) -> Result<T, EngineError>
    where
        T: Send + 'static,
        F: FnOnce(Session) -> Fut,
        Fut: Future<Output = (Session, Result<T, EngineError>)> + Send + 'static,
    {
        let activity = self.start(handle, command);
        let session = match self.open_session(handle, remote).await {
            Ok(session) => session,
            Err(err) => {
                let result = Err(err);
                finish(self.activity.as_ref(), activity, None, &result);
                return result;
            }
        };

        let sink = Arc::clone(&self.activity);
        let sequence = step(session);
        let task = tokio::spawn(async move {
            let (session, result) = sequence.await;
            finish(sink.as_ref(), activity, Some(&session), &result);
            result
        });
        match task.await {
            Ok(result) => result,
            Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
            Err(err) => Err(EngineError::CommandFailed {
                command: command.to_string(),
                exit_code: -1,
                stderr: format!("operation task ended early: {err}"),
            }),
        }
    }

    // --- operations ---

    /// Pull-rebase-then-push against the branch upstream.
    pub async fn sync(&self, handle: &RepositoryHandle) -> SyncResult {
        let sync = self.sync.clone();
        self.run(handle, "sync", true, move |s| async move {
            let result = sync.sync(&s.lease, s.credential()).await;
            (s, result)
        })
        .await
        .into()
    }

    /// Stashes worktree and index changes.
    pub async fn stash(&self, handle: &RepositoryHandle) -> OperationOutcome {
        let ops = self.mutations.clone();
        self.run(handle, "stash", false, move |s| async move {
            let result = ops.stash(&s.lease).await;
            (s, result)
        })
        .await
        .into()
    }

    /// Applies and drops the newest stash entry.
    pub async fn pop_stash(&self, handle: &RepositoryHandle) -> OperationOutcome {
        let ops = self.mutations.clone();
        self.run(handle, "pop_stash", false, move |s| async move {
            let result = ops.pop_stash(&s.lease).await;
            (s, result)
        })
        .await
        .into()
    }

    /// Commits the staged changes with `message`, then pushes.
    pub async fn commit_and_push(
        &self,
        handle: &RepositoryHandle,
        message: &str,
    ) -> OperationOutcome {
        let ops = self.mutations.clone();
        let message = message.to_string();
        self.run(handle, "commit_and_push", true, move |s| async move {
            let result = ops
                .commit_and_push(&s.lease, &message, s.credential())
                .await;
            (s, result)
        })
        .await
        .into()
    }

    /// Pushes the current branch.
    pub async fn push_only(&self, handle: &RepositoryHandle) -> OperationOutcome {
        let ops = self.mutations.clone();
        self.run(handle, "push_only", true, move |s| async move {
            let result = ops.push_only(&s.lease, s.credential()).await;
            (s, result)
        })
        .await
        .into()
    }

    /// Soft-resets the last commit; local only.
    pub async fn undo_last_commit(&self, handle: &RepositoryHandle) -> OperationOutcome {
        let ops = self.mutations.clone();
        self.run(handle, "undo_last_commit", false, move |s| async move {
            let result = ops.undo_last_commit(&s.lease).await;
            (s, result)
        })
        .await
        .into()
    }

    /// Adds a commit inverting the last one.
    pub async fn revert_last_commit(&self, handle: &RepositoryHandle) -> OperationOutcome {
        let ops = self.mutations.clone();
        self.run(handle, "revert_last_commit", false, move |s| async move {
            let result = ops.revert_last_commit(&s.lease).await;
            (s, result)
        })
        .await
        .into()
    }

    /// Hard-resets the last commit away and force-pushes if it was published.
    ///
    /// Destructive: the reflog (see [`list_history`](Self::list_history)) is
    /// the only way back.
    pub async fn delete_last_commit(&self, handle: &RepositoryHandle) -> OperationOutcome {
        let ops = self.mutations.clone();
        self.run(handle, "delete_last_commit", true, move |s| async move {
            let result = ops.delete_last_commit(&s.lease, s.credential()).await;
            (s, result)
        })
        .await
        .into()
    }

    /// Hard-resets the current branch to `selector`, re-resolved under the lease.
    pub async fn restore(&self, handle: &RepositoryHandle, selector: &str) -> OperationOutcome {
        let history = self.history.clone();
        let selector = selector.to_string();
        self.run(handle, "restore", false, move |s| async move {
            let result = history.restore(&s.lease, &selector).await;
            (s, result)
        })
        .await
        .into()
    }

    /// Restores a listed entry, refusing if its selector moved to another commit.
    pub async fn restore_entry(
        &self,
        handle: &RepositoryHandle,
        entry: &ReflogEntry,
    ) -> OperationOutcome {
        let history = self.history.clone();
        let entry = entry.clone();
        self.run(handle, "restore", false, move |s| async move {
            let result = history.restore_entry(&s.lease, &entry).await;
            (s, result)
        })
        .await
        .into()
    }
}

/// Records the outcome. Called while the lease is still held.
fn finish<T>(
    sink: &dyn ActivitySink,
    activity: Activity,
    session: Option<&Session>,
    result: &Result<T, EngineError>,
) {
    let secret = session
        .and_then(Session::credential)
        .map(Credential::expose_secret);
    let error = result
        .as_ref()
        .err()
        .map(|e| redact(&e.to_string(), secret.as_slice()));
    match &error {
        None => info!(id = activity.id(), "operation succeeded"),
        Some(message) => warn!(id = activity.id(), error = %message, "operation failed"),
    }
    activity.finish(sink, error);
}
