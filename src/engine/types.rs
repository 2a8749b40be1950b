// gitdock: Multi-repository Git sync engine
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Values exchanged with engine callers. Nothing here is persisted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;

use crate::error::EngineError;

/// Caller-owned view of one repository.
///
/// `path` identifies the lock domain; the other fields are a snapshot taken
/// by [`Engine::open`](super::Engine::open) and are not trusted by mutations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryHandle {
    pub path: PathBuf,
    pub branch: Option<String>,
    pub dirty: bool,
    pub remote_url: Option<String>,
    /// Account whose token is used for remote-touching operations.
    pub account: Option<String>,
}

impl RepositoryHandle {
    /// Handle with no snapshot data, for callers that only know the path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            branch: None,
            dirty: false,
            remote_url: None,
            account: None,
        }
    }

    #[must_use]
    pub fn with_account(mut self, account: impl Into<String>) -> Self {
        self.account = Some(account.into());
        self
    }
}

/// Kind of change recorded for a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Added,
    Modified,
    Deleted,
    Renamed,
    Untracked,
    Conflict,
}

/// One changed path. A path changed in both index and worktree yields two
/// entries, one with `staged == true`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileStatusEntry {
    pub path: String,
    pub status: FileStatus,
    pub staged: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_path: Option<String>,
}

/// Working tree snapshot, recomputed on every query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoStatus {
    /// `None` when HEAD is detached.
    pub branch: Option<String>,
    /// `None` before the first commit.
    pub head: Option<String>,
    /// Upstream short name, e.g. `origin/main`.
    pub upstream: Option<String>,
    pub ahead: u32,
    pub behind: u32,
    pub files: Vec<FileStatusEntry>,
    pub dirty: bool,
}

impl RepoStatus {
    #[must_use]
    pub fn has_staged(&self) -> bool {
        self.files
            .iter()
            .any(|f| f.staged && f.status != FileStatus::Conflict)
    }

    /// Changes a hard reset would destroy (anything but untracked files).
    #[must_use]
    pub fn has_tracked_changes(&self) -> bool {
        self.files.iter().any(|f| f.status != FileStatus::Untracked)
    }

    #[must_use]
    pub fn conflicted_paths(&self) -> Vec<String> {
        self.files
            .iter()
            .filter(|f| f.status == FileStatus::Conflict)
            .map(|f| f.path.clone())
            .collect()
    }

    /// Every path touched locally, including rename sources.
    #[must_use]
    pub fn changed_paths(&self) -> BTreeSet<String> {
        self.files
            .iter()
            .flat_map(|f| std::iter::once(f.path.clone()).chain(f.old_path.clone()))
            .collect()
    }
}

/// Result of `sync`.
///
/// Exactly one of: `success`, non-empty `conflicts`, or `error`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncResult {
    pub success: bool,
    pub pulled: bool,
    pub pushed: bool,
    pub conflicts: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<EngineError>,
}

impl SyncResult {
    #[must_use]
    pub const fn succeeded(pulled: bool, pushed: bool) -> Self {
        Self {
            success: true,
            pulled,
            pushed,
            conflicts: Vec::new(),
            error: None,
        }
    }

    /// Failure result; a `Conflict` error becomes the `conflicts` list.
    #[must_use]
    pub fn failed(error: EngineError) -> Self {
        match error {
            EngineError::Conflict { paths } => Self {
                success: false,
                pulled: false,
                pushed: false,
                conflicts: paths,
                error: None,
            },
            error => Self {
                success: false,
                pulled: false,
                pushed: false,
                conflicts: Vec::new(),
                error: Some(error),
            },
        }
    }
}

impl From<Result<(bool, bool), EngineError>> for SyncResult {
    fn from(result: Result<(bool, bool), EngineError>) -> Self {
        match result {
            Ok((pulled, pushed)) => Self::succeeded(pulled, pushed),
            Err(error) => Self::failed(error),
        }
    }
}

/// One reflog entry of HEAD, newest first in listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReflogEntry {
    /// `HEAD@{n}`, valid only until the reflog moves.
    pub selector: String,
    pub commit_hash: String,
    pub subject: String,
    pub timestamp: DateTime<Utc>,
}

/// Outcome of a mutating operation, as a value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum OperationOutcome {
    Success,
    Conflict { paths: Vec<String> },
    AuthMissing { account: String },
    Busy { path: String },
    Precondition { reason: String },
    Rejected { message: String },
    CommandFailed {
        command: String,
        stderr: String,
        exit_code: i32,
    },
}

impl OperationOutcome {
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

impl std::fmt::Display for OperationOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Conflict { paths } => write!(f, "conflicts in: {}", paths.join(", ")),
            Self::AuthMissing { account } => write!(f, "no usable credential for account '{account}'"),
            Self::Busy { path } => write!(f, "repository is busy: {path}"),
            Self::Precondition { reason } => write!(f, "cannot start: {reason}"),
            Self::Rejected { message } => write!(f, "remote rejected or unreachable: {message}"),
            Self::CommandFailed {
                command,
                stderr,
                exit_code,
            } => write!(f, "`{command}` exited with code {exit_code}: {stderr}"),
        }
    }
}

impl From<EngineError> for OperationOutcome {
    fn from(error: EngineError) -> Self {
        match error {
            EngineError::AuthMissing { account } => Self::AuthMissing { account },
            EngineError::Busy { path } => Self::Busy { path },
            EngineError::Precondition { reason } => Self::Precondition { reason },
            EngineError::Conflict { paths } => Self::Conflict { paths },
            EngineError::NetworkOrRemoteRejected { message } => Self::Rejected { message },
            EngineError::CommandFailed {
                command,
                exit_code,
                stderr,
            } => Self::CommandFailed {
                command,
                stderr,
                exit_code,
            },
        }
    }
}

impl<T> From<Result<T, EngineError>> for OperationOutcome {
    fn from(result: Result<T, EngineError>) -> Self {
        result.map_or_else(Self::from, |_| Self::Success)
    }
}

impl From<&SyncResult> for OperationOutcome {
    fn from(result: &SyncResult) -> Self {
        if result.success {
            Self::Success
        } else if let Some(error) = &result.error {
            error.clone().into()
        } else {
            Self::Conflict {
                paths: result.conflicts.clone(),
            }
        }
    }
}
