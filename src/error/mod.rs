// gitdock: Multi-repository Git sync engine
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Error handling module.
//!
//! ```text
//!              DockError (<= 24 bytes)
//!                     |
//!      +--------+-----+-----+--------+
//!      |        |           |        |
//!      v        v           v        v
//!    Engine  Process     Config     Io
//!     Box      Box         Box     Box
//!
//! EngineError (value-level taxonomy, returned to callers):
//!   AuthMissing              no usable credential
//!   Busy                     repository lease contention
//!   Precondition             repository state not suitable
//!   Conflict                 overlapping changes, repo restored
//!   NetworkOrRemoteRejected  fetch/push refused or unreachable
//!   CommandFailed            any other non-zero exit
//! ```

use serde::Serialize;
use thiserror::Error;

/// Convenience alias for `anyhow::Result`.
pub type Result<T> = anyhow::Result<T>;

/// Result type using [`DockError`].
pub type DockResult<T> = std::result::Result<T, DockError>;

/// Top-level infrastructure error type.
///
/// All sub-errors are boxed to keep this enum small on the stack.
#[derive(Debug, Error)]
pub enum DockError {
    /// Engine operation failed.
    #[error("engine error: {0}")]
    Engine(#[from] Box<EngineError>),

    /// Process execution error.
    #[error("process error: {0}")]
    Process(#[from] Box<ProcessError>),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(#[from] Box<ConfigError>),

    /// I/O error.
    #[error("io error: {0}")]
    Io(Box<std::io::Error>),
}

// --- From implementations for boxing ---

/// Macro to generate `From` implementations that box the source error.
macro_rules! impl_from_boxed {
    ($($error:ty => $variant:ident),+ $(,)?) => {
        $(
            impl From<$error> for DockError {
                fn from(err: $error) -> Self {
                    DockError::$variant(Box::new(err))
                }
            }
        )+
    };
}

impl_from_boxed! {
    EngineError => Engine,
    ProcessError => Process,
    ConfigError => Config,
    std::io::Error => Io,
}

// --- Engine Errors ---

/// Failure categories of engine operations.
///
/// These are values handed back to the caller, never panics. Every variant is
/// cloneable and serializable so it can travel inside a
/// [`SyncResult`](crate::engine::types::SyncResult) or across a UI boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EngineError {
    /// No usable credential for the account. Recovered upstream by
    /// re-authenticating; never retried by the engine.
    #[error("no usable credential for account '{account}'")]
    AuthMissing { account: String },

    /// Another mutating operation holds the repository lease.
    #[error("repository is busy: {path}")]
    Busy { path: String },

    /// The repository is not in a state the operation can start from.
    #[error("precondition failed: {reason}")]
    Precondition { reason: String },

    /// Overlapping changes; the repository was restored before returning.
    #[error("conflicts in {} path(s): {}", paths.len(), paths.join(", "))]
    Conflict { paths: Vec<String> },

    /// Fetch or push was refused by (or could not reach) the remote.
    #[error("remote rejected or unreachable: {message}")]
    NetworkOrRemoteRejected { message: String },

    /// Generic non-zero exit not matching a more specific category.
    #[error("`{command}` exited with code {exit_code}: {stderr}")]
    CommandFailed {
        command: String,
        exit_code: i32,
        stderr: String,
    },
}

impl EngineError {
    /// Shorthand for [`EngineError::Precondition`].
    pub fn precondition(reason: impl Into<String>) -> Self {
        Self::Precondition {
            reason: reason.into(),
        }
    }

    /// Shorthand for [`EngineError::NetworkOrRemoteRejected`].
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::NetworkOrRemoteRejected {
            message: message.into(),
        }
    }

    /// Returns true for non-fast-forward push rejections, the only failure
    /// `sync` is allowed to retry.
    #[must_use]
    pub fn is_non_fast_forward(&self) -> bool {
        matches!(self, Self::NetworkOrRemoteRejected { message }
            if message.contains("non-fast-forward") || message.contains("fetch first"))
    }

    /// Stable category name for logs and activity records.
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match self {
            Self::AuthMissing { .. } => "auth_missing",
            Self::Busy { .. } => "busy",
            Self::Precondition { .. } => "precondition",
            Self::Conflict { .. } => "conflict",
            Self::NetworkOrRemoteRejected { .. } => "network_or_remote_rejected",
            Self::CommandFailed { .. } => "command_failed",
        }
    }
}

impl From<DockError> for EngineError {
    /// Infrastructure failures (spawn errors, I/O) surface as `CommandFailed`
    /// with exit code -1 so the caller still receives a typed value.
    fn from(err: DockError) -> Self {
        match err {
            DockError::Engine(inner) => *inner,
            other => Self::CommandFailed {
                command: "git".to_string(),
                exit_code: -1,
                stderr: other.to_string(),
            },
        }
    }
}

// --- Config Errors ---

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Invalid configuration value.
    #[error("invalid value for '{key}' in section '[{section}]': {message}")]
    InvalidValue {
        section: String,
        key: String,
        message: String,
    },
}

// --- Process Errors ---

/// Process execution errors.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// Executable not found in PATH.
    #[error("executable not found: '{name}' (not in PATH)")]
    ExecutableNotFound { name: String },

    /// Failed to spawn process.
    #[error("failed to spawn process '{command}': {source}")]
    SpawnFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to wait for or read from the process.
    #[error("failed to read output from process '{command}': {message}")]
    OutputError { command: String, message: String },
}
