// gitdock: Multi-repository Git sync engine
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Configuration types for gitdock.
//!
//! # Config Structure
//!
//! ```text
//! Config: GlobalConfig, GitConfig, LockConfig, SyncConfig,
//!         StashConfig, PushConfig, HistoryConfig
//! Accounts: account name → AccountConfig
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::logging::LogLevel;

/// Global configuration options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GlobalConfig {
    /// Console (stderr) log level (0-6).
    pub output_log_level: LogLevel,
    /// Log level for file output (0-6).
    pub file_log_level: LogLevel,
    /// Log file; unset disables file logging.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,
    /// Write the log file as JSON lines.
    pub log_json: bool,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            output_log_level: LogLevel::INFO,
            file_log_level: LogLevel::TRACE,
            log_file: None,
            log_json: false,
        }
    }
}

/// Git toolchain settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GitConfig {
    /// Git executable, resolved via PATH when not absolute.
    pub program: PathBuf,
    /// Upper bound for network steps (fetch, push) in seconds. 0 disables it.
    pub network_timeout_secs: u64,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from("git"),
            network_timeout_secs: 120,
        }
    }
}

/// Repository lease settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LockConfig {
    /// How long a second operation waits for the lease. 0 fails fast with `Busy`.
    pub wait_ms: u64,
}

/// Pull-rebase-push policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyncConfig {
    /// Extra full sequences after a non-fast-forward push rejection.
    pub push_retries: u32,
    /// Let the rebase stash and re-apply uncommitted changes.
    pub autostash: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            push_retries: 1,
            autostash: false,
        }
    }
}

/// Stash policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StashConfig {
    /// Include untracked files in the stash.
    pub include_untracked: bool,
    /// Keep the stash entry when applying it conflicts.
    pub retain_on_conflict: bool,
}

impl Default for StashConfig {
    fn default() -> Self {
        Self {
            include_untracked: true,
            retain_on_conflict: true,
        }
    }
}

/// Push policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PushConfig {
    /// Remote used to publish a branch that has no upstream yet.
    pub default_remote: String,
    /// Use `--force-with-lease` instead of a bare `--force`.
    pub force_with_lease: bool,
    /// Publish branches without upstream (`--set-upstream`) on push.
    pub publish_new_branches: bool,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            default_remote: "origin".to_string(),
            force_with_lease: true,
            publish_new_branches: true,
        }
    }
}

/// Time Machine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HistoryConfig {
    /// Maximum reflog entries returned by a listing.
    pub limit: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { limit: 100 }
    }
}

/// Per-account credential lookup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AccountConfig {
    /// Environment variable holding the account's token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_env: Option<String>,
}

/// Accounts keyed by account name.
pub type Accounts = BTreeMap<String, AccountConfig>;
