// gitdock: Multi-repository Git sync engine
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Configuration management for gitdock.
//!
//! # Configuration Hierarchy
//!
//! ```text
//! Priority (low → high)
//! 1. defaults
//! 2. local gitdock.toml (cwd)
//! 3. --ini FILE (repeatable)
//! 4. GITDOCK_* env vars
//! 5. --set / CLI overrides
//! ```
//!
//! # Environment Variable Mapping
//!
//! ```text
//! GITDOCK_LOCK__WAIT_MS=500       → lock.wait_ms = 500
//! GITDOCK_SYNC__AUTOSTASH=true    → sync.autostash = true
//! ```

pub mod loader;
pub mod types;


use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use crate::error::Result;

use loader::ConfigLoader;
use types::{
    Accounts, GitConfig, GlobalConfig, HistoryConfig, LockConfig, PushConfig, StashConfig,
    SyncConfig,
};

/// Complete application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Global options.
    pub global: GlobalConfig,
    /// Git toolchain.
    pub git: GitConfig,
    /// Repository lease.
    pub lock: LockConfig,
    /// Pull-rebase-push policy.
    pub sync: SyncConfig,
    /// Stash policy.
    pub stash: StashConfig,
    /// Push policy.
    pub push: PushConfig,
    /// Time Machine.
    pub history: HistoryConfig,
    /// Accounts and their token sources.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub accounts: Accounts,
}

impl Config {
    /// Create a new configuration builder.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use gitdock::config::Config;
    ///
    /// let config = Config::builder()
    ///     .add_toml_file_optional("gitdock.toml")
    ///     .with_env_prefix("GITDOCK")
    ///     .build()?;
    /// # Ok::<(), anyhow::Error>(())
    /// ```
    #[must_use]
    pub fn builder() -> ConfigLoader {
        ConfigLoader::new()
    }

    /// Load configuration from a single TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, contains invalid TOML, or
    /// does not match the `Config` structure.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::builder().add_toml_file(path).build()
    }

    /// Load configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the content is not valid TOML or does not match the
    /// `Config` structure.
    pub fn parse(content: &str) -> Result<Self> {
        Self::builder().add_toml_str(content).build()
    }

    /// Network step timeout, `None` when disabled.
    #[must_use]
    pub const fn network_timeout(&self) -> Option<Duration> {
        if self.git.network_timeout_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.git.network_timeout_secs))
        }
    }

    /// Bounded wait for the repository lease.
    #[must_use]
    pub const fn lock_wait(&self) -> Duration {
        Duration::from_millis(self.lock.wait_ms)
    }

    /// Validate values that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns an error if a value is out of range.
    pub fn validate(&self) -> Result<()> {
        if self.push.default_remote.trim().is_empty() {
            return Err(crate::error::ConfigError::InvalidValue {
                section: "push".to_string(),
                key: "default_remote".to_string(),
                message: "must not be empty".to_string(),
            }
            .into());
        }
        if self.history.limit == 0 {
            return Err(crate::error::ConfigError::InvalidValue {
                section: "history".to_string(),
                key: "limit".to_string(),
                message: "must be at least 1".to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Format configuration options for display.
    ///
    /// Output is deterministically ordered using `BTreeMap`. Token sources are
    /// listed by variable name only, never by value.
    #[must_use]
    pub fn format_options(&self) -> Vec<String> {
        let mut options = BTreeMap::new();
        self.format_global_options(&mut options);
        self.format_engine_options(&mut options);
        self.format_account_options(&mut options);

        let max_key_len = options.keys().map(String::len).max().unwrap_or(0);

        options
            .into_iter()
            .map(|(key, value)| format!("{key:<max_key_len$} = {value}"))
            .collect()
    }

    fn format_global_options(&self, options: &mut BTreeMap<String, String>) {
        options.insert(
            "global.output_log_level".into(),
            self.global.output_log_level.as_u8().to_string(),
        );
        options.insert(
            "global.file_log_level".into(),
            self.global.file_log_level.as_u8().to_string(),
        );
        options.insert(
            "global.log_file".into(),
            self.global
                .log_file
                .as_ref()
                .map_or_else(String::new, |p| p.display().to_string()),
        );
        options.insert(
            "global.log_json".into(),
            self.global.log_json.to_string(),
        );
    }

    fn format_engine_options(&self, options: &mut BTreeMap<String, String>) {
        options.insert("git.program".into(), self.git.program.display().to_string());
        options.insert(
            "git.network_timeout_secs".into(),
            self.git.network_timeout_secs.to_string(),
        );
        options.insert("lock.wait_ms".into(), self.lock.wait_ms.to_string());
        options.insert(
            "sync.push_retries".into(),
            self.sync.push_retries.to_string(),
        );
        options.insert("sync.autostash".into(), self.sync.autostash.to_string());
        options.insert(
            "stash.include_untracked".into(),
            self.stash.include_untracked.to_string(),
        );
        options.insert(
            "stash.retain_on_conflict".into(),
            self.stash.retain_on_conflict.to_string(),
        );
        options.insert(
            "push.default_remote".into(),
            self.push.default_remote.clone(),
        );
        options.insert(
            "push.force_with_lease".into(),
            self.push.force_with_lease.to_string(),
        );
        options.insert(
            "push.publish_new_branches".into(),
            self.push.publish_new_branches.to_string(),
        );
        options.insert("history.limit".into(), self.history.limit.to_string());
    }

    fn format_account_options(&self, options: &mut BTreeMap<String, String>) {
        for (name, account) in &self.accounts {
            let source = account
                .token_env
                .clone()
                .unwrap_or_else(|| crate::auth::default_token_env(name));
            options.insert(format!("accounts.{name}.token_env"), source);
        }
    }
}
