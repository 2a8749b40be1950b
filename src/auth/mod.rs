// gitdock: Multi-repository Git sync engine
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Account-scoped credentials.
//!
//! ```text
//! Engine --account--> TokenProvider::token() --> Option<Credential>
//!                       |                |
//!                EnvTokenProvider  StaticTokenProvider
//!                 (process env)      (in-memory)
//! ```
//!
//! A [`Credential`] never reaches a log line: its `Debug` is redacted and the
//! git runner hands the secret to the child through its environment only.

pub mod redact;

#[cfg(test)]
mod tests;

use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::{PoisonError, RwLock};

use crate::config::types::Accounts;

pub use redact::redact;

/// Username sent alongside token credentials over HTTPS.
pub const TOKEN_USERNAME: &str = "x-access-token";

/// Token for one account.
#[derive(Clone)]
pub struct Credential {
    account: String,
    username: String,
    secret: String,
}

impl Credential {
    /// Creates a token credential for `account`.
    pub fn new(account: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            username: TOKEN_USERNAME.to_string(),
            secret: secret.into(),
        }
    }

    /// Overrides the username presented with the token.
    #[must_use]
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }

    #[must_use]
    pub fn account(&self) -> &str {
        &self.account
    }

    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Returns the raw secret. Only the git runner and the redactor read it.
    #[must_use]
    pub fn expose_secret(&self) -> &str {
        &self.secret
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("account", &self.account)
            .field("username", &self.username)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

/// Source of per-account tokens.
///
/// Returning `None` means the account has no usable credential; the engine
/// reports `AuthMissing` without running any command.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn token(&self, account: &str) -> Option<Credential>;
}

/// Default environment variable holding the token of `account`.
///
/// `work-gh` maps to `GITDOCK_TOKEN_WORK_GH`.
#[must_use]
pub fn default_token_env(account: &str) -> String {
    let suffix: String = account
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    format!("GITDOCK_TOKEN_{suffix}")
}

/// Reads tokens from the process environment.
///
/// The variable for each account comes from `[accounts.<name>].token_env`,
/// falling back to [`default_token_env`].
#[derive(Debug, Clone, Default)]
pub struct EnvTokenProvider {
    accounts: Accounts,
}

impl EnvTokenProvider {
    #[must_use]
    pub const fn new(accounts: Accounts) -> Self {
        Self { accounts }
    }

    /// Name of the variable consulted for `account`.
    #[must_use]
    pub fn variable_for(&self, account: &str) -> String {
        self.accounts
            .get(account)
            .and_then(|a| a.token_env.clone())
            .unwrap_or_else(|| default_token_env(account))
    }
}

#[async_trait]
impl TokenProvider for EnvTokenProvider {
    async fn token(&self, account: &str) -> Option<Credential> {
        let variable = self.variable_for(account);
        let value = std::env::var(&variable).ok()?;
        let value = value.trim();
        if value.is_empty() {
            tracing::debug!(account, variable = %variable, "token variable is empty");
            return None;
        }
        Some(Credential::new(account, value))
    }
}

/// In-memory tokens, for embedding applications that manage secrets themselves.
#[derive(Debug, Default)]
pub struct StaticTokenProvider {
    tokens: RwLock<HashMap<String, Credential>>,
}

impl StaticTokenProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with_token(self, account: &str, secret: &str) -> Self {
        self.insert(Credential::new(account, secret));
        self
    }

    /// Stores or replaces the credential of its account.
    pub fn insert(&self, credential: Credential) {
        self.tokens
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(credential.account().to_string(), credential);
    }

    /// Forgets an account's credential, as after a revoked sign-in.
    pub fn revoke(&self, account: &str) -> bool {
        self.tokens
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(account)
            .is_some()
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn token(&self, account: &str) -> Option<Credential> {
        self.tokens
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(account)
            .cloned()
    }
}
