// gitdock: Multi-repository Git sync engine
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Reflog-backed recovery.
//!
//! ```text
//! list_history(limit)   reflog show --date=unix -n<limit> --format=%H%x00%gd%x00%gs HEAD
//!                       line i --> ReflogEntry { selector: HEAD@{i}, ... }
//!
//! restore(selector)     validate syntax
//!                       rev-parse --verify -q <selector>^{commit}   (under the lease)
//!                         fails --> Precondition("selector no longer resolvable")
//!                       clean tracked tree, nothing in progress
//!                       reset --hard <hash>
//! ```
//!
//! Reflog entries expire; a selector is only meaningful until the ledger moves.


use std::path::Path;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use tracing::{info, trace, warn};

use super::invoker::CommandInvoker;
use super::lock::RepoLease;
use super::status::StatusTracker;
use super::types::ReflogEntry;
use crate::error::EngineError;

/// `<ref>@{<n>}` or an abbreviated/full object id.
static SELECTOR: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"^(?:[A-Za-z0-9_][A-Za-z0-9_./-]*@\{[0-9]+\}|[0-9a-fA-F]{4,64})$").ok()
});

const UNRESOLVABLE: &str = "selector no longer resolvable";

/// Whether `selector` has a shape `restore` accepts.
#[must_use]
pub fn is_valid_selector(selector: &str) -> bool {
    SELECTOR
        .as_ref()
        .is_some_and(|re| re.is_match(selector) && !selector.contains(".."))
}

/// Whether the resolved `full` hash is the commit `expected` names.
/// Abbreviated ids of at least four hex digits match by prefix.
fn names_commit(expected: &str, full: &str) -> bool {
    let expected = expected.trim();
    expected.len() >= 4
        && expected.chars().all(|c| c.is_ascii_hexdigit())
        && full
            .get(..expected.len())
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(expected))
}

/// Number inside the braces of `HEAD@{...}`.
fn braced_number(reflog_name: &str) -> Option<i64> {
    let start = reflog_name.find("@{")? + 2;
    let end = reflog_name[start..].find('}')? + start;
    reflog_name[start..end].parse().ok()
}

/// Parses `%H NUL %gd NUL %gs` lines produced with `--date=unix`.
fn parse_reflog(raw: &str) -> Vec<ReflogEntry> {
    raw.lines()
        .filter(|line| !line.is_empty())
        .enumerate()
        .filter_map(|(index, line)| {
            let mut fields = line.splitn(3, '\0');
            let (Some(hash), Some(name), subject) = (fields.next(), fields.next(), fields.next())
            else {
                trace!(line, "reflog line skipped");
                return None;
            };
            let timestamp = braced_number(name)
                .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
                .unwrap_or_default();
            Some(ReflogEntry {
                selector: format!("HEAD@{{{index}}}"),
                commit_hash: hash.to_string(),
                subject: subject.unwrap_or_default().to_string(),
                timestamp,
            })
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct TimeMachine {
    invoker: CommandInvoker,
    tracker: StatusTracker,
    limit: usize,
}

impl TimeMachine {
    #[must_use]
    pub const fn new(invoker: CommandInvoker, tracker: StatusTracker, limit: usize) -> Self {
        Self {
            invoker,
            tracker,
            limit,
        }
    }

    /// HEAD reflog, newest first. Empty before the first commit.
    ///
    /// # Errors
    ///
    /// Returns an error if git fails.
    pub async fn list_history(&self, repo: &Path) -> Result<Vec<ReflogEntry>, EngineError> {
        if !self
            .invoker
            .probe(repo, ["rev-parse", "-q", "--verify", "HEAD"])
            .await?
        {
            return Ok(Vec::new());
        }
        let raw = self
            .invoker
            .git(
                repo,
                [
                    "reflog".to_string(),
                    "show".to_string(),
                    "--date=unix".to_string(),
                    format!("-n{}", self.limit),
                    "--format=%H%x00%gd%x00%gs".to_string(),
                    "HEAD".to_string(),
                ],
            )
            .await?;
        Ok(parse_reflog(&raw))
    }

    /// Resolves `selector` to a commit hash, now.
    async fn resolve(&self, repo: &Path, selector: &str) -> Result<String, EngineError> {
        if !is_valid_selector(selector) {
            return Err(EngineError::precondition(format!(
                "invalid selector '{selector}'"
            )));
        }
        let command = CommandInvoker::local([
            "rev-parse".to_string(),
            "--verify".to_string(),
            "-q".to_string(),
            format!("{selector}^{{commit}}"),
        ]);
        let output = self.invoker.output(repo, &command).await?;
        let hash = output.stdout.trim();
        if output.success() && !hash.is_empty() {
            Ok(hash.to_string())
        } else {
            Err(EngineError::precondition(UNRESOLVABLE))
        }
    }

    async fn reset_to(&self, repo: &Path, selector: &str, hash: &str) -> Result<(), EngineError> {
        let status = self.tracker.refresh(repo).await?;
        if status.has_tracked_changes() {
            return Err(EngineError::precondition(
                "tracked changes present; commit or stash them first",
            ));
        }
        self.tracker.ensure_idle(repo).await?;

        warn!(repo = %repo.display(), selector, commit = hash, "hard reset to reflog entry");
        self.invoker.git(repo, ["reset", "--hard", hash]).await?;
        info!(repo = %repo.display(), commit = hash, "restored");
        Ok(())
    }

    /// Hard-resets the current branch to whatever `selector` resolves to at
    /// call time. Returns the restored hash.
    ///
    /// # Errors
    ///
    /// `Precondition` for a malformed or unresolvable selector, tracked
    /// changes, or an unfinished operation.
    pub async fn restore(&self, lease: &RepoLease, selector: &str) -> Result<String, EngineError> {
        let repo = lease.path();
        let hash = self.resolve(repo, selector).await?;
        self.reset_to(repo, selector, &hash).await?;
        Ok(hash)
    }

    /// Like [`restore`](Self::restore), but also requires the entry's
    /// selector to still name the listed commit. The listed hash may be
    /// abbreviated.
    ///
    /// # Errors
    ///
    /// `Precondition` if the reflog moved since `entry` was listed.
    pub async fn restore_entry(
        &self,
        lease: &RepoLease,
        entry: &ReflogEntry,
    ) -> Result<String, EngineError> {
        let repo = lease.path();
        let hash = self.resolve(repo, &entry.selector).await?;
        if !names_commit(&entry.commit_hash, &hash) {
            return Err(EngineError::precondition(format!(
                "{} now names {}, not {}",
                entry.selector,
                hash.get(..12).unwrap_or(&hash),
                entry.commit_hash
            )));
        }
        self.reset_to(repo, &entry.selector, &hash).await?;
        Ok(hash)
    }
}
