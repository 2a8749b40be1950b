// gitdock: Multi-repository Git sync engine
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Activity records: one `running` record when an operation starts and one
//! final `success`/`error` record when it ends.
//!
//! ```text
//! Activity::start(sink, repo, command) --> ActivityRecord { status: running }
//!        ... operation ...
//! Activity::finish(sink, Ok | Err(msg)) --> ActivityRecord { status, duration_ms }
//!
//! Sinks: TracingSink (log lines), ChannelSink (flume -> UI), NullSink
//! ```
//!
//! Command and error text are redacted by the caller before they get here.


use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Lifecycle state of an activity record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityStatus {
    Running,
    Success,
    Error,
}

/// One entry of the activity feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivityRecord {
    /// Shared by the `running` record and its final record.
    pub id: u64,
    pub repo: PathBuf,
    pub command: String,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub status: ActivityStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Receiver of activity records.
///
/// Called from engine tasks; implementations must not block.
pub trait ActivitySink: Send + Sync {
    fn record(&self, record: &ActivityRecord);
}

/// Discards every record.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl ActivitySink for NullSink {
    fn record(&self, _record: &ActivityRecord) {}
}

/// Writes records as `tracing` events under the `gitdock::activity` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl ActivitySink for TracingSink {
    fn record(&self, record: &ActivityRecord) {
        match record.status {
            ActivityStatus::Running => tracing::debug!(
                target: "gitdock::activity",
                id = record.id,
                repo = %record.repo.display(),
                command = %record.command,
                "running"
            ),
            ActivityStatus::Success => tracing::info!(
                target: "gitdock::activity",
                id = record.id,
                repo = %record.repo.display(),
                command = %record.command,
                duration_ms = record.duration_ms,
                "success"
            ),
            ActivityStatus::Error => tracing::warn!(
                target: "gitdock::activity",
                id = record.id,
                repo = %record.repo.display(),
                command = %record.command,
                duration_ms = record.duration_ms,
                error = record.error_message.as_deref().unwrap_or_default(),
                "error"
            ),
        }
    }
}

/// Forwards records over a `flume` channel, typically to a UI thread.
///
/// A full channel drops the record instead of stalling the engine.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: flume::Sender<ActivityRecord>,
}

impl ChannelSink {
    /// Creates a sink and the receiver end of its channel.
    #[must_use]
    pub fn bounded(capacity: usize) -> (Self, flume::Receiver<ActivityRecord>) {
        let (tx, rx) = flume::bounded(capacity);
        (Self { tx }, rx)
    }

    /// Creates a sink whose channel never fills up.
    #[must_use]
    pub fn unbounded() -> (Self, flume::Receiver<ActivityRecord>) {
        let (tx, rx) = flume::unbounded();
        (Self { tx }, rx)
    }
}

impl ActivitySink for ChannelSink {
    fn record(&self, record: &ActivityRecord) {
        match self.tx.try_send(record.clone()) {
            Ok(()) | Err(flume::TrySendError::Disconnected(_)) => {}
            Err(flume::TrySendError::Full(_)) => {
                tracing::debug!(id = record.id, "activity channel full, record dropped");
            }
        }
    }
}

/// An operation in flight.
#[derive(Debug)]
pub struct Activity {
    id: u64,
    repo: PathBuf,
    command: String,
    started_at: DateTime<Utc>,
    started: Instant,
}

impl Activity {
    /// Emits the `running` record.
    pub fn start(sink: &dyn ActivitySink, repo: &Path, command: impl Into<String>) -> Self {
        let activity = Self {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            repo: repo.to_path_buf(),
            command: command.into(),
            started_at: Utc::now(),
            started: Instant::now(),
        };
        sink.record(&activity.snapshot(ActivityStatus::Running, 0, None));
        activity
    }

    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Emits the final record and returns it.
    pub fn finish(self, sink: &dyn ActivitySink, error: Option<String>) -> ActivityRecord {
        let duration_ms = u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX);
        let status = if error.is_some() {
            ActivityStatus::Error
        } else {
            ActivityStatus::Success
        };
        let record = self.snapshot(status, duration_ms, error);
        sink.record(&record);
        record
    }

    fn snapshot(
        &self,
        status: ActivityStatus,
        duration_ms: u64,
        error_message: Option<String>,
    ) -> ActivityRecord {
        ActivityRecord {
            id: self.id,
            repo: self.repo.clone(),
            command: self.command.clone(),
            started_at: self.started_at,
            duration_ms,
            status,
            error_message,
        }
    }
}
