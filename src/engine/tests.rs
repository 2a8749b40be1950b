// gitdock: Multi-repository Git sync engine
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

use super::test_utils::{ScriptedRunner, changed, script_repo};
use super::types::{OperationOutcome, RepositoryHandle};
use super::{Engine, EngineOptions};
use crate::activity::{ActivityRecord, ActivityStatus, ChannelSink};
use crate::auth::StaticTokenProvider;
use crate::config::Config;
use crate::error::{DockResult, EngineError};
use crate::git::{CommandOutput, CommandRunner, GitCommand};

const SECRET: &str = "s3cr3t-token";

fn engine(runner: Arc<dyn CommandRunner>) -> (Engine, flume::Receiver<ActivityRecord>) {
    let (sink, rx) = ChannelSink::unbounded();
    let tokens = StaticTokenProvider::new().with_token("work", SECRET);
    let options = EngineOptions::builder()
        .with_network_timeout(Duration::from_secs(5))
        .build();
    (
        Engine::new(runner, Arc::new(tokens), Arc::new(sink), &options),
        rx,
    )
}

fn handle() -> RepositoryHandle {
    RepositoryHandle::new("/repo").with_account("work")
}

/// Parks every call starting with `gate` until released.
struct GatedRunner {
    inner: ScriptedRunner,
    gate: Vec<String>,
    reached: Notify,
    release: Notify,
}

impl GatedRunner {
    fn on(gate: &[&str]) -> Self {
        Self {
            inner: ScriptedRunner::new(),
            gate: gate.iter().map(|a| (*a).to_string()).collect(),
            reached: Notify::new(),
            release: Notify::new(),
        }
    }
}

#[async_trait]
impl CommandRunner for GatedRunner {
    async fn run(&self, repo: &Path, command: &GitCommand) -> DockResult<CommandOutput> {
        if command.args().starts_with(&self.gate) {
            self.reached.notify_one();
            self.release.notified().await;
        }
        self.inner.run(repo, command).await
    }
}

#[test]
fn test_options_follow_config() {
    let config = Config::parse(
        "[sync]\npush_retries = 3\n[git]\nnetwork_timeout_secs = 0\n[push]\ndefault_remote = \"upstream\"\n",
    )
    .unwrap();
    let options = EngineOptions::from(&config);
    assert_eq!(options.push_retries, 3);
    assert_eq!(options.network_timeout, None);
    assert_eq!(options.default_remote, "upstream");
    assert_eq!(options.lock_wait, Duration::ZERO);
    assert!(options.retain_on_conflict);
}

#[tokio::test]
async fn test_remote_operation_without_account_runs_nothing() {
    let runner = Arc::new(ScriptedRunner::new());
    let (engine, activity) = engine(runner.clone());

    let outcome = engine.push_only(&RepositoryHandle::new("/repo")).await;

    assert_eq!(
        outcome,
        OperationOutcome::AuthMissing {
            account: "<unassigned>".into()
        }
    );
    assert!(runner.calls().is_empty());
    let records: Vec<ActivityRecord> = activity.try_iter().collect();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].status, ActivityStatus::Running);
    assert_eq!(records[1].status, ActivityStatus::Error);
    assert_eq!(records[0].id, records[1].id);
}

#[tokio::test]
async fn test_revoked_token_is_auth_missing_for_sync() {
    let runner = Arc::new(ScriptedRunner::new());
    let (engine, _activity) = engine(runner.clone());
    let handle = RepositoryHandle::new("/repo").with_account("personal");

    let result = engine.sync(&handle).await;

    assert!(!result.success);
    assert!(!result.pushed);
    assert_eq!(
        result.error,
        Some(EngineError::AuthMissing {
            account: "personal".into()
        })
    );
    assert!(runner.calls().is_empty());
}

#[tokio::test]
async fn test_held_lease_is_busy() {
    let runner = Arc::new(ScriptedRunner::new());
    let (engine, _activity) = engine(runner.clone());
    let lease = engine.mutex.acquire(Path::new("/repo")).await.unwrap();

    let outcome = engine.stash(&handle()).await;

    assert_eq!(
        outcome,
        OperationOutcome::Busy {
            path: "/repo".into()
        }
    );
    assert!(runner.calls().is_empty());
    drop(lease);
    assert!(!engine.mutex.is_held(Path::new("/repo")));
}

#[tokio::test]
async fn test_concurrent_sync_on_one_repository() {
    let gated = Arc::new(GatedRunner::on(&["fetch"]));
    script_repo(&gated.inner, "main", &[]);
    gated
        .inner
        .always(["fetch"], CommandOutput::ok(""))
        .always(["rev-list"], CommandOutput::ok("0\t0\n"));
    let (engine, _activity) = engine(gated.clone());
    let engine = Arc::new(engine);

    let first = tokio::spawn({
        let engine = Arc::clone(&engine);
        async move { engine.sync(&handle()).await }
    });
    gated.reached.notified().await;

    let second = engine.sync(&handle()).await;
    assert_eq!(
        second.error,
        Some(EngineError::Busy {
            path: "/repo".into()
        })
    );

    gated.release.notify_one();
    let first = first.await.unwrap();
    assert!(first.success);
    assert!(!first.pulled);
    assert!(!first.pushed);
    assert!(first.conflicts.is_empty());
}

#[tokio::test]
async fn test_stash_records_activity() {
    let runner = Arc::new(ScriptedRunner::new());
    script_repo(&runner, "main", &[&changed(".M", "a.txt")]);
    runner.always(["stash", "push"], CommandOutput::ok(""));
    let (engine, activity) = engine(runner.clone());

    let outcome = engine.stash(&handle()).await;

    assert!(outcome.is_success());
    let records: Vec<ActivityRecord> = activity.try_iter().collect();
    let summary: Vec<(&str, ActivityStatus)> = records
        .iter()
        .map(|r| (r.command.as_str(), r.status))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("stash", ActivityStatus::Running),
            ("stash", ActivityStatus::Success)
        ]
    );
    assert!(records[1].error_message.is_none());
}

#[tokio::test]
async fn test_error_message_never_carries_token() {
    let runner = Arc::new(ScriptedRunner::new());
    script_repo(&runner, "main", &[]);
    runner.always(
        ["push"],
        CommandOutput::failed(128, format!("fatal: helper returned {SECRET} to an unexpected host")),
    );
    let (engine, activity) = engine(runner.clone());

    let outcome = engine.push_only(&handle()).await;

    let OperationOutcome::CommandFailed { stderr, .. } = outcome else {
        panic!("expected CommandFailed, got {outcome:?}");
    };
    assert!(!stderr.contains(SECRET));
    let failed = activity
        .try_iter()
        .find(|r| r.status == ActivityStatus::Error)
        .unwrap();
    assert!(!failed.error_message.unwrap().contains(SECRET));
    let push = &runner.matching(&["push"])[0];
    assert!(push.had_credential);
    assert!(push.args.iter().all(|a| !a.contains(SECRET)));
}

#[tokio::test]
async fn test_queries_record_no_activity() {
    let runner = Arc::new(ScriptedRunner::new());
    script_repo(&runner, "main", &["? a.txt"]);
    let (engine, activity) = engine(runner.clone());

    let status = engine.refresh_status(&handle()).await.unwrap();

    assert!(status.dirty);
    assert_eq!(activity.try_iter().count(), 0);
}

#[tokio::test]
async fn test_dropped_sync_still_runs_rebase_abort() {
    let temp = tempfile::tempdir().unwrap();
    std::fs::create_dir(temp.path().join("rebase-merge")).unwrap();
    let gated = Arc::new(GatedRunner::on(&["rebase", "--abort"]));
    gated
        .inner
        .expect(["rev-parse", "--git-dir"], CommandOutput::ok("/nonexistent/.git\n"))
        .always(
            ["rev-parse", "--git-dir"],
            CommandOutput::ok(temp.path().display().to_string()),
        );
    script_repo(&gated.inner, "main", &[]);
    gated
        .inner
        .always(["fetch"], CommandOutput::ok(""))
        .always(["rev-list"], CommandOutput::ok("1\t1\n"))
        .expect(
            ["rebase", "--no-autostash"],
            CommandOutput::failed(1, "CONFLICT (content): Merge conflict in a.txt"),
        )
        .always(["diff", "--name-only", "--diff-filter=U"], CommandOutput::ok("a.txt\0"))
        .expect(["rebase", "--abort"], CommandOutput::ok(""));
    let (engine, activity) = engine(gated.clone());
    let handle = handle();

    tokio::select! {
        _ = engine.sync(&handle) => panic!("sync finished while rebase --abort was parked"),
        () = gated.reached.notified() => {}
    }
    gated.release.notify_one();
    tokio::time::timeout(Duration::from_secs(5), async {
        while engine.mutex.is_held(Path::new("/repo")) {
            tokio::task::yield_now().await;
        }
    })
    .await
    .unwrap();

    assert!(gated.inner.ran(&["rebase", "--abort"]));
    assert!(!gated.inner.ran(&["push"]));
    let finished = activity
        .try_iter()
        .find(|r| r.status != ActivityStatus::Running)
        .unwrap();
    assert_eq!(finished.status, ActivityStatus::Error);
    assert!(finished.error_message.unwrap().contains("a.txt"));
}
