// gitdock: Multi-repository Git sync engine
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use super::{Force, PushStep};
use crate::auth::Credential;
use crate::engine::invoker::CommandInvoker;
use crate::engine::status::Upstream;
use crate::engine::test_utils::ScriptedRunner;
use crate::error::EngineError;
use crate::git::CommandOutput;

fn origin_main() -> Upstream {
    Upstream {
        remote: "origin".into(),
        merge_ref: "refs/heads/main".into(),
    }
}

fn step(runner: &Arc<ScriptedRunner>, publish: bool) -> PushStep {
    let invoker = CommandInvoker::new(runner.clone(), Some(Duration::from_secs(60)));
    PushStep::new(invoker, "origin", publish)
}

#[test]
fn test_plan_requires_branch() {
    let runner = Arc::new(ScriptedRunner::new());
    let err = step(&runner, true).plan(None, None).unwrap_err();
    assert_eq!(err, EngineError::precondition("HEAD is detached"));
}

#[test]
fn test_plan_without_upstream() {
    let runner = Arc::new(ScriptedRunner::new());
    let plan = step(&runner, true).plan(Some("topic"), None).unwrap();
    assert!(plan.publish);
    assert_eq!(plan.remote_ref, "refs/heads/topic");

    let err = step(&runner, false).plan(Some("topic"), None).unwrap_err();
    assert_eq!(err.category(), "precondition");
}

#[tokio::test]
async fn test_execute_variants() {
    let runner = Arc::new(ScriptedRunner::new());
    runner.always(["push"], CommandOutput::ok(""));
    let step = step(&runner, true);
    let repo = Path::new("/repo");
    let credential = Credential::new("work", "tok");
    let upstream = origin_main();

    let tracked = step.plan(Some("main"), Some(&upstream)).unwrap();
    step.execute(repo, &tracked, &Force::No, Some(&credential))
        .await
        .unwrap();
    step.execute(
        repo,
        &tracked,
        &Force::WithLease {
            expected: "abc123".into(),
        },
        Some(&credential),
    )
    .await
    .unwrap();
    let new_branch = step.plan(Some("topic"), None).unwrap();
    step.execute(repo, &new_branch, &Force::No, Some(&credential))
        .await
        .unwrap();

    insta::assert_debug_snapshot!(runner.lines(), @r#"
    [
        "push origin HEAD:refs/heads/main",
        "push --force-with-lease=refs/heads/main:abc123 origin HEAD:refs/heads/main",
        "push --set-upstream origin HEAD:refs/heads/topic",
    ]
    "#);
    assert!(runner.calls().iter().all(|c| c.had_credential));
    assert!(
        runner
            .calls()
            .iter()
            .all(|c| c.timeout == Some(Duration::from_secs(60)))
    );
}

#[tokio::test]
async fn test_execute_surfaces_rejection() {
    let runner = Arc::new(ScriptedRunner::new());
    runner.always(
        ["push"],
        CommandOutput::failed(1, " ! [rejected]        HEAD -> main (non-fast-forward)"),
    );
    let step = step(&runner, true);
    let plan = step.plan(Some("main"), Some(&origin_main())).unwrap();
    let err = step
        .execute(Path::new("/repo"), &plan, &Force::No, None)
        .await
        .unwrap_err();
    assert!(err.is_non_fast_forward());
}
