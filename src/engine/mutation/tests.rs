// gitdock: Multi-repository Git sync engine
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use super::{MutationPolicy, SafeMutationOps, overwritten_paths};
use crate::auth::Credential;
use crate::engine::invoker::CommandInvoker;
use crate::engine::lock::{RepoLease, RepoMutex};
use crate::engine::push::PushStep;
use crate::engine::status::StatusTracker;
use crate::engine::test_utils::{ScriptedRunner, changed, porcelain, script_repo, unmerged};
use crate::error::EngineError;
use crate::git::CommandOutput;

const OVERWRITE: &str = "error: Your local changes to the following files would be overwritten by merge:\n\ta.txt\n\tdir/b.txt\nPlease commit your changes or stash them before you merge.\nAborting";

fn ops_with(runner: &Arc<ScriptedRunner>, policy: MutationPolicy) -> SafeMutationOps {
    let invoker = CommandInvoker::new(runner.clone(), None);
    let tracker = StatusTracker::new(invoker.clone());
    let push = PushStep::new(invoker.clone(), "origin", true);
    SafeMutationOps::new(invoker, tracker, push, policy)
}

fn ops(runner: &Arc<ScriptedRunner>) -> SafeMutationOps {
    ops_with(runner, MutationPolicy::default())
}

async fn lease() -> (RepoMutex, RepoLease) {
    let mutex = RepoMutex::new(Duration::ZERO);
    let lease = mutex.acquire(Path::new("/repo")).await.unwrap();
    (mutex, lease)
}

#[test]
fn test_overwritten_paths() {
    assert_eq!(overwritten_paths(OVERWRITE), vec!["a.txt", "dir/b.txt"]);
    assert!(overwritten_paths("fatal: something else").is_empty());
}

// --- stash ---

#[tokio::test]
async fn test_stash_clean_tree_is_precondition() {
    let runner = Arc::new(ScriptedRunner::new());
    script_repo(&runner, "main", &[]);
    let (_mutex, lease) = lease().await;

    let err = ops(&runner).stash(&lease).await.unwrap_err();

    assert_eq!(err, EngineError::precondition("nothing to stash"));
    assert!(!runner.ran(&["stash"]));
}

#[tokio::test]
async fn test_stash_includes_untracked() {
    let runner = Arc::new(ScriptedRunner::new());
    script_repo(&runner, "main", &["? new.txt"]);
    runner.always(["stash", "push"], CommandOutput::ok("Saved working directory"));
    let (_mutex, lease) = lease().await;

    ops(&runner).stash(&lease).await.unwrap();

    assert_eq!(
        runner.matching(&["stash"])[0].line(),
        "stash push --include-untracked"
    );
}

#[tokio::test]
async fn test_pop_without_stash_is_precondition() {
    let runner = Arc::new(ScriptedRunner::new());
    runner.always(["stash", "list"], CommandOutput::ok(""));
    let (_mutex, lease) = lease().await;

    let err = ops(&runner).pop_stash(&lease).await.unwrap_err();

    assert_eq!(err, EngineError::precondition("no stash to pop"));
    assert!(!runner.ran(&["stash", "apply"]));
}

#[tokio::test]
async fn test_pop_applies_then_drops() {
    let runner = Arc::new(ScriptedRunner::new());
    script_repo(&runner, "main", &[]);
    runner
        .always(["stash", "list"], CommandOutput::ok("stash@{0}: WIP on main\n"))
        .always(["stash", "apply"], CommandOutput::ok(""))
        .always(["stash", "drop"], CommandOutput::ok(""));
    let (_mutex, lease) = lease().await;

    ops(&runner).pop_stash(&lease).await.unwrap();

    let stash_calls: Vec<String> = runner
        .matching(&["stash"])
        .iter()
        .map(|c| c.line())
        .collect();
    assert_eq!(
        stash_calls,
        vec![
            "stash list",
            "stash apply --index stash@{0}",
            "stash drop stash@{0}"
        ]
    );
}

/// Scripts a stash apply that leaves `a.txt` unmerged, plus the commands
/// that put the tree back.
fn script_conflicting_apply(runner: &ScriptedRunner, stashed_untracked: Option<&str>) {
    runner
        .always(["stash", "list"], CommandOutput::ok("stash@{0}: WIP on main\n"))
        .always(
            ["stash", "apply", "--index", "stash@{0}"],
            CommandOutput::failed(1, "CONFLICT (content): Merge conflict in a.txt"),
        )
        .always(["diff", "--name-only", "--diff-filter=U"], CommandOutput::ok("a.txt\0"))
        .always(["reset", "--hard"], CommandOutput::ok(""))
        .always(["clean"], CommandOutput::ok(""))
        .always(["stash", "drop"], CommandOutput::ok(""));
    match stashed_untracked {
        Some(listing) => runner
            .always(["rev-parse", "-q", "--verify", "stash@{0}^3"], CommandOutput::ok("abc\n"))
            .always(["ls-tree"], CommandOutput::ok(listing)),
        None => runner.always(
            ["rev-parse", "-q", "--verify", "stash@{0}^3"],
            CommandOutput::failed(1, ""),
        ),
    };
}

#[tokio::test]
async fn test_pop_conflict_restores_tree_and_retains_stash() {
    let runner = Arc::new(ScriptedRunner::new());
    script_repo(&runner, "main", &[]);
    script_conflicting_apply(&runner, None);
    let (_mutex, lease) = lease().await;

    let err = ops(&runner).pop_stash(&lease).await.unwrap_err();

    assert_eq!(
        err,
        EngineError::Conflict {
            paths: vec!["a.txt".into()]
        }
    );
    assert!(runner.ran(&["reset", "--hard", "--quiet", "HEAD"]));
    assert!(!runner.ran(&["stash", "create"]));
    assert!(!runner.ran(&["clean"]));
    assert!(!runner.ran(&["stash", "drop"]));
}

#[tokio::test]
async fn test_pop_conflict_reapplies_local_changes_and_cleans_stashed_untracked() {
    let runner = Arc::new(ScriptedRunner::new());
    script_repo(&runner, "main", &[&changed("M.", "b.txt"), "? keep.txt"]);
    runner
        .always(["stash", "create"], CommandOutput::ok("feedface\n"))
        .always(["stash", "apply", "--index", "feedface"], CommandOutput::ok(""));
    script_conflicting_apply(&runner, Some("keep.txt\0new.txt\0"));
    let (_mutex, lease) = lease().await;

    let err = ops(&runner).pop_stash(&lease).await.unwrap_err();

    assert_eq!(err.category(), "conflict");
    let lines = runner.lines();
    let position = |line: &str| lines.iter().position(|l| l == line).unwrap();
    assert!(position("stash create") < position("stash apply --index stash@{0}"));
    assert!(position("reset --hard --quiet HEAD") < position("clean -f -q -- new.txt"));
    assert!(position("clean -f -q -- new.txt") < position("stash apply --index feedface"));
    assert!(!runner.ran(&["stash", "drop"]));
}

#[tokio::test]
async fn test_pop_conflict_drops_when_not_retained() {
    let runner = Arc::new(ScriptedRunner::new());
    script_repo(&runner, "main", &[]);
    script_conflicting_apply(&runner, None);
    let policy = MutationPolicy {
        retain_on_conflict: false,
        ..MutationPolicy::default()
    };
    let (_mutex, lease) = lease().await;

    let err = ops_with(&runner, policy).pop_stash(&lease).await.unwrap_err();

    assert_eq!(err.category(), "conflict");
    assert!(runner.ran(&["reset", "--hard"]));
    assert!(runner.ran(&["stash", "drop"]));
}

#[tokio::test]
async fn test_pop_blocked_by_local_changes_keeps_stash() {
    let runner = Arc::new(ScriptedRunner::new());
    script_repo(&runner, "main", &[&changed(".M", "a.txt")]);
    runner
        .always(["stash", "list"], CommandOutput::ok("stash@{0}: WIP on main\n"))
        .always(["stash", "create"], CommandOutput::ok("feedface\n"))
        .always(["stash", "apply"], CommandOutput::failed(1, OVERWRITE))
        .always(["diff", "--name-only", "--diff-filter=U"], CommandOutput::ok(""))
        .always(["stash", "drop"], CommandOutput::ok(""));
    let policy = MutationPolicy {
        retain_on_conflict: false,
        ..MutationPolicy::default()
    };
    let (_mutex, lease) = lease().await;

    let err = ops_with(&runner, policy).pop_stash(&lease).await.unwrap_err();

    assert_eq!(
        err,
        EngineError::Conflict {
            paths: vec!["a.txt".into(), "dir/b.txt".into()]
        }
    );
    assert!(!runner.ran(&["stash", "drop"]));
    assert!(!runner.ran(&["reset"]));
}

// --- commit / push ---

#[tokio::test]
async fn test_commit_and_push() {
    let runner = Arc::new(ScriptedRunner::new());
    script_repo(&runner, "main", &[&changed("A.", "x.txt")]);
    runner
        .always(["commit"], CommandOutput::ok(""))
        .always(["push"], CommandOutput::ok(""));
    let (_mutex, lease) = lease().await;
    let credential = Credential::new("work", "tok");

    ops(&runner)
        .commit_and_push(&lease, "fix", Some(&credential))
        .await
        .unwrap();

    let commit = &runner.matching(&["commit"])[0];
    assert_eq!(commit.line(), "commit --quiet -F -");
    assert_eq!(commit.stdin.as_deref(), Some("fix"));
    assert!(!commit.had_credential);
    let push = &runner.matching(&["push"])[0];
    assert_eq!(push.line(), "push origin HEAD:refs/heads/main");
    assert!(push.had_credential);
}

#[tokio::test]
async fn test_commit_refusals_run_nothing_mutating() {
    let runner = Arc::new(ScriptedRunner::new());
    script_repo(&runner, "main", &[&changed(".M", "x.txt")]);
    let (_mutex, lease) = lease().await;
    let ops = ops(&runner);

    assert_eq!(
        ops.commit_and_push(&lease, "  ", None).await,
        Err(EngineError::precondition("commit message is empty"))
    );
    assert_eq!(
        ops.commit_and_push(&lease, "fix", None).await,
        Err(EngineError::precondition("nothing staged to commit"))
    );
    assert!(!runner.ran(&["commit"]));
}

#[tokio::test]
async fn test_commit_refused_with_conflicts() {
    let runner = Arc::new(ScriptedRunner::new());
    script_repo(&runner, "main", &[&changed("M.", "x.txt"), &unmerged("y.txt")]);
    let (_mutex, lease) = lease().await;

    let err = ops(&runner)
        .commit_and_push(&lease, "fix", None)
        .await
        .unwrap_err();

    assert_eq!(err, EngineError::precondition("unresolved conflicts"));
}

#[tokio::test]
async fn test_push_failure_keeps_commit() {
    let runner = Arc::new(ScriptedRunner::new());
    script_repo(&runner, "main", &[&changed("M.", "x.txt")]);
    runner
        .always(["commit"], CommandOutput::ok(""))
        .always(
            ["push"],
            CommandOutput::failed(128, "fatal: unable to access 'https://example.com/r.git/'"),
        );
    let (_mutex, lease) = lease().await;

    let err = ops(&runner)
        .commit_and_push(&lease, "fix", None)
        .await
        .unwrap_err();

    assert_eq!(err.category(), "network_or_remote_rejected");
    assert!(runner.ran(&["commit"]));
    assert!(!runner.ran(&["reset"]));
}

#[tokio::test]
async fn test_push_only_publishes_new_branch() {
    let runner = Arc::new(ScriptedRunner::new());
    runner
        .always(["status"], CommandOutput::ok(porcelain(Some("topic"), None, &[])))
        .always(["config", "--get"], CommandOutput::failed(1, ""))
        .always(["push"], CommandOutput::ok(""));
    let (_mutex, lease) = lease().await;

    ops(&runner).push_only(&lease, None).await.unwrap();

    assert_eq!(
        runner.lines(),
        vec![
            "status --porcelain=v2 --branch -z --untracked-files=all",
            "config --get branch.topic.remote",
            "push --set-upstream origin HEAD:refs/heads/topic",
        ]
    );
}

// --- undo / revert ---

#[tokio::test]
async fn test_undo_soft_resets() {
    let runner = Arc::new(ScriptedRunner::new());
    script_repo(&runner, "main", &[]);
    runner
        .always(["rev-parse", "-q", "--verify", "HEAD~1^{commit}"], CommandOutput::ok("p\n"))
        .always(["merge-base", "--is-ancestor"], CommandOutput::failed(1, ""))
        .always(["reset"], CommandOutput::ok(""));
    let (_mutex, lease) = lease().await;

    ops(&runner).undo_last_commit(&lease).await.unwrap();

    assert_eq!(runner.matching(&["reset"])[0].line(), "reset --soft HEAD~1");
    assert!(!runner.ran(&["push"]));
}

#[tokio::test]
async fn test_undo_root_commit_is_precondition() {
    let runner = Arc::new(ScriptedRunner::new());
    script_repo(&runner, "main", &[]);
    runner.always(["rev-parse", "-q", "--verify"], CommandOutput::failed(1, ""));
    let (_mutex, lease) = lease().await;

    let err = ops(&runner).undo_last_commit(&lease).await.unwrap_err();

    assert_eq!(err.category(), "precondition");
    assert!(!runner.ran(&["reset"]));
}

#[tokio::test]
async fn test_revert_refuses_merge_commit() {
    let runner = Arc::new(ScriptedRunner::new());
    script_repo(&runner, "main", &[]);
    runner.always(["rev-parse", "-q", "--verify", "HEAD^2"], CommandOutput::ok("m\n"));
    let (_mutex, lease) = lease().await;

    let err = ops(&runner).revert_last_commit(&lease).await.unwrap_err();

    assert_eq!(err, EngineError::precondition("last commit is a merge"));
    assert!(!runner.ran(&["revert"]));
}

#[tokio::test]
async fn test_revert_conflict_is_aborted() {
    let runner = Arc::new(ScriptedRunner::new());
    script_repo(&runner, "main", &["? untracked.txt"]);
    runner
        .always(["rev-parse", "-q", "--verify", "HEAD^2"], CommandOutput::failed(1, ""))
        .expect(["revert", "--no-edit"], CommandOutput::failed(1, "error: could not revert"))
        .always(["diff", "--name-only", "--diff-filter=U"], CommandOutput::ok("a.txt\0"))
        .expect(["revert", "--abort"], CommandOutput::ok(""));
    let (_mutex, lease) = lease().await;

    let err = ops(&runner).revert_last_commit(&lease).await.unwrap_err();

    assert_eq!(
        err,
        EngineError::Conflict {
            paths: vec!["a.txt".into()]
        }
    );
    assert!(runner.ran(&["revert", "--abort"]));
}

// --- delete ---

fn script_delete(runner: &ScriptedRunner, published: bool, upstream_tip: &str) {
    script_repo(runner, "main", &["? scratch.txt"]);
    runner
        .always(["rev-parse", "-q", "--verify", "HEAD~1^{commit}"], CommandOutput::ok("p\n"))
        .always(["rev-parse", "HEAD"], CommandOutput::ok("abc123\n"))
        .always(["rev-parse", "@{upstream}"], CommandOutput::ok(format!("{upstream_tip}\n")))
        .always(
            ["merge-base", "--is-ancestor"],
            if published {
                CommandOutput::ok("")
            } else {
                CommandOutput::failed(1, "")
            },
        )
        .always(["reset"], CommandOutput::ok(""))
        .always(["push"], CommandOutput::ok(""));
}

#[tokio::test]
async fn test_delete_unpublished_commit_stays_local() {
    let runner = Arc::new(ScriptedRunner::new());
    script_delete(&runner, false, "def456");
    let (_mutex, lease) = lease().await;

    let discarded = ops(&runner).delete_last_commit(&lease, None).await.unwrap();

    assert_eq!(discarded, "abc123");
    assert_eq!(runner.matching(&["reset"])[0].line(), "reset --hard HEAD~1");
    assert!(!runner.ran(&["push"]));
}

#[tokio::test]
async fn test_delete_published_commit_force_pushes_with_lease() {
    let runner = Arc::new(ScriptedRunner::new());
    script_delete(&runner, true, "abc123");
    let (_mutex, lease) = lease().await;
    let credential = Credential::new("work", "tok");

    ops(&runner)
        .delete_last_commit(&lease, Some(&credential))
        .await
        .unwrap();

    let lines = runner.lines();
    let reset = lines.iter().position(|l| l.starts_with("reset")).unwrap();
    let push = lines.iter().position(|l| l.starts_with("push")).unwrap();
    assert!(reset < push);
    assert_eq!(
        lines[push],
        "push --force-with-lease=refs/heads/main:abc123 origin HEAD:refs/heads/main"
    );
}

#[tokio::test]
async fn test_delete_refused_when_upstream_moved_on() {
    let runner = Arc::new(ScriptedRunner::new());
    script_delete(&runner, true, "fff000");
    let (_mutex, lease) = lease().await;

    let err = ops(&runner).delete_last_commit(&lease, None).await.unwrap_err();

    assert_eq!(err.category(), "precondition");
    assert!(!runner.ran(&["reset"]));
}

#[tokio::test]
async fn test_delete_refused_with_tracked_changes() {
    let runner = Arc::new(ScriptedRunner::new());
    script_repo(&runner, "main", &[&changed(".M", "a.txt")]);
    let (_mutex, lease) = lease().await;

    let err = ops(&runner).delete_last_commit(&lease, None).await.unwrap_err();

    assert_eq!(err.category(), "precondition");
    assert!(!runner.ran(&["reset"]));
}
