// gitdock: Multi-repository Git sync engine
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Test-only scripted [`CommandRunner`].
//!
//! Rules match on argument prefixes in insertion order. `expect` rules answer
//! once, `always` rules answer every time. Anything unscripted exits 127, so a
//! test fails loudly when the engine issues a command it did not plan for.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use crate::error::DockResult;
use crate::git::{CommandOutput, CommandRunner, GitCommand};

struct Rule {
    prefix: Vec<String>,
    output: CommandOutput,
    sticky: bool,
    used: bool,
}

/// One recorded invocation.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub repo: PathBuf,
    pub args: Vec<String>,
    pub had_credential: bool,
    pub timeout: Option<Duration>,
    pub stdin: Option<String>,
}

impl RecordedCall {
    pub fn line(&self) -> String {
        self.args.join(" ")
    }
}

#[derive(Default)]
pub struct ScriptedRunner {
    rules: Mutex<Vec<Rule>>,
    calls: Mutex<Vec<RecordedCall>>,
}

fn to_strings<I, S>(prefix: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    prefix.into_iter().map(Into::into).collect()
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers the next matching call once.
    pub fn expect<I, S>(&self, prefix: I, output: CommandOutput) -> &Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.push_rule(to_strings(prefix), output, false);
        self
    }

    /// Answers every matching call not taken by an earlier rule.
    pub fn always<I, S>(&self, prefix: I, output: CommandOutput) -> &Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.push_rule(to_strings(prefix), output, true);
        self
    }

    fn push_rule(&self, prefix: Vec<String>, output: CommandOutput, sticky: bool) {
        self.rules
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Rule {
                prefix,
                output,
                sticky,
                used: false,
            });
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Every call as a space-joined argument line.
    pub fn lines(&self) -> Vec<String> {
        self.calls().iter().map(RecordedCall::line).collect()
    }

    /// Calls whose arguments start with `prefix`.
    pub fn matching(&self, prefix: &[&str]) -> Vec<RecordedCall> {
        self.calls()
            .into_iter()
            .filter(|c| {
                c.args.len() >= prefix.len() && c.args.iter().zip(prefix).all(|(a, p)| a == p)
            })
            .collect()
    }

    pub fn ran(&self, prefix: &[&str]) -> bool {
        !self.matching(prefix).is_empty()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, repo: &Path, command: &GitCommand) -> DockResult<CommandOutput> {
        let args = command.args().to_vec();
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(RecordedCall {
                repo: repo.to_path_buf(),
                args: args.clone(),
                had_credential: command.credential().is_some(),
                timeout: command.timeout(),
                stdin: command.stdin().map(str::to_string),
            });

        let mut rules = self.rules.lock().unwrap_or_else(PoisonError::into_inner);
        let hit = rules.iter_mut().find(|rule| {
            (rule.sticky || !rule.used) && args.starts_with(&rule.prefix)
        });
        Ok(match hit {
            Some(rule) => {
                rule.used = true;
                rule.output.clone()
            }
            None => CommandOutput::failed(127, format!("unscripted: git {}", args.join(" "))),
        })
    }
}

/// Builds `git status --porcelain=v2 --branch -z` output.
///
/// `records` are complete entries; a rename entry's source path is passed as
/// its own record, as git emits it.
pub fn porcelain(
    branch: Option<&str>,
    upstream: Option<(&str, u32, u32)>,
    records: &[&str],
) -> String {
    let mut out = Vec::new();
    out.push("# branch.oid 1111111111111111111111111111111111111111".to_string());
    out.push(format!("# branch.head {}", branch.unwrap_or("(detached)")));
    if let Some((name, ahead, behind)) = upstream {
        out.push(format!("# branch.upstream {name}"));
        out.push(format!("# branch.ab +{ahead} -{behind}"));
    }
    out.extend(records.iter().map(|r| (*r).to_string()));
    let mut joined = out.join("\0");
    joined.push('\0');
    joined
}

/// Ordinary changed-entry record for `path` with the given `XY` code.
pub fn changed(xy: &str, path: &str) -> String {
    format!("1 {xy} N... 100644 100644 100644 aaaa bbbb {path}")
}

/// Unmerged entry record for `path`.
pub fn unmerged(path: &str) -> String {
    format!("u UU N... 100644 100644 100644 100644 aaaa bbbb cccc {path}")
}

/// Scripts the read-only commands every mutation starts with: a status with
/// `records`, upstream `origin/main` and no operation in progress.
pub fn script_repo(runner: &ScriptedRunner, branch: &str, records: &[&str]) {
    runner
        .always(
            ["status", "--porcelain=v2"],
            CommandOutput::ok(porcelain(Some(branch), Some(("origin/main", 0, 0)), records)),
        )
        .always(["rev-parse", "--git-dir"], CommandOutput::ok("/nonexistent/.git\n"))
        .always(
            ["config", "--get", format!("branch.{branch}.remote").as_str()],
            CommandOutput::ok("origin\n"),
        )
        .always(
            ["config", "--get", format!("branch.{branch}.merge").as_str()],
            CommandOutput::ok("refs/heads/main\n"),
        );
}
