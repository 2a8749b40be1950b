// gitdock: Multi-repository Git sync engine
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! The push step shared by `sync`, `commit_and_push`, `push_only` and
//! `delete_last_commit`.
//!
//! ```text
//! plan(branch, upstream)
//!   upstream set          --> push <remote> HEAD:<merge_ref>
//!   none, publishing on   --> push --set-upstream <default_remote> HEAD:refs/heads/<branch>
//!   none, publishing off  --> Precondition
//!
//! Force::WithLease { expected } --> --force-with-lease=<merge_ref>:<expected>
//! Force::Always                 --> --force
//! ```
//!
//! Planning runs no command, so callers can refuse before changing history.

#[cfg(test)]
mod tests;

use std::path::Path;

use tracing::{info, warn};

use super::invoker::CommandInvoker;
use super::status::Upstream;
use crate::auth::Credential;
use crate::error::EngineError;

/// How a push may overwrite the remote branch.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Force {
    #[default]
    No,
    /// Overwrite only if the remote still points at `expected`.
    WithLease { expected: String },
    Always,
}

/// A resolved push.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushPlan {
    pub remote: String,
    pub remote_ref: String,
    /// Sets the upstream of a branch published for the first time.
    pub publish: bool,
}

impl PushPlan {
    fn args(&self, force: &Force) -> Vec<String> {
        let mut args = vec!["push".to_string()];
        if self.publish {
            args.push("--set-upstream".to_string());
        }
        match force {
            Force::No => {}
            Force::WithLease { expected } => {
                args.push(format!("--force-with-lease={}:{expected}", self.remote_ref));
            }
            Force::Always => args.push("--force".to_string()),
        }
        args.push(self.remote.clone());
        args.push(format!("HEAD:{}", self.remote_ref));
        args
    }
}

#[derive(Debug, Clone)]
pub struct PushStep {
    invoker: CommandInvoker,
    default_remote: String,
    publish_new_branches: bool,
}

impl PushStep {
    #[must_use]
    pub fn new(
        invoker: CommandInvoker,
        default_remote: impl Into<String>,
        publish_new_branches: bool,
    ) -> Self {
        Self {
            invoker,
            default_remote: default_remote.into(),
            publish_new_branches,
        }
    }

    /// Decides where `branch` goes.
    ///
    /// # Errors
    ///
    /// Returns `Precondition` when HEAD is detached, or when the branch has no
    /// upstream and publishing new branches is disabled.
    pub fn plan(
        &self,
        branch: Option<&str>,
        upstream: Option<&Upstream>,
    ) -> Result<PushPlan, EngineError> {
        let branch = branch.ok_or_else(|| EngineError::precondition("HEAD is detached"))?;
        match upstream {
            Some(upstream) => Ok(PushPlan {
                remote: upstream.remote.clone(),
                remote_ref: upstream.merge_ref.clone(),
                publish: false,
            }),
            None if self.publish_new_branches => Ok(PushPlan {
                remote: self.default_remote.clone(),
                remote_ref: format!("refs/heads/{branch}"),
                publish: true,
            }),
            None => Err(EngineError::precondition(format!(
                "branch '{branch}' has no upstream"
            ))),
        }
    }

    /// Runs the planned push.
    ///
    /// # Errors
    ///
    /// Returns the classified push failure. Nothing is rolled back.
    pub async fn execute(
        &self,
        repo: &Path,
        plan: &PushPlan,
        force: &Force,
        credential: Option<&Credential>,
    ) -> Result<(), EngineError> {
        if *force != Force::No {
            warn!(repo = %repo.display(), remote = %plan.remote, target = %plan.remote_ref, ?force, "force push");
        }
        let command = self.invoker.network(plan.args(force), credential);
        self.invoker.check(repo, &command).await?;
        info!(
            repo = %repo.display(),
            remote = %plan.remote,
            target = %plan.remote_ref,
            published = plan.publish,
            "pushed"
        );
        Ok(())
    }
}
