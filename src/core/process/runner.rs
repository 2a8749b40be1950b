// gitdock: Multi-repository Git sync engine
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Spawning.
//!
//! ```text
//! run()
//!   command(): args, cwd, env overrides/removals, piped stdio
//!   spawn()    NotFound --> ExecutableNotFound
//!   collect()  --> ProcessOutput
//! ```

use std::fmt::Write as _;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, trace};

use super::builder::{ProcessBuilder, ProcessOutput};
use crate::error::{DockResult, ProcessError};

impl ProcessBuilder {
    /// Program and arguments for log lines. Environment values never appear.
    pub(super) fn command_line(&self) -> String {
        let mut line = self.program().display().to_string();
        for arg in self.arguments() {
            if arg.contains(' ') {
                let _ = write!(line, " \"{arg}\"");
            } else {
                let _ = write!(line, " {arg}");
            }
        }
        line
    }

    /// Spawns the child and waits for it.
    ///
    /// Any exit code, including a timeout kill, comes back as output.
    ///
    /// # Errors
    ///
    /// Returns an error if the program is missing, cannot be spawned, or its
    /// pipes fail.
    pub async fn run(self) -> DockResult<ProcessOutput> {
        let name = self.display_name();
        let line = self.command_line();
        match self.working_dir() {
            Some(cwd) => debug!(cmd = %line, cwd = %cwd.display(), "exec"),
            None => debug!(cmd = %line, "exec"),
        }

        let mut child = self.command().spawn().map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                ProcessError::ExecutableNotFound {
                    name: self.program().display().to_string(),
                }
            } else {
                ProcessError::SpawnFailed {
                    command: line.clone(),
                    source,
                }
            }
        })?;
        trace!(process = %name, pid = ?child.id(), "spawned");

        let output = self.collect(&name, &mut child).await?;
        trace!(
            process = %name,
            exit_code = output.exit_code(),
            timed_out = output.timed_out(),
            "finished"
        );
        Ok(output)
    }

    fn command(&self) -> Command {
        let mut command = Command::new(self.program());
        command.args(self.arguments());
        if let Some(cwd) = self.working_dir() {
            command.current_dir(cwd);
        }
        for key in self.env_removals() {
            command.env_remove(key);
        }
        command
            .envs(self.env_overrides())
            .stdin(if self.stdin_content().is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // A child never outlives the task that started it.
            .kill_on_drop(true);
        command
    }
}
