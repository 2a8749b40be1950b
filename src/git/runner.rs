// gitdock: Multi-repository Git sync engine
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Production [`CommandRunner`] backed by the git CLI.
//!
//! ```text
//! GitCommand --> ProcessBuilder(git)
//!                  cwd = repo
//!                  GIT_TERMINAL_PROMPT=0, GCM_INTERACTIVE=never, LC_ALL=C
//!                  credential? --> GIT_CONFIG_* helper + token env var
//!                  timeout?    --> kill, timed_out = true
//!            --> CommandOutput
//! ```

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use super::{CommandOutput, CommandRunner, GitCommand};
use crate::auth::Credential;
use crate::core::process::builder::ProcessBuilder;
use crate::error::DockResult;

/// Environment variable carrying the token into the credential helper.
const TOKEN_VAR: &str = "GITDOCK_CREDENTIAL_TOKEN";
/// Environment variable carrying the username into the credential helper.
const USER_VAR: &str = "GITDOCK_CREDENTIAL_USER";

/// Inline credential helper. It answers `get` from the environment, so the
/// secret is never part of the command line or any config file.
const CREDENTIAL_HELPER: &str = "!f() { test \"$1\" = get || exit 0; \
     echo \"username=$GITDOCK_CREDENTIAL_USER\"; \
     echo \"password=$GITDOCK_CREDENTIAL_TOKEN\"; }; f";

/// Runs git as a child process.
#[derive(Debug, Clone)]
pub struct GitCli {
    program: PathBuf,
}

impl GitCli {
    /// Uses `program` as the git executable.
    ///
    /// A bare name is resolved via PATH once, up front.
    ///
    /// # Errors
    ///
    /// Returns an error if a bare program name is not found in PATH.
    pub fn new(program: impl AsRef<Path>) -> DockResult<Self> {
        let program = program.as_ref();
        let is_bare = program.components().count() == 1 && !program.is_absolute();
        let program = if is_bare {
            ProcessBuilder::which(&program.to_string_lossy())?
                .program()
                .clone()
        } else {
            program.to_path_buf()
        };
        Ok(Self { program })
    }

    #[must_use]
    pub fn program(&self) -> &Path {
        &self.program
    }

    fn apply_credential(builder: ProcessBuilder, credential: &Credential) -> ProcessBuilder {
        // The empty helper first resets helpers from user/system config so the
        // account token is the only answer git receives.
        builder
            .env("GIT_CONFIG_COUNT", "2")
            .env("GIT_CONFIG_KEY_0", "credential.helper")
            .env("GIT_CONFIG_VALUE_0", "")
            .env("GIT_CONFIG_KEY_1", "credential.helper")
            .env("GIT_CONFIG_VALUE_1", CREDENTIAL_HELPER)
            .env(USER_VAR, credential.username())
            .env(TOKEN_VAR, credential.expose_secret())
    }
}

#[async_trait]
impl CommandRunner for GitCli {
    async fn run(&self, repo: &Path, command: &GitCommand) -> DockResult<CommandOutput> {
        let mut builder = ProcessBuilder::new(&self.program)
            .name("git")
            .args(command.args())
            .cwd(repo)
            .env("GIT_TERMINAL_PROMPT", "0")
            .env("GCM_INTERACTIVE", "never")
            .env("LC_ALL", "C")
            .env_remove(TOKEN_VAR)
            .timeout_opt(command.timeout());

        if let Some(credential) = command.credential() {
            builder = Self::apply_credential(builder, credential);
        }
        if let Some(input) = command.stdin() {
            builder = builder.stdin(input);
        }

        let output = builder.run().await?;
        let timed_out = output.timed_out();
        let exit_code = output.exit_code();
        let (stdout, stderr) = output.into_streams();
        Ok(CommandOutput {
            exit_code,
            stdout,
            stderr,
            timed_out,
        })
    }
}
