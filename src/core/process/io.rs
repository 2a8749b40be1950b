// gitdock: Multi-repository Git sync engine
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Stream draining and waiting for a spawned child.
//!
//! ```text
//! collect()
//!   stdout/stderr drained on their own tasks
//!   stdin written, then closed
//!   wait, or kill once the timeout fires
//!   readers joined (bounded by READER_GRACE after a kill)
//!   --> ProcessOutput
//! ```

use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Child;
use tokio::task::JoinHandle;
use tracing::warn;

use super::builder::{ProcessBuilder, ProcessOutput};
use crate::error::{DockResult, ProcessError};

/// How long readers may lag behind a killed child.
///
/// Helpers spawned by git (ssh, remote-https) can hold the pipes open.
const READER_GRACE: Duration = Duration::from_secs(2);

/// Drains `stream` on its own task so a full pipe never stalls the child.
fn drain<R>(stream: Option<R>) -> Option<JoinHandle<Vec<u8>>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let mut stream = stream?;
    Some(tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Err(e) = stream.read_to_end(&mut buf).await {
            warn!(error = %e, "error reading child output");
        }
        buf
    }))
}

async fn collect_stream(handle: Option<JoinHandle<Vec<u8>>>, grace: Option<Duration>) -> String {
    let Some(handle) = handle else {
        return String::new();
    };
    let bytes = match grace {
        None => handle.await.unwrap_or_default(),
        Some(grace) => {
            let abort = handle.abort_handle();
            tokio::time::timeout(grace, handle)
                .await
                .map_or_else(
                    |_| {
                        abort.abort();
                        Vec::new()
                    },
                    Result::unwrap_or_default,
                )
        }
    };
    String::from_utf8_lossy(&bytes).into_owned()
}

impl ProcessBuilder {
    /// Feeds stdin, waits for `child` and gathers its output.
    pub(super) async fn collect(&self, name: &str, child: &mut Child) -> DockResult<ProcessOutput> {
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let io_failed = |context: &str, e: std::io::Error| ProcessError::OutputError {
            command: name.to_string(),
            message: format!("{context}: {e}"),
        };

        if let Some(input) = self.stdin_content()
            && let Some(mut pipe) = child.stdin.take()
        {
            pipe.write_all(input.as_bytes())
                .await
                .map_err(|e| io_failed("failed to write stdin", e))?;
        }

        let (status, timed_out) = match self.timeout() {
            None => (
                child.wait().await.map_err(|e| io_failed("wait failed", e))?,
                false,
            ),
            Some(limit) => tokio::select! {
                status = child.wait() => (status.map_err(|e| io_failed("wait failed", e))?, false),
                () = tokio::time::sleep(limit) => {
                    warn!(process = %name, timeout = ?limit, "process timed out, killing it");
                    child.kill().await.map_err(|e| io_failed("kill failed", e))?;
                    (child.wait().await.map_err(|e| io_failed("wait failed", e))?, true)
                }
            },
        };

        let grace = timed_out.then_some(READER_GRACE);
        Ok(ProcessOutput::new(
            status.code().unwrap_or(-1),
            collect_stream(stdout, grace).await,
            collect_stream(stderr, grace).await,
            timed_out,
        ))
    }
}
