//! Runs the external obfuscator as a child process.
//!
//! One request maps to one child: the source is written to the workspace
//! input file, the tool is spawned from its own installation directory with a
//! fixed argument list, and its exit is awaited under a hard timeout.

use std::process::{ExitStatus, Stdio};
use std::time::Instant;

use async_trait::async_trait;
use luaguard_core::{Profile, TransformOutcome, TransformRequest};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::config::ToolConfig;
use crate::traits::Transformer;
use crate::workspace::Workspace;

/// [`Transformer`] backed by the configured executable.
#[derive(Debug, Clone)]
pub struct ProcessTransformer {
    config: ToolConfig,
}

impl ProcessTransformer {
    #[must_use]
    pub fn new(config: ToolConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &ToolConfig {
        &self.config
    }

    /// `<executable> <script> --preset <profile> --out <output> <input>`
    ///
    /// Arguments go straight to `execve`; nothing is interpreted by a shell.
    fn command(&self, workspace: &Workspace, profile: Profile) -> Command {
        let mut cmd = Command::new(&self.config.executable);
        cmd.arg(&self.config.script)
            .arg("--preset")
            .arg(profile.as_str())
            .arg("--out")
            .arg(workspace.output_path())
            .arg(workspace.input_path())
            .current_dir(&self.config.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl Transformer for ProcessTransformer {
    async fn transform(
        &self,
        workspace: &Workspace,
        request: &TransformRequest,
    ) -> TransformOutcome {
        if let Err(e) = tokio::fs::write(workspace.input_path(), request.source()).await {
            warn!(error = %e, "failed to write tool input");
            return TransformOutcome::SpawnError(format!("failed to stage input: {e}"));
        }

        let mut child = match self.command(workspace, request.profile()).spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!(executable = %self.config.executable, error = %e, "failed to spawn tool");
                return TransformOutcome::SpawnError(e.to_string());
            }
        };
        debug!(pid = ?child.id(), profile = %request.profile(), "tool spawned");

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let started = Instant::now();

        // Pipes are drained while waiting so a chatty tool cannot block on a
        // full pipe buffer. Only the first `max_output_bytes` of each are kept.
        let limit = self.config.max_output_bytes;
        let waited = tokio::time::timeout(self.config.timeout, async {
            tokio::join!(
                child.wait(),
                read_capped(stdout, limit),
                read_capped(stderr, limit)
            )
        })
        .await;

        #[allow(clippy::cast_possible_truncation)]
        let duration_ms = started.elapsed().as_millis() as u64;

        let (status, stdout, stderr) = match waited {
            Ok((Ok(status), stdout, stderr)) => (status, stdout, stderr),
            Ok((Err(e), _, _)) => {
                warn!(error = %e, "failed to wait for tool");
                return TransformOutcome::ToolFailure(format!("failed to wait for tool: {e}"));
            }
            Err(_elapsed) => {
                // kill() also reaps, so the process is gone once this returns.
                if let Err(e) = child.kill().await {
                    warn!(error = %e, "failed to kill timed-out tool");
                }
                warn!(timeout_ms = duration_ms, "tool timed out");
                return TransformOutcome::Timeout {
                    after: self.config.timeout,
                };
            }
        };

        info!(status = %status, duration_ms, profile = %request.profile(), "tool exited");

        if !status.success() {
            return TransformOutcome::ToolFailure(diagnostic(status, &stdout, &stderr));
        }

        match tokio::fs::read(workspace.output_path()).await {
            Ok(bytes) => TransformOutcome::Success(bytes),
            Err(e) => {
                warn!(error = %e, "tool succeeded but output is unreadable");
                TransformOutcome::ToolFailure(format!(
                    "tool exited successfully but produced no readable output: {e}"
                ))
            }
        }
    }
}

/// Reads `pipe` to EOF, keeping at most `limit` bytes and discarding the rest.
async fn read_capped<R: AsyncRead + Unpin>(pipe: Option<R>, limit: usize) -> Vec<u8> {
    let mut kept = Vec::new();
    let Some(pipe) = pipe else {
        return kept;
    };

    let mut head = pipe.take(u64::try_from(limit).unwrap_or(u64::MAX));
    if let Err(e) = head.read_to_end(&mut kept).await {
        debug!(error = %e, "tool pipe closed early");
        return kept;
    }

    match tokio::io::copy(&mut head.into_inner(), &mut tokio::io::sink()).await {
        Ok(0) => {}
        Ok(discarded) => warn!(kept = kept.len(), discarded, "tool output truncated"),
        Err(e) => debug!(error = %e, "tool pipe closed early"),
    }
    kept
}

/// Tool's own words for the failure: stderr, else stdout, else the exit status.
fn diagnostic(status: ExitStatus, stdout: &[u8], stderr: &[u8]) -> String {
    if !stderr.is_empty() {
        into_text(stderr.to_vec())
    } else if !stdout.is_empty() {
        into_text(stdout.to_vec())
    } else {
        format!("tool exited with {status}")
    }
}

/// Diagnostic text; invalid UTF-8 sequences become U+FFFD.
fn into_text(bytes: Vec<u8>) -> String {
    String::from_utf8(bytes)
        .unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned())
}
