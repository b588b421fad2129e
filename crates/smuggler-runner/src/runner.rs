//! Command execution with captured output.

use std::io::ErrorKind;
use std::process::Stdio;
use std::time::Instant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use smuggler_core::{CommandDefinition, CommandEnvironment, Result, SmugglerError};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// How a child process ended.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExitOutcome {
    /// Whether the process exited with status 0.
    pub success: bool,

    /// Exit code, -1 when the process was terminated by a signal.
    pub code: i32,
}

impl ExitOutcome {
    pub fn ok() -> Self {
        Self {
            success: true,
            code: 0,
        }
    }

    pub fn failed(code: i32) -> Self {
        Self {
            success: false,
            code,
        }
    }
}

/// Everything captured from one command run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommandOutput {
    /// Command path that was run.
    pub path: String,

    /// Captured stdout.
    pub stdout: Vec<u8>,

    /// Captured stderr, never interleaved with stdout.
    pub stderr: Vec<u8>,

    /// Exit status.
    pub exit: ExitOutcome,

    /// Duration in milliseconds.
    pub duration_ms: u64,
}

impl CommandOutput {
    /// Whether this run passed (exit code 0).
    pub fn passed(&self) -> bool {
        self.exit.success && self.exit.code == 0
    }

    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }

    /// The error value for a failed run, carrying both output streams.
    ///
    /// `None` when the run passed.
    pub fn exit_error(&self) -> Option<SmugglerError> {
        if self.passed() {
            return None;
        }
        Some(SmugglerError::CommandFailed {
            path: self.path.clone(),
            code: self.exit.code,
            stdout: self.stdout.clone(),
            stderr: self.stderr.clone(),
        })
    }
}

/// Runs one command to completion.
///
/// A launch failure is an `Err`; a non-zero exit is reported through
/// [`CommandOutput::exit`] so captured output is never lost.
#[async_trait]
pub trait CommandInvoker: Send + Sync {
    async fn run(
        &self,
        command: &CommandDefinition,
        env: &CommandEnvironment,
        stdin: &[u8],
    ) -> Result<CommandOutput>;
}

/// Invoker backed by real child processes.
///
/// The child inherits the parent environment, with `env` applied on top in
/// order. There is no timeout: a hung command hangs the invocation.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessInvoker;

#[async_trait]
impl CommandInvoker for ProcessInvoker {
    async fn run(
        &self,
        command: &CommandDefinition,
        env: &CommandEnvironment,
        stdin: &[u8],
    ) -> Result<CommandOutput> {
        let start = Instant::now();
        let launch_error = |source: std::io::Error| SmugglerError::Launch {
            path: command.path.clone(),
            source,
        };

        info!(
            path = %command.path,
            args = ?command.args,
            env_vars = env.len(),
            "Running command"
        );
        for (key, value) in env.vars() {
            debug!(key = %key, value = %value, "Command environment");
        }

        let mut child = Command::new(&command.path)
            .args(&command.args)
            .envs(env.vars().iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(launch_error)?;

        // Feed stdin concurrently so a child writing before it reads cannot block.
        let child_stdin = child.stdin.take();
        let payload = stdin.to_vec();
        let feeder = tokio::spawn(async move {
            match child_stdin {
                Some(mut pipe) => {
                    pipe.write_all(&payload).await?;
                    pipe.shutdown().await
                }
                None => Ok(()),
            }
        });

        let output = child.wait_with_output().await.map_err(launch_error)?;

        match feeder.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) if e.kind() == ErrorKind::BrokenPipe => {
                debug!(path = %command.path, "Command exited without reading stdin");
            }
            Ok(Err(e)) => warn!(path = %command.path, error = %e, "Failed to write command stdin"),
            Err(e) => warn!(path = %command.path, error = %e, "Stdin writer task failed"),
        }

        let duration_ms = start.elapsed().as_millis() as u64;
        let exit = ExitOutcome {
            success: output.status.success(),
            code: output.status.code().unwrap_or(-1),
        };

        info!(
            path = %command.path,
            exit_code = exit.code,
            duration_ms,
            stdout_bytes = output.stdout.len(),
            stderr_bytes = output.stderr.len(),
            "Command finished"
        );

        Ok(CommandOutput {
            path: command.path.clone(),
            stdout: output.stdout,
            stderr: output.stderr,
            exit,
            duration_ms,
        })
    }
}
