//! In-memory invoker fake (testing only)
//!
//! `RecordingInvoker` never spawns a process. It records every call and
//! replies with a scripted [`CommandOutput`], optionally dropping marker
//! files into the scratch directory named by `SMUGGLER_OUTPUT_DIR`.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use smuggler_core::environment::OUTPUT_DIR_VAR;
use smuggler_core::{env_name, CommandDefinition, CommandEnvironment, Result};

use crate::runner::{CommandInvoker, CommandOutput, ExitOutcome};

/// One recorded invocation.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub command: CommandDefinition,
    pub env: CommandEnvironment,
    pub stdin: Vec<u8>,
    /// Scratch directory the command was pointed at.
    pub output_dir: Option<PathBuf>,
}

/// Scripted invoker that records its calls.
#[derive(Debug, Default)]
pub struct RecordingInvoker {
    stdout: Vec<u8>,
    stderr: Vec<u8>,
    exit_code: i32,
    marker_files: Vec<(String, String)>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl RecordingInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stdout(mut self, stdout: impl Into<Vec<u8>>) -> Self {
        self.stdout = stdout.into();
        self
    }

    pub fn with_stderr(mut self, stderr: impl Into<Vec<u8>>) -> Self {
        self.stderr = stderr.into();
        self
    }

    pub fn with_exit_code(mut self, code: i32) -> Self {
        self.exit_code = code;
        self
    }

    /// Write `contents` to `name` inside the output directory on each call.
    pub fn with_marker_file(mut self, name: impl Into<String>, contents: impl Into<String>) -> Self {
        self.marker_files.push((name.into(), contents.into()));
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn last_call(&self) -> Option<RecordedCall> {
        self.calls.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl CommandInvoker for RecordingInvoker {
    async fn run(
        &self,
        command: &CommandDefinition,
        env: &CommandEnvironment,
        stdin: &[u8],
    ) -> Result<CommandOutput> {
        let output_dir = env.get(&env_name(OUTPUT_DIR_VAR)).map(PathBuf::from);
        if let Some(dir) = &output_dir {
            write_marker_files(dir, &self.marker_files)?;
        }

        self.calls.lock().unwrap().push(RecordedCall {
            command: command.clone(),
            env: env.clone(),
            stdin: stdin.to_vec(),
            output_dir,
        });

        Ok(CommandOutput {
            path: command.path.clone(),
            stdout: self.stdout.clone(),
            stderr: self.stderr.clone(),
            exit: if self.exit_code == 0 {
                ExitOutcome::ok()
            } else {
                ExitOutcome::failed(self.exit_code)
            },
            duration_ms: 0,
        })
    }
}

fn write_marker_files(dir: &Path, files: &[(String, String)]) -> Result<()> {
    for (name, contents) in files {
        std::fs::write(dir.join(name), contents)?;
    }
    Ok(())
}
