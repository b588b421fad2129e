//! Action orchestration: one request, at most one command run.
//!
//! ```text
//! Idle -> CommandResolved -> Executed -> Decoded
//!   \-> Skipped (no command)      any -> Failed
//! ```

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use smuggler_core::{
    decode_response, Action, PreparedExecution, ResourceRequest, ResourceResponse, SmugglerError,
};
use tempfile::TempDir;
use tracing::{debug, info, warn, Instrument, Span};

use crate::runner::{CommandInvoker, CommandOutput};

/// Prefix of per-run scratch output directories.
pub const SCRATCH_DIR_PREFIX: &str = "smuggler-run";

/// Orchestrator state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActionState {
    Idle,
    CommandResolved,
    Executed,
    Decoded,
    /// No command configured for the action; terminal success.
    Skipped,
    Failed,
}

impl ActionState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ActionState::Decoded | ActionState::Skipped | ActionState::Failed
        )
    }
}

impl fmt::Display for ActionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ActionState::Idle => "idle",
            ActionState::CommandResolved => "command_resolved",
            ActionState::Executed => "executed",
            ActionState::Decoded => "decoded",
            ActionState::Skipped => "skipped",
            ActionState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Successful result of one action.
#[derive(Debug, Clone)]
pub struct ActionOutcome {
    /// Terminal state: `Decoded` or `Skipped`.
    pub state: ActionState,

    pub response: ResourceResponse,

    /// Captured output, present when a command ran.
    pub output: Option<CommandOutput>,
}

/// A hard failure of one action.
///
/// The run is in [`ActionState::Failed`]; `reached` is the last state it
/// passed through before failing.
#[derive(Debug, thiserror::Error)]
#[error("{action} action failed after {reached}")]
pub struct ActionError {
    pub action: Action,

    /// Last state reached before failing.
    pub reached: ActionState,

    #[source]
    pub source: SmugglerError,

    /// Captured output, present when a command ran.
    pub output: Option<CommandOutput>,
}

impl ActionError {
    fn new(action: Action, reached: ActionState, source: SmugglerError) -> Self {
        Self {
            action,
            reached,
            source,
            output: None,
        }
    }

    fn with_output(mut self, output: CommandOutput) -> Self {
        self.output = Some(output);
        self
    }

    /// Terminal state of a failed run.
    pub fn state(&self) -> ActionState {
        ActionState::Failed
    }

    /// Exit code the caller should terminate with.
    pub fn exit_code(&self) -> i32 {
        self.source.exit_code()
    }
}

/// Sequences registry lookup, environment build, execution and decoding.
///
/// Log events are emitted inside the span given at construction.
pub struct ActionPipeline<I> {
    invoker: I,
    span: Span,
    scratch_root: Option<PathBuf>,
}

impl<I: CommandInvoker> ActionPipeline<I> {
    pub fn new(invoker: I, span: Span) -> Self {
        Self {
            invoker,
            span,
            scratch_root: None,
        }
    }

    /// Create scratch directories under `root` instead of the system temp dir.
    pub fn with_scratch_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.scratch_root = Some(root.into());
        self
    }

    pub fn invoker(&self) -> &I {
        &self.invoker
    }

    /// Run `request`'s action.
    pub async fn run(&self, request: &ResourceRequest) -> Result<ActionOutcome, ActionError> {
        self.run_action(request)
            .instrument(self.span.clone())
            .await
    }

    async fn run_action(&self, request: &ResourceRequest) -> Result<ActionOutcome, ActionError> {
        let action = request.action;
        let mut state = ActionState::Idle;
        info!(action = %action, state = %state, "Running action");

        let Some(command) = request.commands.find(action) else {
            info!(action = %action, "No command definition, skipping");
            return Ok(ActionOutcome {
                state: ActionState::Skipped,
                response: ResourceResponse::empty(action),
                output: None,
            });
        };
        state = ActionState::CommandResolved;
        debug!(action = %action, state = %state, path = %command.path, "Command resolved");

        // Dropping the TempDir removes the scratch directory on every early return.
        let scratch = self
            .create_scratch_dir()
            .map_err(|e| ActionError::new(action, state, e.into()))?;
        let prepared = PreparedExecution::for_request(request, scratch.path())
            .map_err(|e| ActionError::new(action, state, e))?;

        let output = self
            .invoker
            .run(command, &prepared.env, &prepared.stdin)
            .await
            .map_err(|e| ActionError::new(action, state, e))?;
        if let Some(err) = output.exit_error() {
            warn!(
                action = %action,
                state = %ActionState::Failed,
                exit_code = output.exit.code,
                "Command failed"
            );
            return Err(ActionError::new(action, state, err).with_output(output));
        }
        state = ActionState::Executed;
        debug!(action = %action, state = %state, "Command executed");

        let response = match decode_response(
            &output.stdout,
            scratch.path(),
            action,
            request.version.as_ref(),
        ) {
            Ok(response) => response,
            Err(e) => {
                warn!(
                    action = %action,
                    state = %ActionState::Failed,
                    error = %e,
                    "Failed to decode command response"
                );
                return Err(ActionError::new(action, state, e).with_output(output));
            }
        };

        let scratch_path = scratch.path().to_path_buf();
        if let Err(e) = scratch.close() {
            warn!(dir = %scratch_path.display(), error = %e, "Failed to remove scratch directory");
        }

        info!(
            action = %action,
            versions = ?response.versions,
            version = ?response.version,
            metadata = ?response.metadata,
            "Command reported response"
        );

        Ok(ActionOutcome {
            state: ActionState::Decoded,
            response,
            output: Some(output),
        })
    }

    fn create_scratch_dir(&self) -> std::io::Result<TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(SCRATCH_DIR_PREFIX);
        match &self.scratch_root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(ActionState::Decoded.is_terminal());
        assert!(ActionState::Skipped.is_terminal());
        assert!(ActionState::Failed.is_terminal());
        assert!(!ActionState::Idle.is_terminal());
        assert!(!ActionState::CommandResolved.is_terminal());
        assert!(!ActionState::Executed.is_terminal());
    }

    #[test]
    fn test_action_error_message_and_exit_code() {
        let err = ActionError::new(
            Action::Out,
            ActionState::Executed,
            SmugglerError::NoVersionProduced(Action::Out),
        );
        assert_eq!(err.exit_code(), 1);
        assert_eq!(err.state(), ActionState::Failed);
        assert!(err.state().is_terminal());
        assert_eq!(err.to_string(), "out action failed after executed");
        let source = std::error::Error::source(&err).map(ToString::to_string);
        assert_eq!(
            source.as_deref(),
            Some("command for action 'out' produced no version")
        );
    }
}
