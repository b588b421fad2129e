//! Smuggler Runner - command execution for smuggler resources
//!
//! Provides the action orchestrator that:
//! - Resolves the command configured for an action
//! - Runs it with the smuggler environment and request on stdin
//! - Decodes its response from stdout or marker files

pub mod fakes;
pub mod pipeline;
pub mod runner;

// Re-export key types
pub use pipeline::{ActionError, ActionOutcome, ActionPipeline, ActionState, SCRATCH_DIR_PREFIX};
pub use runner::{CommandInvoker, CommandOutput, ExitOutcome, ProcessInvoker};
