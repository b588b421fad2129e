//! Error taxonomy for smuggler.
//!
//! "No command configured" is deliberately absent: the registry reports it
//! as `None` and the orchestrator turns it into an empty response.

use std::path::PathBuf;

use super::action::Action;

/// Smuggler errors.
#[derive(Debug, thiserror::Error)]
pub enum SmugglerError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("invalid format in {field}: expected a map of key-value")]
    NotAMap { field: String },

    #[error("invalid version: {0}")]
    InvalidVersion(String),

    #[error("action '{0}' requires a version in the request")]
    MissingVersion(Action),

    #[error("unknown action '{0}', expected one of check/in/out")]
    UnknownAction(String),

    #[error("failed to launch command '{path}': {source}")]
    Launch {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("command '{path}' exited with code {code}")]
    CommandFailed {
        path: String,
        code: i32,
        stdout: Vec<u8>,
        stderr: Vec<u8>,
    },

    #[error("command for action '{0}' produced no version")]
    NoVersionProduced(Action),

    #[error("failed to read marker file {path}: {source}")]
    MarkerFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid local config {path}: {reason}")]
    InvalidConfig { path: PathBuf, reason: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl SmugglerError {
    /// Exit code a caller should terminate with for this error.
    ///
    /// Command failures propagate the child's own exit code; everything else,
    /// including children killed by a signal, maps to 1.
    pub fn exit_code(&self) -> i32 {
        match self {
            SmugglerError::CommandFailed { code, .. } if *code > 0 => *code,
            _ => 1,
        }
    }

    /// Captured child output attached to a command failure, as (stdout, stderr).
    pub fn captured_output(&self) -> Option<(&[u8], &[u8])> {
        match self {
            SmugglerError::CommandFailed { stdout, stderr, .. } => {
                Some((stdout.as_slice(), stderr.as_slice()))
            }
            _ => None,
        }
    }
}

/// Result type for smuggler operations.
pub type Result<T> = std::result::Result<T, SmugglerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_failed_exit_code() {
        let err = SmugglerError::CommandFailed {
            path: "sh".to_string(),
            code: 2,
            stdout: b"out".to_vec(),
            stderr: b"err".to_vec(),
        };
        assert_eq!(err.exit_code(), 2);
        assert!(err.to_string().contains("exited with code 2"));

        let (stdout, stderr) = err.captured_output().unwrap();
        assert_eq!(stdout, b"out");
        assert_eq!(stderr, b"err");
    }

    #[test]
    fn test_other_errors_exit_with_one() {
        let err = SmugglerError::NoVersionProduced(Action::Out);
        assert_eq!(err.exit_code(), 1);
        assert!(err.captured_output().is_none());
        assert!(err.to_string().contains("produced no version"));
    }

    #[test]
    fn test_signal_killed_command_exits_with_one() {
        // Killed by a signal: no exit code, recorded as -1 by the invoker.
        let err = SmugglerError::CommandFailed {
            path: "sh".to_string(),
            code: -1,
            stdout: Vec::new(),
            stderr: Vec::new(),
        };
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_not_a_map_message() {
        let err = SmugglerError::NotAMap {
            field: "params.smuggler_params".to_string(),
        };
        assert!(err.to_string().contains("params.smuggler_params"));
    }
}
