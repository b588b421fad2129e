//! Resource lifecycle actions.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::SmugglerError;

/// One of the three lifecycle operations a resource performs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Detect available versions.
    Check,

    /// Materialize a specific version into a directory.
    In,

    /// Publish a new version from a directory.
    Out,
}

impl Action {
    /// All actions, in the order program names are matched against them.
    pub const ALL: [Action; 3] = [Action::Check, Action::In, Action::Out];

    /// Get the action name as used in command tables and environment values.
    pub fn name(&self) -> &'static str {
        match self {
            Action::Check => "check",
            Action::In => "in",
            Action::Out => "out",
        }
    }

    /// Whether this action receives a data directory argument.
    pub fn takes_data_dir(&self) -> bool {
        !matches!(self, Action::Check)
    }

    /// Resolve the action from a program name such as `/opt/resource/check`.
    ///
    /// Matches by substring of the file name, checking `check` first so that
    /// names containing several candidates resolve deterministically.
    pub fn from_program_name(program: &str) -> Option<Action> {
        let base = std::path::Path::new(program)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(program);
        Action::ALL
            .into_iter()
            .find(|action| base.contains(action.name()))
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Action {
    type Err = SmugglerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "check" => Ok(Action::Check),
            "in" => Ok(Action::In),
            "out" => Ok(Action::Out),
            other => Err(SmugglerError::UnknownAction(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_names_round_trip() {
        for action in Action::ALL {
            assert_eq!(action.name().parse::<Action>().unwrap(), action);
        }
        assert!("publish".parse::<Action>().is_err());
    }

    #[test]
    fn test_from_program_name() {
        assert_eq!(Action::from_program_name("/opt/resource/check"), Some(Action::Check));
        assert_eq!(Action::from_program_name("/opt/resource/in"), Some(Action::In));
        assert_eq!(Action::from_program_name("./out"), Some(Action::Out));
        assert_eq!(Action::from_program_name("smuggler-check"), Some(Action::Check));
        assert_eq!(Action::from_program_name("/usr/bin/smuggler"), None);
    }

    #[test]
    fn test_only_file_name_is_matched() {
        assert_eq!(Action::from_program_name("/checkout/bin/smuggler"), None);
    }

    #[test]
    fn test_takes_data_dir() {
        assert!(!Action::Check.takes_data_dir());
        assert!(Action::In.takes_data_dir());
        assert!(Action::Out.takes_data_dir());
    }
}
