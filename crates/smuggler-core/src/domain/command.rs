//! Command definitions and the per-resource command table.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::action::Action;

/// Shell used for one-line string commands.
pub const INLINE_SHELL: &str = "sh";

/// An executable and its fixed argument list.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(from = "RawCommand")]
pub struct CommandDefinition {
    pub path: String,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
}

/// Accepted wire forms of a command entry.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawCommand {
    Inline(String),
    Full {
        #[serde(default)]
        path: String,
        #[serde(default)]
        args: Vec<String>,
    },
}

impl From<RawCommand> for CommandDefinition {
    fn from(raw: RawCommand) -> Self {
        match raw {
            RawCommand::Inline(script) => CommandDefinition::inline(script),
            RawCommand::Full { path, args } => CommandDefinition { path, args },
        }
    }
}

impl CommandDefinition {
    pub fn new(path: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            path: path.into(),
            args,
        }
    }

    /// A one-line script run as `sh -e -c <script>`.
    pub fn inline(script: impl Into<String>) -> Self {
        Self {
            path: INLINE_SHELL.to_string(),
            args: vec!["-e".to_string(), "-c".to_string(), script.into()],
        }
    }

    /// A definition is usable only when it names an executable.
    pub fn is_defined(&self) -> bool {
        !self.path.is_empty()
    }
}

/// Mapping from action name to command definition.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct CommandTable(BTreeMap<String, CommandDefinition>);

impl CommandTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, action: Action, command: CommandDefinition) {
        self.0.insert(action.name().to_string(), command);
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, action: Action, command: CommandDefinition) -> Self {
        self.insert(action, command);
        self
    }

    /// Exact-match lookup of the command for `action`.
    ///
    /// `None` means the action is unconfigured; an entry with an empty path
    /// counts as unconfigured too.
    pub fn find(&self, action: Action) -> Option<&CommandDefinition> {
        self.0
            .get(action.name())
            .filter(|command| command.is_defined())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
