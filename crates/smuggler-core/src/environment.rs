//! Execution environment for resource commands.
//!
//! Entries are ordered: merged parameters first, then the reserved context
//! entries. Applying them in order onto the inherited process environment
//! gives last-write-wins semantics, so callers can never shadow the
//! directories or version injected here.

use std::collections::BTreeMap;
use std::path::Path;

use tracing::warn;

use crate::domain::{Action, ResourceRequest, Result, Version};
use crate::params::{render_env_value, ParamLayer};

/// Namespace prefix of every exported variable.
pub const ENV_PREFIX: &str = "SMUGGLER";

pub const ACTION_VAR: &str = "ACTION";
pub const COMMAND_VAR: &str = "COMMAND";
pub const OUTPUT_DIR_VAR: &str = "OUTPUT_DIR";
pub const VERSION_ID_VAR: &str = "VERSION_ID";
pub const DESTINATION_DIR_VAR: &str = "DESTINATION_DIR";
pub const SOURCES_DIR_VAR: &str = "SOURCES_DIR";

/// Prefix a key with [`ENV_PREFIX`].
pub fn env_name(key: &str) -> String {
    format!("{ENV_PREFIX}_{key}")
}

/// Action-specific values injected under reserved names.
#[derive(Debug, Clone, Copy)]
pub struct ActionContext<'a> {
    pub action: Action,
    pub output_dir: &'a Path,
    pub data_dir: Option<&'a Path>,
    pub version: Option<&'a Version>,
}

/// Ordered environment overlay for a child process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandEnvironment {
    vars: Vec<(String, String)>,
}

impl CommandEnvironment {
    fn push(&mut self, key: &str, value: String) {
        if key.is_empty() || key.contains('=') || key.contains('\0') || value.contains('\0') {
            warn!(key = %key, "Skipping parameter that cannot be exported");
            return;
        }
        self.vars.push((env_name(key), value));
    }

    /// Entries in application order.
    pub fn vars(&self) -> &[(String, String)] {
        &self.vars
    }

    /// Effective value of `name` after all entries are applied.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars
            .iter()
            .rev()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Effective overlay with later entries replacing earlier ones.
    pub fn resolved(&self) -> BTreeMap<String, String> {
        self.vars.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

/// Build the environment overlay from merged parameters and action context.
pub fn build_environment(params: &ParamLayer, context: &ActionContext<'_>) -> CommandEnvironment {
    let mut env = CommandEnvironment::default();

    for (key, value) in params {
        env.push(key, render_env_value(value));
    }

    let action = context.action.name();
    env.push(ACTION_VAR, action.to_string());
    env.push(COMMAND_VAR, action.to_string());
    env.push(OUTPUT_DIR_VAR, path_text(Some(context.output_dir)));

    match context.action {
        Action::Check => push_version(&mut env, context.version),
        Action::In => {
            env.push(DESTINATION_DIR_VAR, path_text(context.data_dir));
            push_version(&mut env, context.version);
        }
        Action::Out => env.push(SOURCES_DIR_VAR, path_text(context.data_dir)),
    }

    env
}

fn push_version(env: &mut CommandEnvironment, version: Option<&Version>) {
    let Some(version) = version else {
        env.push(VERSION_ID_VAR, String::new());
        return;
    };
    for (field, value) in version.fields() {
        env.push(&format!("VERSION_{field}"), value.clone());
    }
    // After the per-field entries so a field literally named `ID` cannot win.
    env.push(VERSION_ID_VAR, version.identifier());
}

fn path_text(path: Option<&Path>) -> String {
    path.map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Environment and stdin payload for running `request`'s command.
#[derive(Debug, Clone)]
pub struct PreparedExecution {
    pub env: CommandEnvironment,
    pub stdin: Vec<u8>,
}

impl PreparedExecution {
    pub fn for_request(request: &ResourceRequest, output_dir: &Path) -> Result<Self> {
        let context = ActionContext {
            action: request.action,
            output_dir,
            data_dir: request.data_dir(),
            version: request.version.as_ref(),
        };
        Ok(Self {
            env: build_environment(&request.merged_params(), &context),
            stdin: request.stdin_payload()?,
        })
    }
}
