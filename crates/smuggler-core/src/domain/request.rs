//! Resource requests as received from the CI controller.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use super::action::Action;
use super::command::CommandTable;
use super::error::{Result, SmugglerError};
use super::version::Version;
use crate::params::{ParamLayer, ParamLayers};

/// Keys of `source` interpreted by smuggler itself.
pub const SOURCE_SCHEMA_KEYS: [&str; 4] = [
    "commands",
    "smuggler_params",
    "smuggler_debug",
    "filter_raw_request",
];

/// Keys of `params` interpreted by smuggler itself.
pub const PARAMS_SCHEMA_KEYS: [&str; 1] = ["smuggler_params"];

/// A parsed request for one action.
///
/// Built once per invocation. The parameter layers, including the layers
/// derived from unrecognised keys, are computed during construction.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceRequest {
    /// Requested action.
    pub action: Action,

    /// Commands declared by the resource.
    pub commands: CommandTable,

    /// Version held or requested by the controller.
    pub version: Option<Version>,

    /// Parameter layers, in merge order.
    pub params: ParamLayers,

    /// Echo log output to stderr.
    pub debug: bool,

    /// Send the filtered request on stdin instead of the original.
    pub filter_raw_request: bool,

    /// Destination (in) or sources (out) directory.
    pub data_dir: Option<PathBuf>,

    original: Value,
    filtered: Value,
}

impl ResourceRequest {
    /// Parse a request from its JSON text.
    pub fn from_json(action: Action, json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json)?;
        Self::from_value(action, value)
    }

    /// Parse a request from an already decoded JSON document.
    pub fn from_value(action: Action, original: Value) -> Result<Self> {
        let root = original
            .as_object()
            .ok_or_else(|| SmugglerError::InvalidRequest("request is not a JSON object".into()))?;

        let source = object_field(root, "source")?;
        let params = object_field(root, "params")?;

        let commands = match source.get("commands") {
            None | Some(Value::Null) => CommandTable::new(),
            Some(value) => serde_json::from_value(value.clone()).map_err(|e| {
                SmugglerError::InvalidRequest(format!("invalid source.commands: {e}"))
            })?,
        };

        let layers = ParamLayers {
            resource_fixed: layer_field(&source, "smuggler_params", "source.smuggler_params")?,
            resource_dynamic: extra_keys(&source, &SOURCE_SCHEMA_KEYS),
            invocation_fixed: layer_field(&params, "smuggler_params", "params.smuggler_params")?,
            invocation_dynamic: extra_keys(&params, &PARAMS_SCHEMA_KEYS),
        };

        let version = match root.get("version") {
            None | Some(Value::Null) => None,
            Some(value) => Some(Version::from_json(value.clone())?),
        };
        if action == Action::In && version.is_none() {
            return Err(SmugglerError::MissingVersion(action));
        }

        let debug = bool_field(&source, "smuggler_debug")?;
        let filter_raw_request = bool_field(&source, "filter_raw_request")?;
        let filtered = filter_request(&original);

        Ok(Self {
            action,
            commands,
            version,
            params: layers,
            debug,
            filter_raw_request,
            data_dir: None,
            original,
            filtered,
        })
    }

    /// Attach the directory passed to `in`/`out`.
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(dir.into());
        self
    }

    pub fn data_dir(&self) -> Option<&Path> {
        self.data_dir.as_deref()
    }

    /// The request exactly as received (after any local config merge).
    pub fn original(&self) -> &Value {
        &self.original
    }

    /// The request with every smuggler-specific key removed.
    pub fn filtered(&self) -> &Value {
        &self.filtered
    }

    /// Merged parameters, highest precedence layer winning.
    pub fn merged_params(&self) -> ParamLayer {
        self.params.merged()
    }

    /// Payload written to the command's stdin.
    pub fn stdin_payload(&self) -> Result<Vec<u8>> {
        let payload = if self.filter_raw_request {
            &self.filtered
        } else {
            &self.original
        };
        Ok(serde_json::to_vec(payload)?)
    }
}

fn object_field(root: &Map<String, Value>, field: &str) -> Result<Map<String, Value>> {
    match root.get(field) {
        None | Some(Value::Null) => Ok(Map::new()),
        Some(Value::Object(map)) => Ok(map.clone()),
        Some(_) => Err(SmugglerError::NotAMap {
            field: field.to_string(),
        }),
    }
}

fn layer_field(parent: &Map<String, Value>, key: &str, field: &str) -> Result<ParamLayer> {
    match parent.get(key) {
        None | Some(Value::Null) => Ok(ParamLayer::new()),
        Some(Value::Object(map)) => Ok(map.iter().map(|(k, v)| (k.clone(), v.clone())).collect()),
        Some(_) => Err(SmugglerError::NotAMap {
            field: field.to_string(),
        }),
    }
}

fn extra_keys(parent: &Map<String, Value>, schema: &[&str]) -> ParamLayer {
    parent
        .iter()
        .filter(|(k, _)| !schema.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

fn bool_field(parent: &Map<String, Value>, key: &str) -> Result<bool> {
    match parent.get(key) {
        None | Some(Value::Null) => Ok(false),
        Some(Value::Bool(b)) => Ok(*b),
        Some(other) => Err(SmugglerError::InvalidRequest(format!(
            "source.{key} must be a boolean, got {other}"
        ))),
    }
}

fn filter_request(original: &Value) -> Value {
    let mut filtered = original.clone();
    if let Some(source) = filtered.get_mut("source").and_then(Value::as_object_mut) {
        for key in SOURCE_SCHEMA_KEYS {
            source.remove(key);
        }
    }
    if let Some(params) = filtered.get_mut("params").and_then(Value::as_object_mut) {
        for key in PARAMS_SCHEMA_KEYS {
            params.remove(key);
        }
    }
    filtered
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn mixed_request() -> Value {
        json!({
            "source": {
                "commands": {"in": "env"},
                "smuggler_params": {"smuggler_param1": "smuggler_val1"},
                "non_smuggler_param1": "non_smuggler_val1"
            },
            "version": {"id": "1.2.3"},
            "params": {
                "smuggler_params": {"smuggler_param2": "smuggler_val2"},
                "non_smuggler_param2": "non_smuggler_val2"
            }
        })
    }

    #[test]
    fn test_layers_are_split_by_schema() {
        let request = ResourceRequest::from_value(Action::In, mixed_request()).unwrap();

        assert_eq!(request.params.resource_fixed["smuggler_param1"], json!("smuggler_val1"));
        assert_eq!(
            request.params.resource_dynamic["non_smuggler_param1"],
            json!("non_smuggler_val1")
        );
        assert!(!request.params.resource_dynamic.contains_key("commands"));
        assert_eq!(request.params.invocation_fixed["smuggler_param2"], json!("smuggler_val2"));
        assert_eq!(
            request.params.invocation_dynamic["non_smuggler_param2"],
            json!("non_smuggler_val2")
        );
        assert!(!request.params.invocation_dynamic.contains_key("smuggler_params"));
        assert_eq!(request.merged_params().len(), 4);
    }

    #[test]
    fn test_version_and_commands_are_parsed() {
        let request = ResourceRequest::from_value(Action::In, mixed_request()).unwrap();
        assert_eq!(request.version, Some(Version::id("1.2.3")));
        assert!(request.commands.find(Action::In).is_some());
        assert!(request.commands.find(Action::Check).is_none());
    }

    #[test]
    fn test_stdin_payload_is_unfiltered_by_default() {
        let request = ResourceRequest::from_value(Action::In, mixed_request()).unwrap();
        let payload: Value = serde_json::from_slice(&request.stdin_payload().unwrap()).unwrap();
        assert_eq!(payload, mixed_request());
    }

    #[test]
    fn test_filter_raw_request_strips_smuggler_keys() {
        let mut raw = mixed_request();
        raw["source"]["filter_raw_request"] = json!(true);
        let request = ResourceRequest::from_value(Action::In, raw).unwrap();
        assert!(request.filter_raw_request);

        let payload: Value = serde_json::from_slice(&request.stdin_payload().unwrap()).unwrap();
        for key in SOURCE_SCHEMA_KEYS {
            assert!(payload["source"].get(key).is_none(), "source.{key} leaked");
        }
        assert!(payload["params"].get("smuggler_params").is_none());
        assert_eq!(payload["source"]["non_smuggler_param1"], json!("non_smuggler_val1"));
        assert_eq!(payload["params"]["non_smuggler_param2"], json!("non_smuggler_val2"));
    }

    #[test]
    fn test_check_without_version_is_accepted() {
        let request =
            ResourceRequest::from_json(Action::Check, r#"{"source": {}, "version": null}"#)
                .unwrap();
        assert!(request.version.is_none());
        assert!(request.commands.is_empty());
    }

    #[test]
    fn test_in_without_version_is_rejected() {
        let err = ResourceRequest::from_json(Action::In, r#"{"source": {}}"#).unwrap_err();
        assert!(matches!(err, SmugglerError::MissingVersion(Action::In)));
    }

    #[test]
    fn test_non_map_smuggler_params_is_rejected() {
        let err = ResourceRequest::from_json(
            Action::Out,
            r#"{"source": {}, "params": {"smuggler_params": "oops"}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, SmugglerError::NotAMap { .. }));
    }

    #[test]
    fn test_non_object_request_is_rejected() {
        assert!(ResourceRequest::from_json(Action::Check, "[]").is_err());
        assert!(ResourceRequest::from_json(Action::Check, "not json").is_err());
    }

    #[test]
    fn test_data_dir_is_attached() {
        let request = ResourceRequest::from_value(Action::In, mixed_request())
            .unwrap()
            .with_data_dir("/some/path");
        assert_eq!(request.data_dir(), Some(Path::new("/some/path")));
    }
}
