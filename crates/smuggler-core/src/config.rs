//! Local `smuggler.yml` override file.
//!
//! A resource image may ship a config file next to the executable (or at
//! `SMUGGLER_CONFIG`) that provides default commands and parameters. It is
//! merged into the request's `source` before the request is parsed:
//!
//! - `commands` and `smuggler_params` are merged by key, request entries
//!   winning over the file's;
//! - any other top-level key of the file overrides the request's `source`.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::domain::{Result, SmugglerError};

/// File name searched next to the executable.
pub const CONFIG_FILE_NAME: &str = "smuggler.yml";
/// Variable naming the fallback config path.
pub const CONFIG_PATH_VAR: &str = "SMUGGLER_CONFIG";
/// Fallback config path when [`CONFIG_PATH_VAR`] is unset.
pub const DEFAULT_CONFIG_PATH: &str = "/opt/resource/smuggler.yml";

const MERGED_BY_KEY: [&str; 2] = ["commands", "smuggler_params"];

/// A loaded local config file.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalConfig {
    pub path: PathBuf,
    pub values: Map<String, Value>,
}

impl LocalConfig {
    /// Candidate locations, in search order.
    pub fn candidate_paths(program: &Path) -> Vec<PathBuf> {
        let beside_program = program
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(CONFIG_FILE_NAME);
        let fallback = std::env::var(CONFIG_PATH_VAR)
            .ok()
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
        vec![beside_program, PathBuf::from(fallback)]
    }

    /// Load the first existing file among `candidates`.
    pub fn discover(candidates: &[PathBuf]) -> Result<Option<Self>> {
        let Some(path) = candidates.iter().find(|p| p.is_file()) else {
            debug!(candidates = ?candidates, "No local config file found");
            return Ok(None);
        };
        info!(path = %path.display(), "Found local config file");
        Self::load(path).map(Some)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(path, &text)
    }

    /// Parse YAML text. An empty document is an empty config.
    pub fn parse(path: &Path, text: &str) -> Result<Self> {
        let invalid = |reason: String| SmugglerError::InvalidConfig {
            path: path.to_path_buf(),
            reason,
        };
        let parsed: Option<Value> =
            serde_yaml::from_str(text).map_err(|e| invalid(e.to_string()))?;
        let values = match parsed {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(map)) => map,
            Some(_) => return Err(invalid("top level is not a map".to_string())),
        };
        Ok(Self {
            path: path.to_path_buf(),
            values,
        })
    }

    /// Merge this config into a raw request document.
    pub fn merge_into(&self, request: &mut Value) -> Result<()> {
        let root = request
            .as_object_mut()
            .ok_or_else(|| SmugglerError::InvalidRequest("request is not a JSON object".into()))?;
        let source = root
            .entry("source")
            .or_insert_with(|| Value::Object(Map::new()));
        if source.is_null() {
            *source = Value::Object(Map::new());
        }
        let source = source.as_object_mut().ok_or_else(|| SmugglerError::NotAMap {
            field: "source".to_string(),
        })?;

        for (key, value) in &self.values {
            if MERGED_BY_KEY.contains(&key.as_str()) {
                let merged = merge_by_key(source.get(key), value, key)?;
                source.insert(key.clone(), merged);
            } else {
                source.insert(key.clone(), value.clone());
            }
        }
        Ok(())
    }
}

/// Union of two maps where `ours` wins on collision.
fn merge_by_key(ours: Option<&Value>, theirs: &Value, field: &str) -> Result<Value> {
    let not_a_map = || SmugglerError::NotAMap {
        field: field.to_string(),
    };
    let ours = match ours {
        None | Some(Value::Null) => return Ok(theirs.clone()),
        Some(Value::Object(map)) => map,
        Some(_) => return Err(not_a_map()),
    };
    let mut merged = match theirs {
        Value::Null => Map::new(),
        Value::Object(map) => map.clone(),
        _ => return Err(not_a_map()),
    };
    for (k, v) in ours {
        merged.insert(k.clone(), v.clone());
    }
    Ok(Value::Object(merged))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    const FULL_CONFIG: &str = r#"
commands:
  check: echo from config file
  in:
    path: sh
    args: ["-c", "echo config in"]
smuggler_params:
  config_param1: param_in_config
  shared: from_config
filter_raw_request: true
"#;

    fn config() -> LocalConfig {
        LocalConfig::parse(Path::new("smuggler.yml"), FULL_CONFIG).unwrap()
    }

    #[test]
    fn test_empty_file_is_empty_config() {
        let cfg = LocalConfig::parse(Path::new("smuggler.yml"), "").unwrap();
        assert!(cfg.values.is_empty());

        let mut request = json!({"source": {"commands": {"check": "true"}}});
        let before = request.clone();
        cfg.merge_into(&mut request).unwrap();
        assert_eq!(request, before);
    }

    #[test]
    fn test_request_commands_win_over_config() {
        let mut request = json!({
            "source": {
                "commands": {"in": "echo from definition"},
                "smuggler_params": {"shared": "from_request"}
            }
        });
        config().merge_into(&mut request).unwrap();

        let source = &request["source"];
        assert_eq!(source["commands"]["in"], json!("echo from definition"));
        assert_eq!(source["commands"]["check"], json!("echo from config file"));
        assert_eq!(source["smuggler_params"]["shared"], json!("from_request"));
        assert_eq!(source["smuggler_params"]["config_param1"], json!("param_in_config"));
    }

    #[test]
    fn test_other_config_keys_override_source() {
        let mut request = json!({"source": {"filter_raw_request": false}});
        config().merge_into(&mut request).unwrap();
        assert_eq!(request["source"]["filter_raw_request"], json!(true));
    }

    #[test]
    fn test_missing_source_is_created() {
        let mut request = json!({"version": {"id": "1"}});
        config().merge_into(&mut request).unwrap();
        assert_eq!(request["source"]["commands"]["check"], json!("echo from config file"));
    }

    #[test]
    fn test_non_map_commands_is_rejected() {
        let mut request = json!({"source": {"commands": "oops"}});
        assert!(config().merge_into(&mut request).is_err());
    }

    #[test]
    fn test_non_map_top_level_is_rejected() {
        assert!(LocalConfig::parse(Path::new("smuggler.yml"), "- a\n- b\n").is_err());
    }

    #[test]
    fn test_discover_first_existing_file() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("missing.yml");
        let present = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&present, FULL_CONFIG).unwrap();

        let found = LocalConfig::discover(&[missing.clone(), present.clone()])
            .unwrap()
            .unwrap();
        assert_eq!(found.path, present);

        assert!(LocalConfig::discover(&[missing]).unwrap().is_none());
    }

    #[test]
    fn test_candidate_paths_start_beside_program() {
        let paths = LocalConfig::candidate_paths(Path::new("/opt/resource/check"));
        assert_eq!(paths[0], PathBuf::from("/opt/resource/smuggler.yml"));
        assert_eq!(paths.len(), 2);
    }
}
