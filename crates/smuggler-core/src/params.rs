//! Parameter layers and their merge.
//!
//! A request carries four layers. They are combined with a fixed
//! precedence, lowest first:
//!
//! 1. resource-fixed (`source.smuggler_params`)
//! 2. resource-dynamic (remaining `source` keys)
//! 3. invocation-fixed (`params.smuggler_params`)
//! 4. invocation-dynamic (remaining `params` keys)
//!
//! Values are never coerced here; [`render_env_value`] is the only place a
//! value becomes text.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A named set of JSON-typed parameters.
pub type ParamLayer = BTreeMap<String, Value>;

/// The four parameter layers of a request.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ParamLayers {
    pub resource_fixed: ParamLayer,
    pub resource_dynamic: ParamLayer,
    pub invocation_fixed: ParamLayer,
    pub invocation_dynamic: ParamLayer,
}

impl ParamLayers {
    /// Flatten the layers into one mapping.
    pub fn merged(&self) -> ParamLayer {
        merge_layers(
            &self.resource_fixed,
            &self.resource_dynamic,
            &self.invocation_fixed,
            &self.invocation_dynamic,
        )
    }
}

/// Merge four layers; on key collision the later layer wins.
pub fn merge_layers(
    resource_fixed: &ParamLayer,
    resource_dynamic: &ParamLayer,
    invocation_fixed: &ParamLayer,
    invocation_dynamic: &ParamLayer,
) -> ParamLayer {
    let mut merged = ParamLayer::new();
    for layer in [
        resource_fixed,
        resource_dynamic,
        invocation_fixed,
        invocation_dynamic,
    ] {
        merged.extend(layer.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
    merged
}

/// Render a parameter value as environment text.
///
/// Strings pass through unquoted; every other value becomes compact JSON,
/// so booleans read `true`/`false` and objects keep their structure.
pub fn render_env_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
