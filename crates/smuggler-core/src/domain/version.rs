//! Versions and metadata exchanged with the CI controller.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::{Result, SmugglerError};
use crate::params::render_env_value;

/// Field used when a version is a single plain identifier.
pub const VERSION_ID_FIELD: &str = "id";

/// An opaque set of named string fields identifying one revision.
///
/// Equality is structural over all fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(try_from = "Value")]
pub struct Version(BTreeMap<String, String>);

impl Version {
    /// A version made of a single `id` field.
    pub fn id(id: impl Into<String>) -> Self {
        let mut fields = BTreeMap::new();
        fields.insert(VERSION_ID_FIELD.to_string(), id.into());
        Self(fields)
    }

    /// Build a version from arbitrary fields.
    pub fn from_fields<K, V>(fields: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self(
            fields
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Convert a JSON value into a version.
    ///
    /// Objects keep their keys and render non-string values as JSON text,
    /// a bare string becomes an `id` version, other scalars use their
    /// literal text as `id`.
    pub fn from_json(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self(
                map.into_iter()
                    .map(|(k, v)| (k, render_env_value(&v)))
                    .collect(),
            )),
            Value::String(s) => Ok(Self::id(s)),
            Value::Bool(_) | Value::Number(_) => Ok(Self::id(value.to_string())),
            Value::Null => Err(SmugglerError::InvalidVersion("null".to_string())),
            Value::Array(_) => Err(SmugglerError::InvalidVersion(format!(
                "expected an object, got {value}"
            ))),
        }
    }

    /// Parse one marker-file line.
    ///
    /// JSON-looking lines are decoded structurally; anything else is wrapped
    /// verbatim as an identifier.
    pub fn from_line(line: &str) -> Self {
        match serde_json::from_str::<Value>(line) {
            Ok(Value::Bool(_) | Value::Number(_)) => Self::id(line),
            Ok(value) => Self::from_json(value).unwrap_or_else(|_| Self::id(line)),
            Err(_) => Self::id(line),
        }
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The identifier exported to commands: the `id` field when present,
    /// otherwise the compact JSON of every field.
    pub fn identifier(&self) -> String {
        match self.get(VERSION_ID_FIELD) {
            Some(id) => id.to_string(),
            None => serde_json::to_string(&self.0).unwrap_or_default(),
        }
    }
}

impl TryFrom<Value> for Version {
    type Error = SmugglerError;

    fn try_from(value: Value) -> Result<Self> {
        Self::from_json(value)
    }
}

/// A name/value annotation attached to a fetched or published version.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MetadataPair {
    pub name: String,
    pub value: String,
}

impl MetadataPair {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Parse a `name=value` marker line.
    ///
    /// Splits on the first `=`, trims spaces and tabs on each side, and
    /// yields an empty value when there is no `=`.
    pub fn from_line(line: &str) -> Self {
        let (name, value) = line.split_once('=').unwrap_or((line, ""));
        Self::new(trim_marker(name), trim_marker(value))
    }
}

/// Trim the characters marker files treat as padding.
pub(crate) fn trim_marker(s: &str) -> &str {
    s.trim_matches(|c| c == ' ' || c == '\t')
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_plain_line_is_identifier() {
        assert_eq!(Version::from_line("1.2.3"), Version::id("1.2.3"));
    }

    #[test]
    fn test_json_object_line_is_structured() {
        let v = Version::from_line(r#"{"ref": "abc", "build": 12}"#);
        assert_eq!(v.get("ref"), Some("abc"));
        assert_eq!(v.get("build"), Some("12"));
        assert_eq!(v.get("id"), None);
    }

    #[test]
    fn test_json_string_line_is_unquoted() {
        assert_eq!(Version::from_line(r#""1.0""#), Version::id("1.0"));
    }

    #[test]
    fn test_numeric_line_keeps_literal_text() {
        assert_eq!(Version::from_line("42"), Version::id("42"));
        assert_eq!(Version::from_line("1.50"), Version::id("1.50"));
    }

    #[test]
    fn test_invalid_json_line_is_identifier() {
        let line = r#"{"a":1 ... invalid"#;
        assert_eq!(Version::from_line(line), Version::id(line));
    }

    #[test]
    fn test_array_line_is_identifier() {
        assert_eq!(Version::from_line("[1,2]"), Version::id("[1,2]"));
    }

    #[test]
    fn test_identifier_prefers_id_field() {
        assert_eq!(Version::id("9.9.9").identifier(), "9.9.9");

        let named = Version::from_fields([("foo", "foo_version"), ("bar", "bar_version")]);
        assert_eq!(
            named.identifier(),
            r#"{"bar":"bar_version","foo":"foo_version"}"#
        );
    }

    #[test]
    fn test_version_deserializes_from_string_or_object() {
        let v: Version = serde_json::from_value(json!("1.2.3")).unwrap();
        assert_eq!(v, Version::id("1.2.3"));

        let v: Version = serde_json::from_value(json!({"id": "1.2.3"})).unwrap();
        assert_eq!(v, Version::id("1.2.3"));

        assert!(serde_json::from_value::<Version>(json!([1])).is_err());
    }

    #[test]
    fn test_version_serializes_as_flat_map() {
        let s = serde_json::to_string(&Version::id("3.2.1")).unwrap();
        assert_eq!(s, r#"{"id":"3.2.1"}"#);
    }

    #[test]
    fn test_metadata_line_trims_each_side() {
        assert_eq!(MetadataPair::from_line("  k = v  "), MetadataPair::new("k", "v"));
        assert_eq!(
            MetadataPair::from_line("\tvalue1=something quite long"),
            MetadataPair::new("value1", "something quite long")
        );
    }

    #[test]
    fn test_metadata_line_splits_on_first_equals() {
        assert_eq!(MetadataPair::from_line("url=a=b"), MetadataPair::new("url", "a=b"));
    }

    #[test]
    fn test_metadata_line_without_equals() {
        assert_eq!(MetadataPair::from_line(" flag "), MetadataPair::new("flag", ""));
    }

    proptest! {
        #[test]
        fn test_padded_metadata_lines_trim_both_sides(
            name in "[a-z_][a-z0-9_]{0,8}",
            value in "[a-z0-9.=]{0,8}",
            pads in prop::collection::vec("[ \t]{0,3}", 4),
        ) {
            let line = format!("{}{}{}={}{}{}", pads[0], name, pads[1], pads[2], value, pads[3]);
            prop_assert_eq!(MetadataPair::from_line(&line), MetadataPair::new(name.as_str(), value));
        }

        #[test]
        fn test_metadata_line_without_separator_has_empty_value(
            name in "[a-z_][a-z0-9_]{0,8}",
            left in "[ \t]{0,3}",
            right in "[ \t]{0,3}",
        ) {
            let line = format!("{left}{name}{right}");
            prop_assert_eq!(MetadataPair::from_line(&line), MetadataPair::new(name.as_str(), ""));
        }
    }
}
