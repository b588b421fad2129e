//! Resource responses returned to the CI controller.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::action::Action;
use super::version::{MetadataPair, Version};

/// Outcome of one action.
///
/// `check` populates `versions`; `in` and `out` populate `version`.
/// Metadata is carried for every action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceResponse {
    pub action: Action,
    pub version: Option<Version>,
    pub versions: Vec<Version>,
    pub metadata: Vec<MetadataPair>,
}

/// Wire shape of an `in`/`out` response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InOutResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<Version>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub metadata: Vec<MetadataPair>,
}

impl ResourceResponse {
    /// An empty response for `action`.
    pub fn empty(action: Action) -> Self {
        Self {
            action,
            version: None,
            versions: Vec::new(),
            metadata: Vec::new(),
        }
    }

    /// No version, no versions and no metadata.
    pub fn is_empty(&self) -> bool {
        self.version.is_none() && self.versions.is_empty() && self.metadata.is_empty()
    }

    /// The JSON document written back to the controller.
    ///
    /// `check` answers with a bare array of versions, `in`/`out` with an
    /// object holding the version and metadata.
    pub fn to_wire(&self) -> serde_json::Result<Value> {
        match self.action {
            Action::Check => serde_json::to_value(&self.versions),
            Action::In | Action::Out => serde_json::to_value(InOutResponse {
                version: self.version.clone(),
                metadata: self.metadata.clone(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_response() {
        let response = ResourceResponse::empty(Action::Check);
        assert!(response.is_empty());
        assert_eq!(response.to_wire().unwrap(), json!([]));

        let response = ResourceResponse::empty(Action::In);
        assert_eq!(response.to_wire().unwrap(), json!({}));
    }

    #[test]
    fn test_metadata_alone_is_not_empty() {
        let mut response = ResourceResponse::empty(Action::Out);
        response.metadata.push(MetadataPair::new("k", "v"));
        assert!(!response.is_empty());
    }

    #[test]
    fn test_check_wire_is_version_array() {
        let mut response = ResourceResponse::empty(Action::Check);
        response.versions = vec![Version::id("1.2.3"), Version::id("1.2.4")];
        assert_eq!(
            response.to_wire().unwrap(),
            json!([{"id": "1.2.3"}, {"id": "1.2.4"}])
        );
    }

    #[test]
    fn test_in_wire_is_version_and_metadata() {
        let response = ResourceResponse {
            action: Action::In,
            version: Some(Version::id("3.2.1")),
            versions: Vec::new(),
            metadata: vec![MetadataPair::new("k", "v")],
        };
        assert_eq!(
            response.to_wire().unwrap(),
            json!({"version": {"id": "3.2.1"}, "metadata": [{"name": "k", "value": "v"}]})
        );
    }
}
