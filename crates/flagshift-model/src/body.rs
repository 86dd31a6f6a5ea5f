//! Destination creation bodies
//!
//! Each body carries only fields the destination creation endpoint
//! recognizes. Mutually exclusive availability settings are sum types, so a
//! body cannot hold both.

use crate::snapshot::{ClientSideAvailability, FlagDefaults};
use serde::Serialize;
use serde_json::{Map, Value};

/// Project-level availability, exactly one of the two wire fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ProjectAvailability {
    /// Current field
    #[serde(rename = "defaultClientSideAvailability")]
    ClientSide(ClientSideAvailability),
    /// Legacy field
    #[serde(rename = "includeInSnippetByDefault")]
    LegacySnippet(bool),
}

/// Flag-level availability, exactly one of the two wire fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FlagAvailability {
    /// Current field
    #[serde(rename = "clientSideAvailability")]
    ClientSide(ClientSideAvailability),
    /// Legacy field
    #[serde(rename = "includeInSnippet")]
    LegacySnippet(bool),
}

/// `POST projects`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectCreateBody {
    /// Destination project key
    pub key: String,
    /// Destination display name
    pub name: String,
    /// Tags
    pub tags: Vec<String>,
    /// Environments created together with the project
    pub environments: Vec<EnvironmentCreateBody>,
    /// Availability, if the source had either setting
    #[serde(flatten)]
    pub availability: Option<ProjectAvailability>,
}

/// Environment entry inside [`ProjectCreateBody`]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentCreateBody {
    /// Display name
    pub name: String,
    /// Environment key
    pub key: String,
    /// Hex color
    pub color: String,
    /// Default TTL in minutes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_ttl: Option<u64>,
    /// Require change confirmation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirm_changes: Option<bool>,
    /// Secure mode
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secure_mode: Option<bool>,
    /// Track events by default
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_track_events: Option<bool>,
    /// Tags
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

/// `POST segments/{projectKey}/{envKey}`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentCreateBody {
    /// Display name
    pub name: String,
    /// Segment key
    pub key: String,
    /// Tags
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    /// Description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Variation without its source identifier
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariationBody {
    /// Served value
    pub value: Value,
    /// Display name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// `POST flags/{projectKey}`
///
/// Only global, environment-independent fields. Targeting is applied
/// afterwards through per-environment patches.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlagCreateBody {
    /// Flag key
    pub key: String,
    /// Display name
    pub name: String,
    /// Variations in index order
    pub variations: Vec<VariationBody>,
    /// Temporary flag marker
    pub temporary: bool,
    /// Tags
    pub tags: Vec<String>,
    /// Description
    pub description: String,
    /// Availability, if the source had either setting
    #[serde(flatten)]
    pub availability: Option<FlagAvailability>,
    /// Custom properties
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_properties: Option<Map<String, Value>>,
    /// Defaults for new environments
    #[serde(skip_serializing_if = "Option::is_none")]
    pub defaults: Option<FlagDefaults>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn project(availability: Option<ProjectAvailability>) -> ProjectCreateBody {
        ProjectCreateBody {
            key: "web".into(),
            name: "Web".into(),
            tags: vec![],
            environments: vec![],
            availability,
        }
    }

    #[test]
    fn project_availability_flattens_to_single_field() {
        let body = project(Some(ProjectAvailability::ClientSide(ClientSideAvailability {
            using_mobile_key: true,
            using_environment_id: false,
        })));
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({
                "key": "web", "name": "Web", "tags": [], "environments": [],
                "defaultClientSideAvailability": {"usingMobileKey": true, "usingEnvironmentId": false}
            })
        );

        let legacy = project(Some(ProjectAvailability::LegacySnippet(false)));
        let value = serde_json::to_value(&legacy).unwrap();
        assert_eq!(value["includeInSnippetByDefault"], json!(false));
        assert!(value.get("defaultClientSideAvailability").is_none());
    }

    #[test]
    fn project_without_availability_omits_both() {
        let value = serde_json::to_value(project(None)).unwrap();
        assert!(value.get("defaultClientSideAvailability").is_none());
        assert!(value.get("includeInSnippetByDefault").is_none());
    }

    #[test]
    fn environment_omits_absent_fields() {
        let body = EnvironmentCreateBody {
            name: "Test".into(),
            key: "test".into(),
            color: "fff".into(),
            default_ttl: None,
            confirm_changes: Some(false),
            secure_mode: None,
            default_track_events: None,
            tags: None,
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({"name": "Test", "key": "test", "color": "fff", "confirmChanges": false})
        );
    }
}
