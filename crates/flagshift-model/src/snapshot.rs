//! Source snapshots
//!
//! These mirror the documents the source fetcher persists. They are read once
//! and never mutated; projection into destination bodies happens elsewhere.

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// A list that the vendor API sometimes wraps as `{ "items": [...] }`
///
/// Both shapes deserialize to the same thing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ItemList<T> {
    /// Plain JSON array
    Bare(Vec<T>),
    /// Vendor envelope
    Envelope {
        /// Wrapped items
        items: Vec<T>,
    },
}

impl<T> ItemList<T> {
    /// Unwrap into the contained items
    #[inline]
    #[must_use]
    pub fn into_vec(self) -> Vec<T> {
        match self {
            Self::Bare(items) | Self::Envelope { items } => items,
        }
    }
}

impl<T> Default for ItemList<T> {
    fn default() -> Self {
        Self::Bare(Vec::new())
    }
}

fn item_list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<ItemList<T>>::deserialize(deserializer)?
        .map(ItemList::into_vec)
        .unwrap_or_default())
}

/// Which SDK credentials may read a flag client-side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientSideAvailability {
    /// Mobile key access
    #[serde(default)]
    pub using_mobile_key: bool,
    /// Client-side ID access
    #[serde(default)]
    pub using_environment_id: bool,
}

/// Project as stored in `project.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSnapshot {
    /// Project key
    pub key: String,
    /// Display name
    pub name: String,
    /// Tags
    #[serde(default)]
    pub tags: Vec<String>,
    /// Environments, in source order
    #[serde(default, deserialize_with = "item_list")]
    pub environments: Vec<EnvironmentSnapshot>,
    /// Current availability setting
    #[serde(default)]
    pub default_client_side_availability: Option<ClientSideAvailability>,
    /// Legacy availability setting
    #[serde(default)]
    pub include_in_snippet_by_default: Option<bool>,
}

impl ProjectSnapshot {
    /// Environment keys in source order
    #[must_use]
    pub fn environment_keys(&self) -> Vec<&str> {
        self.environments.iter().map(|e| e.key.as_str()).collect()
    }
}

/// Environment as embedded in `project.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentSnapshot {
    /// Environment key
    pub key: String,
    /// Display name
    pub name: String,
    /// Hex color without `#`
    pub color: String,
    /// Default TTL in minutes
    #[serde(default)]
    pub default_ttl: Option<u64>,
    /// Whether changes require confirmation
    #[serde(default)]
    pub confirm_changes: Option<bool>,
    /// Secure mode for client-side SDKs
    #[serde(default)]
    pub secure_mode: Option<bool>,
    /// Track events by default
    #[serde(default)]
    pub default_track_events: Option<bool>,
    /// Tags
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

/// Segment as stored in `segment-<env>.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentSnapshot {
    /// Segment key
    pub key: String,
    /// Display name
    pub name: String,
    /// Tags
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    /// Description
    #[serde(default)]
    pub description: Option<String>,
    /// Big/synced segment; never migrated
    #[serde(default)]
    pub unbounded: bool,
    /// Explicitly included context keys
    #[serde(default)]
    pub included: Option<Vec<String>>,
    /// Explicitly excluded context keys
    #[serde(default)]
    pub excluded: Option<Vec<String>>,
    /// Targeting rules, first match wins
    #[serde(default)]
    pub rules: Option<Vec<Rule>>,
}

/// One flag variation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variation {
    /// Source-assigned identifier, dropped on projection
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Served value
    pub value: Value,
    /// Display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Default on/off variation indexes for new environments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlagDefaults {
    /// Variation served when targeting is on
    pub on_variation: u32,
    /// Variation served when targeting is off
    pub off_variation: u32,
}

/// Flag as stored in `flags/<flagKey>.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlagSnapshot {
    /// Flag key
    pub key: String,
    /// Display name
    pub name: String,
    /// Variations in index order
    pub variations: Vec<Variation>,
    /// Temporary flag marker
    #[serde(default)]
    pub temporary: bool,
    /// Tags
    #[serde(default)]
    pub tags: Vec<String>,
    /// Description
    #[serde(default)]
    pub description: String,
    /// Current availability setting
    #[serde(default)]
    pub client_side_availability: Option<ClientSideAvailability>,
    /// Legacy availability setting
    #[serde(default)]
    pub include_in_snippet: Option<bool>,
    /// Custom properties, passed through untouched
    #[serde(default)]
    pub custom_properties: Option<Map<String, Value>>,
    /// Defaults for new environments
    #[serde(default)]
    pub defaults: Option<FlagDefaults>,
    /// Per-environment targeting state keyed by environment key
    #[serde(default)]
    pub environments: IndexMap<String, FlagEnvironmentConfig>,
}

/// Raw per-environment targeting state
///
/// Mixes configuration with derived bookkeeping (versions, salts,
/// timestamps). Filtering happens in the patch compiler's exclusion table.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlagEnvironmentConfig(pub Map<String, Value>);

impl FlagEnvironmentConfig {
    /// Iterate over raw fields in source order
    pub fn fields(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Look up a single raw field
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Number of raw fields
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no fields at all
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Map<String, Value>> for FlagEnvironmentConfig {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// A targeting rule
///
/// Copied to the destination as opaque data; nothing inside is rewritten.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Rule(pub Map<String, Value>);

impl Rule {
    /// Clauses, in order
    #[must_use]
    pub fn clauses(&self) -> &[Value] {
        self.0
            .get("clauses")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Fixed variation index, when the rule does not roll out
    #[must_use]
    pub fn variation(&self) -> Option<u64> {
        self.0.get("variation").and_then(Value::as_u64)
    }

    /// Whether the rule serves a percentage rollout
    #[must_use]
    pub fn has_rollout(&self) -> bool {
        self.0.get("rollout").is_some_and(|r| !r.is_null())
    }

    /// Borrow the raw rule object
    #[must_use]
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Convert into a JSON value
    #[must_use]
    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}
