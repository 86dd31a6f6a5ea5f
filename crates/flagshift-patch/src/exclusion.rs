//! Declarative field exclusion
//!
//! The source returns per-environment targeting state interleaved with
//! derived bookkeeping. The destination rejects or ignores those fields, so
//! they are dropped before compilation. The rule set is data, evaluated once
//! per field.

use flagshift_model::FlagEnvironmentConfig;
use indexmap::IndexMap;
use serde_json::Value;
use std::fmt;

/// Exact field names that are derived state
const EXCLUDED_NAMES: &[&str] = &[
    "salt",
    "sel",
    "version",
    "lastModified",
    "access",
    "environmentName",
    "site",
    "summary",
    "debugEventsUntilDate",
];

/// Prefixes marking internal fields
const EXCLUDED_PREFIXES: &[&str] = &["_", "-"];

/// Why a field was dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExclusionReason {
    /// Field name is in the exact-name set
    Name(&'static str),
    /// Field name starts with an excluded prefix
    Prefix(&'static str),
}

impl fmt::Display for ExclusionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(name) => write!(f, "derived field '{name}'"),
            Self::Prefix(prefix) => write!(f, "internal prefix '{prefix}'"),
        }
    }
}

/// Fields that survived exclusion, in source order
pub type FilteredFields = IndexMap<String, Value>;

/// Prefix set ∪ exact-name set
#[derive(Debug, Clone)]
pub struct FieldExclusionTable {
    names: Vec<&'static str>,
    prefixes: Vec<&'static str>,
}

impl FieldExclusionTable {
    /// Table with the default exclusion set
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            names: EXCLUDED_NAMES.to_vec(),
            prefixes: EXCLUDED_PREFIXES.to_vec(),
        }
    }

    /// Empty table, nothing excluded
    #[inline]
    #[must_use]
    pub fn empty() -> Self {
        Self {
            names: Vec::new(),
            prefixes: Vec::new(),
        }
    }

    /// Also exclude an exact field name
    #[inline]
    #[must_use]
    pub fn with_name(mut self, name: &'static str) -> Self {
        self.names.push(name);
        self
    }

    /// Also exclude every field starting with `prefix`
    #[inline]
    #[must_use]
    pub fn with_prefix(mut self, prefix: &'static str) -> Self {
        self.prefixes.push(prefix);
        self
    }

    /// Exact names in the table
    #[must_use]
    pub fn names(&self) -> &[&'static str] {
        &self.names
    }

    /// Prefixes in the table
    #[must_use]
    pub fn prefixes(&self) -> &[&'static str] {
        &self.prefixes
    }

    /// Why `field` is excluded, if it is
    #[must_use]
    pub fn reason(&self, field: &str) -> Option<ExclusionReason> {
        if let Some(name) = self.names.iter().find(|n| **n == field) {
            return Some(ExclusionReason::Name(*name));
        }
        self.prefixes
            .iter()
            .find(|p| field.starts_with(**p))
            .map(|p| ExclusionReason::Prefix(*p))
    }

    /// Whether `field` is excluded
    #[inline]
    #[must_use]
    pub fn is_excluded(&self, field: &str) -> bool {
        self.reason(field).is_some()
    }

    /// Keep only configuration fields
    #[must_use]
    pub fn filter(&self, config: &FlagEnvironmentConfig) -> FilteredFields {
        config
            .fields()
            .filter(|(key, _)| !self.is_excluded(key))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }
}

impl Default for FieldExclusionTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config(value: Value) -> FlagEnvironmentConfig {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn drops_derived_fields() {
        let raw = config(json!({
            "on": true,
            "salt": "abc",
            "sel": "def",
            "version": 12,
            "lastModified": 1_700_000_000_000_i64,
            "_environmentName": "Production",
            "_site": {"href": "/x"},
            "_summary": {},
            "_access": {},
            "_debugEventsUntilDate": null,
            "-internal": 1,
            "offVariation": 1,
            "fallthrough": {"variation": 0},
            "rules": []
        }));

        let kept: Vec<_> = FieldExclusionTable::new().filter(&raw).into_keys().collect();
        assert_eq!(kept, vec!["on", "offVariation", "fallthrough", "rules"]);
    }

    #[test]
    fn reasons() {
        let table = FieldExclusionTable::new();
        assert_eq!(table.reason("salt"), Some(ExclusionReason::Name("salt")));
        assert_eq!(table.reason("_site"), Some(ExclusionReason::Prefix("_")));
        assert_eq!(table.reason("trackEvents"), None);
    }

    #[test]
    fn extended_table() {
        let table = FieldExclusionTable::empty()
            .with_name("archived")
            .with_prefix("x-");
        assert!(table.is_excluded("archived"));
        assert!(table.is_excluded("x-debug"));
        assert!(!table.is_excluded("salt"));
    }
}
