//! Patch operations
//!
//! The destination accepts a small JSON-Patch subset. Only what it accepts is
//! modelled here; this is not a general JSON Patch implementation.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Suffix addressing "append at end of list"
pub const APPEND_SEGMENT: &str = "-";

/// Patch verb
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchOp {
    /// Insert a value, or append with a trailing `/-`
    Add,
    /// Overwrite an existing value
    Replace,
    /// Delete a value
    Remove,
}

impl PatchOp {
    /// Wire name
    #[inline]
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Replace => "replace",
            Self::Remove => "remove",
        }
    }
}

impl fmt::Display for PatchOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single compiled patch instruction
///
/// # Invariants
/// - `path` always starts with `/`
/// - `value` is `None` only for [`PatchOp::Remove`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchOperation {
    /// Verb
    pub op: PatchOp,
    /// JSON pointer into the destination resource
    pub path: String,
    /// Payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl PatchOperation {
    /// `add` at `path`
    #[must_use]
    pub fn add(path: impl AsRef<str>, value: Value) -> Self {
        Self {
            op: PatchOp::Add,
            path: pointer(path.as_ref()),
            value: Some(value),
        }
    }

    /// `replace` at `path`
    #[must_use]
    pub fn replace(path: impl AsRef<str>, value: Value) -> Self {
        Self {
            op: PatchOp::Replace,
            path: pointer(path.as_ref()),
            value: Some(value),
        }
    }

    /// `remove` at `path`
    #[must_use]
    pub fn remove(path: impl AsRef<str>) -> Self {
        Self {
            op: PatchOp::Remove,
            path: pointer(path.as_ref()),
            value: None,
        }
    }

    /// Whether this appends to a list
    #[inline]
    #[must_use]
    pub fn is_append(&self) -> bool {
        self.op == PatchOp::Add && self.path.rsplit('/').next() == Some(APPEND_SEGMENT)
    }

    /// Whether replaying this operation leaves the target unchanged
    ///
    /// Appends grow the list on every replay; everything else converges.
    #[inline]
    #[must_use]
    pub fn is_idempotent(&self) -> bool {
        !self.is_append()
    }
}

impl fmt::Display for PatchOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.op, self.path)
    }
}

/// Normalize into a JSON pointer with a single leading slash
fn pointer(path: &str) -> String {
    format!("/{}", path.trim_start_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn paths_are_normalized() {
        assert_eq!(PatchOperation::add("included", json!([])).path, "/included");
        assert_eq!(PatchOperation::add("/included", json!([])).path, "/included");
        assert_eq!(PatchOperation::remove("//x").path, "/x");
    }

    #[test]
    fn wire_shape() {
        let op = PatchOperation::replace("environments/prod/on", json!(true));
        assert_eq!(
            serde_json::to_value(&op).unwrap(),
            json!({"op": "replace", "path": "/environments/prod/on", "value": true})
        );

        let remove = PatchOperation::remove("tags");
        assert_eq!(
            serde_json::to_value(&remove).unwrap(),
            json!({"op": "remove", "path": "/tags"})
        );
    }

    #[test]
    fn append_is_not_idempotent() {
        let append = PatchOperation::add("environments/prod/rules/-", json!({}));
        assert!(append.is_append());
        assert!(!append.is_idempotent());

        let add_member = PatchOperation::add("included", json!(["a"]));
        assert!(!add_member.is_append());
        assert!(add_member.is_idempotent());

        assert!(PatchOperation::replace("on", json!(false)).is_idempotent());
    }

    #[test]
    fn display() {
        let op = PatchOperation::add("rules/-", json!({}));
        assert_eq!(op.to_string(), "add /rules/-");
    }
}
