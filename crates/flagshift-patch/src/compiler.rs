//! Patch compilation
//!
//! The destination has no "set whole list" operation for rules, only append.
//! Rules are therefore emitted as one `add` at `<base>/rules/-` each, in
//! source order, so replaying the operations rebuilds that order.

use crate::error::PatchError;
use crate::exclusion::{FieldExclusionTable, FilteredFields};
use crate::pointer;
use flagshift_model::patch::APPEND_SEGMENT;
use flagshift_model::{FlagEnvironmentConfig, PatchOp, PatchOperation, Rule, SegmentSnapshot};
use serde_json::Value;

/// Field holding ordered targeting rules
const RULES_FIELD: &str = "rules";

/// Compiles source state into destination patch operations
#[derive(Debug, Clone, Default)]
pub struct PatchCompiler {
    exclusions: FieldExclusionTable,
}

impl PatchCompiler {
    /// Compiler with the default exclusion table
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Compiler with a custom exclusion table
    #[inline]
    #[must_use]
    pub fn with_exclusions(exclusions: FieldExclusionTable) -> Self {
        Self { exclusions }
    }

    /// Exclusion table in use
    #[inline]
    #[must_use]
    pub fn exclusions(&self) -> &FieldExclusionTable {
        &self.exclusions
    }

    /// Single field patch; `value` is dropped for [`PatchOp::Remove`]
    #[must_use]
    pub fn compile_field_patch(&self, path: &str, op: PatchOp, value: Value) -> PatchOperation {
        match op {
            PatchOp::Add => PatchOperation::add(path, value),
            PatchOp::Replace => PatchOperation::replace(path, value),
            PatchOp::Remove => PatchOperation::remove(path),
        }
    }

    /// One append per rule, in input order
    ///
    /// `base_path` is an already-built pointer (e.g. `/environments/prod`);
    /// `None` addresses the resource root. An empty slice yields no
    /// operations.
    #[must_use]
    pub fn compile_rules(&self, rules: &[Rule], base_path: Option<&str>) -> Vec<PatchOperation> {
        let target = rules_append_path(base_path);
        rules
            .iter()
            .map(|rule| PatchOperation::add(&target, rule.clone().into_value()))
            .collect()
    }

    /// Membership and rule patches for a freshly created segment
    ///
    /// `included`/`excluded` are only sent when non-empty.
    #[must_use]
    pub fn compile_segment(&self, segment: &SegmentSnapshot) -> Vec<PatchOperation> {
        let mut ops = Vec::new();

        for (field, keys) in [("included", &segment.included), ("excluded", &segment.excluded)] {
            if let Some(keys) = keys.as_ref().filter(|k| !k.is_empty()) {
                ops.push(PatchOperation::add(
                    pointer::join(&[field]),
                    Value::from(keys.clone()),
                ));
            }
        }

        if let Some(rules) = &segment.rules {
            ops.extend(self.compile_rules(rules, None));
        }

        ops
    }

    /// Drop derived/read-only fields from raw per-environment state
    #[inline]
    #[must_use]
    pub fn filter_environment(&self, config: &FlagEnvironmentConfig) -> FilteredFields {
        self.exclusions.filter(config)
    }

    /// One combined patch list for a flag in one environment
    ///
    /// `rules` becomes ordered appends under the environment; every other
    /// field becomes an idempotent `replace`.
    ///
    /// # Errors
    /// Returns [`PatchError::MalformedRules`] if `rules` is neither null nor a
    /// list of objects.
    pub fn compile_flag_environment(
        &self,
        env_key: &str,
        fields: &FilteredFields,
    ) -> Result<Vec<PatchOperation>, PatchError> {
        let base = pointer::join(&["environments", env_key]);
        let mut ops = Vec::with_capacity(fields.len());

        for (field, value) in fields {
            if field == RULES_FIELD {
                let rules = parse_rules(value, &base)?;
                ops.extend(self.compile_rules(&rules, Some(&base)));
            } else {
                ops.push(PatchOperation::replace(
                    pointer::child(&base, field),
                    value.clone(),
                ));
            }
        }

        Ok(ops)
    }
}

fn rules_append_path(base_path: Option<&str>) -> String {
    let rules = pointer::child(base_path.unwrap_or(""), RULES_FIELD);
    format!("{rules}/{APPEND_SEGMENT}")
}

fn parse_rules(value: &Value, base: &str) -> Result<Vec<Rule>, PatchError> {
    if value.is_null() {
        return Ok(Vec::new());
    }
    serde_json::from_value(value.clone())
        .map_err(|e| PatchError::malformed_rules(rules_append_path(Some(base)), e.to_string()))
}
