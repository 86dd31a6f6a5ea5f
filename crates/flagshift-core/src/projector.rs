//! Resource projection
//!
//! Maps source snapshots onto the fields each destination creation endpoint
//! accepts. Presence is mirrored literally: an absent source field is omitted,
//! a present `false` is sent.

use flagshift_model::{
    EnvironmentCreateBody, EnvironmentSnapshot, FlagAvailability, FlagCreateBody, FlagSnapshot,
    PatchOperation, ProjectAvailability, ProjectCreateBody, ProjectSnapshot, SegmentCreateBody,
    SegmentSnapshot, Variation, VariationBody,
};
use flagshift_patch::{FilteredFields, PatchCompiler, PatchError};

/// Source-to-destination field mapping
#[derive(Debug, Clone, Default)]
pub struct ResourceProjector {
    compiler: PatchCompiler,
}

impl ResourceProjector {
    /// Projector with the default exclusion table
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Projector over a custom compiler
    #[inline]
    #[must_use]
    pub fn with_compiler(compiler: PatchCompiler) -> Self {
        Self { compiler }
    }

    /// Compiler used for rule-bearing fields
    #[inline]
    #[must_use]
    pub fn compiler(&self) -> &PatchCompiler {
        &self.compiler
    }

    /// Project creation body, environments included
    #[must_use]
    pub fn project_project(
        &self,
        src: &ProjectSnapshot,
        dest_key: &str,
        dest_name: &str,
    ) -> ProjectCreateBody {
        let availability = src
            .default_client_side_availability
            .map(ProjectAvailability::ClientSide)
            .or_else(|| src.include_in_snippet_by_default.map(ProjectAvailability::LegacySnippet));

        ProjectCreateBody {
            key: dest_key.to_string(),
            name: dest_name.to_string(),
            tags: src.tags.clone(),
            environments: src
                .environments
                .iter()
                .map(|env| self.project_environment(env))
                .collect(),
            availability,
        }
    }

    /// Environment entry for the project body
    #[must_use]
    pub fn project_environment(&self, src: &EnvironmentSnapshot) -> EnvironmentCreateBody {
        EnvironmentCreateBody {
            name: src.name.clone(),
            key: src.key.clone(),
            color: src.color.clone(),
            default_ttl: src.default_ttl,
            confirm_changes: src.confirm_changes,
            secure_mode: src.secure_mode,
            default_track_events: src.default_track_events,
            tags: src.tags.clone(),
        }
    }

    /// Segment creation body; `None` for unbounded segments
    #[must_use]
    pub fn project_segment(&self, src: &SegmentSnapshot) -> Option<SegmentCreateBody> {
        if src.unbounded {
            return None;
        }
        Some(SegmentCreateBody {
            name: src.name.clone(),
            key: src.key.clone(),
            tags: src.tags.clone(),
            description: src.description.clone(),
        })
    }

    /// Membership and rule patches for a segment
    #[must_use]
    pub fn segment_patch(&self, src: &SegmentSnapshot) -> Vec<PatchOperation> {
        self.compiler.compile_segment(src)
    }

    /// Flag creation body, global fields only
    #[must_use]
    pub fn project_flag(&self, src: &FlagSnapshot) -> FlagCreateBody {
        let availability = src
            .client_side_availability
            .map(FlagAvailability::ClientSide)
            .or_else(|| src.include_in_snippet.map(FlagAvailability::LegacySnippet));

        FlagCreateBody {
            key: src.key.clone(),
            name: src.name.clone(),
            variations: src.variations.iter().map(project_variation).collect(),
            temporary: src.temporary,
            tags: src.tags.clone(),
            description: src.description.clone(),
            availability,
            custom_properties: src.custom_properties.clone(),
            defaults: src.defaults,
        }
    }

    /// Configuration fields of a flag in one environment
    ///
    /// `None` when the flag has no entry for `env`.
    #[must_use]
    pub fn project_flag_environment_patch_fields(
        &self,
        src: &FlagSnapshot,
        env: &str,
    ) -> Option<FilteredFields> {
        src.environments
            .get(env)
            .map(|config| self.compiler.filter_environment(config))
    }

    /// Combined patch list for a flag in one environment
    ///
    /// `Ok(None)` when the flag has no entry for `env`.
    ///
    /// # Errors
    /// [`PatchError::MalformedRules`] if the environment's rules are not a list.
    pub fn flag_environment_patch(
        &self,
        src: &FlagSnapshot,
        env: &str,
    ) -> Result<Option<Vec<PatchOperation>>, PatchError> {
        self.project_flag_environment_patch_fields(src, env)
            .map(|fields| self.compiler.compile_flag_environment(env, &fields))
            .transpose()
    }
}

fn project_variation(src: &Variation) -> VariationBody {
    VariationBody {
        value: src.value.clone(),
        name: src.name.clone(),
        description: src.description.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};

    fn project(extra: Value) -> ProjectSnapshot {
        let mut base = json!({
            "key": "web",
            "name": "Web",
            "tags": ["team-a"],
            "environments": {"items": [
                {"key": "production", "name": "Production", "color": "417505", "secureMode": false},
                {"key": "test", "name": "Test", "color": "f5a623", "defaultTtl": 5, "tags": ["qa"]}
            ]}
        });
        if let (Some(base), Some(extra)) = (base.as_object_mut(), extra.as_object()) {
            base.extend(extra.clone());
        }
        serde_json::from_value(base).unwrap()
    }

    fn flag(extra: Value) -> FlagSnapshot {
        let mut base = json!({
            "key": "beta",
            "name": "Beta",
            "variations": [{"_id": "v1", "value": true}, {"_id": "v2", "value": false}],
            "temporary": true,
            "tags": [],
            "description": ""
        });
        if let (Some(base), Some(extra)) = (base.as_object_mut(), extra.as_object()) {
            base.extend(extra.clone());
        }
        serde_json::from_value(base).unwrap()
    }

    #[test]
    fn project_body_with_environments() {
        let body = ResourceProjector::new().project_project(
            &project(json!({"includeInSnippetByDefault": true})),
            "web-copy",
            "Web copy",
        );
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({
                "key": "web-copy",
                "name": "Web copy",
                "tags": ["team-a"],
                "environments": [
                    {"name": "Production", "key": "production", "color": "417505", "secureMode": false},
                    {"name": "Test", "key": "test", "color": "f5a623", "defaultTtl": 5, "tags": ["qa"]}
                ],
                "includeInSnippetByDefault": true
            })
        );
    }

    #[test]
    fn client_side_availability_wins() {
        let src = project(json!({
            "defaultClientSideAvailability": {"usingMobileKey": false, "usingEnvironmentId": true},
            "includeInSnippetByDefault": true
        }));
        let value = serde_json::to_value(ResourceProjector::new().project_project(&src, "w", "w")).unwrap();
        assert!(value.get("defaultClientSideAvailability").is_some());
        assert!(value.get("includeInSnippetByDefault").is_none());
    }

    #[test]
    fn variation_ids_are_stripped() {
        let body = ResourceProjector::new().project_flag(&flag(json!({})));
        assert_eq!(
            serde_json::to_value(&body.variations).unwrap(),
            json!([{"value": true}, {"value": false}])
        );
    }

    #[test]
    fn flag_body_keeps_global_fields_only() {
        let src = flag(json!({
            "includeInSnippet": false,
            "customProperties": {"jira": {"name": "Ticket", "value": ["X-1"]}},
            "defaults": {"onVariation": 0, "offVariation": 1},
            "environments": {"production": {"on": true}}
        }));
        let value = serde_json::to_value(ResourceProjector::new().project_flag(&src)).unwrap();
        assert_eq!(value["includeInSnippet"], json!(false));
        assert_eq!(value["defaults"], json!({"onVariation": 0, "offVariation": 1}));
        assert!(value.get("clientSideAvailability").is_none());
        assert!(value.get("environments").is_none());
    }

    #[test]
    fn unbounded_segment_is_skipped() {
        let segment: SegmentSnapshot =
            serde_json::from_value(json!({"key": "big", "name": "Big", "unbounded": true})).unwrap();
        assert_eq!(ResourceProjector::new().project_segment(&segment), None);
    }

    #[test]
    fn segment_body_omits_absent_fields() {
        let segment: SegmentSnapshot = serde_json::from_value(json!({
            "key": "beta-users", "name": "Beta users", "description": "early access",
            "included": ["u1"], "rules": []
        }))
        .unwrap();
        let body = ResourceProjector::new().project_segment(&segment).unwrap();
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({"name": "Beta users", "key": "beta-users", "description": "early access"})
        );
    }

    #[test]
    fn missing_environment_yields_no_patch() {
        let src = flag(json!({"environments": {"production": {"on": true, "version": 4}}}));
        let projector = ResourceProjector::new();

        assert_eq!(projector.flag_environment_patch(&src, "test").unwrap(), None);

        let ops = projector.flag_environment_patch(&src, "production").unwrap().unwrap();
        assert_eq!(ops, vec![PatchOperation::replace("/environments/production/on", json!(true))]);
    }
}
