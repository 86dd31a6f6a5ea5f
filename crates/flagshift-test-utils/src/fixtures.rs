//! Source documents shaped like the vendor API's responses

use serde_json::{json, Value};

/// Environment as embedded in `project.json`
pub fn environment(key: &str) -> Value {
    json!({
        "_id": format!("env-{key}"),
        "key": key,
        "name": key.to_uppercase(),
        "color": "417505",
        "apiKey": format!("sdk-{key}"),
        "defaultTtl": 0,
        "secureMode": false,
        "tags": []
    })
}

/// `project.json` with the environments wrapped in `{items}`
pub fn project(key: &str, envs: &[&str]) -> Value {
    json!({
        "_id": format!("proj-{key}"),
        "_links": {"self": {"href": format!("/api/v2/projects/{key}")}},
        "key": key,
        "name": format!("Project {key}"),
        "tags": ["migrated"],
        "includeInSnippetByDefault": false,
        "environments": {
            "items": envs.iter().map(|e| environment(e)).collect::<Vec<_>>()
        }
    })
}

/// Targeting rule serving `variation` to users with `key` in `values`
pub fn rule(id: &str, variation: u64, values: &[&str]) -> Value {
    json!({
        "_id": id,
        "clauses": [{
            "_id": format!("{id}-clause"),
            "attribute": "key",
            "op": "in",
            "values": values,
            "negate": false
        }],
        "variation": variation,
        "trackEvents": false
    })
}

/// Regular segment with membership and one rule
pub fn segment(key: &str) -> Value {
    json!({
        "key": key,
        "name": format!("Segment {key}"),
        "description": "",
        "tags": [],
        "creationDate": 1_700_000_000_000_i64,
        "included": ["user-1", "user-2"],
        "excluded": [],
        "rules": [rule(&format!("{key}-r0"), 0, &["user-3"])],
        "version": 3,
        "unbounded": false
    })
}

/// Big segment; never migrated
pub fn unbounded_segment(key: &str) -> Value {
    json!({
        "key": key,
        "name": format!("Synced {key}"),
        "tags": [],
        "creationDate": 1_700_000_000_000_i64,
        "unbounded": true,
        "version": 1
    })
}

/// `segment-<env>.json` envelope
pub fn segment_list(segments: Vec<Value>) -> Value {
    json!({"items": segments, "_links": {}})
}

/// Source per-environment state: configuration plus derived noise
pub fn flag_environment(env: &str, on: bool, rules: Vec<Value>) -> Value {
    json!({
        "on": on,
        "archived": false,
        "salt": "2d8c0cc0",
        "sel": "b1f3aa42",
        "lastModified": 1_700_000_000_000_i64,
        "version": 7,
        "targets": [{"values": ["qa-user"], "variation": 0}],
        "contextTargets": [],
        "rules": rules,
        "fallthrough": {"variation": 1},
        "offVariation": 1,
        "prerequisites": [],
        "_site": {"href": format!("/default/{env}/features/flag"), "type": "text/html"},
        "_environmentName": env.to_uppercase(),
        "trackEvents": false,
        "trackEventsFallthrough": false,
        "_summary": {"variations": {}, "prerequisites": 0}
    })
}

/// Boolean flag with state in every listed environment
pub fn flag(key: &str, envs: &[&str]) -> Value {
    let environments: serde_json::Map<String, Value> = envs
        .iter()
        .map(|env| {
            let rules = vec![
                rule(&format!("{key}-{env}-r0"), 0, &["beta-1"]),
                rule(&format!("{key}-{env}-r1"), 1, &["beta-2"]),
            ];
            ((*env).to_string(), flag_environment(env, *env != "production", rules))
        })
        .collect();

    json!({
        "key": key,
        "name": format!("Flag {key}"),
        "kind": "boolean",
        "description": "",
        "creationDate": 1_700_000_000_000_i64,
        "_version": 4,
        "variations": [
            {"_id": "v-true", "value": true},
            {"_id": "v-false", "value": false, "name": "Off"}
        ],
        "temporary": false,
        "tags": [],
        "clientSideAvailability": {"usingMobileKey": false, "usingEnvironmentId": true},
        "includeInSnippet": true,
        "defaults": {"onVariation": 0, "offVariation": 1},
        "environments": environments,
        "_links": {"self": {"href": format!("/api/v2/flags/web/{key}")}}
    })
}
