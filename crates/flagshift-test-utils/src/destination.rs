use crate::relative_path;
use async_trait::async_trait;
use flagshift_client::{HttpMethod, HttpRequest, HttpResponse, Transport, TransportError};
use flagshift_model::{PatchOp, PatchOperation};
use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

#[derive(Debug, Default)]
struct State {
    projects: BTreeMap<String, Value>,
    segments: BTreeMap<(String, String, String), Value>,
    flags: BTreeMap<(String, String), Value>,
    calls: usize,
}

/// In-memory destination API
///
/// Understands the create and patch endpoints the orchestrator uses and
/// applies the supported patch subset for real, so repeated runs can be
/// compared. Creating an existing resource answers 409; a patch that cannot
/// be applied answers 400 and leaves the resource unchanged.
#[derive(Debug, Default)]
pub struct FakeDestination {
    state: Mutex<State>,
}

impl FakeDestination {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn project(&self, key: &str) -> Option<Value> {
        self.state.lock().projects.get(key).cloned()
    }

    pub fn segment(&self, project: &str, env: &str, key: &str) -> Option<Value> {
        self.state
            .lock()
            .segments
            .get(&(project.to_string(), env.to_string(), key.to_string()))
            .cloned()
    }

    pub fn flag(&self, project: &str, key: &str) -> Option<Value> {
        self.state
            .lock()
            .flags
            .get(&(project.to_string(), key.to_string()))
            .cloned()
    }

    pub fn flag_keys(&self, project: &str) -> Vec<String> {
        self.state
            .lock()
            .flags
            .keys()
            .filter(|(p, _)| p == project)
            .map(|(_, k)| k.clone())
            .collect()
    }

    /// Requests served so far
    pub fn calls(&self) -> usize {
        self.state.lock().calls
    }

    fn handle(&self, method: HttpMethod, path: &str, body: Option<Value>) -> (u16, Value) {
        let mut state = self.state.lock();
        state.calls += 1;
        let segments: Vec<&str> = path.split('/').collect();

        match (method, segments.as_slice(), body) {
            (HttpMethod::Post, ["projects"], Some(body)) => {
                let key = body["key"].as_str().unwrap_or_default().to_string();
                if state.projects.contains_key(&key) {
                    return conflict(&key);
                }
                state.projects.insert(key, body.clone());
                (201, body)
            }
            (HttpMethod::Post, ["segments", project, env], Some(mut body)) => {
                if !state.projects.contains_key(*project) {
                    return not_found(project);
                }
                let key = body["key"].as_str().unwrap_or_default().to_string();
                let id = ((*project).to_string(), (*env).to_string(), key.clone());
                if state.segments.contains_key(&id) {
                    return conflict(&key);
                }
                if let Some(obj) = body.as_object_mut() {
                    obj.entry("included").or_insert_with(|| json!([]));
                    obj.entry("excluded").or_insert_with(|| json!([]));
                    obj.entry("rules").or_insert_with(|| json!([]));
                }
                state.segments.insert(id, body.clone());
                (201, body)
            }
            (HttpMethod::Patch, ["segments", project, env, key], Some(ops)) => {
                let id = ((*project).to_string(), (*env).to_string(), (*key).to_string());
                match state.segments.get_mut(&id) {
                    Some(doc) => patch(doc, ops),
                    None => not_found(key),
                }
            }
            (HttpMethod::Post, ["flags", project], Some(mut body)) => {
                let Some(envs) = state.projects.get(*project).map(environment_keys) else {
                    return not_found(project);
                };
                let key = body["key"].as_str().unwrap_or_default().to_string();
                let id = ((*project).to_string(), key.clone());
                if state.flags.contains_key(&id) {
                    return conflict(&key);
                }
                let off = body["defaults"]["offVariation"].as_u64().unwrap_or(0);
                let environments: Map<String, Value> = envs
                    .into_iter()
                    .map(|env| (env, fresh_environment(off)))
                    .collect();
                if let Some(obj) = body.as_object_mut() {
                    obj.insert("environments".into(), Value::Object(environments));
                }
                state.flags.insert(id, body.clone());
                (201, body)
            }
            (HttpMethod::Patch, ["flags", project, key], Some(ops)) => {
                let id = ((*project).to_string(), (*key).to_string());
                match state.flags.get_mut(&id) {
                    Some(doc) => patch(doc, ops),
                    None => not_found(key),
                }
            }
            (HttpMethod::Get, ["projects", key], None) => match state.projects.get(*key) {
                Some(doc) => (200, doc.clone()),
                None => not_found(key),
            },
            (HttpMethod::Get, ["flags", project, key], None) => {
                match state.flags.get(&((*project).to_string(), (*key).to_string())) {
                    Some(doc) => (200, doc.clone()),
                    None => not_found(key),
                }
            }
            _ => (400, json!({"code": "invalid_request", "message": format!("unsupported {method} {path}")})),
        }
    }
}

#[async_trait]
impl Transport for FakeDestination {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let path = relative_path(&request.url);
        let body = match request.body.as_deref().map(serde_json::from_slice::<Value>) {
            Some(Ok(body)) => Some(body),
            Some(Err(e)) => return Ok(HttpResponse::new(400, e.to_string())),
            None => None,
        };
        let (status, doc) = self.handle(request.method, &path, body);
        Ok(HttpResponse::new(status, doc.to_string()))
    }
}

fn environment_keys(project: &Value) -> Vec<String> {
    project["environments"]
        .as_array()
        .map(|envs| {
            envs.iter()
                .filter_map(|env| env["key"].as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default()
}

/// Per-environment state of a newly created flag
fn fresh_environment(off_variation: u64) -> Value {
    json!({
        "on": false,
        "archived": false,
        "offVariation": off_variation,
        "fallthrough": {"variation": 0},
        "targets": [],
        "contextTargets": [],
        "rules": [],
        "prerequisites": [],
        "trackEvents": false,
        "trackEventsFallthrough": false
    })
}

fn conflict(key: &str) -> (u16, Value) {
    (409, json!({"code": "conflict", "message": format!("{key} already exists")}))
}

fn not_found(key: &str) -> (u16, Value) {
    (404, json!({"code": "not_found", "message": format!("unknown {key}")}))
}

fn patch(doc: &mut Value, ops: Value) -> (u16, Value) {
    let ops: Vec<PatchOperation> = match serde_json::from_value(ops) {
        Ok(ops) => ops,
        Err(e) => return (400, json!({"code": "invalid_request", "message": e.to_string()})),
    };

    let mut updated = doc.clone();
    for op in &ops {
        if let Err(message) = apply(&mut updated, op) {
            return (400, json!({"code": "invalid_request", "message": message}));
        }
    }
    *doc = updated;
    (200, doc.clone())
}

/// Apply one operation of the supported subset
fn apply(doc: &mut Value, op: &PatchOperation) -> Result<(), String> {
    let mut tokens: Vec<String> = op
        .path
        .trim_start_matches('/')
        .split('/')
        .map(|t| t.replace("~1", "/").replace("~0", "~"))
        .collect();
    let last = tokens.pop().ok_or_else(|| format!("empty path in {op}"))?;

    let mut parent = &mut *doc;
    for token in &tokens {
        parent = match parent {
            Value::Object(map) => map.get_mut(token.as_str()),
            Value::Array(items) => token.parse::<usize>().ok().and_then(|i| items.get_mut(i)),
            _ => None,
        }
        .ok_or_else(|| format!("path not found: {}", op.path))?;
    }

    let value = op.value.clone().unwrap_or(Value::Null);
    match (op.op, parent) {
        (PatchOp::Add, Value::Object(map)) => {
            map.insert(last, value);
        }
        (PatchOp::Add, Value::Array(items)) if last == "-" => items.push(value),
        (PatchOp::Add, Value::Array(items)) => {
            let index = array_index(&last, items.len() + 1, op)?;
            items.insert(index, value);
        }
        (PatchOp::Replace, Value::Object(map)) => match map.get_mut(last.as_str()) {
            Some(slot) => *slot = value,
            None => return Err(format!("path not found: {}", op.path)),
        },
        (PatchOp::Replace, Value::Array(items)) => {
            let index = array_index(&last, items.len(), op)?;
            items[index] = value;
        }
        (PatchOp::Remove, Value::Object(map)) => {
            map.remove(last.as_str())
                .ok_or_else(|| format!("path not found: {}", op.path))?;
        }
        (PatchOp::Remove, Value::Array(items)) => {
            let index = array_index(&last, items.len(), op)?;
            items.remove(index);
        }
        _ => return Err(format!("cannot apply {op}")),
    }
    Ok(())
}

fn array_index(token: &str, bound: usize, op: &PatchOperation) -> Result<usize, String> {
    token
        .parse::<usize>()
        .ok()
        .filter(|i| *i < bound)
        .ok_or_else(|| format!("bad index in {op}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_replace_remove() {
        let mut doc = json!({"environments": {"prod": {"on": false, "rules": []}}, "tags": ["a"]});

        apply(&mut doc, &PatchOperation::add("/environments/prod/rules/-", json!({"id": 1}))).unwrap();
        apply(&mut doc, &PatchOperation::add("/environments/prod/rules/-", json!({"id": 2}))).unwrap();
        apply(&mut doc, &PatchOperation::replace("/environments/prod/on", json!(true))).unwrap();
        apply(&mut doc, &PatchOperation::remove("/tags/0")).unwrap();

        assert_eq!(
            doc,
            json!({"environments": {"prod": {"on": true, "rules": [{"id": 1}, {"id": 2}]}}, "tags": []})
        );
    }

    #[test]
    fn replace_needs_existing_member() {
        let mut doc = json!({"on": false});
        assert!(apply(&mut doc, &PatchOperation::replace("/missing", json!(1))).is_err());
        assert!(apply(&mut doc, &PatchOperation::add("/a/b", json!(1))).is_err());
    }

    #[test]
    fn failed_patch_leaves_document_unchanged() {
        let mut doc = json!({"on": false, "rules": []});
        let ops = json!([
            {"op": "replace", "path": "/on", "value": true},
            {"op": "replace", "path": "/nope", "value": 1}
        ]);
        let (status, _) = patch(&mut doc, ops);
        assert_eq!(status, 400);
        assert_eq!(doc, json!({"on": false, "rules": []}));
    }
}
