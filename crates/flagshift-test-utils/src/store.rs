use async_trait::async_trait;
use flagshift_core::{SnapshotSink, SnapshotStore, StoreError};
use flagshift_model::{FlagSnapshot, ItemList, ProjectSnapshot, SegmentSnapshot};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

#[derive(Debug, Default, Clone)]
struct ProjectDocs {
    project: Option<Value>,
    segments: HashMap<String, Value>,
    flag_index: Option<Vec<String>>,
    flags: HashMap<String, Value>,
}

/// Snapshot store held in memory
///
/// Documents are kept as raw JSON and decoded on load, the same as the
/// filesystem store.
#[derive(Debug, Default)]
pub struct InMemorySnapshotStore {
    projects: Mutex<BTreeMap<String, ProjectDocs>>,
}

impl InMemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `project.json`; the key is read from the document
    #[must_use]
    pub fn with_project(self, doc: Value) -> Self {
        let key = doc["key"].as_str().unwrap_or_default().to_string();
        self.projects.lock().entry(key).or_default().project = Some(doc);
        self
    }

    /// Add `segment-<env>.json`
    #[must_use]
    pub fn with_segments(self, project: &str, env: &str, doc: Value) -> Self {
        self.projects
            .lock()
            .entry(project.to_string())
            .or_default()
            .segments
            .insert(env.to_string(), doc);
        self
    }

    /// Add `flags/<key>.json` and append its key to `flags.json`
    #[must_use]
    pub fn with_flag(self, project: &str, doc: Value) -> Self {
        {
            let mut projects = self.projects.lock();
            let docs = projects.entry(project.to_string()).or_default();
            let key = doc["key"].as_str().unwrap_or_default().to_string();
            docs.flag_index.get_or_insert_with(Vec::new).push(key.clone());
            docs.flags.insert(key, doc);
        }
        self
    }

    /// Replace `flags.json`
    #[must_use]
    pub fn with_flag_index(self, project: &str, keys: &[&str]) -> Self {
        self.projects
            .lock()
            .entry(project.to_string())
            .or_default()
            .flag_index = Some(keys.iter().map(ToString::to_string).collect());
        self
    }

    /// Raw document stored for a flag
    pub fn flag_doc(&self, project: &str, flag: &str) -> Option<Value> {
        self.projects.lock().get(project)?.flags.get(flag).cloned()
    }

    /// Raw `project.json`
    pub fn project_doc(&self, project: &str) -> Option<Value> {
        self.projects.lock().get(project)?.project.clone()
    }

    /// Raw `segment-<env>.json`
    pub fn segments_doc(&self, project: &str, env: &str) -> Option<Value> {
        self.projects.lock().get(project)?.segments.get(env).cloned()
    }

    /// Stored flag index
    pub fn flag_index(&self, project: &str) -> Option<Vec<String>> {
        self.projects.lock().get(project)?.flag_index.clone()
    }

    fn lookup<F>(&self, project: &str, path: String, pick: F) -> Result<Value, StoreError>
    where
        F: FnOnce(&ProjectDocs) -> Option<Value>,
    {
        self.projects
            .lock()
            .get(project)
            .and_then(pick)
            .ok_or_else(|| StoreError::NotFound { path: path.into() })
    }
}

fn decode<T: serde::de::DeserializeOwned>(path: String, doc: Value) -> Result<T, StoreError> {
    serde_json::from_value(doc).map_err(|source| StoreError::Parse {
        path: PathBuf::from(path),
        source,
    })
}

#[async_trait]
impl SnapshotStore for InMemorySnapshotStore {
    async fn list_projects(&self) -> Result<Vec<String>, StoreError> {
        Ok(self
            .projects
            .lock()
            .iter()
            .filter(|(_, docs)| docs.project.is_some())
            .map(|(key, _)| key.clone())
            .collect())
    }

    async fn load_project(&self, project: &str) -> Result<ProjectSnapshot, StoreError> {
        let path = format!("project/{project}/project.json");
        let doc = self.lookup(project, path.clone(), |d| d.project.clone())?;
        decode(path, doc)
    }

    async fn load_segments(
        &self,
        project: &str,
        env: &str,
    ) -> Result<Vec<SegmentSnapshot>, StoreError> {
        let path = format!("project/{project}/segment-{env}.json");
        let doc = self.lookup(project, path.clone(), |d| d.segments.get(env).cloned())?;
        decode::<ItemList<SegmentSnapshot>>(path, doc).map(ItemList::into_vec)
    }

    async fn load_flag_index(&self, project: &str) -> Result<Vec<String>, StoreError> {
        let path = format!("project/{project}/flags.json");
        let doc = self.lookup(project, path.clone(), |d| {
            d.flag_index.as_ref().map(|keys| Value::from(keys.clone()))
        })?;
        decode(path, doc)
    }

    async fn load_flag(&self, project: &str, flag: &str) -> Result<FlagSnapshot, StoreError> {
        let path = format!("project/{project}/flags/{flag}.json");
        let doc = self.lookup(project, path.clone(), |d| d.flags.get(flag).cloned())?;
        decode(path, doc)
    }
}

#[async_trait]
impl SnapshotSink for InMemorySnapshotStore {
    async fn save_project(&self, project: &str, doc: &Value) -> Result<(), StoreError> {
        self.projects.lock().entry(project.to_string()).or_default().project = Some(doc.clone());
        Ok(())
    }

    async fn save_segments(&self, project: &str, env: &str, doc: &Value) -> Result<(), StoreError> {
        self.projects
            .lock()
            .entry(project.to_string())
            .or_default()
            .segments
            .insert(env.to_string(), doc.clone());
        Ok(())
    }

    async fn save_flag_index(&self, project: &str, keys: &[String]) -> Result<(), StoreError> {
        self.projects.lock().entry(project.to_string()).or_default().flag_index = Some(keys.to_vec());
        Ok(())
    }

    async fn save_flag(&self, project: &str, flag: &str, doc: &Value) -> Result<(), StoreError> {
        self.projects
            .lock()
            .entry(project.to_string())
            .or_default()
            .flags
            .insert(flag.to_string(), doc.clone());
        Ok(())
    }
}
