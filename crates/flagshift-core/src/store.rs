//! Snapshot storage
//!
//! Layout under the root directory:
//!
//! ```text
//! project/<key>/project.json
//! project/<key>/segment-<env>.json
//! project/<key>/flags.json
//! project/<key>/flags/<flagKey>.json
//! ```

use crate::error::StoreError;
use async_trait::async_trait;
use flagshift_model::{FlagSnapshot, ItemList, ProjectSnapshot, SegmentSnapshot};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Read side, consumed by the orchestrator
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Keys of every stored project, sorted
    async fn list_projects(&self) -> Result<Vec<String>, StoreError>;

    /// `project.json`
    async fn load_project(&self, project: &str) -> Result<ProjectSnapshot, StoreError>;

    /// `segment-<env>.json`, bare list or `{items}` envelope
    async fn load_segments(&self, project: &str, env: &str)
        -> Result<Vec<SegmentSnapshot>, StoreError>;

    /// `flags.json`, flag keys in source order
    async fn load_flag_index(&self, project: &str) -> Result<Vec<String>, StoreError>;

    /// `flags/<flagKey>.json`
    async fn load_flag(&self, project: &str, flag: &str) -> Result<FlagSnapshot, StoreError>;
}

/// Write side, fed by the source fetcher with raw documents
#[async_trait]
pub trait SnapshotSink: Send + Sync {
    /// Store `project.json`
    async fn save_project(&self, project: &str, doc: &Value) -> Result<(), StoreError>;

    /// Store `segment-<env>.json`
    async fn save_segments(&self, project: &str, env: &str, doc: &Value) -> Result<(), StoreError>;

    /// Store `flags.json`
    async fn save_flag_index(&self, project: &str, keys: &[String]) -> Result<(), StoreError>;

    /// Store `flags/<flagKey>.json`
    async fn save_flag(&self, project: &str, flag: &str, doc: &Value) -> Result<(), StoreError>;
}

/// Filesystem-backed store
#[derive(Debug, Clone)]
pub struct FsSnapshotStore {
    root: PathBuf,
}

impl FsSnapshotStore {
    /// Store rooted at `root` (usually `./source`)
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn projects_dir(&self) -> PathBuf {
        self.root.join("project")
    }

    fn project_dir(&self, project: &str) -> PathBuf {
        self.projects_dir().join(project)
    }

    fn project_path(&self, project: &str) -> PathBuf {
        self.project_dir(project).join("project.json")
    }

    fn segments_path(&self, project: &str, env: &str) -> PathBuf {
        self.project_dir(project).join(format!("segment-{env}.json"))
    }

    fn flag_index_path(&self, project: &str) -> PathBuf {
        self.project_dir(project).join("flags.json")
    }

    fn flag_path(&self, project: &str, flag: &str) -> PathBuf {
        self.project_dir(project)
            .join("flags")
            .join(format!("{flag}.json"))
    }

    async fn read<T: DeserializeOwned>(path: PathBuf) -> Result<T, StoreError> {
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| StoreError::io(&path, e))?;
        serde_json::from_slice(&bytes).map_err(|source| StoreError::Parse { path, source })
    }

    async fn write<T: serde::Serialize + ?Sized + Sync>(path: PathBuf, doc: &T) -> Result<(), StoreError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::io(parent, e))?;
        }
        let bytes = serde_json::to_vec_pretty(doc).map_err(|source| StoreError::Parse {
            path: path.clone(),
            source,
        })?;
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| StoreError::io(&path, e))
    }
}

#[async_trait]
impl SnapshotStore for FsSnapshotStore {
    async fn list_projects(&self) -> Result<Vec<String>, StoreError> {
        let dir = self.projects_dir();
        let mut entries = tokio::fs::read_dir(&dir)
            .await
            .map_err(|e| StoreError::io(&dir, e))?;

        let mut keys = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StoreError::io(&dir, e))?
        {
            let is_dir = entry
                .file_type()
                .await
                .map_err(|e| StoreError::io(entry.path(), e))?
                .is_dir();
            if is_dir {
                keys.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        keys.sort();
        Ok(keys)
    }

    async fn load_project(&self, project: &str) -> Result<ProjectSnapshot, StoreError> {
        Self::read(self.project_path(project)).await
    }

    async fn load_segments(
        &self,
        project: &str,
        env: &str,
    ) -> Result<Vec<SegmentSnapshot>, StoreError> {
        let list: ItemList<SegmentSnapshot> = Self::read(self.segments_path(project, env)).await?;
        Ok(list.into_vec())
    }

    async fn load_flag_index(&self, project: &str) -> Result<Vec<String>, StoreError> {
        Self::read(self.flag_index_path(project)).await
    }

    async fn load_flag(&self, project: &str, flag: &str) -> Result<FlagSnapshot, StoreError> {
        Self::read(self.flag_path(project, flag)).await
    }
}

#[async_trait]
impl SnapshotSink for FsSnapshotStore {
    async fn save_project(&self, project: &str, doc: &Value) -> Result<(), StoreError> {
        Self::write(self.project_path(project), doc).await
    }

    async fn save_segments(&self, project: &str, env: &str, doc: &Value) -> Result<(), StoreError> {
        Self::write(self.segments_path(project, env), doc).await
    }

    async fn save_flag_index(&self, project: &str, keys: &[String]) -> Result<(), StoreError> {
        Self::write(self.flag_index_path(project), keys).await
    }

    async fn save_flag(&self, project: &str, flag: &str, doc: &Value) -> Result<(), StoreError> {
        Self::write(self.flag_path(project, flag), doc).await
    }
}
