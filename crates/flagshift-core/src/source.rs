//! Source fetcher
//!
//! Pulls a project's raw documents from the source account and hands them to a
//! [`SnapshotSink`] unchanged, so the migration reads exactly what the source
//! API returned.

use crate::error::SourceError;
use crate::store::SnapshotSink;
use flagshift_client::{ApiRequest, ApiResponse, ClientError, RateLimitedClient};
use flagshift_model::ProjectSnapshot;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::Instrument;

/// Flags requested per index page
pub const DEFAULT_PAGE_SIZE: usize = 20;

#[derive(Debug, Deserialize)]
struct Keyed {
    key: String,
}

#[derive(Debug, Deserialize)]
struct Page {
    #[serde(default)]
    items: Vec<Keyed>,
    #[serde(rename = "_links", default)]
    links: Option<serde_json::Map<String, Value>>,
}

impl Page {
    fn has_next(&self) -> bool {
        self.links
            .as_ref()
            .and_then(|links| links.get("next"))
            .is_some_and(|next| !next.is_null())
    }
}

/// What was fetched for one project
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchSummary {
    /// Project key
    pub project: String,
    /// Environments whose segments were stored
    pub environments: usize,
    /// Flags stored
    pub flags: usize,
    /// Flags the source refused to return
    pub failed_flags: Vec<String>,
}

/// Downloads projects into a snapshot sink
pub struct SourceFetcher {
    client: Arc<RateLimitedClient>,
    sink: Arc<dyn SnapshotSink>,
    page_size: usize,
}

impl SourceFetcher {
    /// Fetcher with the default page size
    #[must_use]
    pub fn new(client: Arc<RateLimitedClient>, sink: Arc<dyn SnapshotSink>) -> Self {
        Self {
            client,
            sink,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Set flag index page size (minimum 1)
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Keys of every project visible to the credential
    ///
    /// # Errors
    /// [`SourceError::Status`] if the listing is refused.
    pub async fn list_projects(&self) -> Result<Vec<String>, SourceError> {
        let resp = self
            .fetch(ApiRequest::get("projects").describe("Listing projects"), "projects")
            .await?;
        let page: Page = resp.json()?;
        Ok(page.items.into_iter().map(|p| p.key).collect())
    }

    /// Fetch and store one project with segments and flags
    ///
    /// # Errors
    /// Fails when the project, a segment list or an index page cannot be
    /// fetched or stored. Individual flag failures are collected instead.
    pub async fn fetch_project(&self, key: &str) -> Result<FetchSummary, SourceError> {
        self.fetch_in_span(key)
            .instrument(tracing::info_span!("source", project = key))
            .await
    }

    async fn fetch_in_span(&self, key: &str) -> Result<FetchSummary, SourceError> {
        let resp = self
            .fetch(
                ApiRequest::get(format!("projects/{key}?expand=environments"))
                    .describe(format!("Getting project {key}")),
                &format!("project {key}"),
            )
            .await?;
        let raw: Value = resp.json()?;
        let project: ProjectSnapshot = resp.json()?;
        self.sink.save_project(key, &raw).await?;

        let envs = project.environment_keys();
        tracing::info!(project = key, environments = envs.len(), "found environments");
        for env in &envs {
            self.checkpoint()?;
            let resp = self
                .fetch(
                    ApiRequest::get(format!("segments/{key}/{env}"))
                        .describe(format!("Getting segments for {key}/{env}")),
                    &format!("segments {key}/{env}"),
                )
                .await?;
            let doc: Value = resp.json()?;
            self.sink.save_segments(key, env, &doc).await?;
        }

        let flags = self.flag_index(key).await?;
        tracing::info!(project = key, flags = flags.len(), "found flags");
        self.sink.save_flag_index(key, &flags).await?;

        let mut summary = FetchSummary {
            project: key.to_string(),
            environments: envs.len(),
            ..FetchSummary::default()
        };

        for (index, flag) in flags.iter().enumerate() {
            self.checkpoint()?;
            tracing::info!(project = key, flag = %flag, "getting flag {} of {}", index + 1, flags.len());
            let resp = self
                .client
                .request(
                    ApiRequest::get(format!("flags/{key}/{flag}"))
                        .describe(format!("Getting flag {flag}")),
                )
                .await?;
            if !resp.is_success() {
                tracing::warn!(project = key, flag = %flag, status = resp.status(), body = %resp.text(), "error getting flag");
                summary.failed_flags.push(flag.clone());
                continue;
            }
            let doc: Value = resp.json()?;
            self.sink.save_flag(key, flag, &doc).await?;
            summary.flags += 1;
        }

        Ok(summary)
    }

    /// Fetch several projects in order
    ///
    /// # Errors
    /// Stops at the first project that fails.
    pub async fn fetch_projects(&self, keys: &[String]) -> Result<Vec<FetchSummary>, SourceError> {
        let mut summaries = Vec::with_capacity(keys.len());
        for key in keys {
            summaries.push(self.fetch_project(key).await?);
        }
        Ok(summaries)
    }

    async fn flag_index(&self, key: &str) -> Result<Vec<String>, SourceError> {
        let mut offset = 0;
        let mut keys = Vec::new();
        loop {
            self.checkpoint()?;
            tracing::debug!(project = key, offset, limit = self.page_size, "building flag list");
            let path = format!(
                "flags/{key}?summary=true&limit={}&offset={offset}",
                self.page_size
            );
            let resp = self
                .fetch(
                    ApiRequest::get(path).describe(format!("Listing flags of {key} from {offset}")),
                    &format!("flag index {key}"),
                )
                .await?;
            let page: Page = resp.json()?;
            let more = page.has_next() && !page.items.is_empty();
            keys.extend(page.items.into_iter().map(|f| f.key));
            if !more {
                return Ok(keys);
            }
            offset += self.page_size;
        }
    }

    async fn fetch(&self, request: ApiRequest, resource: &str) -> Result<ApiResponse, SourceError> {
        let resp = self.client.request(request).await?;
        if resp.is_success() {
            Ok(resp)
        } else {
            Err(SourceError::Status {
                resource: resource.to_string(),
                status: resp.status(),
                body: resp.text(),
            })
        }
    }

    fn checkpoint(&self) -> Result<(), SourceError> {
        if self.client.cancellation().is_cancelled() {
            Err(ClientError::Cancelled.into())
        } else {
            Ok(())
        }
    }
}

impl std::fmt::Debug for SourceFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceFetcher")
            .field("page_size", &self.page_size)
            .finish_non_exhaustive()
    }
}
