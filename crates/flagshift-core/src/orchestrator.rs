//! Migration orchestrator
//!
//! Drives one project through its stages:
//!
//! 1. create the project with its environments
//! 2. per environment, create segments and patch their membership and rules
//! 3. create every flag with its global fields
//! 4. per environment, per flag, send one combined configuration patch
//! 5. report
//!
//! Business failures (non-success statuses, malformed source data) degrade the
//! single resource they concern and land in the [`MigrationReport`]. Only an
//! unreadable project snapshot stops a project; nothing stops the batch.

use crate::config::{MigrationConfig, ProjectPlan};
use crate::error::{FailureKind, MigrationError};
use crate::projector::ResourceProjector;
use crate::report::{BatchSummary, MigrationReport, ProjectResult, ResourceRef};
use crate::stage::{validate_transition, MigrationStage};
use crate::store::SnapshotStore;
use chrono::Utc;
use flagshift_client::{ApiRequest, ApiResponse, ClientError, RateLimitedClient};
use flagshift_model::{FlagSnapshot, PatchOperation, ProjectSnapshot, SegmentSnapshot};
use futures::stream::{self, StreamExt};
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use ulid::Ulid;

/// Highest status not treated as a flag warning
const CLEAN_PATCH_STATUS: u16 = 200;

/// Result of one dispatched request, short of cancellation
enum Dispatch {
    Status(ApiResponse),
    Failed { kind: FailureKind, detail: String },
}

/// A loaded flag and whether its create call succeeded
struct LoadedFlag {
    snapshot: FlagSnapshot,
    created: bool,
}

/// Mutable state of one project migration
struct ProjectRun {
    source: ProjectSnapshot,
    report: MigrationReport,
}

impl ProjectRun {
    fn dest(&self) -> &str {
        &self.report.destination_key
    }

    fn advance(&mut self, to: MigrationStage) -> Result<(), MigrationError> {
        validate_transition(self.report.stage, to)?;
        tracing::debug!(from = %self.report.stage, to = %to, "stage transition");
        self.report.stage = to;
        Ok(())
    }
}

/// Migrates projects from a snapshot store to the destination API
pub struct MigrationOrchestrator {
    client: Arc<RateLimitedClient>,
    store: Arc<dyn SnapshotStore>,
    projector: ResourceProjector,
    config: MigrationConfig,
    cancel: CancellationToken,
}

impl MigrationOrchestrator {
    /// Orchestrator sharing `client` and its cancellation token
    #[must_use]
    pub fn new(
        client: Arc<RateLimitedClient>,
        store: Arc<dyn SnapshotStore>,
        config: MigrationConfig,
    ) -> Self {
        let cancel = client.cancellation().clone();
        Self {
            client,
            store,
            projector: ResourceProjector::new(),
            config,
            cancel,
        }
    }

    /// Replace the projector
    #[must_use]
    pub fn with_projector(mut self, projector: ResourceProjector) -> Self {
        self.projector = projector;
        self
    }

    /// Check `token` between steps
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Active configuration
    #[must_use]
    pub fn config(&self) -> &MigrationConfig {
        &self.config
    }

    /// Migrate every plan, up to `max_concurrent_projects` at once
    ///
    /// Results keep plan order. All projects share one client, so a rate
    /// limit seen by one slows every other.
    pub async fn run(&self, plans: Vec<ProjectPlan>) -> BatchSummary {
        let run_id = Ulid::new();
        let started_at = Utc::now();
        let clock = Instant::now();
        let concurrency = self.config.max_concurrent_projects.max(1);

        tracing::info!(%run_id, projects = plans.len(), concurrency, "starting migration run");

        let projects: Vec<ProjectResult> = stream::iter(plans)
            .map(|plan| async move {
                let result = self.migrate_project(&plan).await;
                if let Err(e) = &result {
                    tracing::error!(project = %plan.source_key, error = %e, "project migration failed");
                }
                ProjectResult {
                    source_key: plan.source_key,
                    result,
                }
            })
            .buffered(concurrency)
            .collect()
            .await;

        let summary = BatchSummary {
            run_id,
            started_at,
            elapsed: clock.elapsed(),
            projects,
        };
        tracing::info!(
            %run_id,
            completed = summary.completed(),
            elapsed_ms = u64::try_from(summary.elapsed.as_millis()).unwrap_or(u64::MAX),
            "migration run finished"
        );
        summary
    }

    /// Migrate one project
    ///
    /// Cancellation yields `Ok` with a report in [`MigrationStage::Cancelled`].
    ///
    /// # Errors
    /// - [`MigrationError::Store`] when the project snapshot cannot be read
    /// - [`MigrationError::Encode`] when a body cannot be serialized
    pub async fn migrate_project(&self, plan: &ProjectPlan) -> Result<MigrationReport, MigrationError> {
        let dest_key = plan.destination_key();
        let span = tracing::info_span!("project", source = %plan.source_key, destination = %dest_key);

        self.migrate_in_span(plan, dest_key).instrument(span).await
    }

    async fn migrate_in_span(
        &self,
        plan: &ProjectPlan,
        dest_key: String,
    ) -> Result<MigrationReport, MigrationError> {
        if self.cancel.is_cancelled() {
            let mut report = MigrationReport::new(&plan.source_key, dest_key);
            report.stage = MigrationStage::Cancelled;
            return Ok(report);
        }

        let source = self
            .store
            .load_project(&plan.source_key)
            .await
            .map_err(|source| MigrationError::Store {
                project: plan.source_key.clone(),
                source,
            })?;

        let mut run = ProjectRun {
            report: MigrationReport::new(&plan.source_key, dest_key),
            source,
        };

        match self.execute(plan, &mut run).await {
            Ok(()) => {}
            Err(MigrationError::Cancelled) => {
                tracing::warn!(stage = %run.report.stage, "migration cancelled");
                run.advance(MigrationStage::Cancelled)?;
                return Ok(run.report);
            }
            Err(e) => return Err(e),
        }

        run.advance(MigrationStage::Report)?;
        self.log_report(&run.report);
        let terminal = if run.report.has_warnings() {
            MigrationStage::CompletedWithWarnings
        } else {
            MigrationStage::Completed
        };
        run.advance(terminal)?;
        Ok(run.report)
    }

    async fn execute(&self, plan: &ProjectPlan, run: &mut ProjectRun) -> Result<(), MigrationError> {
        run.advance(MigrationStage::CreateProject)?;
        self.create_project(plan, run).await?;

        self.checkpoint()?;
        run.advance(MigrationStage::CreateSegments)?;
        let envs: Vec<String> = run.source.environment_keys().into_iter().map(String::from).collect();
        for env in &envs {
            self.checkpoint()?;
            self.create_segments(run, env).await?;
        }

        self.checkpoint()?;
        run.advance(MigrationStage::CreateFlags)?;
        let flags = self.create_flags(run).await?;

        self.checkpoint()?;
        run.advance(MigrationStage::PatchFlagEnvironments)?;
        for env in envs.iter().filter(|env| self.config.patches_environment(env)) {
            for flag in flags.values() {
                self.checkpoint()?;
                self.patch_flag_environment(run, flag, env).await?;
            }
        }

        Ok(())
    }

    async fn create_project(&self, plan: &ProjectPlan, run: &mut ProjectRun) -> Result<(), MigrationError> {
        let dest = run.dest().to_string();
        let name = plan.destination_name(&run.source);
        let body = self.projector.project_project(&run.source, &dest, &name);
        let request = ApiRequest::post("projects", to_json(&body)?)
            .describe(format!("Creating project {dest}"));

        let resource = ResourceRef::Project { key: dest.clone() };
        match self.dispatch(request).await? {
            Dispatch::Status(resp) if resp.is_success() => {}
            Dispatch::Status(resp) => {
                tracing::warn!(status = resp.status(), body = %resp.text(), "project create rejected, continuing");
                run.report.record_failure(
                    resource,
                    FailureKind::Rejected { status: resp.status() },
                    Some(resp.text()),
                );
            }
            Dispatch::Failed { kind, detail } => {
                tracing::warn!(%kind, %detail, "project create failed, continuing");
                run.report.record_failure(resource, kind, Some(detail));
            }
        }
        Ok(())
    }

    async fn create_segments(&self, run: &mut ProjectRun, env: &str) -> Result<(), MigrationError> {
        let segments = match self.store.load_segments(&run.report.source_key, env).await {
            Ok(segments) => segments,
            Err(e) => {
                tracing::warn!(env, error = %e, "cannot read segments, skipping environment");
                run.report.record_failure(
                    ResourceRef::SegmentList { env: env.to_string() },
                    FailureKind::Malformed,
                    Some(e.to_string()),
                );
                return Ok(());
            }
        };

        for segment in &segments {
            self.checkpoint()?;
            self.migrate_segment(run, env, segment).await?;
        }
        Ok(())
    }

    async fn migrate_segment(
        &self,
        run: &mut ProjectRun,
        env: &str,
        segment: &SegmentSnapshot,
    ) -> Result<(), MigrationError> {
        let resource = ResourceRef::Segment {
            env: env.to_string(),
            key: segment.key.clone(),
        };
        let Some(body) = self.projector.project_segment(segment) else {
            tracing::warn!(segment = %segment.key, env, "segment is unbounded, skipping");
            run.report.record_skip(resource, "unbounded segment");
            return Ok(());
        };

        let dest = run.dest().to_string();
        let request = ApiRequest::post(format!("segments/{dest}/{env}"), to_json(&body)?)
            .describe(format!("Creating segment {} in {env}", segment.key));
        let created = self.record_create(run, resource.clone(), request).await?;
        if created {
            run.report.segments_created += 1;
        } else if !self.config.patch_after_failed_create {
            run.report.record_skip(resource, "create failed, patch skipped");
            return Ok(());
        }

        let ops = self.projector.segment_patch(segment);
        if ops.is_empty() {
            return Ok(());
        }
        if segment.rules.as_ref().is_some_and(|rules| !rules.is_empty()) {
            tracing::info!(segment = %segment.key, env, "copying segment rules");
        }

        let request = ApiRequest::patch(format!("segments/{dest}/{env}/{}", segment.key), to_json(&ops)?)
            .describe(format!("Patching segment {} in {env}", segment.key));
        match self.dispatch(request).await? {
            Dispatch::Status(resp) if resp.is_success() => run.report.patches_applied += 1,
            Dispatch::Status(resp) => run.report.record_failure(
                resource,
                FailureKind::Rejected { status: resp.status() },
                Some(resp.text()),
            ),
            Dispatch::Failed { kind, detail } => run.report.record_failure(resource, kind, Some(detail)),
        }
        Ok(())
    }

    async fn create_flags(&self, run: &mut ProjectRun) -> Result<IndexMap<String, LoadedFlag>, MigrationError> {
        let source_key = run.report.source_key.clone();
        let keys = match self.store.load_flag_index(&source_key).await {
            Ok(keys) => keys,
            Err(e) => {
                tracing::warn!(error = %e, "cannot read flag index, no flags migrated");
                run.report
                    .record_failure(ResourceRef::FlagIndex, FailureKind::Malformed, Some(e.to_string()));
                return Ok(IndexMap::new());
            }
        };

        let total = keys.len();
        let dest = run.dest().to_string();
        let mut flags = IndexMap::with_capacity(total);

        for (index, key) in keys.into_iter().enumerate() {
            self.checkpoint()?;
            tracing::info!(flag = %key, "reading flag {} of {total}", index + 1);

            let snapshot = match self.store.load_flag(&source_key, &key).await {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    tracing::warn!(flag = %key, error = %e, "cannot read flag");
                    run.report.record_failure(
                        ResourceRef::Flag { key: key.clone() },
                        FailureKind::Malformed,
                        Some(e.to_string()),
                    );
                    run.report.flag_for_review(&key);
                    continue;
                }
            };

            let body = self.projector.project_flag(&snapshot);
            let request = ApiRequest::post(format!("flags/{dest}"), to_json(&body)?)
                .describe(format!("Creating flag {key}"));
            let created = self
                .record_create(run, ResourceRef::Flag { key: key.clone() }, request)
                .await?;
            if created {
                run.report.flags_created += 1;
            } else {
                run.report.flag_for_review(&key);
            }

            flags.insert(key, LoadedFlag { snapshot, created });
        }

        Ok(flags)
    }

    async fn patch_flag_environment(
        &self,
        run: &mut ProjectRun,
        flag: &LoadedFlag,
        env: &str,
    ) -> Result<(), MigrationError> {
        let key = flag.snapshot.key.as_str();
        let resource = ResourceRef::FlagEnvironment {
            key: key.to_string(),
            env: env.to_string(),
        };

        if !flag.created && !self.config.patch_after_failed_create {
            run.report.record_skip(resource, "create failed, patch skipped");
            return Ok(());
        }

        let ops: Vec<PatchOperation> = match self.projector.flag_environment_patch(&flag.snapshot, env) {
            Ok(Some(ops)) if !ops.is_empty() => ops,
            Ok(_) => return Ok(()),
            Err(e) => {
                tracing::warn!(flag = key, env, error = %e, "cannot compile flag patch");
                run.report.record_failure(resource, FailureKind::Malformed, Some(e.to_string()));
                run.report.flag_for_review(key);
                return Ok(());
            }
        };

        let dest = run.dest().to_string();
        let request = ApiRequest::patch(format!("flags/{dest}/{key}"), to_json(&ops)?)
            .describe(format!("Patching {key} with environment [{env}] specific configuration"));

        match self.dispatch(request).await? {
            Dispatch::Status(resp) => {
                let status = resp.status();
                if resp.is_success() {
                    run.report.patches_applied += 1;
                } else {
                    run.report.record_failure(resource, FailureKind::Rejected { status }, Some(resp.text()));
                }
                if status > CLEAN_PATCH_STATUS {
                    run.report.flag_for_review(key);
                }
            }
            Dispatch::Failed { kind, detail } => {
                run.report.record_failure(resource, kind, Some(detail));
                run.report.flag_for_review(key);
            }
        }
        tracing::debug!(flag = key, env, "finished patching flag");
        Ok(())
    }

    /// Send a create call and record anything but success; returns whether it succeeded
    async fn record_create(
        &self,
        run: &mut ProjectRun,
        resource: ResourceRef,
        request: ApiRequest,
    ) -> Result<bool, MigrationError> {
        match self.dispatch(request).await? {
            Dispatch::Status(resp) if resp.is_success() => Ok(true),
            Dispatch::Status(resp) => {
                tracing::debug!(%resource, status = resp.status(), body = %resp.text(), "create rejected");
                run.report.record_failure(
                    resource,
                    FailureKind::Rejected { status: resp.status() },
                    Some(resp.text()),
                );
                Ok(false)
            }
            Dispatch::Failed { kind, detail } => {
                run.report.record_failure(resource, kind, Some(detail));
                Ok(false)
            }
        }
    }

    async fn dispatch(&self, request: ApiRequest) -> Result<Dispatch, MigrationError> {
        match self.client.request(request).await {
            Ok(resp) => Ok(Dispatch::Status(resp)),
            Err(ClientError::Cancelled) => Err(MigrationError::Cancelled),
            Err(e) => Ok(Dispatch::Failed {
                kind: FailureKind::from_client_error(&e),
                detail: e.to_string(),
            }),
        }
    }

    fn checkpoint(&self) -> Result<(), MigrationError> {
        if self.cancel.is_cancelled() {
            Err(MigrationError::Cancelled)
        } else {
            Ok(())
        }
    }

    fn log_report(&self, report: &MigrationReport) {
        tracing::info!(
            segments = report.segments_created,
            flags = report.flags_created,
            patches = report.patches_applied,
            failures = report.failures().len(),
            skipped = report.skipped().len(),
            "project migrated"
        );
        let flags: Vec<&str> = report.flags_to_check().collect();
        if !flags.is_empty() {
            tracing::warn!(
                count = flags.len(),
                flags = %flags.join(", "),
                "flags to double check, their patch had an error or warning"
            );
        }
    }
}

impl std::fmt::Debug for MigrationOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MigrationOrchestrator")
            .field("client", &self.client)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn to_json<T: Serialize + ?Sized>(body: &T) -> Result<Value, MigrationError> {
    Ok(serde_json::to_value(body)?)
}
