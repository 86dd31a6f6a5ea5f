//! Migration results
//!
//! One [`MigrationReport`] per project, owned by that project's run. The batch
//! runner collects them into a [`BatchSummary`].

use crate::error::{FailureKind, MigrationError};
use crate::stage::MigrationStage;
use chrono::{DateTime, Utc};
use indexmap::IndexSet;
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use ulid::Ulid;

/// Destination resource a report entry refers to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResourceRef {
    /// The project itself
    Project {
        /// Destination key
        key: String,
    },
    /// All segments of one environment
    SegmentList {
        /// Environment key
        env: String,
    },
    /// One segment
    Segment {
        /// Environment key
        env: String,
        /// Segment key
        key: String,
    },
    /// The flag index
    FlagIndex,
    /// A flag's global definition
    Flag {
        /// Flag key
        key: String,
    },
    /// A flag's configuration in one environment
    FlagEnvironment {
        /// Flag key
        key: String,
        /// Environment key
        env: String,
    },
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Project { key } => write!(f, "project {key}"),
            Self::SegmentList { env } => write!(f, "segments of {env}"),
            Self::Segment { env, key } => write!(f, "segment {key} in {env}"),
            Self::FlagIndex => f.write_str("flag index"),
            Self::Flag { key } => write!(f, "flag {key}"),
            Self::FlagEnvironment { key, env } => write!(f, "flag {key} in {env}"),
        }
    }
}

/// A resource that did not fully migrate
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceFailure {
    /// Affected resource
    pub resource: ResourceRef,
    /// Classification
    #[serde(flatten)]
    pub kind: FailureKind,
    /// Response body or error message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// A resource deliberately not migrated
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedResource {
    /// Skipped resource
    pub resource: ResourceRef,
    /// Why
    pub reason: String,
}

/// Terminal result of one project
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectOutcome {
    /// Everything applied
    Completed,
    /// Finished, with resources to review
    CompletedWithWarnings,
    /// Stopped early
    Cancelled,
}

/// Result of migrating one project
#[derive(Debug, Clone, Serialize)]
pub struct MigrationReport {
    /// Source project key
    pub source_key: String,
    /// Destination project key
    pub destination_key: String,
    /// Last stage reached
    pub stage: MigrationStage,
    /// Segments created
    pub segments_created: usize,
    /// Flags created
    pub flags_created: usize,
    /// Patch calls that succeeded
    pub patches_applied: usize,
    flags_to_check: IndexSet<String>,
    failures: Vec<ResourceFailure>,
    skipped: Vec<SkippedResource>,
}

impl MigrationReport {
    /// Empty report at [`MigrationStage::Pending`]
    #[must_use]
    pub fn new(source_key: impl Into<String>, destination_key: impl Into<String>) -> Self {
        Self {
            source_key: source_key.into(),
            destination_key: destination_key.into(),
            stage: MigrationStage::Pending,
            segments_created: 0,
            flags_created: 0,
            patches_applied: 0,
            flags_to_check: IndexSet::new(),
            failures: Vec::new(),
            skipped: Vec::new(),
        }
    }

    /// Flag keys needing manual review, each once, in first-seen order
    pub fn flags_to_check(&self) -> impl Iterator<Item = &str> {
        self.flags_to_check.iter().map(String::as_str)
    }

    /// Recorded failures in occurrence order
    #[must_use]
    pub fn failures(&self) -> &[ResourceFailure] {
        &self.failures
    }

    /// Deliberately skipped resources
    #[must_use]
    pub fn skipped(&self) -> &[SkippedResource] {
        &self.skipped
    }

    /// Mark a flag for review; returns `false` if it was already marked
    pub fn flag_for_review(&mut self, flag: &str) -> bool {
        self.flags_to_check.insert(flag.to_string())
    }

    /// Record a failure
    pub fn record_failure(&mut self, resource: ResourceRef, kind: FailureKind, detail: Option<String>) {
        self.failures.push(ResourceFailure {
            resource,
            kind,
            detail,
        });
    }

    /// Record a deliberate skip
    pub fn record_skip(&mut self, resource: ResourceRef, reason: impl Into<String>) {
        self.skipped.push(SkippedResource {
            resource,
            reason: reason.into(),
        });
    }

    /// Whether anything needs operator attention
    #[must_use]
    pub fn has_warnings(&self) -> bool {
        !self.flags_to_check.is_empty() || !self.failures.is_empty()
    }

    /// Terminal outcome, `None` while still running
    #[must_use]
    pub fn outcome(&self) -> Option<ProjectOutcome> {
        match self.stage {
            MigrationStage::Completed => Some(ProjectOutcome::Completed),
            MigrationStage::CompletedWithWarnings => Some(ProjectOutcome::CompletedWithWarnings),
            MigrationStage::Cancelled => Some(ProjectOutcome::Cancelled),
            _ => None,
        }
    }
}

/// One project's entry in a batch
#[derive(Debug)]
pub struct ProjectResult {
    /// Source project key
    pub source_key: String,
    /// Report, or the error that stopped the project
    pub result: Result<MigrationReport, MigrationError>,
}

/// Overall status of a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RunStatus {
    /// Every project completed cleanly
    Success,
    /// At least one project needs review
    Warnings,
    /// At least one project could not run
    Failed,
    /// Cancellation stopped the batch
    Cancelled,
}

/// Everything a batch run produced
#[derive(Debug)]
pub struct BatchSummary {
    /// Unique run identifier, for correlating logs
    pub run_id: Ulid,
    /// Wall-clock start
    pub started_at: DateTime<Utc>,
    /// Total duration
    pub elapsed: Duration,
    /// Per-project results in plan order
    pub projects: Vec<ProjectResult>,
}

impl BatchSummary {
    /// Reports of projects that ran, in plan order
    pub fn reports(&self) -> impl Iterator<Item = &MigrationReport> {
        self.projects.iter().filter_map(|p| p.result.as_ref().ok())
    }

    /// Projects that reached a completed stage
    #[must_use]
    pub fn completed(&self) -> usize {
        self.reports()
            .filter(|r| {
                matches!(
                    r.outcome(),
                    Some(ProjectOutcome::Completed | ProjectOutcome::CompletedWithWarnings)
                )
            })
            .count()
    }

    /// Worst status across all projects
    #[must_use]
    pub fn status(&self) -> RunStatus {
        self.projects
            .iter()
            .map(|p| match &p.result {
                Err(MigrationError::Cancelled) => RunStatus::Cancelled,
                Err(_) => RunStatus::Failed,
                Ok(report) => match report.outcome() {
                    Some(ProjectOutcome::Completed) => RunStatus::Success,
                    Some(ProjectOutcome::Cancelled) => RunStatus::Cancelled,
                    _ => RunStatus::Warnings,
                },
            })
            .max()
            .unwrap_or(RunStatus::Success)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn finished(stage: MigrationStage) -> MigrationReport {
        let mut report = MigrationReport::new("web", "web-copy");
        report.stage = stage;
        report
    }

    fn summary(projects: Vec<ProjectResult>) -> BatchSummary {
        BatchSummary {
            run_id: Ulid::new(),
            started_at: Utc::now(),
            elapsed: Duration::ZERO,
            projects,
        }
    }

    #[test]
    fn flags_are_listed_once() {
        let mut report = MigrationReport::new("web", "web");
        assert!(report.flag_for_review("beta"));
        assert!(report.flag_for_review("dark-mode"));
        assert!(!report.flag_for_review("beta"));
        assert_eq!(report.flags_to_check().collect::<Vec<_>>(), vec!["beta", "dark-mode"]);
        assert!(report.has_warnings());
    }

    #[test]
    fn skips_alone_are_not_warnings() {
        let mut report = MigrationReport::new("web", "web");
        report.record_skip(
            ResourceRef::Segment {
                env: "production".into(),
                key: "big".into(),
            },
            "unbounded",
        );
        assert!(!report.has_warnings());
    }

    #[test]
    fn status_is_worst_outcome() {
        let ok = |stage| ProjectResult {
            source_key: "p".into(),
            result: Ok(finished(stage)),
        };

        assert_eq!(summary(vec![]).status(), RunStatus::Success);
        assert_eq!(
            summary(vec![ok(MigrationStage::Completed)]).status(),
            RunStatus::Success
        );
        assert_eq!(
            summary(vec![
                ok(MigrationStage::Completed),
                ok(MigrationStage::CompletedWithWarnings)
            ])
            .status(),
            RunStatus::Warnings
        );

        let batch = summary(vec![
            ok(MigrationStage::CompletedWithWarnings),
            ProjectResult {
                source_key: "gone".into(),
                result: Err(MigrationError::Store {
                    project: "gone".into(),
                    source: crate::error::StoreError::NotFound {
                        path: "project/gone/project.json".into(),
                    },
                }),
            },
        ]);
        assert_eq!(batch.status(), RunStatus::Failed);
        assert_eq!(batch.completed(), 1);

        assert_eq!(
            summary(vec![ok(MigrationStage::Cancelled)]).status(),
            RunStatus::Cancelled
        );
    }

    #[test]
    fn failure_serializes_flat() {
        let failure = ResourceFailure {
            resource: ResourceRef::FlagEnvironment {
                key: "beta".into(),
                env: "test".into(),
            },
            kind: FailureKind::Rejected { status: 400 },
            detail: None,
        };
        assert_eq!(
            serde_json::to_value(&failure).unwrap(),
            serde_json::json!({
                "resource": {"type": "flag_environment", "key": "beta", "env": "test"},
                "kind": "rejected",
                "status": 400
            })
        );
    }
}
