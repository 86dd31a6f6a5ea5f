//! flagshift core
//!
//! Migration engine for feature-flag projects:
//!
//! - [`ResourceProjector`]: source snapshots to destination creation bodies
//! - [`MigrationOrchestrator`]: the staged, fail-open per-project migration
//!   and the batch runner on top of it
//! - [`SnapshotStore`] / [`FsSnapshotStore`]: cached source documents
//! - [`SourceFetcher`]: fills the store from the source account
//!
//! # Example
//!
//! ```rust,no_run
//! use flagshift_client::{ClientConfig, RateLimitedClient};
//! use flagshift_core::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Arc::new(RateLimitedClient::new(ClientConfig::new("api-key"))?);
//! let store = Arc::new(FsSnapshotStore::new("./source"));
//! let orchestrator = MigrationOrchestrator::new(client, store, MigrationConfig::default());
//!
//! let plan = ProjectPlan::new("web", DestinationNaming::Suffix("copy".into()));
//! let report = orchestrator.migrate_project(&plan).await?;
//! for flag in report.flags_to_check() {
//!     println!("check {flag}");
//! }
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]

pub mod config;
pub mod error;
pub mod orchestrator;
pub mod projector;
pub mod report;
pub mod source;
pub mod stage;
pub mod store;

pub use config::{DestinationNaming, MigrationConfig, ProjectPlan};
pub use error::{ConfigError, FailureKind, MigrationError, SourceError, StoreError};
pub use orchestrator::MigrationOrchestrator;
pub use projector::ResourceProjector;
pub use report::{
    BatchSummary, MigrationReport, ProjectOutcome, ProjectResult, ResourceFailure, ResourceRef,
    RunStatus, SkippedResource,
};
pub use source::{FetchSummary, SourceFetcher, DEFAULT_PAGE_SIZE};
pub use stage::{allowed_transitions, validate_transition, MigrationStage};
pub use store::{FsSnapshotStore, SnapshotSink, SnapshotStore};

/// Common imports
pub mod prelude {
    pub use crate::config::{DestinationNaming, MigrationConfig, ProjectPlan};
    pub use crate::error::{FailureKind, MigrationError};
    pub use crate::orchestrator::MigrationOrchestrator;
    pub use crate::report::{BatchSummary, MigrationReport, ProjectOutcome, RunStatus};
    pub use crate::store::{FsSnapshotStore, SnapshotStore};
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
