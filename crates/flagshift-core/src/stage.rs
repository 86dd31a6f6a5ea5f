//! Per-project migration stages

use crate::error::MigrationError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a project migration is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MigrationStage {
    /// Not started
    Pending,
    /// Posting the project with its environments
    CreateProject,
    /// Creating and patching segments, environment by environment
    CreateSegments,
    /// Creating flags with global fields
    CreateFlags,
    /// Patching per-environment flag configuration
    PatchFlagEnvironments,
    /// Assembling the report
    Report,
    /// Finished with nothing to review
    Completed,
    /// Finished with flags or resources to review
    CompletedWithWarnings,
    /// Stopped by the cancellation token
    Cancelled,
}

impl MigrationStage {
    /// Whether no further transition is possible
    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::CompletedWithWarnings | Self::Cancelled
        )
    }
}

impl fmt::Display for MigrationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Stages reachable from `from`
///
/// Every stage before `Report` may be cancelled.
#[must_use]
pub fn allowed_transitions(from: MigrationStage) -> Vec<MigrationStage> {
    use MigrationStage::*;
    match from {
        Pending => vec![CreateProject, Cancelled],
        CreateProject => vec![CreateSegments, Cancelled],
        CreateSegments => vec![CreateFlags, Cancelled],
        CreateFlags => vec![PatchFlagEnvironments, Cancelled],
        PatchFlagEnvironments => vec![Report, Cancelled],
        Report => vec![Completed, CompletedWithWarnings],
        Completed | CompletedWithWarnings | Cancelled => vec![],
    }
}

/// Check a transition
///
/// # Errors
/// [`MigrationError::Stage`] if `to` is not reachable from `from`.
pub fn validate_transition(from: MigrationStage, to: MigrationStage) -> Result<(), MigrationError> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(MigrationError::Stage { from, to })
    }
}
