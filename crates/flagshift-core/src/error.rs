//! Error types for flagshift-core

use flagshift_client::ClientError;
use flagshift_patch::PatchError;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Snapshot storage errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// Document does not exist
    #[error("snapshot not found: {path}")]
    NotFound {
        /// Location that was looked up
        path: PathBuf,
    },

    /// Read or write failed
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Location involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Document is not the expected shape
    #[error("malformed snapshot {path}: {source}")]
    Parse {
        /// Location involved
        path: PathBuf,
        /// Decoder error
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    /// Map an I/O error, turning `NotFound` into [`StoreError::NotFound`]
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::NotFound { path }
        } else {
            Self::Io { path, source }
        }
    }

    /// Whether the document is simply missing
    #[inline]
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Source fetch errors
#[derive(Debug, Error)]
pub enum SourceError {
    /// Request could not complete
    #[error(transparent)]
    Client(#[from] ClientError),

    /// Source answered with a non-success status
    #[error("{resource}: source returned {status}: {body}")]
    Status {
        /// What was being fetched
        resource: String,
        /// Status code
        status: u16,
        /// Response body, for diagnosis
        body: String,
    },

    /// Persisting the snapshot failed
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors that abort a single project migration
///
/// Per-resource failures are recorded in the report instead.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// Project snapshot could not be loaded
    #[error("cannot load project '{project}': {source}")]
    Store {
        /// Source project key
        project: String,
        /// Underlying error
        #[source]
        source: StoreError,
    },

    /// Cancellation token fired
    #[error("migration cancelled")]
    Cancelled,

    /// Request body could not be encoded
    #[error("failed to encode request body: {0}")]
    Encode(#[from] serde_json::Error),

    /// Illegal stage transition
    #[error("illegal stage transition {from} -> {to}")]
    Stage {
        /// Current stage
        from: crate::MigrationStage,
        /// Requested stage
        to: crate::MigrationStage,
    },
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Concurrency must be at least one
    #[error("max concurrent projects must be at least 1")]
    InvalidConcurrency,

    /// Neither explicit projects nor all-projects mode
    #[error("no source project given")]
    NoProjects,

    /// Explicit destination key used with more than one source project
    #[error("an explicit destination key needs exactly one source project, got {0}")]
    AmbiguousDestination(usize),

    /// Config file problem
    #[error("config file {path}: {reason}")]
    File {
        /// File path
        path: PathBuf,
        /// Reason
        reason: String,
    },
}

/// Failure taxonomy for reported resources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureKind {
    /// Rate limit persisted past the retry budget
    RateLimited,
    /// No status received
    Transport,
    /// Non-success status
    Rejected {
        /// Status code
        status: u16,
    },
    /// Source data could not be compiled or loaded
    Malformed,
    /// Resource kind not migrated (unbounded segment)
    Unsupported,
}

impl FailureKind {
    /// Classify a client error
    #[must_use]
    pub fn from_client_error(err: &ClientError) -> Self {
        match err {
            ClientError::RateLimitExhausted { .. } => Self::RateLimited,
            ClientError::Encode(_) | ClientError::Decode { .. } => Self::Malformed,
            _ => Self::Transport,
        }
    }
}

impl From<&PatchError> for FailureKind {
    fn from(_: &PatchError) -> Self {
        Self::Malformed
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RateLimited => f.write_str("rate limited"),
            Self::Transport => f.write_str("transport failure"),
            Self::Rejected { status } => write!(f, "rejected ({status})"),
            Self::Malformed => f.write_str("malformed source data"),
            Self::Unsupported => f.write_str("unsupported"),
        }
    }
}
