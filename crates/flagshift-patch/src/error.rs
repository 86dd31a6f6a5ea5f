//! Patch compilation errors

/// Errors while compiling patch operations
#[derive(Debug, thiserror::Error)]
pub enum PatchError {
    /// A `rules` field that is not a list of rule objects
    #[error("malformed rules at {path}: {reason}")]
    MalformedRules {
        /// Pointer the rules would have been appended under
        path: String,
        /// What was wrong
        reason: String,
    },
}

impl PatchError {
    /// Create malformed-rules error for path
    pub fn malformed_rules(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedRules {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
