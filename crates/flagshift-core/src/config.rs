//! Migration configuration and destination naming

use crate::error::ConfigError;
use flagshift_model::ProjectSnapshot;

/// How the orchestrator behaves around partial failures
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationConfig {
    /// Patch segments/flags even when their create call failed
    ///
    /// The destination may already hold the resource from an earlier partial
    /// run. Skipped patches are recorded as warnings when disabled.
    pub patch_after_failed_create: bool,
    /// Only patch flags in these environments; `None` means all
    pub environment_filter: Option<Vec<String>>,
    /// Projects migrated at once over the shared client
    pub max_concurrent_projects: usize,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            patch_after_failed_create: true,
            environment_filter: None,
            max_concurrent_projects: 1,
        }
    }
}

impl MigrationConfig {
    /// Set fail-open policy
    #[must_use]
    pub fn with_patch_after_failed_create(mut self, enabled: bool) -> Self {
        self.patch_after_failed_create = enabled;
        self
    }

    /// Restrict flag patching to `envs`
    #[must_use]
    pub fn with_environment_filter(mut self, envs: Vec<String>) -> Self {
        self.environment_filter = Some(envs);
        self
    }

    /// Set project concurrency
    #[must_use]
    pub fn with_max_concurrent_projects(mut self, n: usize) -> Self {
        self.max_concurrent_projects = n;
        self
    }

    /// Check invariants
    ///
    /// # Errors
    /// [`ConfigError::InvalidConcurrency`] when concurrency is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrent_projects == 0 {
            return Err(ConfigError::InvalidConcurrency);
        }
        Ok(())
    }

    /// Whether flag patches run for `env`
    #[must_use]
    pub fn patches_environment(&self, env: &str) -> bool {
        self.environment_filter
            .as_ref()
            .map_or(true, |envs| envs.iter().any(|e| e == env))
    }
}

/// How destination keys are derived from source keys
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DestinationNaming {
    /// Keep source key and name
    Same,
    /// Single project with an explicit key; the key is also the name
    Explicit(String),
    /// `<key>-<suffix>`, named `<name> <suffix>`
    Suffix(String),
}

/// One source project mapped onto its destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectPlan {
    /// Source project key
    pub source_key: String,
    naming: DestinationNaming,
}

impl ProjectPlan {
    /// Plan for `source_key`
    #[must_use]
    pub fn new(source_key: impl Into<String>, naming: DestinationNaming) -> Self {
        Self {
            source_key: source_key.into(),
            naming,
        }
    }

    /// Plans for several projects under one naming rule
    ///
    /// # Errors
    /// - [`ConfigError::NoProjects`] for an empty list
    /// - [`ConfigError::AmbiguousDestination`] for an explicit key with
    ///   more than one source
    pub fn for_projects(
        keys: impl IntoIterator<Item = String>,
        naming: &DestinationNaming,
    ) -> Result<Vec<Self>, ConfigError> {
        let plans: Vec<Self> = keys
            .into_iter()
            .map(|key| Self::new(key, naming.clone()))
            .collect();
        if plans.is_empty() {
            return Err(ConfigError::NoProjects);
        }
        if matches!(naming, DestinationNaming::Explicit(_)) && plans.len() > 1 {
            return Err(ConfigError::AmbiguousDestination(plans.len()));
        }
        Ok(plans)
    }

    /// Naming rule
    #[must_use]
    pub fn naming(&self) -> &DestinationNaming {
        &self.naming
    }

    /// Destination key
    #[must_use]
    pub fn destination_key(&self) -> String {
        match &self.naming {
            DestinationNaming::Same => self.source_key.clone(),
            DestinationNaming::Explicit(key) => key.clone(),
            DestinationNaming::Suffix(suffix) => format!("{}-{suffix}", self.source_key),
        }
    }

    /// Destination display name for a loaded source project
    #[must_use]
    pub fn destination_name(&self, source: &ProjectSnapshot) -> String {
        match &self.naming {
            DestinationNaming::Same => source.name.clone(),
            DestinationNaming::Explicit(key) => key.clone(),
            DestinationNaming::Suffix(suffix) => format!("{} {suffix}", source.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn source() -> ProjectSnapshot {
        serde_json::from_value(serde_json::json!({"key": "web", "name": "Web App"})).unwrap()
    }

    #[test]
    fn naming_rules() {
        let same = ProjectPlan::new("web", DestinationNaming::Same);
        assert_eq!(same.destination_key(), "web");
        assert_eq!(same.destination_name(&source()), "Web App");

        let explicit = ProjectPlan::new("web", DestinationNaming::Explicit("web-eu".into()));
        assert_eq!(explicit.destination_key(), "web-eu");
        assert_eq!(explicit.destination_name(&source()), "web-eu");

        let suffix = ProjectPlan::new("web", DestinationNaming::Suffix("copy".into()));
        assert_eq!(suffix.destination_key(), "web-copy");
        assert_eq!(suffix.destination_name(&source()), "Web App copy");
    }

    #[test]
    fn explicit_key_needs_one_project() {
        let naming = DestinationNaming::Explicit("dest".into());
        let err = ProjectPlan::for_projects(vec!["a".into(), "b".into()], &naming).unwrap_err();
        assert!(matches!(err, ConfigError::AmbiguousDestination(2)));
        assert!(matches!(
            ProjectPlan::for_projects(Vec::new(), &DestinationNaming::Same),
            Err(ConfigError::NoProjects)
        ));
    }

    #[test]
    fn environment_filter() {
        let config = MigrationConfig::default();
        assert!(config.patches_environment("anything"));

        let filtered = config.with_environment_filter(vec!["production".into()]);
        assert!(filtered.patches_environment("production"));
        assert!(!filtered.patches_environment("test"));
    }

    #[test]
    fn zero_concurrency_rejected() {
        let config = MigrationConfig::default().with_max_concurrent_projects(0);
        assert!(matches!(config.validate(), Err(ConfigError::InvalidConcurrency)));
    }
}
