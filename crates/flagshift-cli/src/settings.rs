//! Config file and flag resolution
//!
//! Precedence, highest first: command-line flag, environment variable,
//! config file, built-in default.

use anyhow::{bail, Context, Result};
use clap::ArgMatches;
use flagshift_client::{ClientConfig, RetryPolicy};
use flagshift_core::{ConfigError, DestinationNaming, MigrationConfig, DEFAULT_PAGE_SIZE};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cli::API_KEY_ENV;

/// Snapshot directory when neither flag nor file names one
pub const DEFAULT_SOURCE_DIR: &str = "./source";

/// Contents of a `--config` file
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    /// API access token
    pub api_key: Option<String>,
    /// API domain
    pub domain: Option<String>,
    /// `LD-API-Version` header value
    pub api_version: Option<String>,
    /// Snapshot directory
    pub source_dir: Option<PathBuf>,
    /// `[client]` table
    pub client: ClientSection,
    /// `[migration]` table
    pub migration: MigrationSection,
}

/// `[client]` table
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientSection {
    /// Rate-limit retries per request
    pub max_retries: Option<u32>,
    /// First fallback wait when the server gives no hint
    pub fallback_delay_ms: Option<u64>,
    /// Longest single wait
    pub max_delay_ms: Option<u64>,
    /// Minimum spacing between requests
    pub min_interval_ms: Option<u64>,
    /// Per-request timeout
    pub timeout_secs: Option<u64>,
    /// Flags per index page when fetching
    pub page_size: Option<usize>,
}

/// `[migration]` table
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MigrationSection {
    /// Fail-open patching after a failed create
    pub patch_after_failed_create: Option<bool>,
    /// Environments whose flags are patched
    pub environments: Option<Vec<String>>,
    /// Projects migrated at once
    pub max_concurrent_projects: Option<usize>,
    /// Destination key/name suffix
    pub suffix: Option<String>,
}

impl FileConfig {
    /// Parse a TOML config file
    ///
    /// # Errors
    /// [`ConfigError::File`] when the file is unreadable or malformed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::File {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::parse(&text).map_err(|reason| ConfigError::File {
            path: path.to_path_buf(),
            reason,
        })
    }

    fn parse(text: &str) -> Result<Self, String> {
        toml::from_str(text).map_err(|e| e.message().to_string())
    }

    /// Load `--config` if given, otherwise defaults
    ///
    /// # Errors
    /// See [`FileConfig::load`].
    pub fn from_matches(matches: &ArgMatches) -> Result<Self, ConfigError> {
        matches
            .get_one::<PathBuf>("config")
            .map_or_else(|| Ok(Self::default()), |path| Self::load(path))
    }
}

/// Which source projects a command works on
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectSelection {
    /// Every project in the source
    All,
    /// The listed keys, in order
    Keys(Vec<String>),
}

impl ProjectSelection {
    fn from_matches(args: &ArgMatches) -> Result<Self, ConfigError> {
        if args.get_flag("all-projects") {
            return Ok(Self::All);
        }
        let keys: Vec<String> = args
            .get_many::<String>("project")
            .map(|keys| keys.cloned().collect())
            .unwrap_or_default();
        if keys.is_empty() {
            return Err(ConfigError::NoProjects);
        }
        Ok(Self::Keys(keys))
    }
}

/// Resolved settings for `flagshift source`
#[derive(Debug, Clone)]
pub struct SourceSettings {
    /// Client for the source account
    pub client: ClientConfig,
    /// Where snapshots are written
    pub source_dir: PathBuf,
    /// Projects to fetch
    pub selection: ProjectSelection,
    /// Flags per index page
    pub page_size: usize,
}

impl SourceSettings {
    /// Merge `args` over `file`
    ///
    /// # Errors
    /// Missing API key or project selection.
    pub fn resolve(args: &ArgMatches, file: &FileConfig) -> Result<Self> {
        let page_size = args
            .get_one::<usize>("page-size")
            .copied()
            .or(file.client.page_size)
            .unwrap_or(DEFAULT_PAGE_SIZE);
        if page_size == 0 {
            bail!("page size must be at least 1");
        }
        Ok(Self {
            client: client_config(args, file)?,
            source_dir: source_dir(args, file),
            selection: ProjectSelection::from_matches(args)?,
            page_size,
        })
    }
}

/// Resolved settings for `flagshift migrate`
#[derive(Debug, Clone)]
pub struct MigrateSettings {
    /// Client for the destination account
    pub client: ClientConfig,
    /// Where snapshots are read from
    pub source_dir: PathBuf,
    /// Projects to migrate
    pub selection: ProjectSelection,
    /// Destination key rule
    pub naming: DestinationNaming,
    /// Orchestrator behaviour
    pub migration: MigrationConfig,
    /// Optional JSON report path
    pub report_file: Option<PathBuf>,
}

impl MigrateSettings {
    /// Merge `args` over `file`
    ///
    /// # Errors
    /// Missing API key or project selection, or an invalid migration config.
    pub fn resolve(args: &ArgMatches, file: &FileConfig) -> Result<Self> {
        let mut client = client_config(args, file)?;
        if let Some(retries) = args.get_one::<u32>("max-retries") {
            client.retry = client.retry.with_max_retries(*retries);
        }
        if let Some(ms) = args.get_one::<u64>("min-interval-ms") {
            client = client.with_min_interval(Duration::from_millis(*ms));
        }

        let selection = ProjectSelection::from_matches(args)?;
        let naming = match (
            args.get_one::<String>("destination"),
            args.get_one::<String>("suffix").or(file.migration.suffix.as_ref()),
        ) {
            (Some(key), _) => DestinationNaming::Explicit(key.clone()),
            (None, Some(suffix)) => DestinationNaming::Suffix(suffix.clone()),
            (None, None) => DestinationNaming::Same,
        };

        let mut migration = MigrationConfig::default();
        if let Some(enabled) = file.migration.patch_after_failed_create {
            migration = migration.with_patch_after_failed_create(enabled);
        }
        if args.get_flag("strict-create") {
            migration = migration.with_patch_after_failed_create(false);
        }
        let envs: Option<Vec<String>> = args
            .get_many::<String>("env")
            .map(|envs| envs.cloned().collect())
            .or_else(|| file.migration.environments.clone());
        if let Some(envs) = envs {
            migration = migration.with_environment_filter(envs);
        }
        if let Some(n) = args
            .get_one::<usize>("concurrency")
            .copied()
            .or(file.migration.max_concurrent_projects)
        {
            migration = migration.with_max_concurrent_projects(n);
        }
        migration.validate()?;

        Ok(Self {
            client,
            source_dir: source_dir(args, file),
            selection,
            naming,
            migration,
            report_file: args.get_one::<PathBuf>("report-file").cloned(),
        })
    }
}

fn source_dir(args: &ArgMatches, file: &FileConfig) -> PathBuf {
    args.get_one::<PathBuf>("source-dir")
        .cloned()
        .or_else(|| file.source_dir.clone())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SOURCE_DIR))
}

fn client_config(args: &ArgMatches, file: &FileConfig) -> Result<ClientConfig> {
    let api_key = args
        .get_one::<String>("api-key")
        .or(file.api_key.as_ref())
        .cloned()
        .with_context(|| format!("no API key: pass --api-key, set {API_KEY_ENV} or add api_key to the config file"))?;

    let mut config = ClientConfig::new(api_key);
    if let Some(domain) = args.get_one::<String>("domain").or(file.domain.as_ref()) {
        config = config.with_domain(domain.clone());
    }
    if let Some(version) = &file.api_version {
        config = config.with_api_version(version.clone());
    }
    if let Some(secs) = file.client.timeout_secs {
        config = config.with_timeout(Duration::from_secs(secs));
    }
    if let Some(ms) = file.client.min_interval_ms {
        config = config.with_min_interval(Duration::from_millis(ms));
    }

    let mut retry = RetryPolicy::default();
    if let Some(n) = file.client.max_retries {
        retry = retry.with_max_retries(n);
    }
    if let Some(ms) = file.client.fallback_delay_ms {
        retry = retry.with_fallback_delay(Duration::from_millis(ms));
    }
    if let Some(ms) = file.client.max_delay_ms {
        retry = retry.with_max_delay(Duration::from_millis(ms));
    }
    Ok(config.with_retry(retry))
}
