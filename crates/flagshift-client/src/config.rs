//! Client configuration

use crate::policy::RetryPolicy;
use std::fmt;
use std::time::Duration;

/// Default management API host
pub const DEFAULT_DOMAIN: &str = "app.launchdarkly.com";

const DEFAULT_API_PREFIX: &str = "/api/v2";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Settings for [`crate::RateLimitedClient`]
#[derive(Clone)]
pub struct ClientConfig {
    /// Credential sent verbatim in the `Authorization` header
    pub api_key: String,
    /// Host, or a full `http(s)://` origin for self-hosted endpoints
    pub domain: String,
    /// Path prefix between origin and resource path
    pub api_prefix: String,
    /// Value for the `LD-API-Version` header, if pinned
    pub api_version: Option<String>,
    /// `User-Agent` header
    pub user_agent: String,
    /// Per-request timeout
    pub timeout: Duration,
    /// Minimum spacing between any two requests
    pub min_interval: Duration,
    /// Rate-limit retry behavior
    pub retry: RetryPolicy,
}

impl ClientConfig {
    /// Defaults for everything but the credential
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            domain: DEFAULT_DOMAIN.to_string(),
            api_prefix: DEFAULT_API_PREFIX.to_string(),
            api_version: None,
            user_agent: format!("flagshift/{}", crate::VERSION),
            timeout: DEFAULT_TIMEOUT,
            min_interval: Duration::ZERO,
            retry: RetryPolicy::default(),
        }
    }

    /// Set domain
    #[must_use]
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = domain.into();
        self
    }

    /// Set API version header
    #[must_use]
    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = Some(version.into());
        self
    }

    /// Set request timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set minimum request spacing
    #[must_use]
    pub fn with_min_interval(mut self, interval: Duration) -> Self {
        self.min_interval = interval;
        self
    }

    /// Set retry policy
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Origin plus prefix, no trailing slash
    #[must_use]
    pub fn base_url(&self) -> String {
        let domain = self.domain.trim_end_matches('/');
        let origin = if domain.starts_with("http://") || domain.starts_with("https://") {
            domain.to_string()
        } else {
            format!("https://{domain}")
        };
        let prefix = self.api_prefix.trim_matches('/');
        if prefix.is_empty() {
            origin
        } else {
            format!("{origin}/{prefix}")
        }
    }

    /// Absolute URL for a resource path such as `flags/web`
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url(), path.trim_start_matches('/'))
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_key", &"<redacted>")
            .field("domain", &self.domain)
            .field("api_prefix", &self.api_prefix)
            .field("api_version", &self.api_version)
            .field("user_agent", &self.user_agent)
            .field("timeout", &self.timeout)
            .field("min_interval", &self.min_interval)
            .field("retry", &self.retry)
            .finish()
    }
}
