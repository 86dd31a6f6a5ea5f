//! Testing utilities for the flagshift workspace
//!
//! Shared transports, stores and fixtures.

#![allow(missing_docs)]

mod destination;
pub mod fixtures;
mod store;
mod transport;

pub use destination::FakeDestination;
pub use store::InMemorySnapshotStore;
pub use transport::{RecordedRequest, ScriptedTransport};

use flagshift_client::{ClientConfig, RateLimitedClient, RetryPolicy, Transport};
use std::sync::Arc;
use std::time::Duration;

pub const TEST_API_KEY: &str = "test-key";

/// Config every helper transport expects: default base URL, short backoff
pub fn test_config() -> ClientConfig {
    ClientConfig::new(TEST_API_KEY).with_retry(
        RetryPolicy::default()
            .with_max_retries(3)
            .with_fallback_delay(Duration::from_millis(10)),
    )
}

pub fn test_client(transport: Arc<dyn Transport>) -> Arc<RateLimitedClient> {
    Arc::new(RateLimitedClient::with_transport(test_config(), transport))
}

/// Resource path of an absolute URL built from [`test_config`]
pub fn relative_path(url: &str) -> String {
    let base = test_config().base_url();
    url.strip_prefix(&base)
        .unwrap_or(url)
        .trim_start_matches('/')
        .to_string()
}
