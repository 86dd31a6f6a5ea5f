//! flagshift API client
//!
//! Every request to the destination (and source) management API goes through
//! [`RateLimitedClient`], which:
//!
//! - adds the credential and base domain to every call
//! - retries rate-limited responses, waiting for the server hint when present
//!   and backing off exponentially otherwise, up to a bounded retry count
//! - returns every other status to the caller untouched
//! - shares its rate-limit bookkeeping between all concurrent callers
//!
//! The wire is behind the [`Transport`] trait; [`ReqwestTransport`] is the
//! production implementation.
//!
//! # Example
//!
//! ```rust,no_run
//! use flagshift_client::{ApiRequest, ClientConfig, RateLimitedClient};
//!
//! # async fn example() -> Result<(), flagshift_client::ClientError> {
//! let client = RateLimitedClient::new(ClientConfig::new("api-key"))?;
//! let response = client
//!     .request(ApiRequest::get("projects").describe("Listing projects"))
//!     .await?;
//! println!("status {}", response.status());
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]

mod client;
mod config;
mod error;
mod gate;
mod policy;
mod request;
mod transport;

pub use client::{ClientStats, RateLimitedClient, RESPONSE_TARGET, RETRY_TARGET};
pub use config::{ClientConfig, DEFAULT_DOMAIN};
pub use error::{ClientError, TransportError};
pub use policy::{RateLimitHint, RetryPolicy, WaitSource, RATE_LIMITED};
pub use request::{ApiRequest, ApiResponse};
pub use transport::{HttpMethod, HttpRequest, HttpResponse, ReqwestTransport, Transport};

/// Re-export so callers can share one token with the client
pub use tokio_util::sync::CancellationToken;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
