//! Rate-limited request dispatch

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::gate::RateLimitGate;
use crate::policy::{RateLimitHint, RATE_LIMITED};
use crate::request::{ApiRequest, ApiResponse};
use crate::transport::{HttpRequest, ReqwestTransport, Transport};
use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Log target for terminal request outcomes
pub const RESPONSE_TARGET: &str = "flagshift::response";

/// Log target for intermediate rate-limited attempts
pub const RETRY_TARGET: &str = "flagshift::retry";

/// Counters since construction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClientStats {
    /// Requests handed to the transport
    pub attempts: u64,
    /// Rate-limited responses received
    pub rate_limited: u64,
    /// Requests that ended with a status
    pub completed: u64,
}

#[derive(Debug, Default)]
struct Counters {
    attempts: AtomicU64,
    rate_limited: AtomicU64,
    completed: AtomicU64,
}

/// Authenticated client that absorbs rate limiting
///
/// Cheap to share behind an `Arc`; all clones of that `Arc` share one gate,
/// so a rate limit seen by one project migration slows all of them.
pub struct RateLimitedClient {
    transport: Arc<dyn Transport>,
    config: ClientConfig,
    gate: RateLimitGate,
    cancel: CancellationToken,
    counters: Counters,
}

impl RateLimitedClient {
    /// Client over the `reqwest` transport
    ///
    /// # Errors
    /// Returns [`ClientError::Build`] if the HTTP client cannot be created.
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let transport = ReqwestTransport::new(&config)?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    /// Client over any transport
    #[must_use]
    pub fn with_transport(config: ClientConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            gate: RateLimitGate::new(config.min_interval),
            transport,
            config,
            cancel: CancellationToken::new(),
            counters: Counters::default(),
        }
    }

    /// Observe `token` while waiting out rate limits
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Active configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Cancellation token observed by this client
    #[inline]
    #[must_use]
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Snapshot of request counters
    #[must_use]
    pub fn stats(&self) -> ClientStats {
        ClientStats {
            attempts: self.counters.attempts.load(Ordering::Relaxed),
            rate_limited: self.counters.rate_limited.load(Ordering::Relaxed),
            completed: self.counters.completed.load(Ordering::Relaxed),
        }
    }

    /// Send `request`, retrying while rate limited
    ///
    /// Any status other than 429 is returned as-is, success or not. Exactly
    /// one event is logged under [`RESPONSE_TARGET`] per call.
    ///
    /// # Errors
    /// - [`ClientError::RateLimitExhausted`] once the retry budget is spent
    /// - [`ClientError::Transport`] on connection-level failure
    /// - [`ClientError::Cancelled`] if the token fires while waiting
    /// - [`ClientError::Encode`] if the body cannot be serialized
    pub async fn request(&self, request: ApiRequest) -> Result<ApiResponse, ClientError> {
        let http = self.build(&request)?;
        let action = request.action.as_str();
        let mut retries = 0_u32;

        loop {
            if self.gate.acquire(&self.cancel).await.is_err() {
                warn!(target: RESPONSE_TARGET, action, "{action} cancelled");
                return Err(ClientError::Cancelled);
            }

            self.counters.attempts.fetch_add(1, Ordering::Relaxed);
            let response = match self.transport.send(http.clone()).await {
                Ok(response) => response,
                Err(source) => {
                    error!(target: RESPONSE_TARGET, action, error = %source, "{action} failed");
                    return Err(ClientError::Transport {
                        action: request.action.clone(),
                        source,
                    });
                }
            };

            if response.status != RATE_LIMITED {
                self.counters.completed.fetch_add(1, Ordering::Relaxed);
                let status = response.status;
                if (200..300).contains(&status) {
                    info!(target: RESPONSE_TARGET, action, status, "{action} status: {status}");
                } else {
                    warn!(target: RESPONSE_TARGET, action, status, "{action} status: {status}");
                }
                return Ok(ApiResponse::new(status, request.path.clone(), response.body));
            }

            self.counters.rate_limited.fetch_add(1, Ordering::Relaxed);
            if !self.config.retry.allows_retry(retries) {
                let attempts = retries + 1;
                error!(
                    target: RESPONSE_TARGET,
                    action,
                    status = RATE_LIMITED,
                    attempts,
                    "{action} still rate limited after {attempts} attempts"
                );
                return Err(ClientError::RateLimitExhausted {
                    action: request.action.clone(),
                    attempts,
                });
            }

            retries += 1;
            let now_ms = Utc::now().timestamp_millis();
            let hint = RateLimitHint::from_response(&response, now_ms);
            let (wait, source) = self.config.retry.wait_for(hint, retries, now_ms);
            debug!(
                target: RETRY_TARGET,
                action,
                retry = retries,
                wait_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX),
                ?source,
                "rate limited, waiting"
            );
            self.gate.block_for(wait);
        }
    }

    /// `GET path`
    ///
    /// # Errors
    /// See [`Self::request`].
    pub async fn get(&self, path: impl Into<String>) -> Result<ApiResponse, ClientError> {
        self.request(ApiRequest::get(path)).await
    }

    fn build(&self, request: &ApiRequest) -> Result<HttpRequest, ClientError> {
        let mut headers = vec![("Authorization".to_string(), self.config.api_key.clone())];
        if let Some(version) = &self.config.api_version {
            headers.push(("LD-API-Version".to_string(), version.clone()));
        }

        let body = match &request.body {
            Some(value) => {
                headers.push(("Content-Type".to_string(), "application/json".to_string()));
                Some(serde_json::to_vec(value)?)
            }
            None => None,
        };

        Ok(HttpRequest {
            method: request.method,
            url: self.config.url(&request.path),
            headers,
            body,
        })
    }
}

impl std::fmt::Debug for RateLimitedClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimitedClient")
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::policy::RetryPolicy;
    use crate::transport::{HttpMethod, HttpResponse, MockTransport};
    use mockall::Sequence;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::time::Duration;
    use tokio::time::Instant;

    fn client(transport: MockTransport) -> RateLimitedClient {
        RateLimitedClient::with_transport(ClientConfig::new("api-key"), Arc::new(transport))
    }

    #[tokio::test(start_paused = true)]
    async fn adds_credential_and_base_url() {
        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .withf(|req| {
                req.method == HttpMethod::Post
                    && req.url == "https://app.launchdarkly.com/api/v2/projects"
                    && req.header("authorization") == Some("api-key")
                    && req.header("content-type") == Some("application/json")
                    && req.body.as_deref() == Some(br#"{"key":"web"}"#.as_slice())
            })
            .times(1)
            .returning(|_| Ok(HttpResponse::new(201, "{}")));

        let response = client(transport)
            .request(ApiRequest::post("projects", json!({"key": "web"})))
            .await
            .unwrap();
        assert_eq!(response.status(), 201);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_rate_limit_then_returns_success() {
        let mut seq = Sequence::new();
        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(HttpResponse::new(429, "").with_header("Retry-After", "2")));
        transport
            .expect_send()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(HttpResponse::new(200, r#"{"ok":true}"#)));

        let client = client(transport);
        let start = Instant::now();
        let response = client.get("projects/web").await.unwrap();

        assert_eq!(response.status(), 200);
        assert!(Instant::now() - start >= Duration::from_secs(2));
        assert_eq!(
            client.stats(),
            ClientStats {
                attempts: 2,
                rate_limited: 1,
                completed: 1
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_retry_budget() {
        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .times(4)
            .returning(|_| Ok(HttpResponse::new(429, "")));

        let config = ClientConfig::new("k").with_retry(RetryPolicy::default().with_max_retries(3));
        let client = RateLimitedClient::with_transport(config, Arc::new(transport));

        let err = client.get("flags/web").await.unwrap_err();
        assert!(matches!(err, ClientError::RateLimitExhausted { attempts: 4, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn other_failures_are_not_retried() {
        for status in [400_u16, 404, 409, 500, 503] {
            let mut transport = MockTransport::new();
            transport
                .expect_send()
                .times(1)
                .returning(move |_| Ok(HttpResponse::new(status, r#"{"message":"no"}"#)));

            let response = client(transport).get("flags/web/beta").await.unwrap();
            assert_eq!(response.status(), status);
            assert!(!response.is_success());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn transport_failure_surfaces() {
        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .times(1)
            .returning(|_| Err(TransportError::Timeout));

        let err = client(transport).get("projects").await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::Transport {
                source: TransportError::Timeout,
                ..
            }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_during_backoff() {
        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .times(1)
            .returning(|_| Ok(HttpResponse::new(429, "").with_header("Retry-After", "30")));

        let token = CancellationToken::new();
        let client = client(transport).with_cancellation(token.clone());
        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            token.cancel();
        });

        let err = client.get("projects").await.unwrap_err();
        assert!(matches!(err, ClientError::Cancelled));
        canceller.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn api_version_header_is_optional() {
        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .withf(|req| req.header("ld-api-version") == Some("20240415") && req.body.is_none())
            .times(1)
            .returning(|_| Ok(HttpResponse::new(200, "[]")));

        let config = ClientConfig::new("k").with_api_version("20240415");
        let client = RateLimitedClient::with_transport(config, Arc::new(transport));
        client.get("projects").await.unwrap();
    }
}
