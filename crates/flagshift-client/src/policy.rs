//! Rate-limit retry policy
//!
//! Wait selection, first match wins:
//! 1. `Retry-After` (delta seconds or an HTTP date)
//! 2. `X-Ratelimit-Reset` (epoch milliseconds)
//! 3. exponential fallback from `fallback_delay`
//!
//! Every wait is clamped to `[MIN_WAIT, max_delay]`.

use crate::transport::HttpResponse;
use chrono::DateTime;
use std::time::Duration;

/// Status the destination uses for rate limiting
pub const RATE_LIMITED: u16 = 429;

const RETRY_AFTER: &str = "retry-after";
const RATELIMIT_RESET: &str = "x-ratelimit-reset";
const MIN_WAIT: Duration = Duration::from_millis(100);

/// Server hint extracted from a rate-limited response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RateLimitHint {
    /// Absolute retry instant, epoch ms, from `Retry-After`
    pub retry_after_ms: Option<i64>,
    /// Reset instant, epoch ms, from `X-Ratelimit-Reset`
    pub reset_at_ms: Option<i64>,
}

impl RateLimitHint {
    /// Parse hint headers; unparseable values are ignored
    #[must_use]
    pub fn from_response(response: &HttpResponse, now_ms: i64) -> Self {
        let retry_after_ms = response
            .header(RETRY_AFTER)
            .and_then(|value| parse_retry_after(value, now_ms));
        let reset_at_ms = response
            .header(RATELIMIT_RESET)
            .and_then(|value| value.trim().parse::<i64>().ok());
        Self {
            retry_after_ms,
            reset_at_ms,
        }
    }
}

fn parse_retry_after(value: &str, now_ms: i64) -> Option<i64> {
    let value = value.trim();
    if let Ok(seconds) = value.parse::<i64>() {
        return Some(now_ms.saturating_add(seconds.saturating_mul(1000)));
    }
    DateTime::parse_from_rfc2822(value)
        .ok()
        .map(|date| date.timestamp_millis())
}

/// Where a wait duration came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitSource {
    /// `Retry-After` header
    RetryAfter,
    /// `X-Ratelimit-Reset` header
    ResetTime,
    /// No usable hint
    Fallback,
}

/// Bounded retry with server hints and exponential fallback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// First fallback wait; doubled per consecutive rate limit
    pub fallback_delay: Duration,
    /// Upper bound for any single wait
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            fallback_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Set retry count
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set fallback delay
    #[must_use]
    pub fn with_fallback_delay(mut self, delay: Duration) -> Self {
        self.fallback_delay = delay;
        self
    }

    /// Set maximum single wait
    #[must_use]
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Whether another attempt is allowed after `retries` retries
    #[inline]
    #[must_use]
    pub fn allows_retry(&self, retries: u32) -> bool {
        retries < self.max_retries
    }

    /// Fallback wait for the `attempt`-th consecutive rate limit (1-based)
    #[must_use]
    pub fn fallback(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.fallback_delay
            .saturating_mul(1_u32 << exponent)
            .min(self.max_delay)
    }

    /// Wait before retrying the `attempt`-th consecutive rate limit
    #[must_use]
    pub fn wait_for(&self, hint: RateLimitHint, attempt: u32, now_ms: i64) -> (Duration, WaitSource) {
        let (wait, source) = if let Some(at) = hint.retry_after_ms {
            (until(at, now_ms), WaitSource::RetryAfter)
        } else if let Some(at) = hint.reset_at_ms {
            (until(at, now_ms), WaitSource::ResetTime)
        } else {
            (self.fallback(attempt), WaitSource::Fallback)
        };
        (wait.clamp(MIN_WAIT, self.max_delay.max(MIN_WAIT)), source)
    }
}

fn until(at_ms: i64, now_ms: i64) -> Duration {
    u64::try_from(at_ms.saturating_sub(now_ms))
        .map(Duration::from_millis)
        .unwrap_or(Duration::ZERO)
}
