//! Client-side request throttling
//!
//! Keeps a single client from hammering the server during large syncs.
//! Every request acquires a permit from a token bucket before it is sent;
//! when the server still answers 429 the client honours `Retry-After`.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use strongbox_api::rate_limit::ApiRateLimiter;
//!
//! # async fn example() {
//! let limiter = ApiRateLimiter::new(20, 40);
//! limiter.acquire().await;
//! // ... make API call ...
//! # }
//! ```

use std::num::NonZeroU32;
use std::time::Duration;

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use strongbox_core::config::RateLimitingConfig;
use tracing::{trace, warn};

/// Token bucket shared by every request of one client
pub struct ApiRateLimiter {
    limiter: DefaultDirectRateLimiter,
    requests_per_second: u32,
    burst: u32,
}

impl ApiRateLimiter {
    /// Creates a limiter refilling `requests_per_second` permits, holding at most `burst`
    ///
    /// Zero values are treated as one.
    pub fn new(requests_per_second: u32, burst: u32) -> Self {
        let rate = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);
        let burst = NonZeroU32::new(burst).unwrap_or(NonZeroU32::MIN);
        let quota = Quota::per_second(rate).allow_burst(burst);

        Self {
            limiter: RateLimiter::direct(quota),
            requests_per_second: rate.get(),
            burst: burst.get(),
        }
    }

    pub fn from_config(config: &RateLimitingConfig) -> Self {
        Self::new(config.requests_per_second, config.burst)
    }

    /// Waits until a permit is available
    pub async fn acquire(&self) {
        if self.limiter.check().is_ok() {
            return;
        }
        trace!("Rate limit reached, waiting for permit");
        self.limiter.until_ready().await;
    }

    /// Takes a permit if one is available right now
    pub fn try_acquire(&self) -> bool {
        self.limiter.check().is_ok()
    }

    pub fn requests_per_second(&self) -> u32 {
        self.requests_per_second
    }

    pub fn burst(&self) -> u32 {
        self.burst
    }
}

impl std::fmt::Debug for ApiRateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiRateLimiter")
            .field("requests_per_second", &self.requests_per_second)
            .field("burst", &self.burst)
            .finish()
    }
}

// ============================================================================
// Retry-After header parsing
// ============================================================================

/// Longest wait accepted from a `Retry-After` header
const MAX_RETRY_AFTER: Duration = Duration::from_secs(3600);

/// Parses a Retry-After header value into a Duration.
///
/// The header can be either:
/// - An integer number of seconds (e.g., "30")
/// - An HTTP-date (e.g., "Fri, 31 Dec 2027 23:59:59 GMT"), taken as the time from now
///
/// Falls back to `default` if parsing fails or the wait is longer than an hour.
pub fn parse_retry_after(value: &str, default: Duration) -> Duration {
    let value = value.trim();
    if let Ok(seconds) = value.parse::<u64>() {
        return Duration::from_secs(seconds).min(MAX_RETRY_AFTER);
    }

    if let Ok(date) = chrono::DateTime::parse_from_rfc2822(value) {
        let wait = date.with_timezone(&chrono::Utc) - chrono::Utc::now();
        if let Ok(wait) = wait.to_std() {
            if wait <= MAX_RETRY_AFTER {
                return wait;
            }
        }
    }

    warn!(value, "Could not parse Retry-After header, using default");
    default
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_burst_is_available_immediately() {
        let limiter = ApiRateLimiter::new(1, 3);
        assert!(limiter.try_acquire());
        assert!(limiter.try_acquire());
        assert!(limiter.try_acquire());
        assert!(!limiter.try_acquire());
    }

    #[test]
    fn test_zero_values_are_clamped() {
        let limiter = ApiRateLimiter::new(0, 0);
        assert_eq!(limiter.requests_per_second(), 1);
        assert_eq!(limiter.burst(), 1);
        assert!(limiter.try_acquire());
    }

    #[test]
    fn test_from_config() {
        let config = RateLimitingConfig {
            requests_per_second: 5,
            burst: 10,
        };
        let limiter = ApiRateLimiter::from_config(&config);
        assert_eq!(limiter.requests_per_second(), 5);
        assert_eq!(limiter.burst(), 10);
    }

    #[tokio::test]
    async fn test_acquire_waits_for_refill() {
        let limiter = ApiRateLimiter::new(100, 1);
        limiter.acquire().await;
        assert!(!limiter.try_acquire());

        let started = std::time::Instant::now();
        limiter.acquire().await;
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_parse_retry_after_seconds() {
        let default = Duration::from_secs(30);
        assert_eq!(parse_retry_after("5", default), Duration::from_secs(5));
        assert_eq!(parse_retry_after(" 12 ", default), Duration::from_secs(12));
    }

    #[test]
    fn test_parse_retry_after_caps_long_waits() {
        let default = Duration::from_secs(30);
        assert_eq!(parse_retry_after("86400", default), MAX_RETRY_AFTER);
    }

    #[test]
    fn test_parse_retry_after_http_date() {
        let default = Duration::from_secs(30);
        let at = chrono::Utc::now() + chrono::Duration::seconds(120);
        let parsed = parse_retry_after(&at.to_rfc2822(), default);
        assert!(parsed > Duration::from_secs(100));
        assert!(parsed <= Duration::from_secs(120));
    }

    #[test]
    fn test_parse_retry_after_garbage_uses_default() {
        let default = Duration::from_secs(30);
        assert_eq!(parse_retry_after("soon", default), default);
        let past = (chrono::Utc::now() - chrono::Duration::seconds(60)).to_rfc2822();
        assert_eq!(parse_retry_after(&past, default), default);
    }
}
