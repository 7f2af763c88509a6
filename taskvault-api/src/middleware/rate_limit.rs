/// Per-client rate limiting
///
/// Token bucket keyed by client IP, held in process memory:
/// - Tokens refill at a constant rate (`limit / 60` per second)
/// - Each request consumes 1 token
/// - Request rejected with 429 if the bucket is empty
///
/// # Headers
///
/// - `X-RateLimit-Limit`: requests allowed per minute
/// - `X-RateLimit-Remaining`: whole tokens left after this request
/// - `Retry-After`: seconds to wait (429 responses only)
///
/// # Example
///
/// ```no_run
/// use taskvault_api::middleware::rate_limit::{rate_limit_middleware, RateLimiter};
/// use axum::{middleware, Router};
///
/// # async fn example() {
/// let limiter = RateLimiter::per_minute(100);
///
/// let app: Router = Router::new()
///     .route("/api/v1/tasks", axum::routing::get(handler))
///     .layer(middleware::from_fn_with_state(limiter, rate_limit_middleware));
/// # }
/// # async fn handler() {}
/// ```

use crate::error::ApiError;
use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderValue,
    middleware::Next,
    response::Response,
};
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Buckets beyond this count trigger a sweep of idle, full buckets
const SWEEP_THRESHOLD: usize = 10_000;

/// Token bucket for one client
#[derive(Debug, Clone)]
struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn new(capacity: u32, now: Instant) -> Self {
        TokenBucket {
            tokens: capacity as f64,
            last_refill: now,
        }
    }

    /// Refills tokens based on elapsed time
    fn refill(&mut self, rate: f64, capacity: u32, now: Instant) {
        let elapsed_secs = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed_secs * rate).min(capacity as f64);
        self.last_refill = now;
    }

    fn try_consume(&mut self) -> bool {
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Seconds until one token is available
    fn seconds_until_available(&self, rate: f64) -> u64 {
        let deficit = 1.0 - self.tokens;
        if deficit <= 0.0 {
            0
        } else {
            (deficit / rate).ceil() as u64
        }
    }
}

/// Outcome of one rate limit check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitResult {
    /// Whether the request may proceed
    pub ok: bool,

    /// Whole tokens remaining
    pub remaining: u32,

    /// Seconds until the next token (0 when allowed)
    pub retry_after: u64,
}

/// Shared per-IP token buckets
#[derive(Debug, Clone)]
pub struct RateLimiter {
    requests_per_minute: u32,
    buckets: Arc<Mutex<HashMap<IpAddr, TokenBucket>>>,
}

impl RateLimiter {
    /// Allows `requests_per_minute` requests per client, with the same burst
    pub fn per_minute(requests_per_minute: u32) -> Self {
        Self {
            requests_per_minute: requests_per_minute.max(1),
            buckets: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn requests_per_minute(&self) -> u32 {
        self.requests_per_minute
    }

    fn refill_rate(&self) -> f64 {
        self.requests_per_minute as f64 / 60.0
    }

    /// Consumes one token for `client`
    pub async fn check(&self, client: IpAddr) -> RateLimitResult {
        let now = Instant::now();
        let capacity = self.requests_per_minute;
        let rate = self.refill_rate();

        let mut buckets = self.buckets.lock().await;

        if buckets.len() > SWEEP_THRESHOLD {
            buckets.retain(|_, bucket| {
                bucket.refill(rate, capacity, now);
                bucket.tokens < capacity as f64
            });
        }

        let bucket = buckets
            .entry(client)
            .or_insert_with(|| TokenBucket::new(capacity, now));
        bucket.refill(rate, capacity, now);

        if bucket.try_consume() {
            RateLimitResult {
                ok: true,
                remaining: bucket.tokens.floor() as u32,
                retry_after: 0,
            }
        } else {
            RateLimitResult {
                ok: false,
                remaining: 0,
                retry_after: bucket.seconds_until_available(rate).max(1),
            }
        }
    }
}

/// Rate limiting middleware
///
/// Requests without connection info (in-process tests) share one bucket.
///
/// # Errors
///
/// - 429 Too Many Requests: bucket empty
pub async fn rate_limit_middleware(
    State(limiter): State<RateLimiter>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let client = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));

    let result = limiter.check(client).await;

    if !result.ok {
        tracing::warn!(target: "security", client = %client, "Rate limit exceeded");
        return Err(create_rate_limit_error(result));
    }

    let mut response = next.run(request).await;

    let headers = response.headers_mut();
    headers.insert(
        "X-RateLimit-Limit",
        HeaderValue::from(limiter.requests_per_minute()),
    );
    headers.insert("X-RateLimit-Remaining", HeaderValue::from(result.remaining));

    Ok(response)
}

fn create_rate_limit_error(result: RateLimitResult) -> ApiError {
    ApiError::RateLimitExceeded {
        retry_after: result.retry_after,
        message: format!(
            "Rate limit exceeded. Try again in {} seconds",
            result.retry_after
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn ip(last: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(10, 0, 0, last))
    }

    #[test]
    fn test_token_bucket_consume() {
        let mut bucket = TokenBucket::new(2, Instant::now());
        assert!(bucket.try_consume());
        assert!(bucket.try_consume());
        assert!(!bucket.try_consume());
        assert_eq!(bucket.tokens, 0.0); // Unchanged after failed attempt
    }

    #[tokio::test(start_paused = true)]
    async fn test_token_bucket_refill_capped() {
        let mut bucket = TokenBucket {
            tokens: 95.0,
            last_refill: Instant::now(),
        };

        tokio::time::advance(Duration::from_secs(10)).await;
        bucket.refill(1.0, 100, Instant::now());
        assert_eq!(bucket.tokens, 100.0);
    }

    #[test]
    fn test_token_bucket_seconds_until_available() {
        let bucket = TokenBucket {
            tokens: 0.25,
            last_refill: Instant::now(),
        };

        // 0.75 tokens short at 0.5/sec
        assert_eq!(bucket.seconds_until_available(0.5), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_limiter_blocks_then_recovers() {
        let limiter = RateLimiter::per_minute(3);

        for expected_remaining in [2, 1, 0] {
            let result = limiter.check(ip(1)).await;
            assert!(result.ok);
            assert_eq!(result.remaining, expected_remaining);
        }

        let blocked = limiter.check(ip(1)).await;
        assert!(!blocked.ok);
        assert_eq!(blocked.retry_after, 20);

        // other clients are unaffected
        assert!(limiter.check(ip(2)).await.ok);

        tokio::time::advance(Duration::from_secs(20)).await;
        assert!(limiter.check(ip(1)).await.ok);
    }

    #[test]
    fn test_rate_limit_error() {
        let err = create_rate_limit_error(RateLimitResult {
            ok: false,
            remaining: 0,
            retry_after: 5,
        });
        assert!(matches!(err, ApiError::RateLimitExceeded { retry_after: 5, .. }));
    }
}
