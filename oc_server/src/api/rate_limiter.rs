//! Per-IP rate limiting for the credential endpoints.
//!
//! Brute-force protection lives here at the transport layer; the auth core
//! itself never locks accounts. A sliding window of recent attempts is kept
//! per source IP, and `register`/`login` share one strict budget of 10
//! attempts per 15 minutes. Requests over budget get `429` with a
//! `Retry-After` header.

use std::collections::{HashMap, VecDeque};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use axum::extract::{ConnectInfo, Request};
use axum::http::{HeaderValue, StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use super::error::ApiError;

/// Entries above this count trigger a prune of idle clients
const PRUNE_THRESHOLD: usize = 10_000;

/// Rate limiter using a sliding window algorithm
#[derive(Debug)]
pub struct RateLimiter {
    /// Timestamps of recent requests
    timestamps: VecDeque<Instant>,
    /// Maximum number of requests allowed in the window
    max_requests: usize,
    /// Time window for rate limiting
    window: Duration,
}

impl RateLimiter {
    /// Create a new rate limiter
    ///
    /// # Arguments
    ///
    /// * `max_requests` - Maximum number of requests allowed in the time window
    /// * `window` - Time window duration
    ///
    /// # Example
    ///
    /// ```
    /// use oc_server::api::rate_limiter::RateLimiter;
    /// use std::time::Duration;
    ///
    /// // Allow 10 requests per second
    /// let limiter = RateLimiter::new(10, Duration::from_secs(1));
    /// ```
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            timestamps: VecDeque::with_capacity(max_requests),
            max_requests,
            window,
        }
    }

    /// Create a rate limiter with the credential-endpoint policy
    /// (10 attempts per 15 minutes)
    pub fn auth_strict() -> Self {
        Self::new(10, Duration::from_secs(15 * 60))
    }

    /// Check if a request should be allowed
    ///
    /// Returns `true` if the request is allowed, `false` if rate limit exceeded.
    ///
    /// # Example
    ///
    /// ```
    /// # use oc_server::api::rate_limiter::RateLimiter;
    /// # use std::time::Duration;
    /// let mut limiter = RateLimiter::new(5, Duration::from_secs(1));
    ///
    /// // First 5 requests allowed
    /// for _ in 0..5 {
    ///     assert!(limiter.check());
    /// }
    ///
    /// // 6th request blocked
    /// assert!(!limiter.check());
    /// ```
    pub fn check(&mut self) -> bool {
        let now = Instant::now();
        self.evict(now);

        // Check if limit exceeded
        if self.timestamps.len() >= self.max_requests {
            return false;
        }

        // Record this request
        self.timestamps.push_back(now);
        true
    }

    /// Drop timestamps that have left the window
    fn evict(&mut self, now: Instant) {
        while let Some(ts) = self.timestamps.front() {
            if now.duration_since(*ts) > self.window {
                self.timestamps.pop_front();
            } else {
                break;
            }
        }
    }

    /// Get the number of requests in the current window
    pub fn current_count(&self) -> usize {
        self.timestamps.len()
    }

    /// Get the number of remaining requests allowed in the current window
    #[allow(dead_code)]
    pub fn remaining(&self) -> usize {
        self.max_requests.saturating_sub(self.timestamps.len())
    }

    /// Get the time until the window resets (when the oldest request expires)
    ///
    /// Returns `None` if there are no requests in the current window.
    pub fn reset_in(&self) -> Option<Duration> {
        self.timestamps.front().map(|oldest| {
            let elapsed = Instant::now().duration_since(*oldest);
            self.window.saturating_sub(elapsed)
        })
    }

    /// Reset the rate limiter (clear all timestamps)
    #[allow(dead_code)]
    pub fn reset(&mut self) {
        self.timestamps.clear();
    }
}

/// Shared per-client limiter table. One [`RateLimiter`] per source IP,
/// pruned of idle entries once the table grows large.
#[derive(Debug)]
pub struct RateLimiterMap {
    clients: Mutex<HashMap<IpAddr, RateLimiter>>,
    max_requests: usize,
    window: Duration,
}

impl RateLimiterMap {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            clients: Mutex::new(HashMap::new()),
            max_requests,
            window,
        }
    }

    /// Table with the credential-endpoint policy (10 per 15 minutes per IP)
    pub fn auth_strict() -> Self {
        Self::new(10, Duration::from_secs(15 * 60))
    }

    /// Check and record an attempt from `ip`
    pub fn check(&self, ip: IpAddr) -> bool {
        let mut clients = self.clients.lock().unwrap_or_else(PoisonError::into_inner);

        if clients.len() >= PRUNE_THRESHOLD {
            let now = Instant::now();
            clients.retain(|_, limiter| {
                limiter.evict(now);
                limiter.current_count() > 0
            });
        }

        clients
            .entry(ip)
            .or_insert_with(|| RateLimiter::new(self.max_requests, self.window))
            .check()
    }

    /// Seconds until the oldest attempt from `ip` leaves the window
    pub fn retry_after_secs(&self, ip: IpAddr) -> u64 {
        let clients = self.clients.lock().unwrap_or_else(PoisonError::into_inner);
        clients
            .get(&ip)
            .and_then(RateLimiter::reset_in)
            .map(|d| d.as_secs().max(1))
            .unwrap_or(1)
    }
}

/// Per-IP rate limit middleware for the credential endpoints.
///
/// The client address comes from [`ConnectInfo`]; requests without one
/// (tests drive the router directly) share a single localhost bucket.
pub async fn rate_limit_middleware(
    limiter: Arc<RateLimiterMap>,
    request: Request,
    next: Next,
) -> Response {
    let ip = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST));

    if limiter.check(ip) {
        return next.run(request).await;
    }

    crate::metrics::rate_limit_hits_total(request.uri().path());
    crate::logging::log_security_event(
        "rate_limited",
        None,
        Some(&ip.to_string()),
        "Too many auth attempts",
    );

    let mut response = ApiError::new(
        StatusCode::TOO_MANY_REQUESTS,
        "Too many auth attempts, try again later",
    )
    .into_response();
    response.headers_mut().insert(
        header::RETRY_AFTER,
        HeaderValue::from(limiter.retry_after_secs(ip)),
    );

    response
}
