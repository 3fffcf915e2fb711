//! Per-IP rate limiting middleware using a fixed-window counter.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderMap, HeaderValue};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use dashmap::DashMap;

use crate::error::AppError;
use crate::state::AppState;

/// Message sent to clients over their quota.
pub const RATE_LIMIT_MESSAGE: &str = "Too many requests, please try later";

/// In-memory per-IP rate limiter with fixed-window counters.
#[derive(Clone)]
pub struct RateLimiter {
    inner: Arc<RateLimiterInner>,
}

struct RateLimiterInner {
    max_requests: u64,
    window: Duration,
    counters: DashMap<IpAddr, (u64, Instant)>,
}

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub allowed: bool,
    /// Requests left in the current window.
    pub remaining: u64,
    /// Time until the current window resets.
    pub reset_after: Duration,
}

impl RateLimiter {
    /// Creates a new rate limiter. `max_requests = 0` means disabled.
    pub fn new(max_requests: u64, window: Duration) -> Self {
        Self {
            inner: Arc::new(RateLimiterInner {
                max_requests,
                window,
                counters: DashMap::new(),
            }),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.max_requests > 0
    }

    pub fn max_requests(&self) -> u64 {
        self.inner.max_requests
    }

    /// Counts one request from `ip` and decides whether it may proceed.
    pub fn check(&self, ip: IpAddr) -> Decision {
        let max = self.inner.max_requests;
        let window = self.inner.window;
        if max == 0 {
            return Decision {
                allowed: true,
                remaining: 0,
                reset_after: Duration::ZERO,
            };
        }

        let mut entry = self.inner.counters.entry(ip).or_insert((0, Instant::now()));
        let (count, window_start) = entry.value_mut();

        if window_start.elapsed() > window {
            *count = 0;
            *window_start = Instant::now();
        }

        let allowed = *count < max;
        if allowed {
            *count += 1;
        }

        Decision {
            allowed,
            remaining: max - *count,
            reset_after: window.saturating_sub(window_start.elapsed()),
        }
    }

    /// Removes entries for expired windows (background cleanup).
    pub fn cleanup(&self) {
        let window = self.inner.window;
        self.inner
            .counters
            .retain(|_, (_, start)| start.elapsed() <= window);
    }

    /// Number of clients currently tracked.
    pub fn tracked_clients(&self) -> usize {
        self.inner.counters.len()
    }
}

/// Extracts the client IP from the request.
fn extract_ip(req: &Request) -> Option<IpAddr> {
    // X-Forwarded-For takes priority (reverse proxy)
    if let Some(xff) = req.headers().get("x-forwarded-for")
        && let Ok(s) = xff.to_str()
        && let Some(first) = s.split(',').next()
        && let Ok(ip) = first.trim().parse::<IpAddr>()
    {
        return Some(ip);
    }

    // Fallback to ConnectInfo (direct connection)
    req.extensions()
        .get::<ConnectInfo<std::net::SocketAddr>>()
        .map(|ci| ci.0.ip())
}

fn set_limit_headers(headers: &mut HeaderMap, limit: u64, decision: Decision) {
    headers.insert("x-ratelimit-limit", HeaderValue::from(limit));
    headers.insert("x-ratelimit-remaining", HeaderValue::from(decision.remaining));
}

/// Rate-limiting middleware. Over-quota requests fail with an operational 429.
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    let limiter = state.rate_limiter();
    if !limiter.is_enabled() {
        return next.run(req).await;
    }

    let Some(ip) = extract_ip(&req) else {
        return next.run(req).await;
    };

    let decision = limiter.check(ip);
    if !decision.allowed {
        tracing::warn!(%ip, "rate limit exceeded");
        let mut response = AppError::new(RATE_LIMIT_MESSAGE, 429).into_response();
        set_limit_headers(response.headers_mut(), limiter.max_requests(), decision);
        let retry_after = decision.reset_after.as_secs().max(1);
        response
            .headers_mut()
            .insert("retry-after", HeaderValue::from(retry_after));
        return response;
    }

    let mut response = next.run(req).await;
    set_limit_headers(response.headers_mut(), limiter.max_requests(), decision);
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(last: u8) -> IpAddr {
        IpAddr::from([10, 0, 0, last])
    }

    #[test]
    fn disabled_limiter_allows_everything() {
        let limiter = RateLimiter::new(0, Duration::from_secs(60));
        assert!(!limiter.is_enabled());
        for _ in 0..100 {
            assert!(limiter.check(ip(1)).allowed);
        }
        assert_eq!(limiter.tracked_clients(), 0);
    }

    #[test]
    fn blocks_after_quota() {
        let limiter = RateLimiter::new(3, Duration::from_secs(60));
        let remaining: Vec<u64> = (0..3).map(|_| limiter.check(ip(1)).remaining).collect();
        assert_eq!(remaining, vec![2, 1, 0]);

        let decision = limiter.check(ip(1));
        assert!(!decision.allowed);
        assert_eq!(decision.remaining, 0);
        assert!(decision.reset_after <= Duration::from_secs(60));
    }

    #[test]
    fn clients_are_counted_separately() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        assert!(limiter.check(ip(1)).allowed);
        assert!(!limiter.check(ip(1)).allowed);
        assert!(limiter.check(ip(2)).allowed);
        assert_eq!(limiter.tracked_clients(), 2);
    }

    #[test]
    fn window_expiry_resets_count() {
        let limiter = RateLimiter::new(1, Duration::from_millis(20));
        assert!(limiter.check(ip(1)).allowed);
        assert!(!limiter.check(ip(1)).allowed);
        std::thread::sleep(Duration::from_millis(40));
        assert!(limiter.check(ip(1)).allowed);
    }

    #[test]
    fn cleanup_drops_expired_windows() {
        let limiter = RateLimiter::new(5, Duration::from_millis(20));
        limiter.check(ip(1));
        limiter.check(ip(2));
        std::thread::sleep(Duration::from_millis(40));
        limiter.check(ip(3));
        limiter.cleanup();
        assert_eq!(limiter.tracked_clients(), 1);
    }

    #[test]
    fn forwarded_for_wins_over_socket() {
        let mut req = Request::builder()
            .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
            .body(axum::body::Body::empty())
            .unwrap();
        req.extensions_mut()
            .insert(ConnectInfo(std::net::SocketAddr::from(([127, 0, 0, 1], 9))));
        assert_eq!(extract_ip(&req), Some(IpAddr::from([203, 0, 113, 7])));

        req.headers_mut().remove("x-forwarded-for");
        assert_eq!(extract_ip(&req), Some(IpAddr::from([127, 0, 0, 1])));
    }
}
