//! Rate limiting for login submissions.
//!
//! Uses a token bucket algorithm with per-IP tracking to slow down password guessing.

use axum::{
    extract::{ConnectInfo, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{Quota, RateLimiter, clock::DefaultClock, state::keyed::DefaultKeyedStateStore};
use std::net::SocketAddr;
use std::{num::NonZeroU32, sync::Arc};
use tracing::warn;

/// Per-IP rate limiter.
pub type IpLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

/// Steady refill: one attempt per second.
const LOGIN_SUBMIT_PER_SEC: NonZeroU32 = NonZeroU32::new(1).unwrap();
/// Up to five attempts in a burst.
const LOGIN_SUBMIT_BURST: NonZeroU32 = NonZeroU32::new(5).unwrap();

/// Key used when the peer address is unknown; such requests share one bucket.
const UNKNOWN_CLIENT: &str = "unknown";

#[derive(Clone)]
pub struct RateLimitConfig {
    pub login_submit: Arc<IpLimiter>,
    /// Take the client IP from the first `X-Forwarded-For` entry
    pub trust_forwarded_for: bool,
}

impl RateLimitConfig {
    pub fn new(trust_forwarded_for: bool) -> Self {
        Self {
            login_submit: Arc::new(RateLimiter::keyed(
                Quota::per_second(LOGIN_SUBMIT_PER_SEC).allow_burst(LOGIN_SUBMIT_BURST),
            )),
            trust_forwarded_for,
        }
    }
}

/// Best-effort client IP for rate limiting.
fn client_ip(request: &Request, trust_forwarded_for: bool) -> String {
    if trust_forwarded_for {
        let forwarded = request
            .headers()
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|ip| !ip.is_empty());
        if let Some(ip) = forwarded {
            return ip.to_string();
        }
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

/// Middleware for rate limiting login form submissions.
pub async fn rate_limit_login_submit(
    State(config): State<RateLimitConfig>,
    request: Request,
    next: Next,
) -> Response {
    let ip = client_ip(&request, config.trust_forwarded_for);

    match config.login_submit.check_key(&ip) {
        Ok(_) => next.run(request).await,
        Err(_) => {
            warn!(ip = %ip, "Login rate limit exceeded");
            (
                StatusCode::TOO_MANY_REQUESTS,
                "Too many login attempts. Please wait before trying again.",
            )
                .into_response()
        }
    }
}
