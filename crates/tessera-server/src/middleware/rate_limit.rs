//! Tiered per-minute rate limiting, keyed on the caller's API-key prefix
//! (falling back to remote IP), with a distinct quota per tier.

use std::future::Future;
use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::pin::Pin;
use std::sync::Arc;

use axum::extract::{ConnectInfo, Request};
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use governor::clock::{Clock, DefaultClock};
use governor::state::keyed::DefaultKeyedStateStore;
use governor::{Quota, RateLimiter};
use serde_json::json;

use tessera_core::error::ErrorCode;

use crate::config::RateLimitTiers;

type KeyedLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

#[derive(Clone, Copy, Debug)]
pub enum Tier {
    Read,
    Write,
    Admin,
    Auth,
    Expensive,
}

fn quota(per_min: u32) -> Quota {
    Quota::per_minute(NonZeroU32::new(per_min.max(1)).expect("per_min.max(1) is never zero"))
}

/// Holds one independent bucket family per tier. `expensive` is layered on
/// top of `read`, never instead of it, per the impact-analysis endpoint's
/// double quota.
pub struct RateLimiters {
    read: KeyedLimiter,
    write: KeyedLimiter,
    admin: KeyedLimiter,
    auth: KeyedLimiter,
    expensive: KeyedLimiter,
}

impl RateLimiters {
    pub fn new(tiers: &RateLimitTiers) -> Self {
        Self {
            read: RateLimiter::keyed(quota(tiers.read_per_min)),
            write: RateLimiter::keyed(quota(tiers.write_per_min)),
            admin: RateLimiter::keyed(quota(tiers.admin_per_min)),
            auth: RateLimiter::keyed(quota(tiers.auth_per_min)),
            expensive: RateLimiter::keyed(quota(tiers.expensive_per_min)),
        }
    }

    fn for_tier(&self, tier: Tier) -> &KeyedLimiter {
        match tier {
            Tier::Read => &self.read,
            Tier::Write => &self.write,
            Tier::Admin => &self.admin,
            Tier::Auth => &self.auth,
            Tier::Expensive => &self.expensive,
        }
    }
}

fn caller_key(request: &Request) -> String {
    if let Some(value) = request.headers().get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        if let Some(token) = value.strip_prefix("Bearer ") {
            let end = token.len().min(18);
            return format!("key:{}", &token[..end]);
        }
    }
    if let Some(ConnectInfo(addr)) = request.extensions().get::<ConnectInfo<SocketAddr>>() {
        return format!("ip:{}", addr.ip());
    }
    "ip:unknown".to_string()
}

fn too_many_requests(retry_after_secs: u64) -> Response {
    let body = json!({
        "error": {
            "code": ErrorCode::RateLimitExceeded,
            "message": format!("rate limit exceeded, retry after {retry_after_secs}s"),
        }
    });
    let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
    if let Ok(value) = axum::http::HeaderValue::from_str(&retry_after_secs.to_string()) {
        response.headers_mut().insert(header::RETRY_AFTER, value);
    }
    response
}

fn check(limiters: &RateLimiters, tier: Tier, request: &Request) -> Result<(), Response> {
    let key = caller_key(request);
    let clock = DefaultClock::default();
    limiters.for_tier(tier).check_key(&key).map_err(|not_until| {
        let retry_after = not_until.wait_time_from(clock.now()).as_secs().max(1);
        too_many_requests(retry_after)
    })
}

/// Builds the `from_fn` middleware for one tier, closing over the shared
/// limiter state. The impact-analysis route layers both `Read` and
/// `Expensive` so a caller burning the expensive budget still counts
/// against their ordinary read quota.
pub fn layer(
    limiters: Arc<RateLimiters>,
    tier: Tier,
) -> impl Fn(Request, Next) -> Pin<Box<dyn Future<Output = Response> + Send>> + Clone {
    move |request: Request, next: Next| {
        let limiters = limiters.clone();
        Box::pin(async move {
            match check(&limiters, tier, &request) {
                Ok(()) => next.run(request).await,
                Err(response) => response,
            }
        })
    }
}
