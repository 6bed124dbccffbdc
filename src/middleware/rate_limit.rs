// SPDX-License-Identifier: MIT
// Copyright 2026 Pedalea y Conquista contributors

//! Per-client rate limiting middleware.

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use std::net::SocketAddr;
use std::sync::Arc;

use crate::error::AppError;
use crate::services::rate_limit::{RateLimitDecision, RateLimitPolicy};
use crate::time_utils::format_utc_rfc3339;
use crate::AppState;

/// Best-effort client identifier.
///
/// Proxy headers win over the socket address because the service normally
/// sits behind a load balancer.
pub fn client_identifier(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    if let Some(ip) = header("cf-connecting-ip") {
        return ip.to_string();
    }
    if let Some(ip) = header("x-real-ip") {
        return ip.to_string();
    }
    if let Some(first) = header("x-forwarded-for")
        .and_then(|list| list.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        return first.to_string();
    }

    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Identifier for the client that sent `request`.
pub fn request_client(request: &Request) -> String {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    client_identifier(request.headers(), peer)
}

/// Attach `X-RateLimit-*` headers describing `decision`.
pub fn apply_rate_limit_headers(
    headers: &mut HeaderMap,
    policy: &RateLimitPolicy,
    decision: &RateLimitDecision,
) {
    headers.insert("X-RateLimit-Limit", HeaderValue::from(policy.max_requests));
    headers.insert("X-RateLimit-Remaining", HeaderValue::from(decision.remaining));
    if let Ok(reset) = HeaderValue::from_str(&format_utc_rfc3339(decision.reset_time)) {
        headers.insert("X-RateLimit-Reset", reset);
    }
}

/// Count the request against `policy` for its client; reject with 429 when over quota.
pub async fn enforce_rate_limit(
    State((state, policy)): State<(Arc<AppState>, RateLimitPolicy)>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let client = request_client(&request);

    let decision = state
        .rate_limiter
        .enforce(&policy, &client)
        .map_err(|rejection| {
            tracing::info!(client = %client, policy = policy.name, "Request throttled");
            AppError::RateLimited(rejection)
        })?;

    let mut response = next.run(request).await;
    apply_rate_limit_headers(response.headers_mut(), &policy, &decision);
    Ok(response)
}
