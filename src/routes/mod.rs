// SPDX-License-Identifier: MIT
// Copyright 2026 Pedalea y Conquista contributors

//! HTTP route handlers.

pub mod api;
pub mod auth;

use crate::error::AppError;
use crate::middleware::{enforce_rate_limit, require_session};
use crate::services::rate_limit::RateLimitPolicy;
use crate::AppState;
use axum::extract::{FromRequest, FromRequestParts, Query, Request, State};
use axum::http::{header, request::Parts, Method};
use axum::{middleware, routing::get, Json, Router};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use validator::Validate;

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct HealthResponse {
    pub status: String,
    pub build_id: String,
}

/// Health check response
async fn health_check() -> Json<HealthResponse> {
    let build_id = option_env!("BUILD_ID").unwrap_or("unknown").to_string();
    Json(HealthResponse {
        status: "ok".to_string(),
        build_id,
    })
}

#[derive(Serialize)]
pub struct DbHealthResponse {
    pub status: String,
    pub database: String,
}

/// Storage round trip; fails with `database_error` when the backend is unreachable.
async fn db_health_check(
    State(state): State<Arc<AppState>>,
) -> Result<Json<DbHealthResponse>, AppError> {
    state.db.ping().await?;
    Ok(Json(DbHealthResponse {
        status: "ok".to_string(),
        database: "connected".to_string(),
    }))
}

// ─── Extractors ──────────────────────────────────────────────

/// JSON body that has passed its `validator` rules.
///
/// Malformed JSON becomes `bad_request`, rule violations `validation_error`.
pub struct ValidJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;
        value.validate()?;
        Ok(Self(value))
    }
}

/// `?page=&limit=` query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

/// Resolved paging window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl PageRequest {
    /// `limit` falls back to `default` and is capped at `max`.
    pub fn resolve(params: &PageParams, default: u32, max: u32) -> Result<Self, AppError> {
        let page = params.page.unwrap_or(1);
        let limit = params.limit.unwrap_or(default);
        if page == 0 {
            return Err(AppError::BadRequest("page must be at least 1".to_string()));
        }
        if limit == 0 {
            return Err(AppError::BadRequest("limit must be at least 1".to_string()));
        }
        Ok(Self {
            page,
            limit: limit.min(max),
        })
    }

    pub fn offset(&self) -> u32 {
        (self.page - 1).saturating_mul(self.limit)
    }

    pub fn pagination(&self, total: u64) -> Pagination {
        Pagination {
            total,
            page: self.page,
            limit: self.limit,
            pages: total.div_ceil(u64::from(self.limit)),
        }
    }
}

/// Paging metadata returned alongside list results.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Pagination {
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub pages: u64,
}

/// Query-string paging parameters, rejected with `bad_request` when malformed.
pub struct Paging(pub PageParams);

impl<S> FromRequestParts<S> for Paging
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(params) = Query::<PageParams>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;
        Ok(Self(params))
    }
}

// ─── Router ──────────────────────────────────────────────────

/// Wrap `router` in the rate limiter for `policy`.
pub(crate) fn rate_limited(
    router: Router<Arc<AppState>>,
    state: &Arc<AppState>,
    policy: RateLimitPolicy,
) -> Router<Arc<AppState>> {
    router.route_layer(middleware::from_fn_with_state(
        (state.clone(), policy),
        enforce_rate_limit,
    ))
}

/// Require a session, then apply the rate limiter for `policy` in front of it.
pub(crate) fn protected(
    router: Router<Arc<AppState>>,
    state: &Arc<AppState>,
    policy: RateLimitPolicy,
) -> Router<Arc<AppState>> {
    // Layers added last run first: throttling happens before the session lookup.
    let router =
        router.route_layer(middleware::from_fn_with_state(state.clone(), require_session));
    rate_limited(router, state, policy)
}

/// Build the complete router with all routes.
pub fn create_router(state: Arc<AppState>) -> Router {
    // CORS layer - allow requests from frontend URL and localhost (for dev)
    let frontend_url = state.config.frontend_url.clone();
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::AllowOrigin::predicate(
            move |origin: &axum::http::HeaderValue, _request_parts: &axum::http::request::Parts| {
                let origin_str = origin.to_str().unwrap_or("");
                origin_str == frontend_url
                    || origin_str.starts_with("http://localhost")
                    || origin_str.starts_with("http://127.0.0.1")
            },
        ))
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT])
        .expose_headers([
            header::RETRY_AFTER,
            header::HeaderName::from_static("x-ratelimit-limit"),
            header::HeaderName::from_static("x-ratelimit-remaining"),
            header::HeaderName::from_static("x-ratelimit-reset"),
        ]);

    let health_routes = Router::new()
        .route("/health", get(health_check))
        .route("/health/db", get(db_health_check));

    Router::new()
        .merge(health_routes)
        .merge(auth::routes(&state))
        .merge(api::routes(&state))
        .layer(middleware::from_fn(
            crate::middleware::security::add_security_headers,
        ))
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state)
}
