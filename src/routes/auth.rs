// SPDX-License-Identifier: MIT
// Copyright 2026 Pedalea y Conquista contributors

//! Account and session routes.

use axum::{
    extract::{Path, Request, State},
    http::StatusCode,
    routing::{delete, get, post},
    Extension, Json, Router,
};
use axum_extra::extract::cookie::CookieJar;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::{Validate, ValidationError};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use super::{protected, rate_limited, ValidJson};
use crate::error::{AppError, Result};
use crate::middleware::rate_limit::request_client;
use crate::middleware::AuthSession;
use crate::models::user::{normalize_email, EMAIL_RE};
use crate::models::{DeviceInfo, Session, User};
use crate::services::password::{hash_password_blocking, verify_password_blocking};
use crate::services::rate_limit::{self, RateLimitDecision, RateLimitPolicy};
use crate::time_utils::{format_utc_rfc3339, utc_seconds};
use crate::AppState;

pub fn routes(state: &Arc<AppState>) -> Router<Arc<AppState>> {
    let sign_up = rate_limited(
        Router::new().route("/api/sign-up", post(sign_up)),
        state,
        rate_limit::SIGNUP,
    );
    let sign_in = rate_limited(
        Router::new().route("/api/sign-in", post(sign_in)),
        state,
        rate_limit::AUTH,
    );
    let account = protected(
        Router::new()
            .route("/api/logout", post(logout))
            .route("/api/me", get(get_me))
            .route("/api/refresh-session", post(refresh_session)),
        state,
        rate_limit::API,
    );
    let sessions = protected(
        Router::new()
            .route("/api/sessions", get(list_sessions))
            .route("/api/sessions/{id}", delete(delete_session)),
        state,
        rate_limit::AUTH,
    );

    Router::new()
        .route("/api/rate-limit-status", get(rate_limit_status))
        .merge(sign_up)
        .merge(sign_in)
        .merge(account)
        .merge(sessions)
}

// ─── Sign-up / Sign-in ───────────────────────────────────────

#[derive(Debug, Deserialize, Validate)]
pub struct SignUpRequest {
    #[validate(regex(path = *EMAIL_RE, message = "Invalid email"))]
    pub email: String,
    #[validate(length(min = 8, max = 128, message = "Password must be at least 8 characters"))]
    pub password: String,
    #[validate(custom(function = "validate_name"))]
    pub name: String,
    #[serde(flatten)]
    #[validate(nested)]
    pub device: DeviceInfo,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SignInRequest {
    #[validate(regex(path = *EMAIL_RE, message = "Invalid email"))]
    pub email: String,
    #[validate(length(min = 1, max = 128, message = "Password is required"))]
    pub password: String,
    #[serde(flatten)]
    #[validate(nested)]
    pub device: DeviceInfo,
}

/// Names are stored trimmed, so the length rule applies to the trimmed value.
fn validate_name(name: &str) -> std::result::Result<(), ValidationError> {
    let len = name.trim().chars().count();
    if !(2..=100).contains(&len) {
        return Err(ValidationError::new("length")
            .with_message("Name must be between 2 and 100 characters".into()));
    }
    Ok(())
}

/// Public part of a user.
#[derive(Debug, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub name: String,
    #[serde(with = "utc_seconds")]
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            email: user.email.clone(),
            name: user.name.clone(),
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub message: String,
    /// Signed session value, usable as a bearer token by non-browser clients
    pub token: String,
    pub user: UserResponse,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

async fn sign_up(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    ValidJson(body): ValidJson<SignUpRequest>,
) -> Result<(StatusCode, CookieJar, Json<AuthResponse>)> {
    if state.db.get_user_by_email(&body.email).await?.is_some() {
        return Err(AppError::Conflict("Email already registered".to_string()));
    }

    let password_hash = hash_password_blocking(body.password).await?;
    let user = User::new(&body.email, password_hash, &body.name);
    // The store enforces uniqueness too, for sign-ups racing past the check above.
    state.db.create_user(&user).await?;

    tracing::info!(user_id = %user.id, "User registered");

    let issued = state.sessions.create(&user.id, &body.device).await?;
    let jar = jar.add(state.sessions.session_cookie(issued.signed.clone()));

    Ok((
        StatusCode::CREATED,
        jar,
        Json(AuthResponse {
            message: "User registered".to_string(),
            token: issued.signed,
            user: UserResponse::from(&user),
        }),
    ))
}

async fn sign_in(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    ValidJson(body): ValidJson<SignInRequest>,
) -> Result<(CookieJar, Json<AuthResponse>)> {
    let email = normalize_email(&body.email);

    // Guessing passwords for one account from many addresses still hits a wall.
    state
        .rate_limiter
        .enforce(&rate_limit::SIGNIN_EMAIL, &email)
        .map_err(AppError::RateLimited)?;

    let user = state
        .db
        .get_user_by_email(&email)
        .await?
        .ok_or(AppError::InvalidCredentials)?;

    let valid = verify_password_blocking(user.password_hash.clone(), body.password).await?;
    if !valid {
        tracing::info!(user_id = %user.id, "Sign-in rejected: wrong password");
        return Err(AppError::InvalidCredentials);
    }

    let issued = state.sessions.create(&user.id, &body.device).await?;
    let jar = jar.add(state.sessions.session_cookie(issued.signed.clone()));

    tracing::info!(user_id = %user.id, "User signed in");

    Ok((
        jar,
        Json(AuthResponse {
            message: "Signed in".to_string(),
            token: issued.signed,
            user: UserResponse::from(&user),
        }),
    ))
}

// ─── Current session ─────────────────────────────────────────

async fn logout(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthSession>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<MessageResponse>)> {
    state.sessions.revoke(&auth.session).await?;
    let jar = jar.add(state.sessions.removal_cookie());

    Ok((
        jar,
        Json(MessageResponse {
            message: "Signed out".to_string(),
        }),
    ))
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user: UserResponse,
}

async fn get_me(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthSession>,
) -> Result<Json<MeResponse>> {
    let user = state
        .db
        .get_user(auth.user_id())
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", auth.user_id())))?;

    Ok(Json(MeResponse {
        user: UserResponse::from(&user),
    }))
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub message: String,
    #[serde(with = "utc_seconds")]
    pub expires_at: DateTime<Utc>,
}

async fn refresh_session(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthSession>,
    jar: CookieJar,
    request_headers: axum::http::HeaderMap,
) -> Result<(CookieJar, Json<RefreshResponse>)> {
    let renewed = state.sessions.renew(&auth.session).await?;

    // Re-issue the cookie so the browser's Max-Age follows the new expiry.
    let credential = crate::middleware::auth::session_credential(&jar, &request_headers)
        .ok_or(AppError::Unauthorized)?;
    let jar = jar.add(state.sessions.session_cookie(credential));

    Ok((
        jar,
        Json(RefreshResponse {
            message: "Session renewed".to_string(),
            expires_at: renewed.expires_at,
        }),
    ))
}

// ─── Multi-session management ────────────────────────────────

#[derive(Debug, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SessionInfo {
    pub id: String,
    pub device_name: String,
    pub device_type: String,
    pub device_model: String,
    #[serde(with = "utc_seconds")]
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub last_used: DateTime<Utc>,
    #[serde(with = "utc_seconds")]
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub created_at: DateTime<Utc>,
    #[serde(with = "utc_seconds")]
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub expires_at: DateTime<Utc>,
    pub is_current: bool,
}

impl SessionInfo {
    fn new(session: Session, current_id: &str) -> Self {
        Self {
            is_current: session.id == current_id,
            id: session.id,
            device_name: session
                .device_name
                .unwrap_or_else(|| "Unknown device".to_string()),
            device_type: session.device_type.unwrap_or_else(|| "unknown".to_string()),
            device_model: session
                .device_model
                .unwrap_or_else(|| "Unknown model".to_string()),
            last_used: session.last_used,
            created_at: session.created_at,
            expires_at: session.expires_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SessionsResponse {
    pub sessions: Vec<SessionInfo>,
    pub total: usize,
}

async fn list_sessions(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthSession>,
) -> Result<Json<SessionsResponse>> {
    let sessions: Vec<SessionInfo> = state
        .sessions
        .list_active(auth.user_id(), Utc::now())
        .await?
        .into_iter()
        .map(|s| SessionInfo::new(s, &auth.session.id))
        .collect();

    Ok(Json(SessionsResponse {
        total: sessions.len(),
        sessions,
    }))
}

async fn delete_session(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthSession>,
    Path(session_id): Path<String>,
) -> Result<Json<MessageResponse>> {
    state
        .sessions
        .revoke_other(&auth.session, &session_id)
        .await?;

    Ok(Json(MessageResponse {
        message: "Session closed".to_string(),
    }))
}

// ─── Rate-limit status ───────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct LimitStatus {
    pub allowed: bool,
    pub remaining: u32,
    pub limit: u32,
    pub reset_time: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

impl LimitStatus {
    fn new(policy: &RateLimitPolicy, decision: RateLimitDecision) -> Self {
        Self {
            allowed: decision.allowed,
            remaining: decision.remaining,
            limit: policy.max_requests,
            reset_time: format_utc_rfc3339(decision.reset_time),
            retry_after: decision.retry_after,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RateLimits {
    pub auth: LimitStatus,
    pub signup: LimitStatus,
    pub api: LimitStatus,
}

#[derive(Debug, Serialize)]
pub struct RateLimitStatusResponse {
    pub client: String,
    pub rate_limits: RateLimits,
}

/// Report the caller's windows without consuming any of them.
async fn rate_limit_status(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Json<RateLimitStatusResponse> {
    let client = request_client(&request);
    let status = |policy: &RateLimitPolicy| {
        LimitStatus::new(policy, state.rate_limiter.status(policy, &client))
    };

    Json(RateLimitStatusResponse {
        rate_limits: RateLimits {
            auth: status(&rate_limit::AUTH),
            signup: status(&rate_limit::SIGNUP),
            api: status(&rate_limit::API),
        },
        client,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_up_request_validation() {
        let body: SignUpRequest = serde_json::from_value(serde_json::json!({
            "email": "not-an-email",
            "password": "short",
            "name": "A",
            "device_name": "x".repeat(101),
        }))
        .unwrap();

        let errors = body.validate().unwrap_err();
        let fields: Vec<String> = crate::error::validation_issues(&errors)
            .into_iter()
            .map(|i| i.field)
            .collect();
        assert_eq!(
            fields,
            vec!["device.device_name", "email", "name", "password"]
        );
    }

    #[test]
    fn test_session_info_defaults() {
        let now = Utc::now();
        let session = Session {
            id: "s-1".to_string(),
            token_hash: "h".to_string(),
            user_id: "u".to_string(),
            expires_at: now,
            created_at: now,
            last_used: now,
            device_name: None,
            device_type: None,
            device_model: Some("Pixel 8".to_string()),
        };

        let info = SessionInfo::new(session, "s-1");
        assert!(info.is_current);
        assert_eq!(info.device_name, "Unknown device");
        assert_eq!(info.device_type, "unknown");
        assert_eq!(info.device_model, "Pixel 8");
    }

    #[test]
    fn test_name_length_counts_trimmed_characters() {
        assert!(validate_name("  A  ").is_err());
        assert!(validate_name(&"x".repeat(101)).is_err());
        assert!(validate_name(" Ana ").is_ok());
        assert!(validate_name("Ñu").is_ok());
    }
}
