// SPDX-License-Identifier: MIT
// Copyright 2026 Pedalea y Conquista contributors

//! Session authentication middleware.

use crate::error::AppError;
use crate::models::Session;
use crate::services::session::SESSION_COOKIE;
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use std::sync::Arc;

/// Authenticated caller, inserted as a request extension.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub session: Session,
}

impl AuthSession {
    pub fn user_id(&self) -> &str {
        &self.session.user_id
    }
}

/// Signed session value from the cookie, falling back to a bearer header.
pub fn session_credential(jar: &CookieJar, headers: &HeaderMap) -> Option<String> {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        if !cookie.value().is_empty() {
            return Some(cookie.value().to_string());
        }
    }

    headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
}

/// Middleware that requires a live session.
pub async fn require_session(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let credential =
        session_credential(&jar, request.headers()).ok_or(AppError::Unauthorized)?;

    let session = state
        .sessions
        .validate(&credential)
        .await?
        .ok_or(AppError::Unauthorized)?;

    request.extensions_mut().insert(AuthSession { session });

    Ok(next.run(request).await)
}
