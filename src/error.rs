// SPDX-License-Identifier: MIT
// Copyright 2026 Pedalea y Conquista contributors

//! Application error types with consistent API responses.

use axum::{
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use validator::{ValidationErrors, ValidationErrorsKind};

use crate::services::rate_limit::RateLimitRejection;
use crate::time_utils::format_utc_rfc3339;

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Rate limit exceeded")]
    RateLimited(RateLimitRejection),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// A single failed constraint, addressed by a dotted field path.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ValidationIssue {
    pub field: String,
    pub code: String,
    pub message: String,
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    issues: Option<Vec<ValidationIssue>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    retry_after: Option<u64>,
}

impl ErrorResponse {
    fn new(error: &str, details: Option<String>) -> Self {
        Self {
            error: error.to_string(),
            details,
            issues: None,
            retry_after: None,
        }
    }
}

/// Flatten nested validator output into `field.path[index]` issues, sorted by path.
pub fn validation_issues(errors: &ValidationErrors) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    collect_issues("", errors, &mut issues);
    issues.sort_by(|a, b| a.field.cmp(&b.field).then_with(|| a.code.cmp(&b.code)));
    issues
}

fn collect_issues(prefix: &str, errors: &ValidationErrors, out: &mut Vec<ValidationIssue>) {
    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{}.{}", prefix, field)
        };

        match kind {
            ValidationErrorsKind::Field(field_errors) => {
                for err in field_errors {
                    out.push(ValidationIssue {
                        field: path.clone(),
                        code: err.code.to_string(),
                        message: err
                            .message
                            .as_ref()
                            .map(|m| m.to_string())
                            .unwrap_or_else(|| format!("{} is invalid", path)),
                    });
                }
            }
            ValidationErrorsKind::Struct(nested) => collect_issues(&path, nested, out),
            ValidationErrorsKind::List(items) => {
                for (index, nested) in items {
                    collect_issues(&format!("{}[{}]", path, index), nested, out);
                }
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                ErrorResponse::new("unauthorized", None),
            ),
            AppError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                ErrorResponse::new("invalid_credentials", None),
            ),
            AppError::Forbidden(msg) => (
                StatusCode::FORBIDDEN,
                ErrorResponse::new("forbidden", Some(msg.clone())),
            ),
            AppError::NotFound(msg) => (
                StatusCode::NOT_FOUND,
                ErrorResponse::new("not_found", Some(msg.clone())),
            ),
            AppError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse::new("bad_request", Some(msg.clone())),
            ),
            AppError::Validation(errors) => {
                let mut body = ErrorResponse::new(
                    "validation_error",
                    Some("Request body failed validation".to_string()),
                );
                body.issues = Some(validation_issues(errors));
                (StatusCode::BAD_REQUEST, body)
            }
            AppError::Conflict(msg) => (
                StatusCode::CONFLICT,
                ErrorResponse::new("conflict", Some(msg.clone())),
            ),
            AppError::RateLimited(rejection) => {
                tracing::warn!(
                    limit = rejection.limit,
                    retry_after = rejection.retry_after,
                    "Rate limit exceeded"
                );
                let mut body = ErrorResponse::new(rejection.message, None);
                body.retry_after = Some(rejection.retry_after);

                let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
                let headers = response.headers_mut();
                headers.insert("Retry-After", HeaderValue::from(rejection.retry_after));
                headers.insert("X-RateLimit-Limit", HeaderValue::from(rejection.limit));
                headers.insert("X-RateLimit-Remaining", HeaderValue::from_static("0"));
                if let Ok(reset) = HeaderValue::from_str(&format_utc_rfc3339(rejection.reset_time))
                {
                    headers.insert("X-RateLimit-Reset", reset);
                }
                return response;
            }
            AppError::Database(msg) => {
                tracing::error!(error = %msg, "Database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::new("database_error", None),
                )
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::new("internal_error", None),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[derive(Validate)]
    struct Inner {
        #[validate(range(min = -90.0, max = 90.0))]
        latitude: f64,
    }

    #[derive(Validate)]
    struct Outer {
        #[validate(length(min = 2, message = "name too short"))]
        name: String,
        #[validate(nested)]
        points: Vec<Inner>,
    }

    #[test]
    fn test_validation_issues_flatten_nested_paths() {
        let outer = Outer {
            name: "a".to_string(),
            points: vec![Inner { latitude: 10.0 }, Inner { latitude: 120.0 }],
        };

        let errors = outer.validate().unwrap_err();
        let issues = validation_issues(&errors);

        assert_eq!(issues.len(), 2);
        assert_eq!(issues[0].field, "name");
        assert_eq!(issues[0].message, "name too short");
        assert_eq!(issues[1].field, "points[1].latitude");
        assert_eq!(issues[1].code, "range");
    }

    #[test]
    fn test_internal_errors_hide_details() {
        let response = AppError::Database("connection refused".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
