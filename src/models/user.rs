//! User model for storage and API.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use crate::time_utils::utc_seconds;

/// Rider account stored in the `users` collection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    /// UUID (also used as document ID)
    pub id: String,
    /// Lower-cased, trimmed email address (unique)
    pub email: String,
    /// Argon2id PHC string
    pub password_hash: String,
    /// Display name
    pub name: String,
    #[serde(with = "utc_seconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "utc_seconds")]
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Build a new user with a fresh ID. The email is normalized here.
    pub fn new(email: &str, password_hash: String, name: &str) -> Self {
        let now = crate::time_utils::utc_now_seconds();
        Self {
            id: super::new_id(),
            email: normalize_email(email),
            password_hash,
            name: name.trim().to_string(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Accepted email shape: no whitespace, one `@`, a dotted domain.
pub static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern compiles")
});

/// Canonical form used for uniqueness checks and lookups.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
