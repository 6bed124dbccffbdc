// SPDX-License-Identifier: MIT
// Copyright 2026 Pedalea y Conquista contributors

//! Server-side session records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::time_utils::utc_seconds;

/// Session stored in the `sessions` collection, keyed by `token_hash`.
///
/// The raw token only ever lives in the client's cookie; `id` is the public
/// handle used by the multi-session endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    /// Public session ID (UUID)
    pub id: String,
    /// Hex SHA-256 of the raw token (document ID)
    pub token_hash: String,
    /// Owning user
    pub user_id: String,
    /// Absolute expiry
    #[serde(with = "utc_seconds")]
    pub expires_at: DateTime<Utc>,
    #[serde(with = "utc_seconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "utc_seconds")]
    pub last_used: DateTime<Utc>,
    #[serde(default)]
    pub device_name: Option<String>,
    #[serde(default)]
    pub device_type: Option<String>,
    #[serde(default)]
    pub device_model: Option<String>,
}

impl Session {
    /// A session is dead from the instant its expiry is reached.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Optional client-reported device metadata, accepted on sign-up/sign-in.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct DeviceInfo {
    #[validate(length(max = 100))]
    pub device_name: Option<String>,
    #[validate(length(max = 50))]
    pub device_type: Option<String>,
    #[validate(length(max = 100))]
    pub device_model: Option<String>,
}
