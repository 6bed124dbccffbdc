// SPDX-License-Identifier: MIT
// Copyright 2026 Pedalea y Conquista contributors

//! Middleware modules (authentication, rate limiting, security headers).

pub mod auth;
pub mod rate_limit;
pub mod security;

pub use auth::{require_session, AuthSession};
pub use rate_limit::enforce_rate_limit;
