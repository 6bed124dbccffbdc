// SPDX-License-Identifier: MIT
// Copyright 2026 Pedalea y Conquista contributors

//! Services module - business logic layer.

pub mod geometry;
pub mod password;
pub mod rate_limit;
pub mod seed;
pub mod session;

pub use rate_limit::{RateLimitPolicy, RateLimiter};
pub use session::SessionManager;
