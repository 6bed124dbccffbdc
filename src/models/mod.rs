// SPDX-License-Identifier: MIT
// Copyright 2026 Pedalea y Conquista contributors

//! Data models for the application.

pub mod route;
pub mod session;
pub mod stats;
pub mod territory;
pub mod user;

pub use route::{Coordinate, Route, RouteStats};
pub use session::{DeviceInfo, Session};
pub use stats::{MonthlyStat, StatsAccumulator, StatsOverview};
pub use territory::Territory;
pub use user::User;

/// Generate a new record ID.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Whether `raw` is a well-formed record ID.
pub fn is_valid_id(raw: &str) -> bool {
    uuid::Uuid::parse_str(raw).is_ok()
}
