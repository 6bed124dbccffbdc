// SPDX-License-Identifier: MIT
// Copyright 2026 Pedalea y Conquista contributors

//! Territory claims derived from completed routes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Coordinate, Route};
use crate::time_utils::utc_seconds;

/// Polygon claimed by a single route, stored in the `territories` collection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Territory {
    /// UUID (also used as document ID)
    pub id: String,
    pub user_id: String,
    /// Originating route
    pub route_id: String,
    /// Polygon vertices (at least three)
    pub coordinates: Vec<Coordinate>,
    /// km²
    pub area: f64,
    /// Claim time (the route's end time)
    #[serde(with = "utc_seconds")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(with = "utc_seconds")]
    pub created_at: DateTime<Utc>,
}

impl Territory {
    /// Derive the territory claimed by `route`, if it claims one.
    pub fn from_route(route: &Route) -> Option<Self> {
        if !route.has_territory_claim() {
            return None;
        }

        Some(Self {
            id: super::new_id(),
            user_id: route.user_id.clone(),
            route_id: route.id.clone(),
            coordinates: route.territory_coords.clone()?,
            area: route.conquered_territory?,
            timestamp: route.end_time,
            name: route.name.clone(),
            created_at: route.created_at,
        })
    }
}
