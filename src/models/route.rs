// SPDX-License-Identifier: MIT
// Copyright 2026 Pedalea y Conquista contributors

//! Recorded ride model for storage and API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::time_utils::utc_seconds;

/// A GPS sample or polygon vertex.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Validate)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Coordinate {
    #[validate(range(min = -90.0, max = 90.0, message = "latitude must be within [-90, 90]"))]
    pub latitude: f64,
    #[validate(range(
        min = -180.0,
        max = 180.0,
        message = "longitude must be within [-180, 180]"
    ))]
    pub longitude: f64,
}

/// Aggregate ride statistics reported by the client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Validate)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct RouteStats {
    /// Kilometres
    #[validate(range(min = 0.0))]
    pub distance: f64,
    /// Seconds
    #[validate(range(min = 0.0))]
    pub duration: f64,
    /// km/h
    #[validate(range(min = 0.0))]
    pub avg_speed: f64,
    /// km/h
    #[serde(default)]
    #[validate(range(min = 0.0))]
    pub max_speed: Option<f64>,
    /// Estimated kcal
    #[serde(default)]
    #[validate(range(min = 0.0))]
    pub calories: Option<f64>,
}

/// Stored route in the `routes` collection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Route {
    /// UUID (also used as document ID)
    pub id: String,
    /// Owning user
    pub user_id: String,
    /// Ordered GPS samples (at least two)
    pub coordinates: Vec<Coordinate>,
    pub stats: RouteStats,
    #[serde(with = "utc_seconds")]
    pub start_time: DateTime<Utc>,
    #[serde(with = "utc_seconds")]
    pub end_time: DateTime<Utc>,
    /// Claimed area in km²
    #[serde(default)]
    pub conquered_territory: Option<f64>,
    /// Claimed polygon vertices
    #[serde(default)]
    pub territory_coords: Option<Vec<Coordinate>>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(with = "utc_seconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "utc_seconds")]
    pub updated_at: DateTime<Utc>,
}

impl Route {
    /// Whether this route carries a polygon that qualifies as a territory claim.
    pub fn has_territory_claim(&self) -> bool {
        let area = self.conquered_territory.unwrap_or(0.0);
        match &self.territory_coords {
            Some(coords) => {
                coords.len() >= 3
                    && area > 0.0
                    && crate::services::geometry::polygon_has_area(coords)
            }
            None => false,
        }
    }
}
