//! Rider statistics aggregates for the dashboard.
//!
//! Aggregates are folded from the rider's routes and territories on request;
//! the store only has to return the raw records.

use chrono::{DateTime, Datelike, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::models::{Route, Territory};

/// All-time totals.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct StatsOverview {
    pub total_routes: u32,
    /// km
    pub total_distance: f64,
    /// seconds
    pub total_duration: f64,
    /// Mean of per-route average speeds (km/h)
    pub avg_speed: f64,
    /// Highest recorded max speed (km/h), 0 when none was reported
    pub max_speed: f64,
    pub total_calories: f64,
    pub total_territories: u32,
    /// km²
    pub total_area: f64,
}

/// One calendar month of activity.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct MonthlyStat {
    pub year: i32,
    pub month: u32,
    pub routes: u32,
    pub distance: f64,
    pub duration: f64,
}

/// Running totals folded over a rider's records.
#[derive(Debug, Clone)]
pub struct StatsAccumulator {
    monthly_since: DateTime<Utc>,
    total_routes: u32,
    total_distance: f64,
    total_duration: f64,
    speed_sum: f64,
    max_speed: Option<f64>,
    total_calories: f64,
    total_territories: u32,
    total_area: f64,
    // Keyed by (year, month) so iteration is chronological.
    monthly: BTreeMap<(i32, u32), MonthlyStat>,
}

impl StatsAccumulator {
    /// Routes created at or after `monthly_since` feed the monthly buckets.
    pub fn new(monthly_since: DateTime<Utc>) -> Self {
        Self {
            monthly_since,
            total_routes: 0,
            total_distance: 0.0,
            total_duration: 0.0,
            speed_sum: 0.0,
            max_speed: None,
            total_calories: 0.0,
            total_territories: 0,
            total_area: 0.0,
            monthly: BTreeMap::new(),
        }
    }

    pub fn add_route(&mut self, route: &Route) {
        let stats = &route.stats;

        self.total_routes += 1;
        self.total_distance += stats.distance;
        self.total_duration += stats.duration;
        self.speed_sum += stats.avg_speed;
        self.total_calories += stats.calories.unwrap_or(0.0);
        if let Some(speed) = stats.max_speed {
            self.max_speed = Some(self.max_speed.map_or(speed, |m| m.max(speed)));
        }

        if route.created_at >= self.monthly_since {
            let key = (route.created_at.year(), route.created_at.month());
            let bucket = self.monthly.entry(key).or_insert_with(|| MonthlyStat {
                year: key.0,
                month: key.1,
                ..MonthlyStat::default()
            });
            bucket.routes += 1;
            bucket.distance += stats.distance;
            bucket.duration += stats.duration;
        }
    }

    pub fn add_territory(&mut self, territory: &Territory) {
        self.total_territories += 1;
        self.total_area += territory.area;
    }

    pub fn overview(&self) -> StatsOverview {
        let avg_speed = if self.total_routes > 0 {
            self.speed_sum / self.total_routes as f64
        } else {
            0.0
        };

        StatsOverview {
            total_routes: self.total_routes,
            total_distance: round2(self.total_distance),
            total_duration: self.total_duration,
            avg_speed: round2(avg_speed),
            max_speed: round2(self.max_speed.unwrap_or(0.0)),
            total_calories: self.total_calories,
            total_territories: self.total_territories,
            total_area: round2(self.total_area),
        }
    }

    /// Monthly buckets in ascending (year, month) order.
    pub fn monthly(&self) -> Vec<MonthlyStat> {
        self.monthly
            .values()
            .map(|m| MonthlyStat {
                distance: round2(m.distance),
                ..m.clone()
            })
            .collect()
    }
}

/// Round to two decimal places for display.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
