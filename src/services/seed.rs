// SPDX-License-Identifier: MIT
// Copyright 2026 Pedalea y Conquista contributors

//! Demo data generator.
//!
//! Wipes the store and fills it with riders cycling around Guadalajara,
//! each with a handful of routes that all claim a hexagonal territory.

use chrono::{DateTime, Duration, NaiveTime, Timelike, Utc};
use futures_util::{stream, StreamExt};
use rand::Rng;
use std::f64::consts::PI;

use crate::db::Store;
use crate::error::AppError;
use crate::models::{new_id, Coordinate, Route, RouteStats, Territory, User};
use crate::services::password::hash_password_blocking;
use crate::time_utils::truncate_to_seconds;

/// Shared password of every seeded rider.
pub const SEED_PASSWORD: &str = "g5XJOWbcFKE=";

/// Rough kilometres per degree, good enough for placing demo points.
const KM_PER_DEGREE: f64 = 111.0;

/// Fraction of the ridden distance claimed as territory (km² per km).
const CLAIM_RATIO: f64 = 0.08;

const MAX_CONCURRENT_WRITES: usize = 8;

pub struct Zone {
    pub name: &'static str,
    pub center: Coordinate,
}

const fn zone(name: &'static str, latitude: f64, longitude: f64) -> Zone {
    Zone {
        name,
        center: Coordinate {
            latitude,
            longitude,
        },
    }
}

pub const GUADALAJARA_ZONES: [Zone; 10] = [
    zone("centro", 20.6737, -103.3444),
    zone("chapalita", 20.6770, -103.3920),
    zone("zapopan", 20.7214, -103.3918),
    zone("tlaquepaque", 20.6401, -103.3125),
    zone("providencia", 20.6764, -103.3710),
    zone("minerva", 20.6739, -103.3917),
    zone("andares", 20.6929, -103.3844),
    zone("oblatos", 20.6956, -103.3210),
    zone("huentitan", 20.7311, -103.3123),
    zone("tonala", 20.6223, -103.2329),
];

pub const SEED_RIDERS: [(&str, &str); 6] = [
    ("Silvino Aguiar", "silvino@devcore.dev"),
    ("Carlos Mendoza", "carlos.mendoza@email.com"),
    ("Ana García", "ana.garcia@email.com"),
    ("Luis Ramírez", "luis.ramirez@email.com"),
    ("María Fernández", "maria.fernandez@email.com"),
    ("Roberto Silva", "roberto.silva@email.com"),
];

const ROUTE_NAMES: [&str; 4] = ["matutina", "vespertina", "nocturna", "del fin de semana"];

const ROUTE_DESCRIPTIONS: [&str; 4] = [
    "Gran recorrido por la ciudad",
    "Entrenamiento intenso",
    "Paseo relajado",
    "Exploración de nuevas rutas",
];

/// What a seeding run produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub cleared: usize,
    pub users: usize,
    pub routes: usize,
    pub territories: usize,
}

/// `count` random points within `radius_km` of `base`.
pub fn generate_nearby_coords<R: Rng>(
    rng: &mut R,
    base: Coordinate,
    radius_km: f64,
    count: usize,
) -> Vec<Coordinate> {
    let radius_deg = radius_km / KM_PER_DEGREE;
    (0..count)
        .map(|_| {
            let angle = rng.gen_range(0.0..2.0 * PI);
            let distance = rng.gen_range(0.0..radius_deg);
            Coordinate {
                latitude: base.latitude + distance * angle.cos(),
                longitude: base.longitude + distance * angle.sin(),
            }
        })
        .collect()
}

/// Regular hexagon of `radius_km` around `center`.
pub fn generate_territory_polygon(center: Coordinate, radius_km: f64) -> Vec<Coordinate> {
    let radius_deg = radius_km / KM_PER_DEGREE;
    (0..6u32)
        .map(|i| {
            let angle = f64::from(i) * 2.0 * PI / 6.0;
            Coordinate {
                latitude: center.latitude + radius_deg * angle.cos(),
                longitude: center.longitude + radius_deg * angle.sin(),
            }
        })
        .collect()
}

/// Build one random ride for `user_id`, plus the territory it claims.
pub fn generate_route<R: Rng>(
    rng: &mut R,
    user_id: &str,
    now: DateTime<Utc>,
) -> (Route, Option<Territory>) {
    let zone = &GUADALAJARA_ZONES[rng.gen_range(0..GUADALAJARA_ZONES.len())];

    let point_count = rng.gen_range(30..80);
    let coordinates = generate_nearby_coords(rng, zone.center, 2.0, point_count);

    let distance = rng.gen_range(2.0..17.0);
    let speed = rng.gen_range(10.0..15.0);
    let duration = (distance / speed * 3600.0_f64).floor().max(1.0);
    let avg_speed = distance / (duration / 3600.0);
    let max_speed = avg_speed * (1.0 + rng.gen_range(0.0..0.3));
    let calories = (distance * 50.0).round();

    let days_ago = rng.gen_range(0..60);
    let hour = rng.gen_range(6..14);
    let day = now - Duration::days(days_ago);
    let time_of_day = NaiveTime::from_hms_opt(hour, day.minute(), day.second())
        .unwrap_or(NaiveTime::MIN);
    let start_time = truncate_to_seconds(day.date_naive().and_time(time_of_day).and_utc());
    let end_time = start_time + Duration::seconds(duration as i64);

    let conquered_area = distance * CLAIM_RATIO;
    let territory_coords = generate_territory_polygon(zone.center, conquered_area.sqrt());

    let name = format!("Ruta {}", ROUTE_NAMES[rng.gen_range(0..ROUTE_NAMES.len())]);
    let description = ROUTE_DESCRIPTIONS[rng.gen_range(0..ROUTE_DESCRIPTIONS.len())];

    let route = Route {
        id: new_id(),
        user_id: user_id.to_string(),
        coordinates,
        stats: RouteStats {
            distance,
            duration,
            avg_speed,
            max_speed: Some(max_speed),
            calories: Some(calories),
        },
        start_time,
        end_time,
        conquered_territory: Some(conquered_area),
        territory_coords: Some(territory_coords),
        name: Some(name),
        description: Some(description.to_string()),
        // Backdated so history and monthly charts have something to show.
        created_at: end_time,
        updated_at: end_time,
    };
    let territory = Territory::from_route(&route);
    tracing::trace!(zone = zone.name, route_id = %route.id, "Generated route");

    (route, territory)
}

/// Clear the store and fill it with demo riders, routes and territories.
pub async fn seed<R: Rng + Send>(store: &dyn Store, rng: &mut R) -> Result<SeedSummary, AppError> {
    let mut summary = SeedSummary {
        cleared: store.clear_all().await?,
        ..Default::default()
    };
    tracing::info!(cleared = summary.cleared, "Existing data removed");

    let password_hash = hash_password_blocking(SEED_PASSWORD.to_string()).await?;
    let now = Utc::now();

    for (name, email) in SEED_RIDERS {
        let user = User::new(email, password_hash.clone(), name);
        store.create_user(&user).await?;
        summary.users += 1;

        let route_count = rng.gen_range(4..10);
        let rides: Vec<(Route, Option<Territory>)> = (0..route_count)
            .map(|_| generate_route(rng, &user.id, now))
            .collect();
        summary.routes += rides.len();
        summary.territories += rides.iter().filter(|(_, t)| t.is_some()).count();

        stream::iter(rides)
            .map(|(route, territory)| async move {
                store.create_route(&route, territory.as_ref()).await
            })
            .buffer_unordered(MAX_CONCURRENT_WRITES)
            .collect::<Vec<Result<(), AppError>>>()
            .await
            .into_iter()
            .collect::<Result<Vec<()>, AppError>>()?;

        tracing::info!(rider = name, routes = route_count, "Rider seeded");
    }

    tracing::info!(
        users = summary.users,
        routes = summary.routes,
        territories = summary.territories,
        "Seed complete"
    );
    Ok(summary)
}
