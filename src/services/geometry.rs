// SPDX-License-Identifier: MIT
// Copyright 2026 Pedalea y Conquista contributors

//! Geometry helpers for routes and territory polygons.

use geo::{Area, Coord, LineString, Polygon};
use geojson::{Feature, FeatureCollection, GeoJson, Geometry, JsonObject};

use crate::models::{Coordinate, Territory};
use crate::time_utils::format_utc_rfc3339;

/// Below this planar area (degrees²) a ring is treated as degenerate.
const MIN_POLYGON_AREA: f64 = 1e-12;

fn to_coord(c: &Coordinate) -> Coord<f64> {
    Coord {
        x: c.longitude,
        y: c.latitude,
    }
}

/// Build a closed polygon from vertices (x = longitude, y = latitude).
pub fn to_polygon(coords: &[Coordinate]) -> Polygon<f64> {
    let ring: LineString<f64> = coords.iter().map(to_coord).collect();
    Polygon::new(ring, vec![])
}

/// True when the vertices describe a polygon with non-zero area.
pub fn polygon_has_area(coords: &[Coordinate]) -> bool {
    coords.len() >= 3 && to_polygon(coords).unsigned_area() > MIN_POLYGON_AREA
}

/// Render territories as a GeoJSON FeatureCollection for map overlays.
pub fn territories_feature_collection(territories: &[Territory]) -> GeoJson {
    let features = territories
        .iter()
        .map(|territory| {
            let polygon = to_polygon(&territory.coordinates);

            let mut properties = JsonObject::new();
            properties.insert("user_id".to_string(), territory.user_id.clone().into());
            properties.insert("route_id".to_string(), territory.route_id.clone().into());
            properties.insert("area".to_string(), territory.area.into());
            properties.insert(
                "timestamp".to_string(),
                format_utc_rfc3339(territory.timestamp).into(),
            );
            if let Some(name) = &territory.name {
                properties.insert("name".to_string(), name.clone().into());
            }

            Feature {
                bbox: None,
                geometry: Some(Geometry::new(geojson::Value::from(&polygon))),
                id: Some(geojson::feature::Id::String(territory.id.clone())),
                properties: Some(properties),
                foreign_members: None,
            }
        })
        .collect();

    GeoJson::FeatureCollection(FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    })
}
