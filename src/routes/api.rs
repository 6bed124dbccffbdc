// SPDX-License-Identifier: MIT
// Copyright 2026 Pedalea y Conquista contributors

//! API routes for authenticated riders: routes, territories and statistics.

use crate::error::{AppError, Result};
use crate::middleware::AuthSession;
use crate::models::{
    is_valid_id, new_id, Coordinate, MonthlyStat, Route, RouteStats, StatsAccumulator,
    StatsOverview, Territory,
};
use crate::services::geometry::territories_feature_collection;
use crate::services::rate_limit;
use crate::time_utils::{truncate_to_seconds, utc_now_seconds, utc_seconds};
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Extension, Json, Router,
};
use chrono::{DateTime, Months, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use validator::{Validate, ValidationError};

use super::{protected, PageRequest, Pagination, Paging, ValidJson};

const ROUTES_DEFAULT_LIMIT: u32 = 10;
const ROUTES_MAX_LIMIT: u32 = 50;
const TERRITORIES_DEFAULT_LIMIT: u32 = 100;
const TERRITORIES_MAX_LIMIT: u32 = 200;
/// Global map overlays show at most this many territories.
const GLOBAL_TERRITORY_LIMIT: u32 = 500;
const RECENT_ROUTES: usize = 5;
const MONTHLY_WINDOW_MONTHS: u32 = 6;

/// API routes (require a session).
pub fn routes(state: &Arc<AppState>) -> Router<Arc<AppState>> {
    protected(
        Router::new()
            .route("/api/routes", get(list_routes).post(create_route))
            .route("/api/routes/{id}", get(get_route).delete(delete_route))
            .route("/api/territories", get(list_territories))
            .route("/api/territories/all", get(all_territories))
            .route("/api/territories/geojson", get(territories_geojson))
            .route("/api/stats", get(get_stats)),
        state,
        rate_limit::API,
    )
}

// ─── Routes ──────────────────────────────────────────────────

/// Body of `POST /api/routes`.
#[derive(Debug, Deserialize, Validate)]
#[validate(schema(function = "validate_time_order", skip_on_field_errors = false))]
pub struct CreateRouteRequest {
    #[validate(length(min = 2, message = "At least 2 coordinates are required"), nested)]
    pub coordinates: Vec<Coordinate>,
    #[validate(nested)]
    pub stats: RouteStats,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    #[validate(range(min = 0.0))]
    pub conquered_territory: Option<f64>,
    #[serde(default)]
    #[validate(nested)]
    pub territory_coords: Option<Vec<Coordinate>>,
    #[serde(default)]
    #[validate(length(max = 100))]
    pub name: Option<String>,
    #[serde(default)]
    #[validate(length(max = 500))]
    pub description: Option<String>,
}

/// Compared at stored (second) precision, so sub-second rides in one second are rejected.
fn validate_time_order(body: &CreateRouteRequest) -> std::result::Result<(), ValidationError> {
    if truncate_to_seconds(body.end_time) <= truncate_to_seconds(body.start_time) {
        return Err(ValidationError::new("time_order")
            .with_message("end_time must be after start_time".into()));
    }
    Ok(())
}

impl CreateRouteRequest {
    fn into_route(self, user_id: &str) -> Route {
        let now = utc_now_seconds();
        Route {
            id: new_id(),
            user_id: user_id.to_string(),
            coordinates: self.coordinates,
            stats: self.stats,
            start_time: truncate_to_seconds(self.start_time),
            end_time: truncate_to_seconds(self.end_time),
            conquered_territory: self.conquered_territory,
            territory_coords: self.territory_coords,
            name: self.name,
            description: self.description,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Route without its GPS track, for listings.
#[derive(Debug, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct RouteSummary {
    pub id: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub stats: RouteStats,
    #[serde(with = "utc_seconds")]
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub start_time: DateTime<Utc>,
    #[serde(with = "utc_seconds")]
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub end_time: DateTime<Utc>,
    pub conquered_territory: Option<f64>,
    #[serde(with = "utc_seconds")]
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub created_at: DateTime<Utc>,
}

impl From<Route> for RouteSummary {
    fn from(route: Route) -> Self {
        Self {
            id: route.id,
            name: route.name,
            description: route.description,
            stats: route.stats,
            start_time: route.start_time,
            end_time: route.end_time,
            conquered_territory: route.conquered_territory,
            created_at: route.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CreateRouteResponse {
    pub message: String,
    pub route: RouteSummary,
    /// ID of the territory claimed by this route, if any
    pub territory_id: Option<String>,
}

async fn create_route(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthSession>,
    ValidJson(body): ValidJson<CreateRouteRequest>,
) -> Result<(StatusCode, Json<CreateRouteResponse>)> {
    let route = body.into_route(auth.user_id());
    let territory = Territory::from_route(&route);

    state.db.create_route(&route, territory.as_ref()).await?;

    tracing::info!(
        user_id = %route.user_id,
        route_id = %route.id,
        points = route.coordinates.len(),
        territory = territory.is_some(),
        "Route saved"
    );

    Ok((
        StatusCode::CREATED,
        Json(CreateRouteResponse {
            message: "Route saved".to_string(),
            territory_id: territory.map(|t| t.id),
            route: RouteSummary::from(route),
        }),
    ))
}

#[derive(Debug, Serialize)]
pub struct RoutesResponse {
    pub routes: Vec<RouteSummary>,
    pub pagination: Pagination,
}

async fn list_routes(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthSession>,
    Paging(params): Paging,
) -> Result<Json<RoutesResponse>> {
    let page = PageRequest::resolve(&params, ROUTES_DEFAULT_LIMIT, ROUTES_MAX_LIMIT)?;
    let result = state
        .db
        .list_routes(auth.user_id(), page.offset(), page.limit)
        .await?;

    Ok(Json(RoutesResponse {
        routes: result.routes.into_iter().map(RouteSummary::from).collect(),
        pagination: page.pagination(result.total),
    }))
}

#[derive(Debug, Serialize)]
pub struct RouteResponse {
    pub route: Route,
}

fn parse_route_id(raw: &str) -> Result<&str> {
    if is_valid_id(raw) {
        Ok(raw)
    } else {
        Err(AppError::BadRequest("Invalid route ID".to_string()))
    }
}

async fn get_route(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthSession>,
    Path(route_id): Path<String>,
) -> Result<Json<RouteResponse>> {
    let route_id = parse_route_id(&route_id)?;
    let route = state
        .db
        .get_route(auth.user_id(), route_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Route not found".to_string()))?;

    Ok(Json(RouteResponse { route }))
}

#[derive(Debug, Serialize)]
pub struct DeleteRouteResponse {
    pub message: String,
}

async fn delete_route(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthSession>,
    Path(route_id): Path<String>,
) -> Result<Json<DeleteRouteResponse>> {
    let route_id = parse_route_id(&route_id)?;
    if !state.db.delete_route(auth.user_id(), route_id).await? {
        return Err(AppError::NotFound("Route not found".to_string()));
    }

    tracing::info!(user_id = %auth.user_id(), route_id, "Route deleted");

    Ok(Json(DeleteRouteResponse {
        message: "Route deleted".to_string(),
    }))
}

// ─── Territories ─────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct TerritoryResponse {
    pub id: String,
    pub route_id: String,
    pub coordinates: Vec<Coordinate>,
    pub area: f64,
    #[serde(with = "utc_seconds")]
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub timestamp: DateTime<Utc>,
    pub name: Option<String>,
}

impl From<Territory> for TerritoryResponse {
    fn from(t: Territory) -> Self {
        Self {
            id: t.id,
            route_id: t.route_id,
            coordinates: t.coordinates,
            area: t.area,
            timestamp: t.timestamp,
            name: t.name,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TerritoryTotals {
    pub total: u64,
    /// km² over every territory of the rider, not just this page
    pub total_area: f64,
}

#[derive(Debug, Serialize)]
pub struct TerritoriesResponse {
    pub territories: Vec<TerritoryResponse>,
    pub stats: TerritoryTotals,
    pub pagination: Pagination,
}

async fn list_territories(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthSession>,
    Paging(params): Paging,
) -> Result<Json<TerritoriesResponse>> {
    let page = PageRequest::resolve(&params, TERRITORIES_DEFAULT_LIMIT, TERRITORIES_MAX_LIMIT)?;
    let all = state.db.territories_for_user(auth.user_id()).await?;

    let total = all.len() as u64;
    let total_area = crate::models::stats::round2(all.iter().map(|t| t.area).sum());

    let territories = all
        .into_iter()
        .skip(page.offset() as usize)
        .take(page.limit as usize)
        .map(TerritoryResponse::from)
        .collect();

    Ok(Json(TerritoriesResponse {
        territories,
        stats: TerritoryTotals { total, total_area },
        pagination: page.pagination(total),
    }))
}

/// Territory as shown on the shared map.
#[derive(Debug, Serialize)]
pub struct GlobalTerritory {
    pub id: String,
    pub user_id: String,
    pub coordinates: Vec<Coordinate>,
    #[serde(with = "utc_seconds")]
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct GlobalTerritoriesResponse {
    pub territories: Vec<GlobalTerritory>,
}

async fn all_territories(State(state): State<Arc<AppState>>) -> Result<Json<GlobalTerritoriesResponse>> {
    let territories = state
        .db
        .recent_territories(GLOBAL_TERRITORY_LIMIT)
        .await?
        .into_iter()
        .map(|t| GlobalTerritory {
            id: t.id,
            user_id: t.user_id,
            coordinates: t.coordinates,
            timestamp: t.timestamp,
        })
        .collect();

    Ok(Json(GlobalTerritoriesResponse { territories }))
}

async fn territories_geojson(State(state): State<Arc<AppState>>) -> Result<Response> {
    let territories = state.db.recent_territories(GLOBAL_TERRITORY_LIMIT).await?;
    let collection = territories_feature_collection(&territories);

    Ok((
        [(header::CONTENT_TYPE, "application/geo+json")],
        Json(collection),
    )
        .into_response())
}

// ─── Statistics ──────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct RecentRoute {
    pub id: String,
    pub name: Option<String>,
    pub distance: f64,
    pub duration: f64,
    pub avg_speed: f64,
    #[serde(with = "utc_seconds")]
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub start_time: DateTime<Utc>,
    #[serde(with = "utc_seconds")]
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub end_time: DateTime<Utc>,
    pub conquered_territory: Option<f64>,
    #[serde(with = "utc_seconds")]
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub created_at: DateTime<Utc>,
}

impl From<&Route> for RecentRoute {
    fn from(route: &Route) -> Self {
        Self {
            id: route.id.clone(),
            name: route.name.clone(),
            distance: route.stats.distance,
            duration: route.stats.duration,
            avg_speed: route.stats.avg_speed,
            start_time: route.start_time,
            end_time: route.end_time,
            conquered_territory: route.conquered_territory,
            created_at: route.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct StatsResponse {
    pub overview: StatsOverview,
    pub recent_routes: Vec<RecentRoute>,
    pub monthly_stats: Vec<MonthlyStat>,
}

async fn get_stats(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthSession>,
) -> Result<Json<StatsResponse>> {
    let user_id = auth.user_id();
    let (routes, territories) = tokio::try_join!(
        state.db.routes_for_user(user_id),
        state.db.territories_for_user(user_id),
    )?;

    let now = Utc::now();
    let since = now
        .checked_sub_months(Months::new(MONTHLY_WINDOW_MONTHS))
        .unwrap_or(now);

    let mut acc = StatsAccumulator::new(since);
    routes.iter().for_each(|r| acc.add_route(r));
    territories.iter().for_each(|t| acc.add_territory(t));

    Ok(Json(StatsResponse {
        overview: acc.overview(),
        recent_routes: routes.iter().take(RECENT_ROUTES).map(RecentRoute::from).collect(),
        monthly_stats: acc.monthly(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn body(start: DateTime<Utc>, end: DateTime<Utc>) -> CreateRouteRequest {
        CreateRouteRequest {
            coordinates: vec![
                Coordinate {
                    latitude: 20.67,
                    longitude: -103.34,
                },
                Coordinate {
                    latitude: 20.68,
                    longitude: -103.35,
                },
            ],
            stats: RouteStats {
                distance: 2.0,
                duration: 600.0,
                avg_speed: 12.0,
                max_speed: None,
                calories: None,
            },
            start_time: start,
            end_time: end,
            conquered_territory: None,
            territory_coords: None,
            name: None,
            description: None,
        }
    }

    #[test]
    fn test_end_time_must_follow_start_time() {
        let start = Utc::now();
        assert!(body(start, start + Duration::minutes(10)).validate().is_ok());

        let errors = body(start, start).validate().unwrap_err();
        let issues = crate::error::validation_issues(&errors);
        assert_eq!(issues[0].code, "time_order");

        assert!(body(start, start - Duration::minutes(1)).validate().is_err());
    }

    #[test]
    fn test_time_order_uses_whole_seconds() {
        let start = DateTime::parse_from_rfc3339("2026-01-01T10:00:00.200Z")
            .unwrap()
            .with_timezone(&Utc);
        let same_second = start + Duration::milliseconds(600);
        assert!(body(start, same_second).validate().is_err());

        let next_second = start + Duration::milliseconds(800);
        assert!(body(start, next_second).validate().is_ok());
    }

    #[test]
    fn test_nested_coordinate_errors_are_reported() {
        let start = Utc::now();
        let mut bad = body(start, start + Duration::minutes(10));
        bad.coordinates[1].latitude = 95.0;
        bad.stats.distance = -1.0;

        let issues = crate::error::validation_issues(&bad.validate().unwrap_err());
        let fields: Vec<&str> = issues.iter().map(|i| i.field.as_str()).collect();
        assert_eq!(fields, vec!["coordinates[1].latitude", "stats.distance"]);
    }

    #[test]
    fn test_route_id_must_be_uuid() {
        assert!(parse_route_id("not-a-uuid").is_err());
        assert!(parse_route_id(&new_id()).is_ok());
    }
}
