// SPDX-License-Identifier: MIT
// Copyright 2026 Pedalea y Conquista contributors

use axum::body::Body;
use axum::http::{header, Request, Response};
use pedalea_conquista::config::Config;
use pedalea_conquista::db::{FirestoreDb, MemoryDb, Store};
use pedalea_conquista::models::{DeviceInfo, User};
use pedalea_conquista::routes::create_router;
use pedalea_conquista::AppState;
use serde_json::Value;
use std::sync::Arc;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Create a test app on the in-memory store.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>) {
    create_test_app_with_config(Config::test_default())
}

#[allow(dead_code)]
pub fn create_test_app_with_config(config: Config) -> (axum::Router, Arc<AppState>) {
    let state = Arc::new(
        AppState::new(config, Arc::new(MemoryDb::new())).expect("Failed to build state"),
    );
    (create_router(state.clone()), state)
}

/// Insert a user directly and open a session for them, skipping password hashing.
/// Returns the user and the signed session value.
#[allow(dead_code)]
pub async fn login_user(state: &AppState, email: &str) -> (User, String) {
    let user = User::new(email, "unused-hash".to_string(), "Test Rider");
    state.db.create_user(&user).await.unwrap();
    let issued = state
        .sessions
        .create(&user.id, &DeviceInfo::default())
        .await
        .unwrap();
    (user, issued.signed)
}

/// Request with a JSON body.
#[allow(dead_code)]
pub fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Request authenticated through the session cookie.
#[allow(dead_code)]
pub fn authed_request(method: &str, uri: &str, session: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::COOKIE, format!("session={}", session));

    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// Collect a response body as JSON.
#[allow(dead_code)]
pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// All `Set-Cookie` headers of a response.
#[allow(dead_code)]
pub fn set_cookie_headers(response: &Response<Body>) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|value| value.to_str().unwrap().to_string())
        .collect()
}

/// The `session` cookie value set by a response.
#[allow(dead_code)]
pub fn session_cookie_value(response: &Response<Body>) -> Option<String> {
    set_cookie_headers(response).iter().find_map(|c| {
        c.strip_prefix("session=")
            .map(|rest| rest.split(';').next().unwrap_or("").to_string())
    })
}

/// A route body ridden over the last hour.
#[allow(dead_code)]
pub fn route_body(territory: Option<Vec<(f64, f64)>>, area: Option<f64>) -> Value {
    let end = chrono::Utc::now();
    let start = end - chrono::Duration::hours(1);
    let mut body = serde_json::json!({
        "coordinates": [
            {"latitude": 20.6737, "longitude": -103.3444},
            {"latitude": 20.6800, "longitude": -103.3500},
            {"latitude": 20.6850, "longitude": -103.3400}
        ],
        "stats": {"distance": 5.2, "duration": 1500, "avg_speed": 12.5, "max_speed": 25.0, "calories": 260},
        "start_time": start.to_rfc3339(),
        "end_time": end.to_rfc3339(),
        "name": "Ruta matutina"
    });
    if let Some(points) = territory {
        body["territory_coords"] = points
            .into_iter()
            .map(|(latitude, longitude)| serde_json::json!({"latitude": latitude, "longitude": longitude}))
            .collect();
    }
    if let Some(area) = area {
        body["conquered_territory"] = area.into();
    }
    body
}

/// A triangle around downtown Guadalajara.
#[allow(dead_code)]
pub fn triangle() -> Vec<(f64, f64)> {
    vec![(20.67, -103.34), (20.68, -103.34), (20.68, -103.35)]
}
