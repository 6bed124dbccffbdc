// SPDX-License-Identifier: MIT
// Copyright 2026 Pedalea y Conquista contributors

//! Account and session flows over HTTP, on the in-memory store.

mod common;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use chrono::{Duration, Utc};
use common::{
    authed_request, body_json, create_test_app, json_request, login_user, session_cookie_value,
};
use pedalea_conquista::models::DeviceInfo;
use serde_json::json;
use tower::ServiceExt;

fn sign_up_body(email: &str) -> serde_json::Value {
    json!({
        "email": email,
        "password": "pedalea-segura",
        "name": "Ana Rider",
        "device_name": "Ana's phone",
        "device_type": "mobile",
    })
}

#[tokio::test]
async fn test_sign_up_sets_cookie_and_returns_user() {
    let (app, _state) = create_test_app();

    let response = app
        .oneshot(json_request("POST", "/api/sign-up", sign_up_body("Ana@Example.com")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let cookie = session_cookie_value(&response).expect("session cookie set");

    let json = body_json(response).await;
    assert_eq!(json["user"]["email"], "ana@example.com");
    assert_eq!(json["user"]["name"], "Ana Rider");
    assert!(json["user"].get("password_hash").is_none());
    assert_eq!(json["token"], cookie.as_str());
}

#[tokio::test]
async fn test_sign_up_duplicate_email_conflicts() {
    let (app, _state) = create_test_app();

    let first = app
        .clone()
        .oneshot(json_request("POST", "/api/sign-up", sign_up_body("dup@example.com")))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::CREATED);

    let second = app
        .oneshot(json_request("POST", "/api/sign-up", sign_up_body("DUP@example.com")))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_sign_up_validation_lists_fields() {
    let (app, _state) = create_test_app();

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/sign-up",
            json!({"email": "nope", "password": "123", "name": "Ana"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"], "validation_error");
    let fields: Vec<&str> = json["issues"]
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i["field"].as_str().unwrap())
        .collect();
    assert_eq!(fields, vec!["email", "password"]);
}

#[tokio::test]
async fn test_sign_up_rejects_undotted_domain_and_short_trimmed_name() {
    let (app, state) = create_test_app();

    let response = app
        .clone()
        .oneshot(json_request("POST", "/api/sign-up", sign_up_body("rider@localhost")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"], "validation_error");
    assert_eq!(json["issues"][0]["field"], "email");

    let mut padded = sign_up_body("padded@example.com");
    padded["name"] = json!("   A   ");
    let response = app
        .oneshot(json_request("POST", "/api/sign-up", padded))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"], "validation_error");
    assert_eq!(json["issues"][0]["field"], "name");

    assert!(state
        .db
        .get_user_by_email("rider@localhost")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_sign_in_with_right_and_wrong_password() {
    let (app, _state) = create_test_app();

    app.clone()
        .oneshot(json_request("POST", "/api/sign-up", sign_up_body("rider@example.com")))
        .await
        .unwrap();

    let wrong = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/sign-in",
            json!({"email": "rider@example.com", "password": "not-the-password"}),
        ))
        .await
        .unwrap();
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(wrong).await["error"], "invalid_credentials");

    let unknown = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/sign-in",
            json!({"email": "ghost@example.com", "password": "pedalea-segura"}),
        ))
        .await
        .unwrap();
    assert_eq!(unknown.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(unknown).await["error"], "invalid_credentials");

    let right = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/sign-in",
            json!({"email": "RIDER@example.com", "password": "pedalea-segura"}),
        ))
        .await
        .unwrap();
    assert_eq!(right.status(), StatusCode::OK);
    let cookie = session_cookie_value(&right).expect("session cookie set");

    let me = app
        .oneshot(authed_request("GET", "/api/me", &cookie, None))
        .await
        .unwrap();
    assert_eq!(me.status(), StatusCode::OK);
    assert_eq!(body_json(me).await["user"]["email"], "rider@example.com");
}

#[tokio::test]
async fn test_protected_routes_require_session() {
    let (app, _state) = create_test_app();

    for uri in ["/api/me", "/api/routes", "/api/stats", "/api/sessions"] {
        let response = app
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{}", uri);
    }
}

#[tokio::test]
async fn test_bearer_token_is_accepted() {
    let (app, state) = create_test_app();
    let (user, signed) = login_user(&state, "bearer@example.com").await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/me")
                .header(header::AUTHORIZATION, format!("Bearer {}", signed))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["user"]["id"], user.id.as_str());
}

#[tokio::test]
async fn test_tampered_cookie_is_rejected() {
    let (app, state) = create_test_app();
    let (_user, signed) = login_user(&state, "tamper@example.com").await;

    let (token, mac) = signed.split_once('.').unwrap();
    let mut forged_token: Vec<char> = token.chars().collect();
    forged_token[0] = if forged_token[0] == 'a' { 'b' } else { 'a' };
    let forged = format!("{}.{}", forged_token.into_iter().collect::<String>(), mac);

    let response = app
        .clone()
        .oneshot(authed_request("GET", "/api/me", &forged, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let unsigned = app
        .oneshot(authed_request("GET", "/api/me", token, None))
        .await
        .unwrap();
    assert_eq!(unsigned.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_expired_session_is_rejected_and_deleted() {
    let (app, state) = create_test_app();
    let (_user, signed) = login_user(&state, "expired@example.com").await;

    let session = state.sessions.validate(&signed).await.unwrap().unwrap();
    let mut expired = session.clone();
    expired.expires_at = Utc::now() - Duration::minutes(1);
    state.db.put_session(&expired).await.unwrap();

    let response = app
        .oneshot(authed_request("GET", "/api/me", &signed, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    assert!(state
        .db
        .get_session_by_token_hash(&session.token_hash)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_logout_revokes_session_and_clears_cookie() {
    let (app, state) = create_test_app();
    let (_user, signed) = login_user(&state, "logout@example.com").await;

    let response = app
        .clone()
        .oneshot(authed_request("POST", "/api/logout", &signed, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let cleared = common::set_cookie_headers(&response);
    assert!(cleared
        .iter()
        .any(|c| c.starts_with("session=") && c.contains("Max-Age=0")));

    let after = app
        .oneshot(authed_request("GET", "/api/me", &signed, None))
        .await
        .unwrap();
    assert_eq!(after.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_refresh_session_extends_expiry() {
    let (app, state) = create_test_app();
    let (_user, signed) = login_user(&state, "refresh@example.com").await;

    let mut session = state.sessions.validate(&signed).await.unwrap().unwrap();
    session.expires_at = Utc::now() + Duration::hours(1);
    state.db.put_session(&session).await.unwrap();

    let response = app
        .oneshot(authed_request("POST", "/api/refresh-session", &signed, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(session_cookie_value(&response).as_deref(), Some(signed.as_str()));

    let renewed = state.sessions.validate(&signed).await.unwrap().unwrap();
    assert!(renewed.expires_at > Utc::now() + Duration::days(6));
}

#[tokio::test]
async fn test_sessions_list_and_close_rules() {
    let (app, state) = create_test_app();
    let (user, current) = login_user(&state, "multi@example.com").await;

    let phone = DeviceInfo {
        device_name: Some("Bike computer".to_string()),
        device_type: Some("wearable".to_string()),
        device_model: None,
    };
    let other = state.sessions.create(&user.id, &phone).await.unwrap();

    let list = app
        .clone()
        .oneshot(authed_request("GET", "/api/sessions", &current, None))
        .await
        .unwrap();
    assert_eq!(list.status(), StatusCode::OK);
    let json = body_json(list).await;
    assert_eq!(json["total"], 2);
    let sessions = json["sessions"].as_array().unwrap();
    assert_eq!(sessions.iter().filter(|s| s["is_current"] == true).count(), 1);
    assert!(sessions
        .iter()
        .all(|s| s.get("token_hash").is_none() && s.get("token").is_none()));

    let current_id = state.sessions.validate(&current).await.unwrap().unwrap().id;
    let own = app
        .clone()
        .oneshot(authed_request(
            "DELETE",
            &format!("/api/sessions/{}", current_id),
            &current,
            None,
        ))
        .await
        .unwrap();
    assert_eq!(own.status(), StatusCode::BAD_REQUEST);

    let (_stranger, stranger_session) = login_user(&state, "stranger@example.com").await;
    let foreign = app
        .clone()
        .oneshot(authed_request(
            "DELETE",
            &format!("/api/sessions/{}", other.session.id),
            &stranger_session,
            None,
        ))
        .await
        .unwrap();
    assert_eq!(foreign.status(), StatusCode::FORBIDDEN);

    let closed = app
        .clone()
        .oneshot(authed_request(
            "DELETE",
            &format!("/api/sessions/{}", other.session.id),
            &current,
            None,
        ))
        .await
        .unwrap();
    assert_eq!(closed.status(), StatusCode::OK);
    assert!(state.sessions.validate(&other.signed).await.unwrap().is_none());

    let missing = app
        .oneshot(authed_request(
            "DELETE",
            &format!("/api/sessions/{}", other.session.id),
            &current,
            None,
        ))
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}
