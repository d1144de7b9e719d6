// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Admin route protection.
//!
//! Every admin route must answer 403 `permission-denied` to a regular
//! user before any handler (or database call) runs. Admin tokens are only
//! honored while the stored profile is still an unblocked admin.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use tower::ServiceExt;
use ucionica::models::Role;

mod common;
use common::{create_emulator_app, create_test_app, create_test_jwt, seed_user, unique_id};

const ADMIN_ROUTES: &[(&str, &str)] = &[
    ("GET", "/api/admin/users"),
    ("PUT", "/api/admin/users/u2/role"),
    ("PUT", "/api/admin/users/u2/blocked"),
    ("DELETE", "/api/admin/users/u2"),
    ("GET", "/api/admin/courses"),
    ("POST", "/api/admin/courses"),
    ("DELETE", "/api/admin/lessons/l1"),
    ("POST", "/api/admin/videos/upload-url"),
    ("GET", "/api/admin/transactions"),
    ("POST", "/api/admin/transactions/t1/confirm"),
    ("POST", "/api/admin/transactions/t1/reject"),
    ("PUT", "/api/admin/online/enrollments/e1/credits"),
    ("POST", "/api/admin/online/groups"),
    ("PUT", "/api/admin/online/sessions/s1/status"),
];

fn request(method: &str, uri: &str, token: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_regular_user_gets_403_on_admin_routes() {
    let (app, _) = create_test_app();
    let token = create_test_jwt("student-1", Role::Korisnik);

    for (method, uri) in ADMIN_ROUTES {
        let response = app
            .clone()
            .oneshot(request(method, uri, &token, "{}"))
            .await
            .unwrap();

        assert_eq!(
            response.status(),
            StatusCode::FORBIDDEN,
            "{} {} should be forbidden for korisnik",
            method,
            uri
        );

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "permission-denied");
    }
}

#[tokio::test]
async fn test_admin_routes_require_authentication() {
    let (app, _) = create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri("/api/admin/users/u2/role")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"role":"admin"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_check_fails_closed_offline() {
    let (app, _) = create_test_app();
    let token = create_test_jwt("admin-1", Role::Admin);

    let response = app
        .oneshot(request("GET", "/api/admin/users", &token, ""))
        .await
        .unwrap();

    // The profile lookup cannot run against the offline database
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

async fn status_of(app: &axum::Router, method: &str, uri: &str, token: &str, body: &str) -> StatusCode {
    app.clone()
        .oneshot(request(method, uri, token, body))
        .await
        .unwrap()
        .status()
}

#[tokio::test]
async fn test_current_admin_passes() {
    require_emulator!();

    let (app, state) = create_emulator_app().await;
    let uid = unique_id("admin");
    seed_user(&state.db, &uid, Role::Admin, false).await;
    let token = create_test_jwt(&uid, Role::Admin);

    assert_eq!(
        status_of(&app, "GET", "/api/admin/transactions", &token, "").await,
        StatusCode::OK
    );
}

#[tokio::test]
async fn test_demoted_admin_token_refused() {
    require_emulator!();

    let (app, state) = create_emulator_app().await;
    let uid = unique_id("former-admin");
    seed_user(&state.db, &uid, Role::Korisnik, false).await;
    // Token issued while the account was still an admin
    let token = create_test_jwt(&uid, Role::Admin);

    assert_eq!(
        status_of(&app, "GET", "/api/admin/transactions", &token, "").await,
        StatusCode::FORBIDDEN
    );
}

#[tokio::test]
async fn test_blocked_or_deleted_admin_refused() {
    require_emulator!();

    let (app, state) = create_emulator_app().await;
    let blocked = unique_id("blocked-admin");
    seed_user(&state.db, &blocked, Role::Admin, true).await;
    let token = create_test_jwt(&blocked, Role::Admin);
    assert_eq!(
        status_of(&app, "GET", "/api/admin/transactions", &token, "").await,
        StatusCode::FORBIDDEN
    );

    // No profile at all
    let token = create_test_jwt(&unique_id("ghost-admin"), Role::Admin);
    assert_eq!(
        status_of(&app, "GET", "/api/admin/transactions", &token, "").await,
        StatusCode::FORBIDDEN
    );
}

#[tokio::test]
async fn test_admin_cannot_demote_self() {
    require_emulator!();

    let (app, state) = create_emulator_app().await;
    let uid = unique_id("admin");
    seed_user(&state.db, &uid, Role::Admin, false).await;
    let token = create_test_jwt(&uid, Role::Admin);

    let response = app
        .oneshot(request(
            "PUT",
            &format!("/api/admin/users/{}/role", uid),
            &token,
            r#"{"role":"korisnik"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["error"], "failed-precondition");
}

#[tokio::test]
async fn test_admin_cannot_delete_self() {
    require_emulator!();

    let (app, state) = create_emulator_app().await;
    let uid = unique_id("admin");
    seed_user(&state.db, &uid, Role::Admin, false).await;
    let token = create_test_jwt(&uid, Role::Admin);

    assert_eq!(
        status_of(&app, "DELETE", &format!("/api/admin/users/{}", uid), &token, "").await,
        StatusCode::CONFLICT
    );
    assert!(state.db.get_user(&uid).await.unwrap().is_some());
}

#[tokio::test]
async fn test_bootstrap_refused_for_unlisted_email() {
    let (app, _) = create_test_app();
    // Token email is student-1@example.com, not in ADMIN_EMAILS
    let token = create_test_jwt("student-1", Role::Korisnik);

    let response = app
        .oneshot(request("POST", "/api/admin/bootstrap", &token, ""))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_bootstrap_allowed_for_listed_email() {
    let (app, _) = create_test_app();
    // admin@example.com is the bootstrap admin in the test config
    let token = create_test_jwt("admin", Role::Korisnik);

    let response = app
        .oneshot(request("POST", "/api/admin/bootstrap", &token, ""))
        .await
        .unwrap();

    // Passed the email check; the offline database fails the profile read
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}
