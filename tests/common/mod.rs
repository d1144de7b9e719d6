// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use std::sync::Arc;
use ucionica::config::Config;
use ucionica::db::FirestoreDb;
use ucionica::middleware::auth::create_jwt;
use ucionica::models::Role;
use ucionica::routes::create_router;
use ucionica::services::{Mailer, VideoStorage};
use ucionica::AppState;

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

/// Create a mock database connection (offline).
#[allow(dead_code)]
pub fn test_db_offline() -> FirestoreDb {
    FirestoreDb::new_mock()
}

/// Create a test app with offline mock dependencies.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>) {
    let state = Arc::new(AppState {
        config: Config::test_default(),
        db: test_db_offline(),
        storage: VideoStorage::new_mock(),
        mailer: Mailer::new_mock(),
        resend_cooldowns: dashmap::DashMap::new(),
    });

    (create_router(state.clone()), state)
}

/// Create a test app backed by the Firestore emulator.
#[allow(dead_code)]
pub async fn create_emulator_app() -> (axum::Router, Arc<AppState>) {
    let state = Arc::new(AppState {
        config: Config::test_default(),
        db: test_db().await,
        storage: VideoStorage::new_mock(),
        mailer: Mailer::new_mock(),
        resend_cooldowns: dashmap::DashMap::new(),
    });

    (create_router(state.clone()), state)
}

/// Store a profile for `uid` matching the tokens from [`create_test_jwt`].
#[allow(dead_code)]
pub async fn seed_user(db: &FirestoreDb, uid: &str, role: Role, blocked: bool) {
    let user = ucionica::models::User {
        uid: uid.to_string(),
        email: format!("{}@example.com", uid),
        display_name: "Test".to_string(),
        role,
        blocked,
        email_verified: true,
        created_at: "2025-03-01T10:00:00Z".to_string(),
        last_login: None,
    };
    db.upsert_user(&user).await.unwrap();
}

/// Session token signed with the test config's key.
#[allow(dead_code)]
pub fn create_test_jwt(uid: &str, role: Role) -> String {
    create_jwt(
        uid,
        &format!("{}@example.com", uid),
        role,
        &Config::test_default().jwt_signing_key,
    )
    .unwrap()
}

/// Unique suffix for test isolation against a shared emulator.
#[allow(dead_code)]
pub fn unique_id(prefix: &str) -> String {
    format!("{}-{}", prefix, uuid::Uuid::new_v4())
}
