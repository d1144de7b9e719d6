// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Live online classes for students.

use axum::{extract::State, routing::get, Extension, Json, Router};
use std::sync::Arc;

use crate::error::Result;
use crate::middleware::auth::AuthUser;
use crate::models::{Enrollment, OnlinePackage, Session};
use crate::time_utils::format_date;
use crate::AppState;

/// Public package listing.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/online/packages", get(list_packages))
}

/// Student routes. The auth middleware is applied in routes/mod.rs.
pub fn protected_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/online/enrollments", get(my_enrollments))
        .route("/api/online/sessions/upcoming", get(upcoming_sessions))
}

async fn list_packages(State(state): State<Arc<AppState>>) -> Result<Json<Vec<OnlinePackage>>> {
    Ok(Json(state.db.list_packages(true).await?))
}

async fn my_enrollments(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<Vec<Enrollment>>> {
    Ok(Json(state.db.list_enrollments_for_user(&auth.uid).await?))
}

/// Scheduled or ongoing sessions of the caller's groups, from today on.
async fn upcoming_sessions(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<Vec<Session>>> {
    let today = format_date(chrono::Utc::now().date_naive());
    Ok(Json(
        state
            .db
            .list_upcoming_sessions_for_user(&auth.uid, &today)
            .await?,
    ))
}
