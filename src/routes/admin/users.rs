//! User management.

use axum::{
    extract::{Path, Query, State},
    routing::{get, put},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{Role, User};
use crate::AppState;

const DEFAULT_USER_LIMIT: u32 = 500;
const MAX_USER_LIMIT: u32 = 1000;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/admin/users", get(list_users))
        .route("/api/admin/users/{uid}/role", put(set_role))
        .route("/api/admin/users/{uid}/blocked", put(set_blocked))
        .route("/api/admin/users/{uid}", axum::routing::delete(delete_user))
}

#[derive(Debug, Deserialize)]
struct ListUsersQuery {
    limit: Option<u32>,
}

async fn list_users(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListUsersQuery>,
) -> Result<Json<Vec<User>>> {
    let limit = query.limit.unwrap_or(DEFAULT_USER_LIMIT).clamp(1, MAX_USER_LIMIT);
    Ok(Json(state.db.list_users(limit).await?))
}

async fn load_user(state: &AppState, uid: &str) -> Result<User> {
    state
        .db
        .get_user(uid)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", uid)))
}

#[derive(Debug, Deserialize)]
pub struct SetRoleRequest {
    pub role: Role,
}

/// Change a user's role. Takes effect at the user's next login.
async fn set_role(
    State(state): State<Arc<AppState>>,
    Extension(admin): Extension<AuthUser>,
    Path(uid): Path<String>,
    Json(req): Json<SetRoleRequest>,
) -> Result<Json<User>> {
    if uid == admin.uid && req.role != Role::Admin {
        return Err(AppError::FailedPrecondition(
            "You cannot remove your own admin role".to_string(),
        ));
    }

    let mut user = load_user(&state, &uid).await?;
    if user.role != req.role {
        user.role = req.role;
        state.db.upsert_user(&user).await?;
        tracing::info!(uid = %uid, role = req.role.as_str(), by = %admin.uid, "User role changed");
    }
    Ok(Json(user))
}

#[derive(Debug, Deserialize)]
pub struct SetBlockedRequest {
    pub blocked: bool,
}

async fn set_blocked(
    State(state): State<Arc<AppState>>,
    Extension(admin): Extension<AuthUser>,
    Path(uid): Path<String>,
    Json(req): Json<SetBlockedRequest>,
) -> Result<Json<User>> {
    if uid == admin.uid && req.blocked {
        return Err(AppError::FailedPrecondition(
            "You cannot block yourself".to_string(),
        ));
    }

    let mut user = load_user(&state, &uid).await?;
    user.blocked = req.blocked;
    state.db.upsert_user(&user).await?;
    tracing::info!(uid = %uid, blocked = req.blocked, by = %admin.uid, "User blocked flag changed");
    Ok(Json(user))
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct DeleteUserResponse {
    pub deleted_documents: usize,
}

/// Delete an account with its grants, payments and enrollments.
async fn delete_user(
    State(state): State<Arc<AppState>>,
    Extension(admin): Extension<AuthUser>,
    Path(uid): Path<String>,
) -> Result<Json<DeleteUserResponse>> {
    if uid == admin.uid {
        return Err(AppError::FailedPrecondition(
            "You cannot delete your own account".to_string(),
        ));
    }

    load_user(&state, &uid).await?;
    let deleted_documents = state.db.delete_user_data(&uid).await?;
    state.resend_cooldowns.remove(&uid);

    tracing::info!(uid = %uid, by = %admin.uid, deleted_documents, "User deleted by admin");
    Ok(Json(DeleteUserResponse { deleted_documents }))
}
