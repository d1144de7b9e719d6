// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Email/password authentication routes.

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use dashmap::mapref::entry::Entry;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use validator::Validate;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use super::validated::ValidatedJson;
use crate::error::{AppError, Result};
use crate::middleware::auth::{create_jwt, AuthUser, SESSION_COOKIE};
use crate::models::user::normalize_email;
use crate::models::{Credentials, Role, User};
use crate::services::{email, password, verification};
use crate::time_utils::now_rfc3339;
use crate::AppState;

/// Minimum time between two verification emails for one user.
const RESEND_COOLDOWN: Duration = Duration::from_secs(60);

/// Public authentication routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/verify-email", post(verify_email))
}

/// Account routes that need a session.
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn protected_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/me", get(get_me))
        .route("/api/auth/resend-verification", post(resend_verification))
        .route("/api/admin/bootstrap", post(bootstrap_admin))
}

// ─── Session helpers ─────────────────────────────────────────

/// Session response: the token is also set as an HttpOnly cookie.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

fn session_cookie(token: String) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::days(30))
        .build()
}

fn start_session(jar: CookieJar, user: User, signing_key: &[u8]) -> Result<(CookieJar, Json<AuthResponse>)> {
    let token = create_jwt(&user.uid, &user.email, user.role, signing_key)?;
    let jar = jar.add(session_cookie(token.clone()));
    Ok((jar, Json(AuthResponse { token, user })))
}

fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}

async fn send_verification(state: &AppState, user: &User) {
    let Some(token) = verification::create_token(&user.uid, &state.config.email_token_key, unix_now())
    else {
        tracing::warn!(uid = %user.uid, "Could not sign verification token");
        return;
    };
    let link = format!(
        "{}/verify-email?token={}",
        state.config.frontend_url.trim_end_matches('/'),
        token
    );
    state
        .mailer
        .send_best_effort(email::verification_email(&user.email, &user.display_name, &link))
        .await;
}

async fn hash_blocking(raw: String) -> Result<String> {
    tokio::task::spawn_blocking(move || password::hash_password(&raw))
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Hashing task failed: {}", e)))?
}

async fn verify_blocking(raw: String, hash: String) -> Result<bool> {
    tokio::task::spawn_blocking(move || password::verify_password(&raw, &hash))
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Verification task failed: {}", e)))
}

// ─── Registration & Login ────────────────────────────────────

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
    #[validate(length(min = 1, max = 100))]
    pub display_name: String,
}

async fn register(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    ValidatedJson(req): ValidatedJson<RegisterRequest>,
) -> Result<(CookieJar, Json<AuthResponse>)> {
    let now = now_rfc3339();
    let user = User {
        uid: uuid::Uuid::new_v4().to_string(),
        email: normalize_email(&req.email),
        display_name: req.display_name.trim().to_string(),
        role: Role::Korisnik,
        blocked: false,
        email_verified: false,
        created_at: now.clone(),
        last_login: Some(now.clone()),
    };
    let credentials = Credentials {
        password_hash: hash_blocking(req.password).await?,
        updated_at: now,
    };

    state.db.create_account(&user, &credentials).await?;
    tracing::info!(uid = %user.uid, "User registered");

    send_verification(&state, &user).await;

    start_session(jar, user, &state.config.jwt_signing_key)
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, max = 128))]
    pub password: String,
}

async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> Result<(CookieJar, Json<AuthResponse>)> {
    let mut user = state
        .db
        .find_user_by_email(&req.email)
        .await?
        .ok_or(AppError::Unauthenticated)?;

    let credentials = state
        .db
        .get_credentials(&user.uid)
        .await?
        .ok_or(AppError::Unauthenticated)?;

    if !verify_blocking(req.password, credentials.password_hash).await? {
        tracing::info!(uid = %user.uid, "Login failed: wrong password");
        return Err(AppError::Unauthenticated);
    }

    if user.blocked {
        return Err(AppError::PermissionDenied("Account is blocked".to_string()));
    }

    user.last_login = Some(now_rfc3339());
    state.db.upsert_user(&user).await?;
    tracing::info!(uid = %user.uid, "User logged in");

    start_session(jar, user, &state.config.jwt_signing_key)
}

/// Clear the session cookie.
async fn logout(jar: CookieJar) -> (CookieJar, StatusCode) {
    (
        jar.remove(Cookie::build(SESSION_COOKIE).path("/")),
        StatusCode::NO_CONTENT,
    )
}

// ─── Email Verification ──────────────────────────────────────

#[derive(Debug, Deserialize, Validate)]
pub struct VerifyEmailRequest {
    #[validate(length(min = 1, max = 1024))]
    pub token: String,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct VerifyEmailResponse {
    pub email_verified: bool,
}

async fn verify_email(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<VerifyEmailRequest>,
) -> Result<Json<VerifyEmailResponse>> {
    let uid = verification::verify_token(&req.token, &state.config.email_token_key, unix_now())
        .ok_or_else(|| {
            AppError::InvalidArgument("Invalid or expired verification link".to_string())
        })?;

    let mut user = state
        .db
        .get_user(&uid)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", uid)))?;

    if !user.email_verified {
        user.email_verified = true;
        state.db.upsert_user(&user).await?;
        tracing::info!(uid = %uid, "Email verified");
    }

    Ok(Json(VerifyEmailResponse {
        email_verified: true,
    }))
}

async fn resend_verification(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<StatusCode> {
    let user = state.db.get_active_user(&auth.uid).await?;
    if user.email_verified {
        return Err(AppError::FailedPrecondition(
            "Email is already verified".to_string(),
        ));
    }

    check_resend_cooldown(&state, &user.uid)?;
    send_verification(&state, &user).await;
    tracing::info!(uid = %user.uid, "Verification email resent");

    Ok(StatusCode::NO_CONTENT)
}

/// Record a resend for `uid`, refusing if the previous one is too recent.
fn check_resend_cooldown(state: &AppState, uid: &str) -> Result<()> {
    let now = Instant::now();
    match state.resend_cooldowns.entry(uid.to_string()) {
        Entry::Occupied(mut last) => {
            let elapsed = now.duration_since(*last.get());
            if elapsed < RESEND_COOLDOWN {
                let wait = (RESEND_COOLDOWN - elapsed).as_secs().max(1);
                return Err(AppError::ResourceExhausted(format!(
                    "Please wait {} seconds before requesting another email",
                    wait
                )));
            }
            last.insert(now);
        }
        Entry::Vacant(slot) => {
            slot.insert(now);
        }
    }
    Ok(())
}

// ─── Profile & Admin Bootstrap ───────────────────────────────

/// Current user profile.
async fn get_me(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<User>> {
    let user = state
        .db
        .get_user(&auth.uid)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", auth.uid)))?;
    Ok(Json(user))
}

/// Promote the caller to admin if their email is on the bootstrap list.
async fn bootstrap_admin(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<AuthResponse>)> {
    if !state.config.is_bootstrap_admin(&auth.email) {
        tracing::warn!(uid = %auth.uid, "Admin bootstrap refused");
        return Err(AppError::PermissionDenied(
            "Email is not on the admin list".to_string(),
        ));
    }

    let mut user = state.db.get_active_user(&auth.uid).await?;

    if user.role != Role::Admin {
        user.role = Role::Admin;
        state.db.upsert_user(&user).await?;
        tracing::info!(uid = %user.uid, "Admin role bootstrapped");
    }

    start_session(jar, user, &state.config.jwt_signing_key)
}
