// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Online-class administration: packages, enrollments, groups,
//! participants and sessions.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::error::{AppError, Result};
use crate::models::{
    Enrollment, EnrollmentStatus, Group, GroupSchedule, OnlinePackage, Session, SessionStatus,
};
use crate::routes::validated::ValidatedJson;
use crate::services::classes::{self, EnrollmentChange, MAX_GENERATED_WEEKS, MAX_GROUP_SIZE};
use crate::time_utils::{format_date, now_rfc3339, parse_date};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        // Packages
        .route(
            "/api/admin/online/packages",
            get(list_packages).post(create_package),
        )
        .route("/api/admin/online/packages/{id}", put(update_package))
        // Enrollments
        .route("/api/admin/online/enrollments", get(list_enrollments))
        .route(
            "/api/admin/online/enrollments/{id}/credits",
            put(set_credits),
        )
        .route(
            "/api/admin/online/enrollments/{id}/status",
            put(set_enrollment_status),
        )
        // Groups
        .route(
            "/api/admin/online/groups",
            get(list_groups).post(create_group),
        )
        .route(
            "/api/admin/online/groups/{id}",
            put(update_group).delete(delete_group),
        )
        .route(
            "/api/admin/online/groups/{id}/participants",
            post(add_participant),
        )
        .route(
            "/api/admin/online/groups/{id}/participants/{enrollment_id}",
            delete(remove_participant),
        )
        // Sessions
        .route(
            "/api/admin/online/groups/{id}/sessions",
            get(list_group_sessions),
        )
        .route(
            "/api/admin/online/groups/{id}/sessions/generate",
            post(generate_sessions),
        )
        .route("/api/admin/online/sessions", post(create_session))
        .route("/api/admin/online/sessions/{id}", delete(delete_session))
        .route(
            "/api/admin/online/sessions/{id}/status",
            put(set_session_status),
        )
}

// ─── Packages ────────────────────────────────────────────────

#[derive(Debug, Deserialize, Validate)]
pub struct PackageInput {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[serde(default)]
    #[validate(length(max = 2000))]
    pub description: String,
    #[validate(range(min = 1, max = 200))]
    pub class_count: u32,
    #[validate(range(max = 10_000_000))]
    pub price: u32,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub order: u32,
}

async fn list_packages(State(state): State<Arc<AppState>>) -> Result<Json<Vec<OnlinePackage>>> {
    Ok(Json(state.db.list_packages(false).await?))
}

async fn create_package(
    State(state): State<Arc<AppState>>,
    ValidatedJson(input): ValidatedJson<PackageInput>,
) -> Result<(StatusCode, Json<OnlinePackage>)> {
    let package = OnlinePackage {
        id: uuid::Uuid::new_v4().to_string(),
        name: input.name,
        description: input.description,
        class_count: input.class_count,
        price: input.price,
        active: input.active,
        order: input.order,
        created_at: now_rfc3339(),
    };
    state.db.upsert_package(&package).await?;
    tracing::info!(package_id = %package.id, "Online package created");
    Ok((StatusCode::CREATED, Json(package)))
}

/// Update a package. Existing enrollments keep the credits they bought.
async fn update_package(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    ValidatedJson(input): ValidatedJson<PackageInput>,
) -> Result<Json<OnlinePackage>> {
    let mut package = state
        .db
        .get_package(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Package {} not found", id)))?;

    package.name = input.name;
    package.description = input.description;
    package.class_count = input.class_count;
    package.price = input.price;
    package.active = input.active;
    package.order = input.order;
    state.db.upsert_package(&package).await?;
    tracing::info!(package_id = %id, "Online package updated");
    Ok(Json(package))
}

// ─── Enrollments ─────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct EnrollmentsQuery {
    group_id: Option<String>,
}

async fn list_enrollments(
    State(state): State<Arc<AppState>>,
    Query(query): Query<EnrollmentsQuery>,
) -> Result<Json<Vec<Enrollment>>> {
    Ok(Json(
        state
            .db
            .list_enrollments(query.group_id.as_deref())
            .await?,
    ))
}

#[derive(Debug, Deserialize, Validate)]
pub struct SetCreditsRequest {
    #[validate(range(max = 500))]
    pub remaining_classes: u32,
}

/// Manual credit correction.
async fn set_credits(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    ValidatedJson(req): ValidatedJson<SetCreditsRequest>,
) -> Result<Json<Enrollment>> {
    let enrollment = state
        .db
        .change_enrollment(&id, EnrollmentChange::Remaining(req.remaining_classes))
        .await?;
    Ok(Json(enrollment))
}

#[derive(Debug, Deserialize)]
pub struct SetEnrollmentStatusRequest {
    pub status: EnrollmentStatus,
}

async fn set_enrollment_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<SetEnrollmentStatusRequest>,
) -> Result<Json<Enrollment>> {
    let enrollment = state
        .db
        .change_enrollment(&id, EnrollmentChange::Status(req.status))
        .await?;
    Ok(Json(enrollment))
}

// ─── Groups ──────────────────────────────────────────────────

#[derive(Debug, Deserialize, Validate)]
pub struct GroupInput {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(min = 1, max = 200))]
    pub teacher_name: String,
    pub schedule: GroupSchedule,
    #[validate(range(min = 1, max = MAX_GROUP_SIZE))]
    pub max_students: u32,
    #[validate(url)]
    pub meeting_url: Option<String>,
    #[serde(default = "default_true")]
    pub active: bool,
}

fn default_true() -> bool {
    true
}

async fn list_groups(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Group>>> {
    Ok(Json(state.db.list_groups().await?))
}

async fn load_group(state: &AppState, id: &str) -> Result<Group> {
    state
        .db
        .get_group(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Group {} not found", id)))
}

async fn create_group(
    State(state): State<Arc<AppState>>,
    ValidatedJson(input): ValidatedJson<GroupInput>,
) -> Result<(StatusCode, Json<Group>)> {
    classes::validate_schedule(&input.schedule)?;

    let now = now_rfc3339();
    let group = Group {
        id: uuid::Uuid::new_v4().to_string(),
        name: input.name,
        teacher_name: input.teacher_name,
        schedule: input.schedule,
        max_students: input.max_students,
        meeting_url: input.meeting_url,
        active: input.active,
        created_at: now.clone(),
        updated_at: now,
    };
    state.db.upsert_group(&group).await?;
    tracing::info!(group_id = %group.id, "Group created");
    Ok((StatusCode::CREATED, Json(group)))
}

/// Update a group. Already generated sessions keep their time.
async fn update_group(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    ValidatedJson(input): ValidatedJson<GroupInput>,
) -> Result<Json<Group>> {
    classes::validate_schedule(&input.schedule)?;
    let mut group = load_group(&state, &id).await?;

    group.name = input.name;
    group.teacher_name = input.teacher_name;
    group.schedule = input.schedule;
    group.max_students = input.max_students;
    group.meeting_url = input.meeting_url;
    group.active = input.active;
    group.updated_at = now_rfc3339();
    state.db.update_group(&group).await?;
    Ok(Json(group))
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct DeleteGroupResponse {
    pub unassigned_enrollments: usize,
    pub deleted_sessions: usize,
}

async fn delete_group(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<DeleteGroupResponse>> {
    load_group(&state, &id).await?;
    let deletion = state.db.delete_group(&id).await?;
    Ok(Json(DeleteGroupResponse {
        unassigned_enrollments: deletion.unassigned_enrollments,
        deleted_sessions: deletion.deleted_sessions,
    }))
}

// ─── Participants ────────────────────────────────────────────

#[derive(Debug, Deserialize, Validate)]
pub struct AddParticipantRequest {
    #[validate(length(min = 1))]
    pub enrollment_id: String,
}

async fn add_participant(
    State(state): State<Arc<AppState>>,
    Path(group_id): Path<String>,
    ValidatedJson(req): ValidatedJson<AddParticipantRequest>,
) -> Result<Json<Enrollment>> {
    Ok(Json(
        state
            .db
            .add_participant(&group_id, &req.enrollment_id)
            .await?,
    ))
}

async fn remove_participant(
    State(state): State<Arc<AppState>>,
    Path((group_id, enrollment_id)): Path<(String, String)>,
) -> Result<Json<Enrollment>> {
    Ok(Json(
        state
            .db
            .remove_participant(&group_id, &enrollment_id)
            .await?,
    ))
}

// ─── Sessions ────────────────────────────────────────────────

fn new_session(group: &Group, date: &str, topic: Option<String>, now: &str) -> Session {
    Session {
        id: Session::doc_id(&group.id, date),
        group_id: group.id.clone(),
        scheduled_date: date.to_string(),
        start_time: group.schedule.time.clone(),
        duration_minutes: group.schedule.duration_minutes,
        status: SessionStatus::Scheduled,
        topic,
        credits_deducted: false,
        charged_enrollment_ids: Vec::new(),
        completed_at: None,
        created_at: now.to_string(),
        updated_at: now.to_string(),
    }
}

fn parse_date_arg(raw: &str) -> Result<chrono::NaiveDate> {
    parse_date(raw)
        .ok_or_else(|| AppError::InvalidArgument(format!("Invalid date '{}', expected YYYY-MM-DD", raw)))
}

async fn list_group_sessions(
    State(state): State<Arc<AppState>>,
    Path(group_id): Path<String>,
) -> Result<Json<Vec<Session>>> {
    Ok(Json(state.db.list_sessions_for_group(&group_id).await?))
}

#[derive(Debug, Deserialize, Validate)]
pub struct GenerateSessionsRequest {
    /// First candidate date, `YYYY-MM-DD`
    pub from: String,
    #[validate(range(min = 1, max = MAX_GENERATED_WEEKS))]
    pub weeks: u32,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct GenerateSessionsResponse {
    pub created: Vec<Session>,
    /// Dates that already had a session
    pub skipped: usize,
}

/// Create one session per week on the group's weekday.
async fn generate_sessions(
    State(state): State<Arc<AppState>>,
    Path(group_id): Path<String>,
    ValidatedJson(req): ValidatedJson<GenerateSessionsRequest>,
) -> Result<Json<GenerateSessionsResponse>> {
    let from = parse_date_arg(&req.from)?;
    let group = load_group(&state, &group_id).await?;

    let now = now_rfc3339();
    let sessions: Vec<Session> = classes::weekly_dates(group.schedule.day_of_week, from, req.weeks)
        .into_iter()
        .map(|date| new_session(&group, &format_date(date), None, &now))
        .collect();
    let requested = sessions.len();

    let created = state.db.create_sessions(sessions).await?;
    tracing::info!(
        group_id = %group_id,
        created = created.len(),
        requested,
        "Sessions generated"
    );

    Ok(Json(GenerateSessionsResponse {
        skipped: requested - created.len(),
        created,
    }))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateSessionRequest {
    #[validate(length(min = 1))]
    pub group_id: String,
    pub scheduled_date: String,
    #[validate(length(max = 500))]
    pub topic: Option<String>,
}

async fn create_session(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<CreateSessionRequest>,
) -> Result<(StatusCode, Json<Session>)> {
    let date = parse_date_arg(&req.scheduled_date)?;
    let group = load_group(&state, &req.group_id).await?;

    let session = new_session(&group, &format_date(date), req.topic, &now_rfc3339());
    let session_id = session.id.clone();
    let created = state.db.create_sessions(vec![session]).await?;

    let session = created.into_iter().next().ok_or_else(|| {
        AppError::AlreadyExists(format!("Session {} already exists", session_id))
    })?;
    Ok((StatusCode::CREATED, Json(session)))
}

async fn delete_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    let session = state
        .db
        .get_session(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Session {} not found", id)))?;

    if session.status == SessionStatus::Completed {
        return Err(AppError::FailedPrecondition(
            "Completed sessions cannot be deleted".to_string(),
        ));
    }

    state.db.delete_session(&id).await?;
    tracing::info!(session_id = %id, "Session deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct SetSessionStatusRequest {
    pub status: SessionStatus,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SessionStatusResponse {
    pub session: Session,
    /// Enrollments charged one class (completion only)
    pub charged_enrollment_ids: Vec<String>,
    /// Group members with no credits left (completion only)
    pub skipped_enrollment_ids: Vec<String>,
    /// The session was already completed; nothing was charged
    pub already_completed: bool,
}

/// Change a session's status. Completing it charges the group's students.
async fn set_session_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<SetSessionStatusRequest>,
) -> Result<Json<SessionStatusResponse>> {
    if req.status == SessionStatus::Completed {
        let completion = state.db.complete_session(&id).await?;
        return Ok(Json(SessionStatusResponse {
            session: completion.session,
            charged_enrollment_ids: completion.charged_ids,
            skipped_enrollment_ids: completion.skipped_ids,
            already_completed: completion.already_completed,
        }));
    }

    let session = state.db.set_session_status(&id, req.status).await?;
    Ok(Json(SessionStatusResponse {
        session,
        charged_enrollment_ids: Vec::new(),
        skipped_enrollment_ids: Vec::new(),
        already_completed: false,
    }))
}
