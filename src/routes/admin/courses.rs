// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Course, module, lesson and video administration.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::error::{AppError, Result};
use crate::models::{Course, CourseStatus, CourseType, Lesson, Material, Module};
use crate::routes::validated::ValidatedJson;
use crate::services::storage::{self, SIGNED_URL_TTL};
use crate::time_utils::now_rfc3339;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/admin/courses", get(list_courses).post(create_course))
        .route(
            "/api/admin/courses/{id}",
            get(get_course).put(update_course).delete(delete_course),
        )
        .route("/api/admin/courses/{id}/modules", post(create_module))
        .route(
            "/api/admin/modules/{id}",
            put(update_module).delete(delete_module),
        )
        .route("/api/admin/modules/{id}/lessons", post(create_lesson))
        .route(
            "/api/admin/lessons/{id}",
            put(update_lesson).delete(delete_lesson),
        )
        .route("/api/admin/videos/upload-url", post(create_upload_url))
        .route("/api/admin/videos", axum::routing::delete(delete_video))
}

// ─── Courses ─────────────────────────────────────────────────

#[derive(Debug, Deserialize, Validate)]
pub struct CourseInput {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[serde(default)]
    #[validate(length(max = 5000))]
    pub description: String,
    #[validate(range(max = 10_000_000))]
    pub price: u32,
    #[serde(default)]
    pub status: CourseStatus,
    #[serde(default)]
    pub course_type: CourseType,
    #[validate(url)]
    pub thumbnail_url: Option<String>,
}

/// Full course tree for the editor, including video locations.
#[derive(Debug, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct AdminCourseDetail {
    pub course: Course,
    pub modules: Vec<Module>,
    pub lessons: Vec<Lesson>,
}

async fn list_courses(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Course>>> {
    Ok(Json(state.db.list_courses(None).await?))
}

async fn load_course(state: &AppState, id: &str) -> Result<Course> {
    state
        .db
        .get_course(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Course {} not found", id)))
}

async fn get_course(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<AdminCourseDetail>> {
    let course = load_course(&state, &id).await?;
    let modules = state.db.list_modules(&id).await?;
    let mut lessons = state.db.list_lessons_for_course(&id).await?;
    lessons.sort_by(|a, b| (&a.module_id, a.order).cmp(&(&b.module_id, b.order)));

    Ok(Json(AdminCourseDetail {
        course,
        modules,
        lessons,
    }))
}

async fn create_course(
    State(state): State<Arc<AppState>>,
    ValidatedJson(input): ValidatedJson<CourseInput>,
) -> Result<(StatusCode, Json<Course>)> {
    let now = now_rfc3339();
    let course = Course {
        id: uuid::Uuid::new_v4().to_string(),
        title: input.title,
        description: input.description,
        price: input.price,
        status: input.status,
        course_type: input.course_type,
        thumbnail_url: input.thumbnail_url,
        created_at: now.clone(),
        updated_at: now,
    };
    state.db.upsert_course(&course).await?;
    tracing::info!(course_id = %course.id, "Course created");
    Ok((StatusCode::CREATED, Json(course)))
}

async fn update_course(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    ValidatedJson(input): ValidatedJson<CourseInput>,
) -> Result<Json<Course>> {
    let mut course = load_course(&state, &id).await?;
    course.title = input.title;
    course.description = input.description;
    course.price = input.price;
    course.status = input.status;
    course.course_type = input.course_type;
    course.thumbnail_url = input.thumbnail_url;
    course.updated_at = now_rfc3339();

    state.db.upsert_course(&course).await?;
    tracing::info!(course_id = %id, "Course updated");
    Ok(Json(course))
}

async fn delete_course(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    load_course(&state, &id).await?;
    let video_paths = state.db.delete_course_tree(&id).await?;
    state.storage.delete_best_effort(&video_paths).await;
    Ok(StatusCode::NO_CONTENT)
}

// ─── Modules ─────────────────────────────────────────────────

#[derive(Debug, Deserialize, Validate)]
pub struct ModuleInput {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[serde(default)]
    pub order: u32,
}

async fn create_module(
    State(state): State<Arc<AppState>>,
    Path(course_id): Path<String>,
    ValidatedJson(input): ValidatedJson<ModuleInput>,
) -> Result<(StatusCode, Json<Module>)> {
    load_course(&state, &course_id).await?;

    let module = Module {
        id: uuid::Uuid::new_v4().to_string(),
        course_id,
        title: input.title,
        order: input.order,
        created_at: now_rfc3339(),
    };
    state.db.upsert_module(&module).await?;
    tracing::info!(module_id = %module.id, course_id = %module.course_id, "Module created");
    Ok((StatusCode::CREATED, Json(module)))
}

async fn load_module(state: &AppState, id: &str) -> Result<Module> {
    state
        .db
        .get_module(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Module {} not found", id)))
}

async fn update_module(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    ValidatedJson(input): ValidatedJson<ModuleInput>,
) -> Result<Json<Module>> {
    let mut module = load_module(&state, &id).await?;
    module.title = input.title;
    module.order = input.order;
    state.db.upsert_module(&module).await?;
    Ok(Json(module))
}

async fn delete_module(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    load_module(&state, &id).await?;
    let video_paths = state.db.delete_module(&id).await?;
    state.storage.delete_best_effort(&video_paths).await;
    Ok(StatusCode::NO_CONTENT)
}

// ─── Lessons ─────────────────────────────────────────────────

#[derive(Debug, Deserialize, Validate)]
pub struct LessonInput {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[serde(default)]
    pub order: u32,
    /// Object key returned by the upload-url endpoint
    pub video_path: Option<String>,
    #[validate(url)]
    pub video_url: Option<String>,
    pub duration_seconds: Option<u32>,
    #[serde(default)]
    #[validate(length(max = 50))]
    pub materials: Vec<Material>,
    #[serde(default)]
    pub free_preview: bool,
}

impl LessonInput {
    fn check_video_path(&self) -> Result<()> {
        match &self.video_path {
            Some(path) => storage::validate_video_key(path),
            None => Ok(()),
        }
    }
}

async fn create_lesson(
    State(state): State<Arc<AppState>>,
    Path(module_id): Path<String>,
    ValidatedJson(input): ValidatedJson<LessonInput>,
) -> Result<(StatusCode, Json<Lesson>)> {
    input.check_video_path()?;
    let module = load_module(&state, &module_id).await?;

    let lesson = Lesson {
        id: uuid::Uuid::new_v4().to_string(),
        module_id: module.id,
        course_id: module.course_id,
        title: input.title,
        order: input.order,
        video_path: input.video_path,
        video_url: input.video_url,
        duration_seconds: input.duration_seconds,
        materials: input.materials,
        free_preview: input.free_preview,
        created_at: now_rfc3339(),
    };
    state.db.upsert_lesson(&lesson).await?;
    tracing::info!(lesson_id = %lesson.id, module_id = %lesson.module_id, "Lesson created");
    Ok((StatusCode::CREATED, Json(lesson)))
}

async fn load_lesson(state: &AppState, id: &str) -> Result<Lesson> {
    state
        .db
        .get_lesson(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Lesson {} not found", id)))
}

/// Update a lesson. A replaced R2 video is deleted best-effort.
async fn update_lesson(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    ValidatedJson(input): ValidatedJson<LessonInput>,
) -> Result<Json<Lesson>> {
    input.check_video_path()?;
    let mut lesson = load_lesson(&state, &id).await?;

    let replaced_video = match (&lesson.video_path, &input.video_path) {
        (Some(old), new) if new.as_ref() != Some(old) => Some(old.clone()),
        _ => None,
    };

    lesson.title = input.title;
    lesson.order = input.order;
    lesson.video_path = input.video_path;
    lesson.video_url = input.video_url;
    lesson.duration_seconds = input.duration_seconds;
    lesson.materials = input.materials;
    lesson.free_preview = input.free_preview;
    state.db.upsert_lesson(&lesson).await?;
    tracing::info!(lesson_id = %id, "Lesson updated");

    if let Some(old) = replaced_video {
        state.storage.delete_best_effort(&[old]).await;
    }
    Ok(Json(lesson))
}

async fn delete_lesson(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    let lesson = load_lesson(&state, &id).await?;
    state.db.delete_lesson(&id).await?;
    tracing::info!(lesson_id = %id, "Lesson deleted");

    if let Some(path) = lesson.video_path {
        state.storage.delete_best_effort(&[path]).await;
    }
    Ok(StatusCode::NO_CONTENT)
}

// ─── Videos ──────────────────────────────────────────────────

#[derive(Debug, Deserialize, Validate)]
pub struct UploadUrlRequest {
    #[validate(length(min = 1))]
    pub lesson_id: String,
    #[validate(length(min = 1, max = 255))]
    pub file_name: String,
    #[validate(length(min = 1, max = 100))]
    pub content_type: String,
}

#[derive(Debug, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct UploadUrlResponse {
    /// Presigned PUT URL; the upload must send the same Content-Type
    pub upload_url: String,
    /// Object key to store on the lesson once the upload finishes
    pub video_path: String,
    pub expires_in: u64,
}

async fn create_upload_url(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<UploadUrlRequest>,
) -> Result<Json<UploadUrlResponse>> {
    // Reject bad files before touching the database
    storage::video_key("_", "_", &req.file_name, &req.content_type)?;

    let lesson = load_lesson(&state, &req.lesson_id).await?;
    let video_path = storage::video_key(
        &lesson.course_id,
        &lesson.id,
        &req.file_name,
        &req.content_type,
    )?;
    let upload_url = state
        .storage
        .upload_url(&video_path, &req.content_type)
        .await?;

    tracing::info!(lesson_id = %lesson.id, video_path = %video_path, "Upload URL issued");
    Ok(Json(UploadUrlResponse {
        upload_url,
        video_path,
        expires_in: SIGNED_URL_TTL.as_secs(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct DeleteVideoRequest {
    pub video_path: String,
}

async fn delete_video(
    State(state): State<Arc<AppState>>,
    Json(req): Json<DeleteVideoRequest>,
) -> Result<StatusCode> {
    state.storage.delete(&req.video_path).await?;
    Ok(StatusCode::NO_CONTENT)
}
