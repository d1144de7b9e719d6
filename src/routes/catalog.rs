// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Public course catalog.

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::db::FirestoreDb;
use crate::error::{AppError, Result};
use crate::models::{Course, CourseStatus, Lesson, Module};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/catalog/courses", get(list_courses))
        .route("/api/catalog/courses/{id}", get(get_course))
}

/// Lesson as shown in a course outline. Video locations are never included.
#[derive(Debug, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct LessonSummary {
    pub id: String,
    pub title: String,
    pub order: u32,
    pub duration_seconds: Option<u32>,
    pub free_preview: bool,
    pub has_video: bool,
}

impl From<&Lesson> for LessonSummary {
    fn from(lesson: &Lesson) -> Self {
        Self {
            id: lesson.id.clone(),
            title: lesson.title.clone(),
            order: lesson.order,
            duration_seconds: lesson.duration_seconds,
            free_preview: lesson.free_preview,
            has_video: lesson.video_path.is_some() || lesson.video_url.is_some(),
        }
    }
}

#[derive(Debug, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ModuleOutline {
    pub id: String,
    pub title: String,
    pub order: u32,
    pub lessons: Vec<LessonSummary>,
}

#[derive(Debug, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct CourseOutline {
    pub course: Course,
    pub modules: Vec<ModuleOutline>,
}

/// Group lessons under their modules, both in display order.
pub(crate) fn build_outline(course: Course, modules: Vec<Module>, lessons: &[Lesson]) -> CourseOutline {
    let modules = modules
        .into_iter()
        .map(|module| {
            let mut module_lessons: Vec<&Lesson> =
                lessons.iter().filter(|l| l.module_id == module.id).collect();
            module_lessons.sort_by_key(|l| l.order);
            ModuleOutline {
                lessons: module_lessons.into_iter().map(LessonSummary::from).collect(),
                id: module.id,
                title: module.title,
                order: module.order,
            }
        })
        .collect();

    CourseOutline { course, modules }
}

pub(crate) async fn load_outline(db: &FirestoreDb, course: Course) -> Result<CourseOutline> {
    let modules = db.list_modules(&course.id).await?;
    let lessons = db.list_lessons_for_course(&course.id).await?;
    Ok(build_outline(course, modules, &lessons))
}

async fn list_courses(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Course>>> {
    let courses = state.db.list_courses(Some(CourseStatus::Active)).await?;
    Ok(Json(courses))
}

/// Active course with its outline. Drafts look like missing courses.
async fn get_course(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<CourseOutline>> {
    let course = state
        .db
        .get_course(&id)
        .await?
        .filter(Course::is_active)
        .ok_or_else(|| AppError::NotFound(format!("Course {} not found", id)))?;

    Ok(Json(load_outline(&state.db, course).await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CourseType;

    fn lesson(id: &str, module_id: &str, order: u32) -> Lesson {
        Lesson {
            id: id.to_string(),
            module_id: module_id.to_string(),
            course_id: "c1".to_string(),
            title: format!("Lekcija {}", id),
            order,
            video_path: Some(format!("videos/c1/{}/a.mp4", id)),
            video_url: None,
            duration_seconds: Some(600),
            materials: vec![],
            free_preview: false,
            created_at: "2025-01-01T00:00:00Z".to_string(),
        }
    }

    fn module(id: &str, order: u32) -> Module {
        Module {
            id: id.to_string(),
            course_id: "c1".to_string(),
            title: format!("Modul {}", id),
            order,
            created_at: "2025-01-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn test_outline_groups_and_orders_lessons() {
        let course = Course {
            id: "c1".to_string(),
            title: "Srpski A1".to_string(),
            description: String::new(),
            price: 4500,
            status: CourseStatus::Active,
            course_type: CourseType::Video,
            thumbnail_url: None,
            created_at: "2025-01-01T00:00:00Z".to_string(),
            updated_at: "2025-01-01T00:00:00Z".to_string(),
        };
        let lessons = vec![lesson("l2", "m1", 2), lesson("l1", "m1", 1), lesson("l3", "m2", 1)];

        let outline = build_outline(course, vec![module("m1", 1), module("m2", 2)], &lessons);

        assert_eq!(outline.modules.len(), 2);
        let ids: Vec<&str> = outline.modules[0].lessons.iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids, vec!["l1", "l2"]);
        assert!(outline.modules[1].lessons[0].has_video);

        // Outline JSON must not leak storage keys
        let json = serde_json::to_string(&outline).unwrap();
        assert!(!json.contains("videos/"));
    }
}
