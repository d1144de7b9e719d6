// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Course catalog operations: courses, modules, lessons and access grants.

use crate::db::collections;
use crate::db::firestore::FirestoreDb;
use crate::error::AppError;
use crate::models::{Course, CourseStatus, Lesson, Module, UserCourse};
use futures_util::{stream, StreamExt};

const MAX_CONCURRENT_DB_OPS: usize = 20;

impl FirestoreDb {
    // ─── Courses ─────────────────────────────────────────────────

    pub async fn get_course(&self, course_id: &str) -> Result<Option<Course>, AppError> {
        self.get_doc(collections::COURSES, course_id).await
    }

    pub async fn upsert_course(&self, course: &Course) -> Result<(), AppError> {
        self.put_doc(collections::COURSES, &course.id, course).await
    }

    /// List courses, optionally only those with the given status.
    pub async fn list_courses(&self, status: Option<CourseStatus>) -> Result<Vec<Course>, AppError> {
        let mut courses: Vec<Course> = match status {
            Some(CourseStatus::Active) => {
                self.query_eq(collections::COURSES, "status", "active").await?
            }
            Some(CourseStatus::Draft) => {
                self.query_eq(collections::COURSES, "status", "draft").await?
            }
            None => self
                .get_client()?
                .fluent()
                .select()
                .from(collections::COURSES)
                .obj()
                .query()
                .await
                .map_err(|e| AppError::Database(e.to_string()))?,
        };

        courses.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(courses)
    }

    /// Delete a course with all its modules and lessons.
    ///
    /// Returns the R2 video paths of the deleted lessons so the caller can
    /// clean up storage. Access grants and transactions are kept as history.
    pub async fn delete_course_tree(&self, course_id: &str) -> Result<Vec<String>, AppError> {
        let lessons = self.list_lessons_for_course(course_id).await?;
        let modules = self.list_modules(course_id).await?;

        let video_paths: Vec<String> = lessons
            .iter()
            .filter_map(|l| l.video_path.clone())
            .collect();

        self.batch_delete(&lessons, collections::LESSONS, |l: &Lesson| l.id.clone())
            .await?;
        self.batch_delete(&modules, collections::MODULES, |m: &Module| m.id.clone())
            .await?;
        self.delete_doc(collections::COURSES, course_id).await?;

        tracing::info!(
            course_id,
            modules = modules.len(),
            lessons = lessons.len(),
            "Course deleted"
        );

        Ok(video_paths)
    }

    // ─── Modules ─────────────────────────────────────────────────

    pub async fn get_module(&self, module_id: &str) -> Result<Option<Module>, AppError> {
        self.get_doc(collections::MODULES, module_id).await
    }

    pub async fn upsert_module(&self, module: &Module) -> Result<(), AppError> {
        self.put_doc(collections::MODULES, &module.id, module).await
    }

    /// Modules of a course in display order.
    pub async fn list_modules(&self, course_id: &str) -> Result<Vec<Module>, AppError> {
        let mut modules: Vec<Module> = self
            .query_eq(collections::MODULES, "course_id", course_id)
            .await?;
        modules.sort_by_key(|m| m.order);
        Ok(modules)
    }

    /// Delete a module and its lessons; returns the lessons' video paths.
    pub async fn delete_module(&self, module_id: &str) -> Result<Vec<String>, AppError> {
        let lessons = self.list_lessons(module_id).await?;
        let video_paths = lessons
            .iter()
            .filter_map(|l| l.video_path.clone())
            .collect();

        self.batch_delete(&lessons, collections::LESSONS, |l: &Lesson| l.id.clone())
            .await?;
        self.delete_doc(collections::MODULES, module_id).await?;

        tracing::info!(module_id, lessons = lessons.len(), "Module deleted");
        Ok(video_paths)
    }

    // ─── Lessons ─────────────────────────────────────────────────

    pub async fn get_lesson(&self, lesson_id: &str) -> Result<Option<Lesson>, AppError> {
        self.get_doc(collections::LESSONS, lesson_id).await
    }

    pub async fn upsert_lesson(&self, lesson: &Lesson) -> Result<(), AppError> {
        self.put_doc(collections::LESSONS, &lesson.id, lesson).await
    }

    pub async fn delete_lesson(&self, lesson_id: &str) -> Result<(), AppError> {
        self.delete_doc(collections::LESSONS, lesson_id).await
    }

    /// Lessons of a module in display order.
    pub async fn list_lessons(&self, module_id: &str) -> Result<Vec<Lesson>, AppError> {
        let mut lessons: Vec<Lesson> = self
            .query_eq(collections::LESSONS, "module_id", module_id)
            .await?;
        lessons.sort_by_key(|l| l.order);
        Ok(lessons)
    }

    pub async fn list_lessons_for_course(&self, course_id: &str) -> Result<Vec<Lesson>, AppError> {
        self.query_eq(collections::LESSONS, "course_id", course_id)
            .await
    }

    // ─── Access Grants ───────────────────────────────────────────

    pub async fn has_course_access(&self, uid: &str, course_id: &str) -> Result<bool, AppError> {
        let grant: Option<UserCourse> = self
            .get_doc(collections::USER_COURSES, &UserCourse::doc_id(uid, course_id))
            .await?;
        Ok(grant.is_some())
    }

    /// Courses the user has access to.
    ///
    /// Course documents are fetched concurrently with a limit to avoid
    /// overloading Firestore. Grants whose course was deleted are skipped.
    pub async fn list_user_courses(&self, uid: &str) -> Result<Vec<Course>, AppError> {
        let grants: Vec<UserCourse> = self
            .query_eq(collections::USER_COURSES, "uid", uid)
            .await?;

        let courses = stream::iter(grants)
            .map(|grant| async move { self.get_course(&grant.course_id).await })
            .buffer_unordered(MAX_CONCURRENT_DB_OPS)
            .collect::<Vec<Result<Option<Course>, AppError>>>()
            .await
            .into_iter()
            .collect::<Result<Vec<Option<Course>>, AppError>>()?;

        let mut courses: Vec<Course> = courses.into_iter().flatten().collect();
        courses.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(courses)
    }
}
