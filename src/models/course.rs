// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Course catalog models: courses, modules, lessons and access grants.

use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "lowercase")]
pub enum CourseStatus {
    #[default]
    Draft,
    Active,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "lowercase")]
pub enum CourseType {
    /// Recorded video lessons
    #[default]
    Video,
    /// Live online classes
    Live,
}

/// Course document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Course {
    /// Course ID (also used as document ID)
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Price in whole dinars (RSD)
    pub price: u32,
    #[serde(default)]
    pub status: CourseStatus,
    #[serde(default)]
    pub course_type: CourseType,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Course {
    pub fn is_active(&self) -> bool {
        self.status == CourseStatus::Active
    }
}

/// A module groups lessons inside a course.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Module {
    pub id: String,
    pub course_id: String,
    pub title: String,
    /// Position within the course (ascending)
    pub order: u32,
    pub created_at: String,
}

/// Downloadable lesson material.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Material {
    pub name: String,
    pub url: String,
}

/// Lesson document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Lesson {
    pub id: String,
    pub module_id: String,
    /// Denormalized for access checks without a module read
    pub course_id: String,
    pub title: String,
    pub order: u32,
    /// Object key in R2 (`videos/...`)
    #[serde(default)]
    pub video_path: Option<String>,
    /// External video URL, used when the video is not hosted in R2
    #[serde(default)]
    pub video_url: Option<String>,
    #[serde(default)]
    pub duration_seconds: Option<u32>,
    #[serde(default)]
    pub materials: Vec<Material>,
    /// Watchable without buying the course
    #[serde(default)]
    pub free_preview: bool,
    pub created_at: String,
}

/// Course access grant (`user_courses/{uid}_{course_id}`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct UserCourse {
    pub uid: String,
    pub course_id: String,
    /// Transaction that paid for the course (None for manual grants)
    #[serde(default)]
    pub transaction_id: Option<String>,
    pub granted_at: String,
}

impl UserCourse {
    pub fn doc_id(uid: &str, course_id: &str) -> String {
        format!("{}_{}", uid, course_id)
    }
}
