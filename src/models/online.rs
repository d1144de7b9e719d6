// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Live online-class models: packages, enrollments, groups and sessions.

use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// A purchasable bundle of live classes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct OnlinePackage {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Number of class credits granted on purchase
    pub class_count: u32,
    /// Price in whole dinars
    pub price: u32,
    #[serde(default)]
    pub active: bool,
    /// Display position (ascending)
    #[serde(default)]
    pub order: u32,
    pub created_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "lowercase")]
pub enum EnrollmentStatus {
    #[default]
    Active,
    /// All credits used
    Completed,
    Cancelled,
}

/// A user's purchased class package and its credit balance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Enrollment {
    pub id: String,
    pub user_id: String,
    pub user_email: String,
    pub package_id: String,
    pub package_name: String,
    pub total_classes: u32,
    pub remaining_classes: u32,
    pub used_classes: u32,
    /// Group the student attends (None until assigned)
    #[serde(default)]
    pub group_id: Option<String>,
    #[serde(default)]
    pub status: EnrollmentStatus,
    /// Transaction that paid for the package
    #[serde(default)]
    pub transaction_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Enrollment {
    pub fn is_active(&self) -> bool {
        self.status == EnrollmentStatus::Active
    }

    /// Spend one class credit.
    ///
    /// Returns `false` and leaves the enrollment untouched when it has no
    /// credits left or is not active. The enrollment becomes `completed`
    /// when its last credit is used.
    pub fn consume_class(&mut self, now: &str) -> bool {
        if !self.is_active() || self.remaining_classes == 0 {
            return false;
        }

        self.remaining_classes -= 1;
        self.used_classes += 1;
        if self.remaining_classes == 0 {
            self.status = EnrollmentStatus::Completed;
        }
        self.updated_at = now.to_string();
        true
    }

    /// Manual balance correction by an admin.
    ///
    /// `total_classes` follows so that `used + remaining == total` keeps
    /// holding. A completed enrollment that gets credits back is reactivated.
    pub fn set_remaining(&mut self, remaining: u32, now: &str) {
        self.remaining_classes = remaining;
        self.total_classes = self.used_classes + remaining;
        if remaining > 0 && self.status == EnrollmentStatus::Completed {
            self.status = EnrollmentStatus::Active;
        } else if remaining == 0 && self.status == EnrollmentStatus::Active {
            self.status = EnrollmentStatus::Completed;
        }
        self.updated_at = now.to_string();
    }
}

/// Weekly time slot of a group. Times are Belgrade wall-clock.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct GroupSchedule {
    /// 0 = Sunday ... 6 = Saturday
    pub day_of_week: u8,
    /// Start time `HH:MM`
    pub time: String,
    pub duration_minutes: u32,
}

/// A cohort of enrollments sharing a weekly slot and teacher.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Group {
    pub id: String,
    pub name: String,
    pub teacher_name: String,
    pub schedule: GroupSchedule,
    pub max_students: u32,
    #[serde(default)]
    pub meeting_url: Option<String>,
    #[serde(default)]
    pub active: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    #[default]
    Scheduled,
    Ongoing,
    Completed,
    Cancelled,
}

impl SessionStatus {
    /// Allowed session status changes. `completed` and `cancelled` are final.
    pub fn can_transition_to(self, next: SessionStatus) -> bool {
        use SessionStatus::*;
        matches!(
            (self, next),
            (Scheduled, Ongoing)
                | (Scheduled, Completed)
                | (Ongoing, Completed)
                | (Scheduled, Cancelled)
                | (Ongoing, Cancelled)
        )
    }

    pub fn is_final(self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Scheduled => "scheduled",
            SessionStatus::Ongoing => "ongoing",
            SessionStatus::Completed => "completed",
            SessionStatus::Cancelled => "cancelled",
        }
    }
}

/// One dated occurrence of a group's class (`online_sessions/{group_id}_{date}`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Session {
    pub id: String,
    pub group_id: String,
    /// `YYYY-MM-DD`
    pub scheduled_date: String,
    /// `HH:MM`
    pub start_time: String,
    pub duration_minutes: u32,
    #[serde(default)]
    pub status: SessionStatus,
    #[serde(default)]
    pub topic: Option<String>,
    /// Set once the completion charge has been applied
    #[serde(default)]
    pub credits_deducted: bool,
    /// Enrollments charged for this session
    #[serde(default)]
    pub charged_enrollment_ids: Vec<String>,
    #[serde(default)]
    pub completed_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Session {
    pub fn doc_id(group_id: &str, date: &str) -> String {
        format!("{}_{}", group_id, date)
    }
}
