// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Online-class rules: weekly schedule expansion, group seats, admin
//! enrollment changes and the per-session credit charge.
//!
//! Everything here is pure so the Firestore layer can apply the result
//! inside a transaction.

use chrono::{Datelike, Duration, NaiveDate};

use crate::error::AppError;
use crate::models::{Enrollment, EnrollmentStatus, Group, GroupSchedule};
use crate::time_utils::parse_time_of_day;

pub const MIN_DURATION_MINUTES: u32 = 15;
pub const MAX_DURATION_MINUTES: u32 = 240;
pub const MAX_GROUP_SIZE: u32 = 50;
pub const MAX_GENERATED_WEEKS: u32 = 26;

/// Enrollments affected by completing one session.
#[derive(Debug, Clone, Default)]
pub struct CreditPlan {
    /// Enrollments with one credit moved from remaining to used
    pub charged: Vec<Enrollment>,
    /// Active group members that had no credits left
    pub skipped_ids: Vec<String>,
}

/// Charge one class to every active enrollment of `group_id`.
///
/// Enrollments of other groups and inactive enrollments are ignored;
/// zero-balance enrollments are reported as skipped and left unchanged.
pub fn plan_session_charge(group_id: &str, enrollments: Vec<Enrollment>, now: &str) -> CreditPlan {
    let mut plan = CreditPlan::default();

    for mut enrollment in enrollments {
        if enrollment.group_id.as_deref() != Some(group_id) || !enrollment.is_active() {
            continue;
        }

        if enrollment.consume_class(now) {
            plan.charged.push(enrollment);
        } else {
            plan.skipped_ids.push(enrollment.id);
        }
    }

    plan
}

/// Validate a group's weekly slot.
pub fn validate_schedule(schedule: &GroupSchedule) -> Result<(), AppError> {
    if schedule.day_of_week > 6 {
        return Err(AppError::InvalidArgument(
            "day_of_week must be 0 (Sunday) to 6 (Saturday)".to_string(),
        ));
    }
    if parse_time_of_day(&schedule.time).is_none() {
        return Err(AppError::InvalidArgument(
            "time must be HH:MM (24-hour)".to_string(),
        ));
    }
    if !(MIN_DURATION_MINUTES..=MAX_DURATION_MINUTES).contains(&schedule.duration_minutes) {
        return Err(AppError::InvalidArgument(format!(
            "duration_minutes must be between {} and {}",
            MIN_DURATION_MINUTES, MAX_DURATION_MINUTES
        )));
    }
    Ok(())
}

/// Active members of `group`, not counting `enrollment_id`.
///
/// Fails when seating `enrollment_id` would exceed `max_students`.
pub fn check_free_seat(
    group: &Group,
    members: &[Enrollment],
    enrollment_id: &str,
) -> Result<u32, AppError> {
    let seated = members
        .iter()
        .filter(|e| e.is_active() && e.id != enrollment_id)
        .count() as u32;
    if seated >= group.max_students {
        return Err(AppError::FailedPrecondition(format!(
            "Group is full ({} of {})",
            seated, group.max_students
        )));
    }
    Ok(seated)
}

/// A group may not shrink below its current active membership.
pub fn check_group_size(max_students: u32, members: &[Enrollment]) -> Result<(), AppError> {
    let seated = members.iter().filter(|e| e.is_active()).count() as u32;
    if max_students < seated {
        return Err(AppError::FailedPrecondition(format!(
            "Group has {} active participants; max_students cannot be {}",
            seated, max_students
        )));
    }
    Ok(())
}

/// Admin edit of a single enrollment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrollmentChange {
    /// Manual credit correction
    Remaining(u32),
    Status(EnrollmentStatus),
}

/// Apply an admin change to `enrollment`.
///
/// Returns `true` when the enrollment became active again and so needs a
/// seat in its group.
pub fn apply_enrollment_change(
    enrollment: &mut Enrollment,
    change: EnrollmentChange,
    now: &str,
) -> Result<bool, AppError> {
    let was_active = enrollment.is_active();

    match change {
        EnrollmentChange::Remaining(remaining) => {
            if enrollment.status == EnrollmentStatus::Cancelled {
                return Err(AppError::FailedPrecondition(
                    "Enrollment is cancelled".to_string(),
                ));
            }
            enrollment.set_remaining(remaining, now);
        }
        EnrollmentChange::Status(status) => {
            if status == EnrollmentStatus::Active && enrollment.remaining_classes == 0 {
                return Err(AppError::FailedPrecondition(
                    "Enrollment has no classes left; add credits instead".to_string(),
                ));
            }
            enrollment.status = status;
            enrollment.updated_at = now.to_string();
        }
    }

    Ok(!was_active && enrollment.is_active() && enrollment.group_id.is_some())
}

/// The next `weeks` dates falling on `day_of_week` (0 = Sunday), starting
/// at `from` inclusive.
pub fn weekly_dates(day_of_week: u8, from: NaiveDate, weeks: u32) -> Vec<NaiveDate> {
    let current = from.weekday().num_days_from_sunday() as i64;
    let offset = (day_of_week as i64 - current).rem_euclid(7);
    let first = from + Duration::days(offset);

    (0..weeks as i64)
        .map(|week| first + Duration::weeks(week))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enrollment(id: &str, group: Option<&str>, remaining: u32) -> Enrollment {
        Enrollment {
            id: id.to_string(),
            user_id: format!("user-{}", id),
            user_email: format!("{}@example.com", id),
            package_id: "p8".to_string(),
            package_name: "8 časova".to_string(),
            total_classes: 8,
            remaining_classes: remaining,
            used_classes: 8 - remaining,
            group_id: group.map(str::to_string),
            status: EnrollmentStatus::Active,
            transaction_id: None,
            created_at: "2025-01-01T00:00:00Z".to_string(),
            updated_at: "2025-01-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn test_charge_decrements_each_active_member_once() {
        let enrollments = vec![
            enrollment("a", Some("g1"), 8),
            enrollment("b", Some("g1"), 1),
            enrollment("c", Some("g1"), 0),
            enrollment("d", Some("g2"), 5),
            enrollment("e", None, 5),
        ];

        let plan = plan_session_charge("g1", enrollments, "2025-03-01T18:00:00Z");

        let charged: Vec<(&str, u32, u32)> = plan
            .charged
            .iter()
            .map(|e| (e.id.as_str(), e.remaining_classes, e.used_classes))
            .collect();
        assert_eq!(charged, vec![("a", 7, 1), ("b", 0, 8)]);
        assert_eq!(plan.skipped_ids, vec!["c".to_string()]);
        assert_eq!(plan.charged[1].status, EnrollmentStatus::Completed);
    }

    fn group(max_students: u32) -> Group {
        Group {
            id: "g1".to_string(),
            name: "Utorak".to_string(),
            teacher_name: "Marija".to_string(),
            schedule: GroupSchedule {
                day_of_week: 2,
                time: "18:00".to_string(),
                duration_minutes: 60,
            },
            max_students,
            meeting_url: None,
            active: true,
            created_at: "2025-01-01T00:00:00Z".to_string(),
            updated_at: "2025-01-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn test_free_seat_counts_only_other_active_members() {
        let mut done = enrollment("c", Some("g1"), 0);
        done.status = EnrollmentStatus::Completed;
        let members = vec![enrollment("a", Some("g1"), 3), done];

        assert_eq!(check_free_seat(&group(2), &members, "b").unwrap(), 1);
        // Already seated members don't need a second seat
        assert_eq!(check_free_seat(&group(1), &members, "a").unwrap(), 0);
        assert!(matches!(
            check_free_seat(&group(1), &members, "b"),
            Err(AppError::FailedPrecondition(_))
        ));
    }

    #[test]
    fn test_group_cannot_shrink_below_members() {
        let members = vec![
            enrollment("a", Some("g1"), 3),
            enrollment("b", Some("g1"), 3),
        ];
        assert!(check_group_size(2, &members).is_ok());
        assert!(matches!(
            check_group_size(1, &members),
            Err(AppError::FailedPrecondition(_))
        ));
    }

    #[test]
    fn test_credits_on_completed_enrollment_need_a_seat() {
        let mut full = enrollment("late", Some("g1"), 0);
        full.status = EnrollmentStatus::Completed;

        let needs_seat =
            apply_enrollment_change(&mut full, EnrollmentChange::Remaining(4), "now").unwrap();
        assert!(needs_seat);
        assert_eq!(full.status, EnrollmentStatus::Active);

        // The group is already full with another active member
        let members = vec![enrollment("a", Some("g1"), 3), full.clone()];
        assert!(check_free_seat(&group(1), &members, &full.id).is_err());
    }

    #[test]
    fn test_status_changes() {
        let mut cancelled = enrollment("x", Some("g1"), 2);
        cancelled.status = EnrollmentStatus::Cancelled;
        let needs_seat = apply_enrollment_change(
            &mut cancelled,
            EnrollmentChange::Status(EnrollmentStatus::Active),
            "now",
        )
        .unwrap();
        assert!(needs_seat);

        // Active members keep their seat
        let mut active = enrollment("y", Some("g1"), 2);
        assert!(!apply_enrollment_change(&mut active, EnrollmentChange::Remaining(5), "now").unwrap());
        assert_eq!(active.total_classes, 11);

        // Without a group there is no seat to check
        let mut loose = enrollment("z", None, 2);
        loose.status = EnrollmentStatus::Cancelled;
        assert!(!apply_enrollment_change(
            &mut loose,
            EnrollmentChange::Status(EnrollmentStatus::Active),
            "now"
        )
        .unwrap());

        let mut empty = enrollment("w", Some("g1"), 0);
        empty.status = EnrollmentStatus::Completed;
        assert!(matches!(
            apply_enrollment_change(&mut empty, EnrollmentChange::Status(EnrollmentStatus::Active), "now"),
            Err(AppError::FailedPrecondition(_))
        ));

        let mut cancelled = enrollment("v", None, 3);
        cancelled.status = EnrollmentStatus::Cancelled;
        assert!(matches!(
            apply_enrollment_change(&mut cancelled, EnrollmentChange::Remaining(5), "now"),
            Err(AppError::FailedPrecondition(_))
        ));
    }

    #[test]
    fn test_charge_ignores_inactive_enrollments() {
        let mut cancelled = enrollment("x", Some("g1"), 4);
        cancelled.status = EnrollmentStatus::Cancelled;

        let plan = plan_session_charge("g1", vec![cancelled], "now");
        assert!(plan.charged.is_empty());
        assert!(plan.skipped_ids.is_empty());
    }

    #[test]
    fn test_charge_never_goes_negative() {
        // Apply the same charge repeatedly to a member with 2 credits.
        let mut members = vec![enrollment("a", Some("g1"), 2)];
        for _ in 0..5 {
            let plan = plan_session_charge("g1", members.clone(), "now");
            if let Some(updated) = plan.charged.into_iter().next() {
                members = vec![updated];
            }
        }
        assert_eq!(members[0].remaining_classes, 0);
        assert_eq!(members[0].used_classes, 8);
    }

    #[test]
    fn test_weekly_dates_start_on_requested_weekday() {
        // 2025-10-06 is a Monday
        let from = NaiveDate::from_ymd_opt(2025, 10, 6).unwrap();

        let wednesdays = weekly_dates(3, from, 3);
        assert_eq!(
            wednesdays,
            vec![
                NaiveDate::from_ymd_opt(2025, 10, 8).unwrap(),
                NaiveDate::from_ymd_opt(2025, 10, 15).unwrap(),
                NaiveDate::from_ymd_opt(2025, 10, 22).unwrap(),
            ]
        );

        // Same weekday includes the start date
        assert_eq!(weekly_dates(1, from, 1), vec![from]);

        // Sunday wraps forward, not backward
        assert_eq!(
            weekly_dates(0, from, 1),
            vec![NaiveDate::from_ymd_opt(2025, 10, 12).unwrap()]
        );
    }

    #[test]
    fn test_validate_schedule() {
        let ok = GroupSchedule {
            day_of_week: 2,
            time: "18:30".to_string(),
            duration_minutes: 60,
        };
        assert!(validate_schedule(&ok).is_ok());

        let bad_day = GroupSchedule {
            day_of_week: 7,
            ..ok.clone()
        };
        assert!(validate_schedule(&bad_day).is_err());

        let bad_time = GroupSchedule {
            time: "6pm".to_string(),
            ..ok.clone()
        };
        assert!(validate_schedule(&bad_time).is_err());

        let too_long = GroupSchedule {
            duration_minutes: 300,
            ..ok
        };
        assert!(matches!(
            validate_schedule(&too_long),
            Err(AppError::InvalidArgument(_))
        ));
    }
}
