// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore integration tests.
//!
//! These tests require the Firestore emulator to be running.
//! Start one with `gcloud emulators firestore start` and export
//! FIRESTORE_EMULATOR_HOST before running `cargo test`.
//!
//! The emulator is shared between tests, so every test works on its own
//! freshly generated IDs.

use ucionica::db::FirestoreDb;
use ucionica::error::AppError;
use ucionica::models::{
    Course, CourseStatus, CourseType, Credentials, Enrollment, EnrollmentStatus, Group,
    GroupSchedule, ItemType, OnlinePackage, Role, Session, SessionStatus, Transaction,
    TransactionStatus, User,
};
use ucionica::services::classes::EnrollmentChange;

mod common;
use common::{test_db, unique_id};

const NOW: &str = "2025-03-01T10:00:00Z";

fn test_user(uid: &str) -> User {
    User {
        uid: uid.to_string(),
        email: format!("{}@example.com", uid.to_lowercase()),
        display_name: "Test Korisnik".to_string(),
        role: Role::Korisnik,
        blocked: false,
        email_verified: false,
        created_at: NOW.to_string(),
        last_login: None,
    }
}

fn pending(user: &User, item_type: ItemType, item_id: &str, amount: u32) -> Transaction {
    Transaction {
        id: unique_id("tx"),
        user_id: user.uid.clone(),
        user_email: user.email.clone(),
        item_type,
        item_id: item_id.to_string(),
        item_title: "Test item".to_string(),
        amount,
        currency: "RSD".to_string(),
        status: TransactionStatus::Pending,
        payment_ref: String::new(),
        created_at: NOW.to_string(),
        reviewed_at: None,
        reviewed_by: None,
        rejection_reason: None,
    }
}

fn enrollment(group_id: Option<&str>, remaining: u32) -> Enrollment {
    Enrollment {
        id: unique_id("enr"),
        user_id: unique_id("user"),
        user_email: "student@example.com".to_string(),
        package_id: "p8".to_string(),
        package_name: "8 časova".to_string(),
        total_classes: 8,
        remaining_classes: remaining,
        used_classes: 8 - remaining,
        group_id: group_id.map(str::to_string),
        status: EnrollmentStatus::Active,
        transaction_id: None,
        created_at: NOW.to_string(),
        updated_at: NOW.to_string(),
    }
}

fn group(max_students: u32) -> Group {
    Group {
        id: unique_id("grp"),
        name: "Utorak 18h".to_string(),
        teacher_name: "Marija".to_string(),
        schedule: GroupSchedule {
            day_of_week: 2,
            time: "18:00".to_string(),
            duration_minutes: 60,
        },
        max_students,
        meeting_url: None,
        active: true,
        created_at: NOW.to_string(),
        updated_at: NOW.to_string(),
    }
}

fn session(group: &Group, date: &str) -> Session {
    Session {
        id: Session::doc_id(&group.id, date),
        group_id: group.id.clone(),
        scheduled_date: date.to_string(),
        start_time: group.schedule.time.clone(),
        duration_minutes: group.schedule.duration_minutes,
        status: SessionStatus::Scheduled,
        topic: None,
        credits_deducted: false,
        charged_enrollment_ids: vec![],
        completed_at: None,
        created_at: NOW.to_string(),
        updated_at: NOW.to_string(),
    }
}

async fn remaining(db: &FirestoreDb, id: &str) -> u32 {
    db.get_enrollment(id).await.unwrap().unwrap().remaining_classes
}

// ═══════════════════════════════════════════════════════════════════════════
// PAYMENT TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_payment_references_increase() {
    require_emulator!();

    let db = test_db().await;
    let user = test_user(&unique_id("payer"));

    let first = db
        .create_pending_transaction(pending(&user, ItemType::Course, "c1", 4500))
        .await
        .unwrap();
    let second = db
        .create_pending_transaction(pending(&user, ItemType::Course, "c2", 4500))
        .await
        .unwrap();

    assert!(first.payment_ref.len() >= 4);
    assert!(second.payment_ref.len() >= 4);

    let a: u32 = first.payment_ref.parse().unwrap();
    let b: u32 = second.payment_ref.parse().unwrap();
    assert!(a >= 100);
    assert_eq!(b, a + 1, "{} then {}", a, b);

    // Stored with the allocated reference
    let stored = db.get_transaction(&first.id).await.unwrap().unwrap();
    assert_eq!(stored.payment_ref, first.payment_ref);
    assert_eq!(stored.status, TransactionStatus::Pending);
}

#[tokio::test]
async fn test_confirm_course_purchase_grants_access_once() {
    require_emulator!();

    let db = test_db().await;
    let user = test_user(&unique_id("buyer"));
    let course_id = unique_id("course");

    let tx = db
        .create_pending_transaction(pending(&user, ItemType::Course, &course_id, 4500))
        .await
        .unwrap();
    assert!(!db.has_course_access(&user.uid, &course_id).await.unwrap());

    let confirmed = db.confirm_transaction(&tx.id, "admin-1").await.unwrap();
    assert_eq!(confirmed.transaction.status, TransactionStatus::Confirmed);
    assert_eq!(confirmed.transaction.reviewed_by.as_deref(), Some("admin-1"));
    assert!(confirmed.enrollment.is_none());
    assert!(db.has_course_access(&user.uid, &course_id).await.unwrap());

    // Second review of the same payment is refused
    let again = db.confirm_transaction(&tx.id, "admin-1").await;
    assert!(matches!(again, Err(AppError::FailedPrecondition(_))));
    let reject = db.reject_transaction(&tx.id, "admin-1", "late").await;
    assert!(matches!(reject, Err(AppError::FailedPrecondition(_))));
}

#[tokio::test]
async fn test_confirm_package_purchase_creates_enrollment() {
    require_emulator!();

    let db = test_db().await;
    let user = test_user(&unique_id("buyer"));
    let package = OnlinePackage {
        id: unique_id("pkg"),
        name: "Paket 4".to_string(),
        description: String::new(),
        class_count: 4,
        price: 6000,
        active: true,
        order: 1,
        created_at: NOW.to_string(),
    };
    db.upsert_package(&package).await.unwrap();

    let tx = db
        .create_pending_transaction(pending(&user, ItemType::OnlinePackage, &package.id, 6000))
        .await
        .unwrap();
    let confirmed = db.confirm_transaction(&tx.id, "admin-1").await.unwrap();

    let enrollment = confirmed.enrollment.expect("package purchase creates enrollment");
    assert_eq!(enrollment.id, tx.id);
    assert_eq!(enrollment.remaining_classes, 4);
    assert_eq!(enrollment.used_classes, 0);
    assert_eq!(enrollment.status, EnrollmentStatus::Active);
    assert!(enrollment.group_id.is_none());
}

// ═══════════════════════════════════════════════════════════════════════════
// SESSION / CREDIT TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_session_completion_charges_exactly_once() {
    require_emulator!();

    let db = test_db().await;
    let group = group(10);
    db.upsert_group(&group).await.unwrap();

    let paying = enrollment(Some(&group.id), 3);
    let empty = enrollment(Some(&group.id), 0);
    let elsewhere = enrollment(Some("other-group"), 5);
    for e in [&paying, &empty, &elsewhere] {
        db.upsert_enrollment(e).await.unwrap();
    }

    let created = db
        .create_sessions(vec![session(&group, "2025-03-04")])
        .await
        .unwrap();
    let session_id = created[0].id.clone();

    let first = db.complete_session(&session_id).await.unwrap();
    assert!(!first.already_completed);
    assert_eq!(first.charged_ids, vec![paying.id.clone()]);
    assert_eq!(first.skipped_ids, vec![empty.id.clone()]);
    assert_eq!(first.session.status, SessionStatus::Completed);
    assert!(first.session.credits_deducted);

    assert_eq!(remaining(&db, &paying.id).await, 2);
    assert_eq!(remaining(&db, &empty.id).await, 0);
    assert_eq!(remaining(&db, &elsewhere.id).await, 5);

    // Completing again changes nothing
    let second = db.complete_session(&session_id).await.unwrap();
    assert!(second.already_completed);
    assert_eq!(second.charged_ids, vec![paying.id.clone()]);
    assert_eq!(remaining(&db, &paying.id).await, 2);
}

#[tokio::test]
async fn test_concurrent_completion_charges_once() {
    require_emulator!();

    let db = test_db().await;
    let group = group(10);
    db.upsert_group(&group).await.unwrap();
    let member = enrollment(Some(&group.id), 3);
    db.upsert_enrollment(&member).await.unwrap();

    let created = db
        .create_sessions(vec![session(&group, "2025-03-25")])
        .await
        .unwrap();
    let id = created[0].id.clone();

    let (a, b) = tokio::join!(db.complete_session(&id), db.complete_session(&id));

    // A losing transaction either sees the completed session or aborts
    let charged: usize = [&a, &b]
        .into_iter()
        .filter_map(|r| r.as_ref().ok())
        .filter(|c| !c.already_completed)
        .map(|c| c.charged_ids.len())
        .sum();
    assert_eq!(charged, 1);
    assert!(a.is_ok() || b.is_ok());
    assert_eq!(remaining(&db, &member.id).await, 2);

    let stored = db.get_session(&id).await.unwrap().unwrap();
    assert_eq!(stored.status, SessionStatus::Completed);
    assert_eq!(stored.charged_enrollment_ids, vec![member.id.clone()]);
}

#[tokio::test]
async fn test_credit_adjustment_keeps_session_charge() {
    require_emulator!();

    let db = test_db().await;
    let group = group(10);
    db.upsert_group(&group).await.unwrap();
    let member = enrollment(Some(&group.id), 3);
    db.upsert_enrollment(&member).await.unwrap();

    let created = db
        .create_sessions(vec![session(&group, "2025-04-08")])
        .await
        .unwrap();
    db.complete_session(&created[0].id).await.unwrap();

    // Stale copy from before the session
    assert_eq!(member.used_classes, 5);

    let adjusted = db
        .change_enrollment(&member.id, EnrollmentChange::Remaining(4))
        .await
        .unwrap();
    assert_eq!(adjusted.used_classes, 6);
    assert_eq!(adjusted.remaining_classes, 4);
    assert_eq!(adjusted.total_classes, 10);
}

#[tokio::test]
async fn test_reactivation_needs_free_seat() {
    require_emulator!();

    let db = test_db().await;
    let group = group(1);
    db.upsert_group(&group).await.unwrap();

    let seated = enrollment(Some(&group.id), 4);
    let mut finished = enrollment(Some(&group.id), 0);
    finished.status = EnrollmentStatus::Completed;
    db.upsert_enrollment(&seated).await.unwrap();
    db.upsert_enrollment(&finished).await.unwrap();

    let more_credits = db
        .change_enrollment(&finished.id, EnrollmentChange::Remaining(4))
        .await;
    assert!(matches!(more_credits, Err(AppError::FailedPrecondition(_))));
    let stored = db.get_enrollment(&finished.id).await.unwrap().unwrap();
    assert_eq!(stored.status, EnrollmentStatus::Completed);
    assert_eq!(stored.remaining_classes, 0);

    let mut cancelled = enrollment(Some(&group.id), 2);
    cancelled.status = EnrollmentStatus::Cancelled;
    db.upsert_enrollment(&cancelled).await.unwrap();
    let reactivate = db
        .change_enrollment(&cancelled.id, EnrollmentChange::Status(EnrollmentStatus::Active))
        .await;
    assert!(matches!(reactivate, Err(AppError::FailedPrecondition(_))));

    // Once the seat frees up the credits go through
    db.remove_participant(&group.id, &seated.id).await.unwrap();
    let reactivated = db
        .change_enrollment(&finished.id, EnrollmentChange::Remaining(4))
        .await
        .unwrap();
    assert_eq!(reactivated.status, EnrollmentStatus::Active);
}

#[tokio::test]
async fn test_group_cannot_shrink_below_members() {
    require_emulator!();

    let db = test_db().await;
    let mut group = group(3);
    db.upsert_group(&group).await.unwrap();
    for _ in 0..2 {
        db.upsert_enrollment(&enrollment(Some(&group.id), 4))
            .await
            .unwrap();
    }

    group.max_students = 1;
    let result = db.update_group(&group).await;
    assert!(matches!(result, Err(AppError::FailedPrecondition(_))));
    assert_eq!(db.get_group(&group.id).await.unwrap().unwrap().max_students, 3);

    group.max_students = 2;
    db.update_group(&group).await.unwrap();
    assert_eq!(db.get_group(&group.id).await.unwrap().unwrap().max_students, 2);
}

#[tokio::test]
async fn test_session_generation_skips_existing_dates() {
    require_emulator!();

    let db = test_db().await;
    let group = group(10);
    db.upsert_group(&group).await.unwrap();

    let first = db
        .create_sessions(vec![session(&group, "2025-03-04"), session(&group, "2025-03-11")])
        .await
        .unwrap();
    assert_eq!(first.len(), 2);

    let second = db
        .create_sessions(vec![session(&group, "2025-03-11"), session(&group, "2025-03-18")])
        .await
        .unwrap();
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].scheduled_date, "2025-03-18");

    let all = db.list_sessions_for_group(&group.id).await.unwrap();
    let dates: Vec<&str> = all.iter().map(|s| s.scheduled_date.as_str()).collect();
    assert_eq!(dates, vec!["2025-03-04", "2025-03-11", "2025-03-18"]);
}

#[tokio::test]
async fn test_cancelled_session_cannot_complete() {
    require_emulator!();

    let db = test_db().await;
    let group = group(10);
    db.upsert_group(&group).await.unwrap();
    let member = enrollment(Some(&group.id), 2);
    db.upsert_enrollment(&member).await.unwrap();

    let created = db
        .create_sessions(vec![session(&group, "2025-04-01")])
        .await
        .unwrap();
    let id = created[0].id.clone();

    db.set_session_status(&id, SessionStatus::Cancelled)
        .await
        .unwrap();
    let result = db.complete_session(&id).await;
    assert!(matches!(result, Err(AppError::FailedPrecondition(_))));
    assert_eq!(remaining(&db, &member.id).await, 2);
}

#[tokio::test]
async fn test_group_capacity_enforced() {
    require_emulator!();

    let db = test_db().await;
    let group = group(1);
    db.upsert_group(&group).await.unwrap();

    let first = enrollment(None, 4);
    let second = enrollment(None, 4);
    db.upsert_enrollment(&first).await.unwrap();
    db.upsert_enrollment(&second).await.unwrap();

    let seated = db.add_participant(&group.id, &first.id).await.unwrap();
    assert_eq!(seated.group_id.as_deref(), Some(group.id.as_str()));

    // Re-adding a member is a no-op, not a capacity error
    db.add_participant(&group.id, &first.id).await.unwrap();

    let full = db.add_participant(&group.id, &second.id).await;
    assert!(matches!(full, Err(AppError::FailedPrecondition(_))));

    db.remove_participant(&group.id, &first.id).await.unwrap();
    db.add_participant(&group.id, &second.id).await.unwrap();
}

// ═══════════════════════════════════════════════════════════════════════════
// USER TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_duplicate_email_rejected() {
    require_emulator!();

    let db = test_db().await;
    let user = test_user(&unique_id("dup"));
    let credentials = Credentials {
        password_hash: "$argon2id$placeholder".to_string(),
        updated_at: NOW.to_string(),
    };
    db.create_account(&user, &credentials).await.unwrap();

    let mut other = test_user(&unique_id("other"));
    other.email = user.email.clone();
    let result = db.create_account(&other, &credentials).await;
    assert!(matches!(result, Err(AppError::AlreadyExists(_))));

    let found = db.find_user_by_email(&user.email).await.unwrap().unwrap();
    assert_eq!(found.uid, user.uid);
}

#[tokio::test]
async fn test_user_deletion_cascades() {
    require_emulator!();

    let db = test_db().await;
    let user = test_user(&unique_id("leaver"));
    db.create_account(
        &user,
        &Credentials {
            password_hash: "$argon2id$placeholder".to_string(),
            updated_at: NOW.to_string(),
        },
    )
    .await
    .unwrap();

    let course = Course {
        id: unique_id("course"),
        title: "Srpski A1".to_string(),
        description: String::new(),
        price: 4500,
        status: CourseStatus::Active,
        course_type: CourseType::Video,
        thumbnail_url: None,
        created_at: NOW.to_string(),
        updated_at: NOW.to_string(),
    };
    db.upsert_course(&course).await.unwrap();

    let tx = db
        .create_pending_transaction(pending(&user, ItemType::Course, &course.id, 4500))
        .await
        .unwrap();
    db.confirm_transaction(&tx.id, "admin-1").await.unwrap();

    let mut owned = enrollment(None, 3);
    owned.user_id = user.uid.clone();
    db.upsert_enrollment(&owned).await.unwrap();

    let deleted = db.delete_user_data(&user.uid).await.unwrap();
    assert!(deleted >= 5, "expected grant, payment, enrollment, credentials, index and profile; got {}", deleted);

    assert!(db.get_user(&user.uid).await.unwrap().is_none());
    assert!(db.get_credentials(&user.uid).await.unwrap().is_none());
    assert!(db.find_user_by_email(&user.email).await.unwrap().is_none());
    assert!(!db.has_course_access(&user.uid, &course.id).await.unwrap());
    assert!(db.list_transactions_for_user(&user.uid).await.unwrap().is_empty());
    assert!(db.list_enrollments_for_user(&user.uid).await.unwrap().is_empty());

    // The course itself survives
    assert!(db.get_course(&course.id).await.unwrap().is_some());
}
