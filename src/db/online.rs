// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Online-class operations: packages, enrollments, groups and sessions.

use std::collections::HashSet;

use crate::db::collections;
use crate::db::firestore::{transactional_reader, FirestoreDb};
use crate::error::AppError;
use crate::models::{Enrollment, Group, OnlinePackage, Session, SessionStatus};
use crate::services::classes::{self, plan_session_charge, EnrollmentChange};
use crate::time_utils::now_rfc3339;

/// Result of completing a session.
#[derive(Debug, Clone)]
pub struct SessionCompletion {
    pub session: Session,
    /// Enrollments charged one class
    pub charged_ids: Vec<String>,
    /// Active members that had no credits left
    pub skipped_ids: Vec<String>,
    /// The session had already been completed; nothing was charged
    pub already_completed: bool,
}

/// Result of deleting a group.
#[derive(Debug, Clone, Default)]
pub struct GroupDeletion {
    pub unassigned_enrollments: usize,
    pub deleted_sessions: usize,
}

impl FirestoreDb {
    // ─── Packages ────────────────────────────────────────────────

    pub async fn get_package(&self, id: &str) -> Result<Option<OnlinePackage>, AppError> {
        self.get_doc(collections::ONLINE_PACKAGES, id).await
    }

    pub async fn upsert_package(&self, package: &OnlinePackage) -> Result<(), AppError> {
        self.put_doc(collections::ONLINE_PACKAGES, &package.id, package)
            .await
    }

    /// Packages in display order.
    pub async fn list_packages(&self, active_only: bool) -> Result<Vec<OnlinePackage>, AppError> {
        let mut packages: Vec<OnlinePackage> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::ONLINE_PACKAGES)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        if active_only {
            packages.retain(|p| p.active);
        }
        packages.sort_by_key(|p| p.order);
        Ok(packages)
    }

    // ─── Enrollments ─────────────────────────────────────────────

    pub async fn get_enrollment(&self, id: &str) -> Result<Option<Enrollment>, AppError> {
        self.get_doc(collections::ONLINE_ENROLLMENTS, id).await
    }

    pub async fn upsert_enrollment(&self, enrollment: &Enrollment) -> Result<(), AppError> {
        self.put_doc(collections::ONLINE_ENROLLMENTS, &enrollment.id, enrollment)
            .await
    }

    pub async fn list_enrollments_for_user(&self, uid: &str) -> Result<Vec<Enrollment>, AppError> {
        let mut enrollments: Vec<Enrollment> = self
            .query_eq(collections::ONLINE_ENROLLMENTS, "user_id", uid)
            .await?;
        enrollments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(enrollments)
    }

    /// All enrollments, or the members of one group.
    pub async fn list_enrollments(&self, group_id: Option<&str>) -> Result<Vec<Enrollment>, AppError> {
        let mut enrollments: Vec<Enrollment> = match group_id {
            Some(group_id) => {
                self.query_eq(collections::ONLINE_ENROLLMENTS, "group_id", group_id)
                    .await?
            }
            None => self
                .get_client()?
                .fluent()
                .select()
                .from(collections::ONLINE_ENROLLMENTS)
                .obj()
                .query()
                .await
                .map_err(|e| AppError::Database(e.to_string()))?,
        };
        enrollments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(enrollments)
    }

    // ─── Groups ──────────────────────────────────────────────────

    pub async fn get_group(&self, id: &str) -> Result<Option<Group>, AppError> {
        self.get_doc(collections::ONLINE_GROUPS, id).await
    }

    pub async fn upsert_group(&self, group: &Group) -> Result<(), AppError> {
        self.put_doc(collections::ONLINE_GROUPS, &group.id, group).await
    }

    pub async fn list_groups(&self) -> Result<Vec<Group>, AppError> {
        let mut groups: Vec<Group> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::ONLINE_GROUPS)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        groups.sort_by(|a, b| {
            (a.schedule.day_of_week, &a.schedule.time).cmp(&(b.schedule.day_of_week, &b.schedule.time))
        });
        Ok(groups)
    }

    /// Delete a group: unassign its members, drop its sessions that were
    /// never held, then remove the group. Completed sessions stay as history.
    pub async fn delete_group(&self, group_id: &str) -> Result<GroupDeletion, AppError> {
        let mut unassigned = 0;
        for member in self.list_enrollments(Some(group_id)).await? {
            match self.remove_participant(group_id, &member.id).await {
                Ok(_) => unassigned += 1,
                // Moved to another group since the listing
                Err(AppError::FailedPrecondition(_)) | Err(AppError::NotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }

        let sessions: Vec<Session> = self
            .list_sessions_for_group(group_id)
            .await?
            .into_iter()
            .filter(|s| s.status != SessionStatus::Completed)
            .collect();
        self.batch_delete(&sessions, collections::ONLINE_SESSIONS, |s: &Session| {
            s.id.clone()
        })
        .await?;

        self.delete_doc(collections::ONLINE_GROUPS, group_id).await?;

        tracing::info!(
            group_id,
            unassigned,
            sessions = sessions.len(),
            "Group deleted"
        );

        Ok(GroupDeletion {
            unassigned_enrollments: unassigned,
            deleted_sessions: sessions.len(),
        })
    }

    // ─── Participants ────────────────────────────────────────────

    /// Put an enrollment into a group, enforcing the group's capacity.
    ///
    /// Runs in one transaction so two admins filling the last seat
    /// concurrently cannot both succeed. Re-adding a current member is a no-op.
    pub async fn add_participant(
        &self,
        group_id: &str,
        enrollment_id: &str,
    ) -> Result<Enrollment, AppError> {
        let client = self.get_client()?;

        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;
        let reader = transactional_reader(client, &transaction);

        let planned = async {
            let group = read_group(&reader, group_id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Group {} not found", group_id)))?;
            let mut enrollment = read_enrollment(&reader, enrollment_id).await?;

            if enrollment.group_id.as_deref() == Some(group_id) {
                return Ok((enrollment, None));
            }
            if !enrollment.is_active() {
                return Err(AppError::FailedPrecondition(
                    "Only active enrollments can join a group".to_string(),
                ));
            }

            let members = read_group_members(&reader, group_id).await?;
            let seated = classes::check_free_seat(&group, &members, enrollment_id)?;

            let previous = enrollment.group_id.replace(group_id.to_string());
            enrollment.updated_at = now_rfc3339();
            Ok::<_, AppError>((enrollment, Some((previous, seated))))
        }
        .await;

        let (enrollment, seat) = match planned {
            Ok(planned) => planned,
            Err(e) => {
                let _ = transaction.rollback().await;
                return Err(e);
            }
        };
        let Some((previous_group, seated)) = seat else {
            let _ = transaction.rollback().await;
            return Ok(enrollment);
        };

        write_enrollment(client, &mut transaction, &enrollment)?;
        commit(transaction).await?;

        tracing::info!(
            group_id,
            enrollment_id,
            previous_group = ?previous_group,
            seated = seated + 1,
            "Participant added to group"
        );

        Ok(enrollment)
    }

    /// Take an enrollment out of a group.
    pub async fn remove_participant(
        &self,
        group_id: &str,
        enrollment_id: &str,
    ) -> Result<Enrollment, AppError> {
        let client = self.get_client()?;

        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;
        let reader = transactional_reader(client, &transaction);

        let planned = async {
            let mut enrollment = read_enrollment(&reader, enrollment_id).await?;
            if enrollment.group_id.as_deref() != Some(group_id) {
                return Err(AppError::FailedPrecondition(
                    "Enrollment is not a member of this group".to_string(),
                ));
            }
            enrollment.group_id = None;
            enrollment.updated_at = now_rfc3339();
            Ok::<_, AppError>(enrollment)
        }
        .await;

        let enrollment = match planned {
            Ok(enrollment) => enrollment,
            Err(e) => {
                let _ = transaction.rollback().await;
                return Err(e);
            }
        };

        write_enrollment(client, &mut transaction, &enrollment)?;
        commit(transaction).await?;

        tracing::info!(group_id, enrollment_id, "Participant removed from group");
        Ok(enrollment)
    }

    /// Apply an admin credit or status change to an enrollment.
    ///
    /// Reads and writes inside one transaction so a concurrent session
    /// completion is never overwritten. An enrollment that becomes active
    /// again must still find a free seat in its group.
    pub async fn change_enrollment(
        &self,
        enrollment_id: &str,
        change: EnrollmentChange,
    ) -> Result<Enrollment, AppError> {
        let client = self.get_client()?;

        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;
        let reader = transactional_reader(client, &transaction);

        let planned = async {
            let mut enrollment = read_enrollment(&reader, enrollment_id).await?;
            let previous_remaining = enrollment.remaining_classes;
            let needs_seat =
                classes::apply_enrollment_change(&mut enrollment, change, &now_rfc3339())?;

            if needs_seat {
                if let Some(group_id) = enrollment.group_id.clone() {
                    match read_group(&reader, &group_id).await? {
                        Some(group) => {
                            let members = read_group_members(&reader, &group_id).await?;
                            classes::check_free_seat(&group, &members, enrollment_id)?;
                        }
                        None => enrollment.group_id = None,
                    }
                }
            }
            Ok::<_, AppError>((enrollment, previous_remaining))
        }
        .await;

        let (enrollment, previous_remaining) = match planned {
            Ok(planned) => planned,
            Err(e) => {
                let _ = transaction.rollback().await;
                return Err(e);
            }
        };

        write_enrollment(client, &mut transaction, &enrollment)?;
        commit(transaction).await?;

        tracing::info!(
            enrollment_id,
            change = ?change,
            previous_remaining,
            remaining = enrollment.remaining_classes,
            status = ?enrollment.status,
            "Enrollment changed"
        );
        Ok(enrollment)
    }

    /// Store an edited group, refusing a `max_students` below the number of
    /// active members. Runs in a transaction with the member read so it
    /// conflicts with a concurrent [`Self::add_participant`].
    pub async fn update_group(&self, group: &Group) -> Result<(), AppError> {
        let client = self.get_client()?;

        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;
        let reader = transactional_reader(client, &transaction);

        let checked = async {
            read_group(&reader, &group.id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Group {} not found", group.id)))?;
            let members = read_group_members(&reader, &group.id).await?;
            classes::check_group_size(group.max_students, &members)
        }
        .await;

        if let Err(e) = checked {
            let _ = transaction.rollback().await;
            return Err(e);
        }

        client
            .fluent()
            .update()
            .in_col(collections::ONLINE_GROUPS)
            .document_id(&group.id)
            .object(group)
            .add_to_transaction(&mut transaction)
            .map_err(|e| AppError::Database(format!("Failed to add group to transaction: {}", e)))?;
        commit(transaction).await?;

        tracing::info!(group_id = %group.id, max_students = group.max_students, "Group updated");
        Ok(())
    }

    // ─── Sessions ────────────────────────────────────────────────

    pub async fn get_session(&self, id: &str) -> Result<Option<Session>, AppError> {
        self.get_doc(collections::ONLINE_SESSIONS, id).await
    }

    /// Sessions of a group ordered by date.
    pub async fn list_sessions_for_group(&self, group_id: &str) -> Result<Vec<Session>, AppError> {
        let mut sessions: Vec<Session> = self
            .query_eq(collections::ONLINE_SESSIONS, "group_id", group_id)
            .await?;
        sessions.sort_by(|a, b| {
            (&a.scheduled_date, &a.start_time).cmp(&(&b.scheduled_date, &b.start_time))
        });
        Ok(sessions)
    }

    /// Store new sessions, skipping dates that already have one.
    ///
    /// Returns the sessions actually created.
    pub async fn create_sessions(&self, sessions: Vec<Session>) -> Result<Vec<Session>, AppError> {
        let mut existing: HashSet<String> = HashSet::new();
        let group_ids: HashSet<String> = sessions.iter().map(|s| s.group_id.clone()).collect();
        for group_id in &group_ids {
            existing.extend(
                self.list_sessions_for_group(group_id)
                    .await?
                    .into_iter()
                    .map(|s| s.id),
            );
        }

        let new_sessions: Vec<Session> = sessions
            .into_iter()
            .filter(|s| existing.insert(s.id.clone()))
            .collect();

        self.batch_upsert(&new_sessions, collections::ONLINE_SESSIONS, |s: &Session| {
            s.id.clone()
        })
        .await?;

        tracing::info!(created = new_sessions.len(), "Sessions created");
        Ok(new_sessions)
    }

    pub async fn delete_session(&self, id: &str) -> Result<(), AppError> {
        self.delete_doc(collections::ONLINE_SESSIONS, id).await
    }

    /// Move a session to a status other than `completed`.
    pub async fn set_session_status(
        &self,
        session_id: &str,
        next: SessionStatus,
    ) -> Result<Session, AppError> {
        if next == SessionStatus::Completed {
            return Ok(self.complete_session(session_id).await?.session);
        }

        let client = self.get_client()?;

        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;
        let reader = transactional_reader(client, &transaction);

        let session: Option<Session> = reader
            .fluent()
            .select()
            .by_id_in(collections::ONLINE_SESSIONS)
            .obj()
            .one(session_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to read session: {}", e)))?;
        let Some(mut session) = session else {
            let _ = transaction.rollback().await;
            return Err(AppError::NotFound(format!("Session {} not found", session_id)));
        };

        if session.status == next {
            let _ = transaction.rollback().await;
            return Ok(session);
        }

        if !session.status.can_transition_to(next) {
            let _ = transaction.rollback().await;
            return Err(AppError::FailedPrecondition(format!(
                "Cannot change session from {} to {}",
                session.status.as_str(),
                next.as_str()
            )));
        }

        session.status = next;
        session.updated_at = now_rfc3339();

        client
            .fluent()
            .update()
            .in_col(collections::ONLINE_SESSIONS)
            .document_id(&session.id)
            .object(&session)
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                AppError::Database(format!("Failed to add session to transaction: {}", e))
            })?;

        transaction
            .commit()
            .await
            .map_err(|e| AppError::Database(format!("Transaction commit failed: {}", e)))?;

        tracing::info!(session_id, status = next.as_str(), "Session status changed");
        Ok(session)
    }

    /// Complete a session and charge one class to every active member of
    /// its group.
    ///
    /// The session read, the member query and all writes share one
    /// Firestore transaction keyed by the session document. The
    /// `credits_deducted` flag makes a repeated completion a no-op, so a
    /// double submit or a retried request cannot charge twice.
    pub async fn complete_session(&self, session_id: &str) -> Result<SessionCompletion, AppError> {
        let client = self.get_client()?;
        let now = now_rfc3339();

        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;
        let reader = transactional_reader(client, &transaction);

        // 1. Read the session (registers it for conflict detection)
        let session: Option<Session> = reader
            .fluent()
            .select()
            .by_id_in(collections::ONLINE_SESSIONS)
            .obj()
            .one(session_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to read session: {}", e)))?;
        let Some(mut session) = session else {
            let _ = transaction.rollback().await;
            return Err(AppError::NotFound(format!("Session {} not found", session_id)));
        };

        // 2. Idempotency
        if session.credits_deducted || session.status == SessionStatus::Completed {
            tracing::debug!(session_id, "Session already completed (idempotent skip)");
            let _ = transaction.rollback().await;
            let charged_ids = session.charged_enrollment_ids.clone();
            return Ok(SessionCompletion {
                session,
                charged_ids,
                skipped_ids: Vec::new(),
                already_completed: true,
            });
        }

        if !session.status.can_transition_to(SessionStatus::Completed) {
            let _ = transaction.rollback().await;
            return Err(AppError::FailedPrecondition(format!(
                "Cannot complete a {} session",
                session.status.as_str()
            )));
        }

        // 3. Group members
        let group_key = session.group_id.clone();
        let members: Vec<Enrollment> = reader
            .fluent()
            .select()
            .from(collections::ONLINE_ENROLLMENTS)
            .filter(move |q| q.for_all([q.field("group_id").eq(group_key.clone())]))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(format!("Failed to read group members: {}", e)))?;

        // 4. Charge in memory
        let plan = plan_session_charge(&session.group_id, members, &now);

        // 5. Enrollment writes
        for enrollment in &plan.charged {
            client
                .fluent()
                .update()
                .in_col(collections::ONLINE_ENROLLMENTS)
                .document_id(&enrollment.id)
                .object(enrollment)
                .add_to_transaction(&mut transaction)
                .map_err(|e| {
                    AppError::Database(format!(
                        "Failed to add enrollment to transaction: {}",
                        e
                    ))
                })?;
        }

        // 6. Session write
        let charged_ids: Vec<String> = plan.charged.iter().map(|e| e.id.clone()).collect();
        session.status = SessionStatus::Completed;
        session.credits_deducted = true;
        session.charged_enrollment_ids = charged_ids.clone();
        session.completed_at = Some(now.clone());
        session.updated_at = now;

        client
            .fluent()
            .update()
            .in_col(collections::ONLINE_SESSIONS)
            .document_id(&session.id)
            .object(&session)
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                AppError::Database(format!("Failed to add session to transaction: {}", e))
            })?;

        // 7. Commit atomically
        transaction
            .commit()
            .await
            .map_err(|e| AppError::Database(format!("Transaction commit failed: {}", e)))?;

        tracing::info!(
            session_id,
            group_id = %session.group_id,
            charged = charged_ids.len(),
            skipped = plan.skipped_ids.len(),
            "Session completed and credits deducted"
        );

        Ok(SessionCompletion {
            session,
            charged_ids,
            skipped_ids: plan.skipped_ids,
            already_completed: false,
        })
    }

    /// Upcoming sessions (on or after `today`) of the user's groups.
    pub async fn list_upcoming_sessions_for_user(
        &self,
        uid: &str,
        today: &str,
    ) -> Result<Vec<Session>, AppError> {
        let group_ids: HashSet<String> = self
            .list_enrollments_for_user(uid)
            .await?
            .into_iter()
            .filter(|e| e.is_active())
            .filter_map(|e| e.group_id)
            .collect();

        let mut sessions = Vec::new();
        for group_id in group_ids {
            sessions.extend(
                self.list_sessions_for_group(&group_id)
                    .await?
                    .into_iter()
                    .filter(|s| s.scheduled_date.as_str() >= today && !s.status.is_final()),
            );
        }
        sessions.sort_by(|a, b| {
            (&a.scheduled_date, &a.start_time).cmp(&(&b.scheduled_date, &b.start_time))
        });
        Ok(sessions)
    }
}

async fn read_group(reader: &firestore::FirestoreDb, id: &str) -> Result<Option<Group>, AppError> {
    reader
        .fluent()
        .select()
        .by_id_in(collections::ONLINE_GROUPS)
        .obj()
        .one(id)
        .await
        .map_err(|e| AppError::Database(format!("Failed to read group: {}", e)))
}

async fn read_enrollment(reader: &firestore::FirestoreDb, id: &str) -> Result<Enrollment, AppError> {
    let enrollment: Option<Enrollment> = reader
        .fluent()
        .select()
        .by_id_in(collections::ONLINE_ENROLLMENTS)
        .obj()
        .one(id)
        .await
        .map_err(|e| AppError::Database(format!("Failed to read enrollment: {}", e)))?;
    enrollment.ok_or_else(|| AppError::NotFound(format!("Enrollment {} not found", id)))
}

async fn read_group_members(
    reader: &firestore::FirestoreDb,
    group_id: &str,
) -> Result<Vec<Enrollment>, AppError> {
    let group_key = group_id.to_string();
    reader
        .fluent()
        .select()
        .from(collections::ONLINE_ENROLLMENTS)
        .filter(move |q| q.for_all([q.field("group_id").eq(group_key.clone())]))
        .obj()
        .query()
        .await
        .map_err(|e| AppError::Database(format!("Failed to read group members: {}", e)))
}

fn write_enrollment(
    client: &firestore::FirestoreDb,
    transaction: &mut firestore::FirestoreTransaction<'_>,
    enrollment: &Enrollment,
) -> Result<(), AppError> {
    client
        .fluent()
        .update()
        .in_col(collections::ONLINE_ENROLLMENTS)
        .document_id(&enrollment.id)
        .object(enrollment)
        .add_to_transaction(transaction)
        .map_err(|e| AppError::Database(format!("Failed to add enrollment to transaction: {}", e)))?;
    Ok(())
}

async fn commit(transaction: firestore::FirestoreTransaction<'_>) -> Result<(), AppError> {
    transaction
        .commit()
        .await
        .map_err(|e| AppError::Database(format!("Transaction commit failed: {}", e)))?;
    Ok(())
}
