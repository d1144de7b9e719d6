// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Payment operations: transactions, the reference counter and
//! confirmation side effects.

use crate::db::collections;
use crate::db::firestore::{transactional_reader, FirestoreDb};
use crate::db::PAYMENT_COUNTER_DOC;
use crate::error::AppError;
use crate::models::transaction::format_payment_ref;
use crate::models::{
    Enrollment, EnrollmentStatus, ItemType, OnlinePackage, PaymentCounter, Transaction,
    TransactionStatus, UserCourse,
};
use crate::time_utils::now_rfc3339;

/// Outcome of a payment confirmation.
#[derive(Debug, Clone)]
pub struct ConfirmedPayment {
    pub transaction: Transaction,
    /// Enrollment created for an online-package purchase
    pub enrollment: Option<Enrollment>,
}

impl FirestoreDb {
    pub async fn get_transaction(&self, id: &str) -> Result<Option<Transaction>, AppError> {
        self.get_doc(collections::TRANSACTIONS, id).await
    }

    /// A user's transactions, newest first.
    pub async fn list_transactions_for_user(&self, uid: &str) -> Result<Vec<Transaction>, AppError> {
        let mut transactions: Vec<Transaction> = self
            .query_eq(collections::TRANSACTIONS, "user_id", uid)
            .await?;
        transactions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(transactions)
    }

    /// All transactions, optionally filtered by status, newest first.
    pub async fn list_transactions(
        &self,
        status: Option<TransactionStatus>,
    ) -> Result<Vec<Transaction>, AppError> {
        let mut transactions: Vec<Transaction> = match status {
            Some(status) => {
                self.query_eq(collections::TRANSACTIONS, "status", status.as_str())
                    .await?
            }
            None => self
                .get_client()?
                .fluent()
                .select()
                .from(collections::TRANSACTIONS)
                .obj()
                .query()
                .await
                .map_err(|e| AppError::Database(e.to_string()))?,
        };
        transactions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(transactions)
    }

    /// The user's pending transaction for an item, if any.
    pub async fn find_pending_transaction(
        &self,
        uid: &str,
        item_id: &str,
    ) -> Result<Option<Transaction>, AppError> {
        let transactions = self.list_transactions_for_user(uid).await?;
        Ok(transactions
            .into_iter()
            .find(|t| t.item_id == item_id && t.status == TransactionStatus::Pending))
    }

    /// Allocate the next payment reference and store a pending transaction.
    ///
    /// The counter read, the counter write and the transaction write happen
    /// in one Firestore transaction, which is what keeps references unique.
    pub async fn create_pending_transaction(
        &self,
        mut transaction_doc: Transaction,
    ) -> Result<Transaction, AppError> {
        let client = self.get_client()?;

        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;
        let reader = transactional_reader(client, &transaction);

        // 1. Read the counter (registers it for conflict detection)
        let counter: Option<PaymentCounter> = reader
            .fluent()
            .select()
            .by_id_in(collections::SYSTEM)
            .obj()
            .one(PAYMENT_COUNTER_DOC)
            .await
            .map_err(|e| {
                AppError::Database(format!("Failed to read payment counter: {}", e))
            })?;

        // 2. Allocate
        let next = PaymentCounter {
            current: PaymentCounter::next_value(counter.as_ref()),
        };
        transaction_doc.payment_ref = format_payment_ref(next.current);
        transaction_doc.status = TransactionStatus::Pending;

        // 3. Write counter and transaction together
        client
            .fluent()
            .update()
            .in_col(collections::SYSTEM)
            .document_id(PAYMENT_COUNTER_DOC)
            .object(&next)
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                AppError::Database(format!("Failed to add counter to transaction: {}", e))
            })?;

        client
            .fluent()
            .update()
            .in_col(collections::TRANSACTIONS)
            .document_id(&transaction_doc.id)
            .object(&transaction_doc)
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                AppError::Database(format!("Failed to add payment to transaction: {}", e))
            })?;

        transaction
            .commit()
            .await
            .map_err(|e| AppError::Database(format!("Transaction commit failed: {}", e)))?;

        tracing::info!(
            transaction_id = %transaction_doc.id,
            user_id = %transaction_doc.user_id,
            payment_ref = %transaction_doc.payment_ref,
            amount = transaction_doc.amount,
            "Pending payment created"
        );

        Ok(transaction_doc)
    }

    /// Confirm a pending payment and grant what it paid for, atomically.
    ///
    /// Course purchases get a `user_courses` grant; package purchases get a
    /// new active enrollment whose document ID is the transaction ID.
    pub async fn confirm_transaction(
        &self,
        transaction_id: &str,
        admin_uid: &str,
    ) -> Result<ConfirmedPayment, AppError> {
        let client = self.get_client()?;
        let now = now_rfc3339();

        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;
        let reader = transactional_reader(client, &transaction);

        let payment: Option<Transaction> = reader
            .fluent()
            .select()
            .by_id_in(collections::TRANSACTIONS)
            .obj()
            .one(transaction_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to read payment: {}", e)))?;

        let Some(mut payment) = payment else {
            let _ = transaction.rollback().await;
            return Err(AppError::NotFound(format!(
                "Transaction {} not found",
                transaction_id
            )));
        };

        if !payment.status.can_transition_to(TransactionStatus::Confirmed) {
            let _ = transaction.rollback().await;
            return Err(AppError::FailedPrecondition(format!(
                "Transaction is already {}",
                payment.status.as_str()
            )));
        }

        payment.status = TransactionStatus::Confirmed;
        payment.reviewed_at = Some(now.clone());
        payment.reviewed_by = Some(admin_uid.to_string());
        payment.rejection_reason = None;

        let mut enrollment = None;
        match payment.item_type {
            ItemType::Course => {
                let grant = UserCourse {
                    uid: payment.user_id.clone(),
                    course_id: payment.item_id.clone(),
                    transaction_id: Some(payment.id.clone()),
                    granted_at: now.clone(),
                };
                client
                    .fluent()
                    .update()
                    .in_col(collections::USER_COURSES)
                    .document_id(UserCourse::doc_id(&grant.uid, &grant.course_id))
                    .object(&grant)
                    .add_to_transaction(&mut transaction)
                    .map_err(|e| {
                        AppError::Database(format!("Failed to add grant to transaction: {}", e))
                    })?;
            }
            ItemType::OnlinePackage => {
                let package: Option<OnlinePackage> = reader
                    .fluent()
                    .select()
                    .by_id_in(collections::ONLINE_PACKAGES)
                    .obj()
                    .one(&payment.item_id)
                    .await
                    .map_err(|e| AppError::Database(format!("Failed to read package: {}", e)))?;

                let Some(package) = package else {
                    let _ = transaction.rollback().await;
                    return Err(AppError::FailedPrecondition(format!(
                        "Package {} no longer exists",
                        payment.item_id
                    )));
                };

                let new_enrollment = Enrollment {
                    id: payment.id.clone(),
                    user_id: payment.user_id.clone(),
                    user_email: payment.user_email.clone(),
                    package_id: package.id.clone(),
                    package_name: package.name.clone(),
                    total_classes: package.class_count,
                    remaining_classes: package.class_count,
                    used_classes: 0,
                    group_id: None,
                    status: EnrollmentStatus::Active,
                    transaction_id: Some(payment.id.clone()),
                    created_at: now.clone(),
                    updated_at: now.clone(),
                };

                client
                    .fluent()
                    .update()
                    .in_col(collections::ONLINE_ENROLLMENTS)
                    .document_id(&new_enrollment.id)
                    .object(&new_enrollment)
                    .add_to_transaction(&mut transaction)
                    .map_err(|e| {
                        AppError::Database(format!(
                            "Failed to add enrollment to transaction: {}",
                            e
                        ))
                    })?;
                enrollment = Some(new_enrollment);
            }
        }

        client
            .fluent()
            .update()
            .in_col(collections::TRANSACTIONS)
            .document_id(&payment.id)
            .object(&payment)
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                AppError::Database(format!("Failed to add payment to transaction: {}", e))
            })?;

        transaction
            .commit()
            .await
            .map_err(|e| AppError::Database(format!("Transaction commit failed: {}", e)))?;

        tracing::info!(
            transaction_id,
            admin_uid,
            user_id = %payment.user_id,
            item_id = %payment.item_id,
            "Payment confirmed"
        );

        Ok(ConfirmedPayment {
            transaction: payment,
            enrollment,
        })
    }

    /// Reject a pending payment.
    pub async fn reject_transaction(
        &self,
        transaction_id: &str,
        admin_uid: &str,
        reason: &str,
    ) -> Result<Transaction, AppError> {
        let client = self.get_client()?;

        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;
        let reader = transactional_reader(client, &transaction);

        let payment: Option<Transaction> = reader
            .fluent()
            .select()
            .by_id_in(collections::TRANSACTIONS)
            .obj()
            .one(transaction_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to read payment: {}", e)))?;

        let Some(mut payment) = payment else {
            let _ = transaction.rollback().await;
            return Err(AppError::NotFound(format!(
                "Transaction {} not found",
                transaction_id
            )));
        };

        if !payment.status.can_transition_to(TransactionStatus::Rejected) {
            let _ = transaction.rollback().await;
            return Err(AppError::FailedPrecondition(format!(
                "Transaction is already {}",
                payment.status.as_str()
            )));
        }

        payment.status = TransactionStatus::Rejected;
        payment.reviewed_at = Some(now_rfc3339());
        payment.reviewed_by = Some(admin_uid.to_string());
        payment.rejection_reason = Some(reason.to_string());

        client
            .fluent()
            .update()
            .in_col(collections::TRANSACTIONS)
            .document_id(&payment.id)
            .object(&payment)
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                AppError::Database(format!("Failed to add payment to transaction: {}", e))
            })?;

        transaction
            .commit()
            .await
            .map_err(|e| AppError::Database(format!("Transaction commit failed: {}", e)))?;

        tracing::info!(transaction_id, admin_uid, "Payment rejected");
        Ok(payment)
    }
}
