// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! This file holds the client itself plus account operations:
//! - Users (profile storage)
//! - Credentials (password hashes)
//! - Email index (uniqueness of login emails)
//! - Cascading account deletion
//!
//! Catalog, payment and online-class operations live in sibling modules as
//! further `impl FirestoreDb` blocks.

use crate::db::collections;
use crate::error::AppError;
use crate::models::user::{normalize_email, EmailIndex};
use crate::models::{Credentials, Enrollment, Transaction, User, UserCourse};
use serde::de::DeserializeOwned;

// Firestore limits batch/transaction writes to 500 operations.
// We use a safe limit of 400 to allow headroom.
pub(crate) const BATCH_SIZE: usize = 400;

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a mock Firestore client for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    pub(crate) fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    // ─── Generic Helpers ───────────────────────────────────────────

    /// Read one document by ID.
    pub(crate) async fn get_doc<T>(&self, collection: &str, id: &str) -> Result<Option<T>, AppError>
    where
        T: DeserializeOwned + Send,
    {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collection)
            .obj()
            .one(id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create or replace one document.
    pub(crate) async fn put_doc<T>(&self, collection: &str, id: &str, doc: &T) -> Result<(), AppError>
    where
        T: serde::Serialize + DeserializeOwned + Send + Sync,
    {
        let _: T = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collection)
            .document_id(id)
            .object(doc)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Delete one document (no error if it does not exist).
    pub(crate) async fn delete_doc(&self, collection: &str, id: &str) -> Result<(), AppError> {
        self.get_client()?
            .fluent()
            .delete()
            .from(collection)
            .document_id(id)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// All documents of a collection whose `field` equals `value`.
    pub(crate) async fn query_eq<T>(
        &self,
        collection: &str,
        field: &'static str,
        value: &str,
    ) -> Result<Vec<T>, AppError>
    where
        T: DeserializeOwned + Send,
    {
        let value = value.to_string();
        self.get_client()?
            .fluent()
            .select()
            .from(collection)
            .filter(move |q| q.for_all([q.field(field).eq(value.clone())]))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Helper to batch delete documents using transactions.
    pub(crate) async fn batch_delete<T, F>(
        &self,
        items: &[T],
        collection: &str,
        id_extractor: F,
    ) -> Result<(), AppError>
    where
        F: Fn(&T) -> String,
    {
        let client = self.get_client()?;

        for chunk in items.chunks(BATCH_SIZE) {
            let mut transaction = client
                .begin_transaction()
                .await
                .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

            for item in chunk {
                let doc_id = id_extractor(item);
                client
                    .fluent()
                    .delete()
                    .from(collection)
                    .document_id(&doc_id)
                    .add_to_transaction(&mut transaction)
                    .map_err(|e| {
                        AppError::Database(format!(
                            "Failed to add deletion to transaction for {}: {}",
                            collection, e
                        ))
                    })?;
            }

            transaction.commit().await.map_err(|e| {
                AppError::Database(format!("Failed to commit batch deletion: {}", e))
            })?;
        }

        Ok(())
    }

    /// Helper to batch write documents using transactions.
    pub(crate) async fn batch_upsert<T, F>(
        &self,
        items: &[T],
        collection: &str,
        id_extractor: F,
    ) -> Result<(), AppError>
    where
        T: serde::Serialize + DeserializeOwned + Sync + Send,
        F: Fn(&T) -> String,
    {
        let client = self.get_client()?;

        for chunk in items.chunks(BATCH_SIZE) {
            let mut transaction = client
                .begin_transaction()
                .await
                .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

            for item in chunk {
                let doc_id = id_extractor(item);
                client
                    .fluent()
                    .update()
                    .in_col(collection)
                    .document_id(&doc_id)
                    .object(item)
                    .add_to_transaction(&mut transaction)
                    .map_err(|e| {
                        AppError::Database(format!(
                            "Failed to add write to transaction for {}: {}",
                            collection, e
                        ))
                    })?;
            }

            transaction
                .commit()
                .await
                .map_err(|e| AppError::Database(format!("Failed to commit batch write: {}", e)))?;
        }

        Ok(())
    }

    // ─── User Operations ─────────────────────────────────────────

    /// Get a user by uid.
    pub async fn get_user(&self, uid: &str) -> Result<Option<User>, AppError> {
        self.get_doc(collections::USERS, uid).await
    }

    /// Get a user by uid, refusing missing or blocked accounts.
    pub async fn get_active_user(&self, uid: &str) -> Result<User, AppError> {
        let user = self
            .get_user(uid)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", uid)))?;

        if user.blocked {
            return Err(AppError::PermissionDenied("Account is blocked".to_string()));
        }
        Ok(user)
    }

    /// Find a user by login email.
    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let key = email_index_key(email);
        let Some(index) = self
            .get_doc::<EmailIndex>(collections::USER_EMAILS, &key)
            .await?
        else {
            return Ok(None);
        };
        self.get_user(&index.uid).await
    }

    /// Create or update a user profile.
    pub async fn upsert_user(&self, user: &User) -> Result<(), AppError> {
        self.put_doc(collections::USERS, &user.uid, user).await
    }

    /// List all users, newest first.
    pub async fn list_users(&self, limit: u32) -> Result<Vec<User>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .from(collections::USERS)
            .order_by([("created_at", firestore::FirestoreQueryDirection::Descending)])
            .limit(limit)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Atomically register a new account: email index, profile and credentials.
    ///
    /// Fails with `AlreadyExists` when the email is taken. The index read
    /// inside the transaction makes concurrent registrations of the same
    /// email conflict instead of both succeeding.
    pub async fn create_account(
        &self,
        user: &User,
        credentials: &Credentials,
    ) -> Result<(), AppError> {
        let client = self.get_client()?;
        let key = email_index_key(&user.email);

        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;
        let reader = transactional_reader(client, &transaction);

        let existing: Option<EmailIndex> = reader
            .fluent()
            .select()
            .by_id_in(collections::USER_EMAILS)
            .obj()
            .one(&key)
            .await
            .map_err(|e| AppError::Database(format!("Failed to read email index: {}", e)))?;

        if existing.is_some() {
            let _ = transaction.rollback().await;
            return Err(AppError::AlreadyExists(
                "An account with this email already exists".to_string(),
            ));
        }

        let index = EmailIndex {
            uid: user.uid.clone(),
        };

        client
            .fluent()
            .update()
            .in_col(collections::USER_EMAILS)
            .document_id(&key)
            .object(&index)
            .add_to_transaction(&mut transaction)
            .map_err(|e| AppError::Database(format!("Failed to add email index: {}", e)))?;

        client
            .fluent()
            .update()
            .in_col(collections::USERS)
            .document_id(&user.uid)
            .object(user)
            .add_to_transaction(&mut transaction)
            .map_err(|e| AppError::Database(format!("Failed to add user: {}", e)))?;

        client
            .fluent()
            .update()
            .in_col(collections::CREDENTIALS)
            .document_id(&user.uid)
            .object(credentials)
            .add_to_transaction(&mut transaction)
            .map_err(|e| AppError::Database(format!("Failed to add credentials: {}", e)))?;

        transaction
            .commit()
            .await
            .map_err(|e| AppError::Database(format!("Transaction commit failed: {}", e)))?;

        tracing::info!(uid = %user.uid, "Account created");
        Ok(())
    }

    // ─── Credentials ───────────────────────────────────────────────

    pub async fn get_credentials(&self, uid: &str) -> Result<Option<Credentials>, AppError> {
        self.get_doc(collections::CREDENTIALS, uid).await
    }

    // ─── User Data Deletion ────────────────────────────────────────

    /// Delete a user and everything that hangs off the account.
    ///
    /// Deletes from all collections:
    /// - `user_courses` (query by uid)
    /// - `transactions` (query by user_id)
    /// - `online_enrollments` (query by user_id)
    /// - `credentials/{uid}`, `user_emails/{email}`, `users/{uid}`
    ///
    /// Returns the number of documents deleted.
    pub async fn delete_user_data(&self, uid: &str) -> Result<usize, AppError> {
        let mut deleted_count = 0;
        let user = self.get_user(uid).await?;

        // 1. Course access grants
        let grants: Vec<UserCourse> = self
            .query_eq(collections::USER_COURSES, "uid", uid)
            .await?;
        let count = grants.len();
        self.batch_delete(&grants, collections::USER_COURSES, |g: &UserCourse| {
            UserCourse::doc_id(&g.uid, &g.course_id)
        })
        .await?;
        deleted_count += count;
        tracing::debug!(uid, count, "Deleted course grants");

        // 2. Transactions
        let transactions: Vec<Transaction> = self
            .query_eq(collections::TRANSACTIONS, "user_id", uid)
            .await?;
        let count = transactions.len();
        self.batch_delete(&transactions, collections::TRANSACTIONS, |t: &Transaction| {
            t.id.clone()
        })
        .await?;
        deleted_count += count;
        tracing::debug!(uid, count, "Deleted transactions");

        // 3. Online enrollments
        let enrollments: Vec<Enrollment> = self
            .query_eq(collections::ONLINE_ENROLLMENTS, "user_id", uid)
            .await?;
        let count = enrollments.len();
        self.batch_delete(&enrollments, collections::ONLINE_ENROLLMENTS, |e: &Enrollment| {
            e.id.clone()
        })
        .await?;
        deleted_count += count;
        tracing::debug!(uid, count, "Deleted online enrollments");

        // 4. Credentials, email index, profile
        self.delete_doc(collections::CREDENTIALS, uid).await?;
        deleted_count += 1;

        if let Some(user) = &user {
            self.delete_doc(collections::USER_EMAILS, &email_index_key(&user.email))
                .await?;
            deleted_count += 1;
        }

        self.delete_doc(collections::USERS, uid).await?;
        deleted_count += 1;

        tracing::info!(uid, deleted_count, "User data deletion complete");

        Ok(deleted_count)
    }
}

/// Document ID in `user_emails` for an email address.
pub(crate) fn email_index_key(email: &str) -> String {
    urlencoding::encode(&normalize_email(email)).into_owned()
}

/// A client clone whose reads run inside `transaction`.
///
/// Reads through it register the documents for conflict detection, so a
/// concurrent writer forces the transaction to fail instead of losing an
/// update.
pub(crate) fn transactional_reader(
    client: &firestore::FirestoreDb,
    transaction: &firestore::FirestoreTransaction<'_>,
) -> firestore::FirestoreDb {
    client.clone_with_consistency_selector(firestore::FirestoreConsistencySelector::Transaction(
        transaction.transaction_id().clone(),
    ))
}
