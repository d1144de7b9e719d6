// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Payment review: confirming or rejecting bank transfers.

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::error::Result;
use crate::middleware::auth::AuthUser;
use crate::models::{Enrollment, Transaction, TransactionStatus};
use crate::routes::validated::ValidatedJson;
use crate::services::email;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/admin/transactions", get(list_transactions))
        .route("/api/admin/transactions/{id}/confirm", post(confirm))
        .route("/api/admin/transactions/{id}/reject", post(reject))
}

#[derive(Debug, Deserialize)]
struct TransactionsQuery {
    status: Option<TransactionStatus>,
}

async fn list_transactions(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TransactionsQuery>,
) -> Result<Json<Vec<Transaction>>> {
    Ok(Json(state.db.list_transactions(query.status).await?))
}

#[derive(Debug, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ConfirmResponse {
    pub transaction: Transaction,
    /// Created for online-package purchases
    pub enrollment: Option<Enrollment>,
}

async fn confirm(
    State(state): State<Arc<AppState>>,
    Extension(admin): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<ConfirmResponse>> {
    let confirmed = state.db.confirm_transaction(&id, &admin.uid).await?;

    state
        .mailer
        .send_best_effort(email::payment_confirmed_email(&confirmed.transaction))
        .await;
    if let Some(enrollment) = &confirmed.enrollment {
        state
            .mailer
            .send_best_effort(email::enrollment_activated_email(enrollment))
            .await;
    }

    Ok(Json(ConfirmResponse {
        transaction: confirmed.transaction,
        enrollment: confirmed.enrollment,
    }))
}

#[derive(Debug, Deserialize, Validate)]
pub struct RejectRequest {
    #[validate(length(min = 1, max = 500))]
    pub reason: String,
}

async fn reject(
    State(state): State<Arc<AppState>>,
    Extension(admin): Extension<AuthUser>,
    Path(id): Path<String>,
    ValidatedJson(req): ValidatedJson<RejectRequest>,
) -> Result<Json<Transaction>> {
    let transaction = state
        .db
        .reject_transaction(&id, &admin.uid, req.reason.trim())
        .await?;

    state
        .mailer
        .send_best_effort(email::payment_rejected_email(&transaction))
        .await;

    Ok(Json(transaction))
}
