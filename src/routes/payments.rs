// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Bank-transfer purchases for the signed-in user.

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{ItemType, Transaction, TransactionStatus};
use crate::services::email;
use crate::services::payment::{build_invoice, Invoice, PaymentSlip};
use crate::time_utils::now_rfc3339;
use crate::AppState;

/// All prices are in Serbian dinars.
pub const CURRENCY: &str = "RSD";

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/payments", post(create_payment).get(list_payments))
        .route("/api/payments/{id}/invoice", get(get_invoice))
}

#[derive(Debug, Deserialize)]
pub struct CreatePaymentRequest {
    pub item_type: ItemType,
    pub item_id: String,
}

#[derive(Debug, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct CreatePaymentResponse {
    pub slip: PaymentSlip,
    /// True when an earlier pending payment for the same item was returned
    pub existing: bool,
}

/// What is being bought, resolved from the catalog.
struct PurchasableItem {
    title: String,
    price: u32,
}

async fn resolve_item(state: &AppState, uid: &str, req: &CreatePaymentRequest) -> Result<PurchasableItem> {
    match req.item_type {
        ItemType::Course => {
            let course = state
                .db
                .get_course(&req.item_id)
                .await?
                .filter(|c| c.is_active())
                .ok_or_else(|| AppError::NotFound(format!("Course {} not found", req.item_id)))?;

            if state.db.has_course_access(uid, &course.id).await? {
                return Err(AppError::AlreadyExists(
                    "You already own this course".to_string(),
                ));
            }

            Ok(PurchasableItem {
                title: course.title,
                price: course.price,
            })
        }
        ItemType::OnlinePackage => {
            let package = state
                .db
                .get_package(&req.item_id)
                .await?
                .filter(|p| p.active)
                .ok_or_else(|| {
                    AppError::NotFound(format!("Package {} not found", req.item_id))
                })?;

            Ok(PurchasableItem {
                title: package.name,
                price: package.price,
            })
        }
    }
}

/// Start a bank-transfer purchase and return the payment slip.
///
/// A pending payment for the same item is reused, so asking twice never
/// burns a second reference.
async fn create_payment(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Json(req): Json<CreatePaymentRequest>,
) -> Result<Json<CreatePaymentResponse>> {
    if req.item_id.trim().is_empty() {
        return Err(AppError::InvalidArgument("item_id is required".to_string()));
    }

    let user = state.db.get_active_user(&auth.uid).await?;
    let item = resolve_item(&state, &user.uid, &req).await?;

    if let Some(pending) = state
        .db
        .find_pending_transaction(&user.uid, &req.item_id)
        .await?
    {
        tracing::info!(transaction_id = %pending.id, "Reusing pending payment");
        return Ok(Json(CreatePaymentResponse {
            slip: PaymentSlip::new(&pending, &state.config.payment),
            existing: true,
        }));
    }

    let transaction = state
        .db
        .create_pending_transaction(Transaction {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user.uid.clone(),
            user_email: user.email.clone(),
            item_type: req.item_type,
            item_id: req.item_id.clone(),
            item_title: item.title,
            amount: item.price,
            currency: CURRENCY.to_string(),
            status: TransactionStatus::Pending,
            payment_ref: String::new(),
            created_at: now_rfc3339(),
            reviewed_at: None,
            reviewed_by: None,
            rejection_reason: None,
        })
        .await?;

    state
        .mailer
        .send_best_effort(email::payment_instructions_email(
            &transaction,
            &state.config.payment,
        ))
        .await;

    Ok(Json(CreatePaymentResponse {
        slip: PaymentSlip::new(&transaction, &state.config.payment),
        existing: false,
    }))
}

async fn list_payments(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<Vec<Transaction>>> {
    Ok(Json(state.db.list_transactions_for_user(&auth.uid).await?))
}

/// Invoice for a confirmed payment (owner or admin).
async fn get_invoice(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<Invoice>> {
    let transaction = state
        .db
        .get_transaction(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Transaction {} not found", id)))?;

    if transaction.user_id != auth.uid && !auth.is_admin() {
        return Err(AppError::PermissionDenied(
            "Not your transaction".to_string(),
        ));
    }

    Ok(Json(build_invoice(&transaction, &state.config.payment)?))
}
