// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Bank-transfer slips and invoices derived from transactions.

use serde::Serialize;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::config::PaymentConfig;
use crate::error::AppError;
use crate::models::{ItemType, Transaction, TransactionStatus};

/// Fields the payer copies onto the bank-transfer slip (uplatnica).
#[derive(Debug, Clone, Serialize, PartialEq)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct PaymentSlip {
    pub transaction_id: String,
    pub recipient: String,
    pub recipient_address: String,
    pub account: String,
    pub amount: u32,
    pub currency: String,
    pub purpose: String,
    pub payment_ref: String,
    pub status: TransactionStatus,
}

impl PaymentSlip {
    pub fn new(transaction: &Transaction, payment: &PaymentConfig) -> Self {
        Self {
            transaction_id: transaction.id.clone(),
            recipient: payment.recipient.clone(),
            recipient_address: payment.address.clone(),
            account: payment.account.clone(),
            amount: transaction.amount,
            currency: transaction.currency.clone(),
            purpose: transaction.item_title.clone(),
            payment_ref: transaction.payment_ref.clone(),
            status: transaction.status,
        }
    }
}

/// Invoice data for a confirmed purchase. Rendering happens client-side.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Invoice {
    pub invoice_number: String,
    pub issued_at: String,
    pub seller: String,
    pub seller_address: String,
    pub seller_account: String,
    pub buyer_email: String,
    pub item_type: ItemType,
    pub item_title: String,
    pub amount: u32,
    pub currency: String,
    pub payment_ref: String,
}

/// Build the invoice for a transaction. Only confirmed payments are invoiced.
///
/// The invoice number is `{year}-{payment_ref}`, with the year taken from
/// the confirmation date (falling back to the creation date).
pub fn build_invoice(transaction: &Transaction, payment: &PaymentConfig) -> Result<Invoice, AppError> {
    if transaction.status != TransactionStatus::Confirmed {
        return Err(AppError::FailedPrecondition(
            "Invoice is available only for confirmed payments".to_string(),
        ));
    }

    let issued_at = transaction
        .reviewed_at
        .clone()
        .unwrap_or_else(|| transaction.created_at.clone());
    let year = issued_at
        .get(..4)
        .filter(|y| y.bytes().all(|b| b.is_ascii_digit()))
        .ok_or_else(|| {
            AppError::Internal(anyhow::anyhow!(
                "Transaction {} has malformed timestamp {}",
                transaction.id,
                issued_at
            ))
        })?
        .to_string();

    Ok(Invoice {
        invoice_number: format!("{}-{}", year, transaction.payment_ref),
        issued_at,
        seller: payment.recipient.clone(),
        seller_address: payment.address.clone(),
        seller_account: payment.account.clone(),
        buyer_email: transaction.user_email.clone(),
        item_type: transaction.item_type,
        item_title: transaction.item_title.clone(),
        amount: transaction.amount,
        currency: transaction.currency.clone(),
        payment_ref: transaction.payment_ref.clone(),
    })
}
