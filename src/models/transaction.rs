// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Bank-transfer payment transactions and the payment reference counter.

use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// First payment reference handed out ("0100").
pub const FIRST_PAYMENT_REF: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    #[default]
    Pending,
    Confirmed,
    Rejected,
}

impl TransactionStatus {
    /// Only pending transactions can be reviewed; review outcomes are final.
    pub fn can_transition_to(self, next: TransactionStatus) -> bool {
        matches!(
            (self, next),
            (TransactionStatus::Pending, TransactionStatus::Confirmed)
                | (TransactionStatus::Pending, TransactionStatus::Rejected)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Confirmed => "confirmed",
            TransactionStatus::Rejected => "rejected",
        }
    }
}

/// What a transaction pays for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
    Course,
    OnlinePackage,
}

/// Payment transaction stored in Firestore.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Transaction {
    /// Transaction ID (also used as document ID)
    pub id: String,
    pub user_id: String,
    pub user_email: String,
    pub item_type: ItemType,
    pub item_id: String,
    /// Item title at purchase time
    pub item_title: String,
    /// Amount in whole dinars
    pub amount: u32,
    pub currency: String,
    #[serde(default)]
    pub status: TransactionStatus,
    /// Four-digit reference the payer writes on the bank transfer
    pub payment_ref: String,
    pub created_at: String,
    #[serde(default)]
    pub reviewed_at: Option<String>,
    /// Admin uid that confirmed or rejected the payment
    #[serde(default)]
    pub reviewed_by: Option<String>,
    #[serde(default)]
    pub rejection_reason: Option<String>,
}

/// Counter document at `system/paymentCounter`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PaymentCounter {
    /// Last reference handed out
    pub current: u32,
}

impl PaymentCounter {
    /// Reference that follows the stored counter value.
    ///
    /// A missing or out-of-range counter starts at [`FIRST_PAYMENT_REF`].
    /// References are never reused: past 9999 they grow a fifth digit.
    pub fn next_value(counter: Option<&PaymentCounter>) -> u32 {
        match counter.map(|c| c.current) {
            Some(current) if current >= FIRST_PAYMENT_REF => current.saturating_add(1),
            _ => FIRST_PAYMENT_REF,
        }
    }
}

/// Render a counter value as a reference of at least four digits.
pub fn format_payment_ref(value: u32) -> String {
    format!("{:04}", value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_reference_is_0100() {
        let value = PaymentCounter::next_value(None);
        assert_eq!(format_payment_ref(value), "0100");
    }

    #[test]
    fn test_references_strictly_increase() {
        let mut counter = PaymentCounter::default();
        let mut previous = String::new();
        for _ in 0..5 {
            counter.current = PaymentCounter::next_value(Some(&counter));
            let reference = format_payment_ref(counter.current);
            assert_eq!(reference.len(), 4);
            assert!(reference > previous, "{} should follow {}", reference, previous);
            previous = reference;
        }
        assert_eq!(previous, "0104");
    }

    #[test]
    fn test_counter_never_reuses_after_9999() {
        let counter = PaymentCounter { current: 9998 };
        assert_eq!(format_payment_ref(PaymentCounter::next_value(Some(&counter))), "9999");

        let counter = PaymentCounter { current: 9999 };
        let next = PaymentCounter::next_value(Some(&counter));
        assert_eq!(format_payment_ref(next), "10000");
        assert_ne!(format_payment_ref(next), format_payment_ref(PaymentCounter::next_value(None)));
    }

    #[test]
    fn test_review_is_final() {
        use TransactionStatus::*;
        assert!(Pending.can_transition_to(Confirmed));
        assert!(Pending.can_transition_to(Rejected));
        assert!(!Confirmed.can_transition_to(Rejected));
        assert!(!Rejected.can_transition_to(Confirmed));
        assert!(!Confirmed.can_transition_to(Pending));
        assert!(!Pending.can_transition_to(Pending));
    }
}
