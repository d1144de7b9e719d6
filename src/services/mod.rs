// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod classes;
pub mod email;
pub mod password;
pub mod payment;
pub mod storage;
pub mod verification;

pub use email::{Mailer, OutgoingEmail};
pub use payment::{Invoice, PaymentSlip};
pub use storage::VideoStorage;
