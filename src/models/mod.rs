// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod course;
pub mod online;
pub mod transaction;
pub mod user;

pub use course::{Course, CourseStatus, CourseType, Lesson, Material, Module, UserCourse};
pub use online::{
    Enrollment, EnrollmentStatus, Group, GroupSchedule, OnlinePackage, Session, SessionStatus,
};
pub use transaction::{ItemType, PaymentCounter, Transaction, TransactionStatus};
pub use user::{Credentials, Role, User};
