// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Učionica: backend API for a Serbian-language online school.
//!
//! Sells recorded video courses and packages of live online classes paid
//! by bank transfer, streams lesson videos from R2, and tracks class
//! credits for scheduled group sessions.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use dashmap::DashMap;
use db::FirestoreDb;
use services::{Mailer, VideoStorage};
use std::time::Instant;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: FirestoreDb,
    pub storage: VideoStorage,
    pub mailer: Mailer,
    /// Last verification email per user, for the resend cooldown
    pub resend_cooldowns: DashMap<String, Instant>,
}
