// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Admin routes. `require_auth` and `require_admin` are applied in
//! routes/mod.rs for everything merged here.

mod courses;
mod online;
mod payments;
mod users;

use crate::AppState;
use axum::Router;
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .merge(users::routes())
        .merge(courses::routes())
        .merge(payments::routes())
        .merge(online::routes())
}
