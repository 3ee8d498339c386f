//! HTTP route entry point for `/api/...`.
//!
//! Route groups:
//! - `/health` → Health check endpoint
//! - `/attendance` → Scan ingestion, session notes and class summaries

use crate::routes::{attendance::attendance_routes, health::health_routes};
use axum::Router;
use services::AttendanceEngine;
use std::sync::Arc;
use util::state::AppState;

pub mod attendance;
pub mod health;

/// Builds the `/api` router with `app_state` already applied.
pub fn routes(app_state: AppState, engine: Arc<AttendanceEngine>) -> Router {
    Router::new()
        .nest("/health", health_routes())
        .nest("/attendance", attendance_routes(engine))
        .with_state(app_state)
}
