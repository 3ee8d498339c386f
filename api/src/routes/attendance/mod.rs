//! `/api/attendance` route group.
//!
//! - `POST /events` → ingest one scan (kiosk or name terminal)
//! - `POST /sessions/{session_id}/note` → staff annotation
//! - `GET  /classes/{class_id}/summary?date=YYYY-MM-DD` → day report for a class

use axum::{
    Extension, Router,
    routing::{get, post},
};
use services::AttendanceEngine;
use std::sync::Arc;
use util::state::AppState;

mod common;
mod get;
mod post;

pub use common::status_for;
pub use get::class_summary;
pub use post::{annotate_session, record_event};

/// Every handler shares `engine`, so collaborators such as the gateway client
/// are built once per server.
pub fn attendance_routes(engine: Arc<AttendanceEngine>) -> Router<AppState> {
    Router::new()
        .route("/events", post(record_event))
        .route("/sessions/{session_id}/note", post(annotate_session))
        .route("/classes/{class_id}/summary", get(class_summary))
        .layer(Extension(engine))
}
