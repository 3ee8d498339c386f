use axum::{
    Extension, Json,
    extract::Path,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use services::{AttendanceEngine, ScanEvent};
use services::router::ScanAction;
use std::sync::Arc;

use super::common::{NoteReq, failure_response};
use crate::response::ApiResponse;

/// POST /api/attendance/events
///
/// Ingests one scan. The body is a [`ScanEvent`]; the server's clock decides
/// the grading time.
///
/// ### Responses
/// - `200 OK` with a `ScanOutcome`
/// - `409 Conflict` for a duplicate check-in or a check-out without an open session
///   (`data.duplicate == true` for both)
/// - `404 Not Found` when the scan matches no one, or a correction targets an unknown session
/// - `403 Forbidden` for a locked fingerprint or a student not enrolled in the class
/// - `422 Unprocessable Entity` when the correction window has passed
/// - `400 Bad Request` for malformed or contradictory scans
/// - `503 Service Unavailable` when storage stayed unreachable after a retry
pub async fn record_event(
    Extension(engine): Extension<Arc<AttendanceEngine>>,
    Json(event): Json<ScanEvent>,
) -> Response {
    match engine.handle(&event).await {
        Ok(outcome) => {
            let message = match outcome.action {
                ScanAction::TimeIn => "Checked in",
                ScanAction::TimeOut => "Checked out",
                ScanAction::ActivatorTrigger => "Room toggled",
                ScanAction::Correction => "Scan corrected",
            };
            (StatusCode::OK, Json(ApiResponse::success(outcome, message))).into_response()
        }
        Err(err) => failure_response(&err),
    }
}

/// POST /api/attendance/sessions/{session_id}/note
///
/// Body: `{ "note": "...", "actor_id": 3 }`. Only administrators may annotate
/// sessions older than the freeze age.
pub async fn annotate_session(
    Extension(engine): Extension<Arc<AttendanceEngine>>,
    Path(session_id): Path<i64>,
    Json(body): Json<NoteReq>,
) -> Response {
    match engine.annotate(session_id, body.actor_id, &body.note).await {
        Ok(session) => (
            StatusCode::OK,
            Json(ApiResponse::success(session, "Note saved")),
        )
            .into_response(),
        Err(err) => failure_response(&err),
    }
}
