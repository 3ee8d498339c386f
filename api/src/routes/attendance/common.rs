use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use services::{AttendanceError, ScanFailure};

use crate::response::ApiResponse;

#[derive(Debug, Deserialize)]
pub struct NoteReq {
    pub note: String,
    pub actor_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct SummaryQuery {
    /// Campus-local day; today when omitted.
    pub date: Option<chrono::NaiveDate>,
}

/// HTTP status for a rejected operation.
pub fn status_for(err: &AttendanceError) -> StatusCode {
    match err {
        AttendanceError::DuplicateCheckIn { .. } | AttendanceError::NoOpenSession { .. } => {
            StatusCode::CONFLICT
        }
        AttendanceError::IdentityNotFound | AttendanceError::NotFound(_) => StatusCode::NOT_FOUND,
        AttendanceError::FingerprintLocked { .. }
        | AttendanceError::NotEnrolled { .. }
        | AttendanceError::FrozenRecord { .. } => StatusCode::FORBIDDEN,
        AttendanceError::CorrectionWindowExpired { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        AttendanceError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        AttendanceError::TransientStorageError(_) => StatusCode::SERVICE_UNAVAILABLE,
        AttendanceError::ScheduleUnavailable { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// `ApiResponse<ScanFailure>` with the status matching `err`.
pub fn failure_response(err: &AttendanceError) -> Response {
    let status = status_for(err);
    if status.is_server_error() {
        tracing::error!(code = err.code(), error = %err, "attendance request failed");
    } else {
        tracing::info!(code = err.code(), error = %err, "attendance request rejected");
    }
    (
        status,
        Json(ApiResponse::failure(ScanFailure::from(err), err.to_string())),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicates_are_conflicts_and_locks_are_forbidden() {
        assert_eq!(
            status_for(&AttendanceError::DuplicateCheckIn { student_name: "A".into() }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_for(&AttendanceError::FingerprintLocked { student_name: "A".into() }),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status_for(&AttendanceError::CorrectionWindowExpired { window_seconds: 300 }),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_for(&AttendanceError::TransientStorageError("x".into())),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
