use axum::{
    Extension, Json,
    extract::{Path, Query},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use services::AttendanceEngine;
use std::sync::Arc;

use super::common::{SummaryQuery, failure_response};
use crate::response::ApiResponse;

/// GET /api/attendance/classes/{class_id}/summary?date=YYYY-MM-DD
///
/// Tallies for the day plus every live session with its display status.
/// Check-ins too early to count are listed as `invalid` and left out of the
/// present/late/absent tallies.
pub async fn class_summary(
    Extension(engine): Extension<Arc<AttendanceEngine>>,
    Path(class_id): Path<i64>,
    Query(query): Query<SummaryQuery>,
) -> Response {    let day = query
        .date
        .unwrap_or_else(|| engine.ledger().day_of(Utc::now()));

    match engine.class_report(class_id, day).await {
        Ok(report) => (
            StatusCode::OK,
            Json(ApiResponse::success(report, "Attendance summary retrieved")),
        )
            .into_response(),
        Err(err) => failure_response(&err),
    }
}
