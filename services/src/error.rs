//! Failure taxonomy of the attendance engine.
//!
//! Every rejection a scan can produce is a variant here, with a stable
//! machine-readable [`code`](AttendanceError::code) that terminals and the HTTP
//! layer switch on. Storage failures are the only retryable kind.

use sea_orm::{DbErr, SqlErr};
use std::future::Future;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AttendanceError {
    #[error("No student or room activator matches this scan")]
    IdentityNotFound,

    #[error("Fingerprint access for {student_name} is locked")]
    FingerprintLocked { student_name: String },

    #[error("{student_name} is not enrolled in this class")]
    NotEnrolled { student_name: String },

    #[error("{student_name} already has a session for this class today")]
    DuplicateCheckIn { student_name: String },

    #[error("{student_name} has no open session to check out of")]
    NoOpenSession { student_name: String },

    #[error("Corrections are only accepted within {window_seconds} seconds of the original scan")]
    CorrectionWindowExpired { window_seconds: i64 },

    #[error("Class {class_id} has no usable schedule")]
    ScheduleUnavailable { class_id: i64 },

    #[error("Storage is temporarily unavailable: {0}")]
    TransientStorageError(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Session {session_id} is frozen and may only be annotated by an administrator")]
    FrozenRecord { session_id: i64 },
}

impl AttendanceError {
    /// Stable identifier, safe to match on from clients.
    pub fn code(&self) -> &'static str {
        match self {
            Self::IdentityNotFound => "identity_not_found",
            Self::FingerprintLocked { .. } => "fingerprint_locked",
            Self::NotEnrolled { .. } => "not_enrolled",
            Self::DuplicateCheckIn { .. } => "duplicate_check_in",
            Self::NoOpenSession { .. } => "no_open_session",
            Self::CorrectionWindowExpired { .. } => "correction_window_expired",
            Self::ScheduleUnavailable { .. } => "schedule_unavailable",
            Self::TransientStorageError(_) => "transient_storage_error",
            Self::InvalidRequest(_) => "invalid_request",
            Self::NotFound(_) => "not_found",
            Self::FrozenRecord { .. } => "frozen_record",
        }
    }

    /// Duplicate or out-of-sequence scans. Terminals show a softer "already recorded" screen.
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::DuplicateCheckIn { .. } | Self::NoOpenSession { .. })
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TransientStorageError(_))
    }

    /// Display name of the student the failure concerns, when it was resolved.
    pub fn student_name(&self) -> Option<&str> {
        match self {
            Self::FingerprintLocked { student_name }
            | Self::NotEnrolled { student_name }
            | Self::DuplicateCheckIn { student_name }
            | Self::NoOpenSession { student_name } => Some(student_name),
            _ => None,
        }
    }
}

impl From<DbErr> for AttendanceError {
    fn from(err: DbErr) -> Self {
        AttendanceError::TransientStorageError(err.to_string())
    }
}

/// `true` when `err` is a unique-index violation rather than an outage.
pub fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

/// Runs `op`, retrying exactly once if it fails with a storage error.
///
/// Domain errors are returned as-is on the first attempt.
pub async fn with_storage_retry<T, F, Fut>(label: &str, mut op: F) -> Result<T, AttendanceError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AttendanceError>>,
{
    match op().await {
        Err(err) if err.is_transient() => {
            tracing::warn!(op = label, error = %err, "storage error, retrying once");
            op().await
        }
        other => other,
    }
}
