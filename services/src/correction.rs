//! Short-window self-service corrections.
//!
//! A student who scanned the wrong way (in instead of out, or the other way
//! round) can redo the scan within a few minutes. The original row is never
//! edited; it is voided and a replacement carrying `corrects_session_id` takes
//! over the key.

use chrono::{DateTime, Duration, Utc};
use db::models::attendance_session::{Model as Session, NewSession};
use db::models::{class, student};
use sea_orm::DatabaseConnection;
use util::config;

use crate::actor::Actor;
use crate::error::AttendanceError;
use crate::grading::{Schedule, check_out_status};
use crate::ledger::SessionLedger;
use crate::router::ScanKind;

#[derive(Debug, Clone, Copy)]
pub struct CorrectionRequest {
    pub corrects_session_id: i64,
    /// `TimeIn` leaves the replacement open, `TimeOut` closes it immediately.
    pub kind: ScanKind,
    pub actor: Option<Actor>,
}

#[derive(Debug, Clone)]
pub struct Corrected {
    pub voided: Session,
    pub replacement: Session,
    pub student: student::Model,
    pub class: class::Model,
}

#[derive(Debug, Clone, Copy)]
pub struct CorrectionManager {
    window: Duration,
}

impl CorrectionManager {
    pub fn new(window: Duration) -> Self {
        Self { window }
    }

    pub fn from_config() -> Self {
        Self::new(Duration::seconds(config::correction_window_seconds()))
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub async fn apply(
        &self,
        db: &DatabaseConnection,
        ledger: &SessionLedger,
        request: CorrectionRequest,
        now: DateTime<Utc>,
    ) -> Result<Corrected, AttendanceError> {
        let id = request.corrects_session_id;
        let original = match ledger.find_by_id(db, id).await? {
            Some(s) if !s.is_voided() => s,
            _ => return Err(AttendanceError::NotFound(format!("Session {id}"))),
        };

        if now - original.check_in_at > self.window {
            return Err(AttendanceError::CorrectionWindowExpired {
                window_seconds: self.window.num_seconds(),
            });
        }

        let class = class::Model::get_by_id(db, original.class_id)
            .await?
            .ok_or_else(|| AttendanceError::NotFound(format!("Class {}", original.class_id)))?;
        let student = student::Model::get_by_id(db, original.student_id)
            .await?
            .ok_or_else(|| AttendanceError::NotFound(format!("Student {}", original.student_id)))?;

        let (check_out_at, status) = match request.kind {
            ScanKind::TimeIn => (None, original.status),
            ScanKind::TimeOut => {
                let schedule = Schedule::from(&class);
                (Some(now), check_out_status(&original, now, &schedule, ledger.tz()))
            }
            ScanKind::RoomControl => {
                return Err(AttendanceError::InvalidRequest(
                    "room control scans cannot be corrected".into(),
                ));
            }
        };

        let replacement = NewSession {
            student_id: original.student_id,
            class_id: original.class_id,
            session_day: original.session_day,
            check_in_at: now,
            check_out_at,
            status,
            entry_method: original.entry_method,
            corrects_session_id: Some(original.id),
            created_by: request.actor.map(|a| a.user_id).or(original.created_by),
        };

        let (voided, replacement) = ledger
            .void_and_replace(db, original.id, replacement, now)
            .await?;
        tracing::info!(
            original = voided.id,
            replacement = replacement.id,
            kind = %request.kind,
            "session corrected"
        );

        Ok(Corrected {
            voided,
            replacement,
            student,
            class,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{Campus, at, campus, utc};
    use db::models::attendance_session::{AttendanceStatus, EntryMethod};
    use serial_test::serial;
    use util::config::AppConfig;

    fn manager() -> CorrectionManager {
        CorrectionManager::new(Duration::minutes(5))
    }

    fn ledger() -> SessionLedger {
        SessionLedger::new(utc(), Duration::hours(48))
    }

    async fn checked_in(c: &Campus) -> Session {
        ledger()
            .create_check_in(
                &c.db,
                &c.ada,
                c.class.id,
                EntryMethod::Biometric,
                at(8, 5),
                AttendanceStatus::Present,
                None,
            )
            .await
            .unwrap()
    }

    fn request(id: i64, kind: ScanKind) -> CorrectionRequest {
        CorrectionRequest {
            corrects_session_id: id,
            kind,
            actor: None,
        }
    }

    #[tokio::test]
    async fn correction_inside_window_replaces_session() {
        let c = campus().await;
        let original = checked_in(&c).await;
        let now = at(8, 5) + Duration::seconds(4 * 60 + 59);

        let done = manager()
            .apply(&c.db, &ledger(), request(original.id, ScanKind::TimeIn), now)
            .await
            .unwrap();

        assert!(done.voided.is_voided());
        assert_eq!(done.voided.original_check_in_at, Some(at(8, 5)));
        assert_eq!(done.replacement.corrects_session_id, Some(original.id));
        assert!(done.replacement.is_correction);
        assert_eq!(done.replacement.check_in_at, now);
        assert_eq!(done.replacement.session_day, original.session_day);
        assert_eq!(done.replacement.status, original.status);
        assert!(done.replacement.is_open());

        let live = ledger()
            .find_open_session(&c.db, c.ada.id, c.class.id, original.session_day)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(live.id, done.replacement.id);

        let history =
            Session::history_for_key(&c.db, c.ada.id, c.class.id, original.session_day)
                .await
                .unwrap();
        assert_eq!(history.len(), 2);
        let (voided, active): (Vec<_>, Vec<_>) = history.iter().partition(|s| s.is_voided());
        assert_eq!(voided.len(), 1);
        assert_eq!(active.len(), 1);
        assert_eq!(voided[0].id, original.id);
        assert_eq!(active[0].corrects_session_id, Some(voided[0].id));
    }

    #[tokio::test]
    async fn correction_after_window_is_refused() {
        let c = campus().await;
        let original = checked_in(&c).await;
        let now = at(8, 5) + Duration::seconds(5 * 60 + 1);

        let err = manager()
            .apply(&c.db, &ledger(), request(original.id, ScanKind::TimeIn), now)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "correction_window_expired");

        let untouched = ledger().find_by_id(&c.db, original.id).await.unwrap().unwrap();
        assert!(!untouched.is_voided());
        assert!(untouched.is_open());
        assert_eq!(untouched.check_in_at, original.check_in_at);

        let history =
            Session::history_for_key(&c.db, c.ada.id, c.class.id, original.session_day)
                .await
                .unwrap();
        assert_eq!(history.len(), 1);
    }

    #[tokio::test]
    async fn time_out_correction_closes_and_regrades() {
        let c = campus().await;
        let original = checked_in(&c).await;
        let now = at(8, 8);

        let done = manager()
            .apply(&c.db, &ledger(), request(original.id, ScanKind::TimeOut), now)
            .await
            .unwrap();
        assert_eq!(done.replacement.check_out_at, Some(now));
        // leaving at 08:08 for a class ending at 10:00
        assert_eq!(done.replacement.status, AttendanceStatus::Absent);
    }

    #[tokio::test]
    async fn voided_or_missing_sessions_cannot_be_corrected() {
        let c = campus().await;
        let original = checked_in(&c).await;
        manager()
            .apply(&c.db, &ledger(), request(original.id, ScanKind::TimeIn), at(8, 6))
            .await
            .unwrap();

        let again = manager()
            .apply(&c.db, &ledger(), request(original.id, ScanKind::TimeIn), at(8, 7))
            .await
            .unwrap_err();
        assert_eq!(again.code(), "not_found");

        let missing = manager()
            .apply(&c.db, &ledger(), request(9999, ScanKind::TimeIn), at(8, 7))
            .await
            .unwrap_err();
        assert_eq!(missing.code(), "not_found");
    }

    #[tokio::test]
    async fn actor_is_recorded_on_replacement() {
        let c = campus().await;
        let original = checked_in(&c).await;
        let req = CorrectionRequest {
            actor: Some(Actor {
                user_id: c.lecturer.id,
                privileged: false,
            }),
            ..request(original.id, ScanKind::TimeIn)
        };
        let done = manager().apply(&c.db, &ledger(), req, at(8, 6)).await.unwrap();
        assert_eq!(done.replacement.created_by, Some(c.lecturer.id));
    }

    #[test]
    #[serial]
    fn window_comes_from_configuration() {
        AppConfig::set_correction_window_seconds(90);
        assert_eq!(CorrectionManager::from_config().window(), Duration::seconds(90));
        AppConfig::reset();
    }
}
