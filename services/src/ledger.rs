//! The session ledger: the only writer of `attendance_sessions`.
//!
//! It owns day scoping (the campus clock decides which day a scan belongs to)
//! and maps storage-level races onto the domain errors terminals understand.
//! Callers hand it a connection or a transaction; nothing here opens its own,
//! except [`SessionLedger::void_and_replace`], which must be atomic.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Utc};
use db::models::attendance_session::{
    AttendanceStatus, EntryMethod, Model as Session, NewSession,
};
use db::models::{student, user};
use sea_orm::{ConnectionTrait, DatabaseConnection, TransactionTrait};
use util::config;

use crate::actor::Actor;
use crate::error::{AttendanceError, is_unique_violation};
use crate::grading::local_day;

#[derive(Debug, Clone, Copy)]
pub struct SessionLedger {
    tz: FixedOffset,
    frozen_after: Duration,
}

impl SessionLedger {
    pub fn new(tz: FixedOffset, frozen_after: Duration) -> Self {
        Self { tz, frozen_after }
    }

    /// Campus time zone and freeze age from the global configuration.
    pub fn from_config() -> Self {
        Self::new(
            config::timezone(),
            Duration::hours(config::frozen_after_hours()),
        )
    }

    pub fn tz(&self) -> FixedOffset {
        self.tz
    }

    pub fn day_of(&self, at: DateTime<Utc>) -> NaiveDate {
        local_day(at, self.tz)
    }

    pub async fn find_by_id<C: ConnectionTrait>(
        &self,
        db: &C,
        id: i64,
    ) -> Result<Option<Session>, AttendanceError> {
        Ok(Session::get_by_id(db, id).await?)
    }

    pub async fn find_open_session<C: ConnectionTrait>(
        &self,
        db: &C,
        student_id: i64,
        class_id: i64,
        day: NaiveDate,
    ) -> Result<Option<Session>, AttendanceError> {
        Ok(Session::find_open(db, student_id, class_id, day).await?)
    }

    pub async fn has_any_session<C: ConnectionTrait>(
        &self,
        db: &C,
        student_id: i64,
        class_id: i64,
        day: NaiveDate,
    ) -> Result<bool, AttendanceError> {
        Ok(Session::exists_for_day(db, student_id, class_id, day).await?)
    }

    /// Opens the day's session for `student` in `class_id`.
    ///
    /// A second check-in on the same day is rejected whether the first session
    /// is still open or already closed, and whatever the entry method.
    pub async fn create_check_in<C: ConnectionTrait>(
        &self,
        db: &C,
        student: &student::Model,
        class_id: i64,
        entry_method: EntryMethod,
        at: DateTime<Utc>,
        status: AttendanceStatus,
        created_by: Option<i64>,
    ) -> Result<Session, AttendanceError> {
        let day = self.day_of(at);
        let duplicate = || AttendanceError::DuplicateCheckIn {
            student_name: student.full_name.clone(),
        };

        if self.has_any_session(db, student.id, class_id, day).await? {
            return Err(duplicate());
        }

        let new = NewSession {
            student_id: student.id,
            class_id,
            session_day: day,
            check_in_at: at,
            check_out_at: None,
            status,
            entry_method,
            corrects_session_id: None,
            created_by,
        };
        match Session::insert_live(db, new).await {
            Ok(session) => Ok(session),
            Err(err) if is_unique_violation(&err) => {
                tracing::info!(student_id = student.id, class_id, %day, "lost check-in race");
                Err(duplicate())
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Closes `session_id` at `at` with the graded `status`.
    pub async fn complete_check_out<C: ConnectionTrait>(
        &self,
        db: &C,
        session_id: i64,
        student: &student::Model,
        at: DateTime<Utc>,
        status: AttendanceStatus,
    ) -> Result<Session, AttendanceError> {
        Session::close(db, session_id, at, status)
            .await?
            .ok_or_else(|| AttendanceError::NoOpenSession {
                student_name: student.full_name.clone(),
            })
    }

    /// Voids `original_id` and inserts `replacement` as the key's live session.
    ///
    /// Both writes share one transaction; if either fails neither is visible.
    pub async fn void_and_replace(
        &self,
        db: &DatabaseConnection,
        original_id: i64,
        replacement: NewSession,
        at: DateTime<Utc>,
    ) -> Result<(Session, Session), AttendanceError> {
        let txn = db.begin().await?;

        let voided = Session::void(&txn, original_id, at)
            .await?
            .ok_or_else(|| AttendanceError::NotFound(format!("Session {original_id}")))?;

        let inserted = match Session::insert_live(&txn, replacement).await {
            Ok(session) => session,
            Err(err) if is_unique_violation(&err) => {
                return Err(AttendanceError::InvalidRequest(format!(
                    "another live session already holds the key of session {original_id}"
                )));
            }
            Err(err) => return Err(err.into()),
        };

        txn.commit().await?;
        Ok((voided, inserted))
    }

    /// Attaches a staff note to a session.
    ///
    /// Sessions older than the freeze age can only be annotated by an
    /// administrator. Annotating an `Absent` session that was not entered by an
    /// administrator marks it `ManuallyVerified`.
    pub async fn annotate<C: ConnectionTrait>(
        &self,
        db: &C,
        session_id: i64,
        actor: &Actor,
        note: &str,
        now: DateTime<Utc>,
    ) -> Result<Session, AttendanceError> {
        let note = note.trim();
        if note.is_empty() {
            return Err(AttendanceError::InvalidRequest("note must not be empty".into()));
        }

        let session = match self.find_by_id(db, session_id).await? {
            Some(s) if !s.is_voided() => s,
            _ => return Err(AttendanceError::NotFound(format!("Session {session_id}"))),
        };

        if !actor.privileged && now - session.check_in_at > self.frozen_after {
            return Err(AttendanceError::FrozenRecord { session_id });
        }

        let verify = session.status == AttendanceStatus::Absent
            && !entered_by_admin(db, session.created_by).await?;

        let updated = Session::set_note(
            db,
            session,
            note,
            actor.user_id,
            now,
            verify.then_some(AttendanceStatus::ManuallyVerified),
        )
        .await?;

        tracing::info!(session_id, actor = actor.user_id, verified = verify, "session annotated");
        Ok(updated)
    }

    pub async fn list_for_class_day<C: ConnectionTrait>(
        &self,
        db: &C,
        class_id: i64,
        day: NaiveDate,
    ) -> Result<Vec<Session>, AttendanceError> {
        Ok(Session::list_for_class_day(db, class_id, day).await?)
    }
}

async fn entered_by_admin<C: ConnectionTrait>(
    db: &C,
    created_by: Option<i64>,
) -> Result<bool, AttendanceError> {
    let Some(user_id) = created_by else {
        return Ok(false);
    };
    Ok(user::Model::get_by_id(db, user_id)
        .await?
        .map(|u| u.admin)
        .unwrap_or(false))
}
