//! Single entry point for every scan a terminal sends.
//!
//! Classification order is fixed: a correction is handled as a correction even
//! if it also carries a fingerprint; a fingerprint wins over a typed name. The
//! time a scan is graded at is always the server's receive time.

use chrono::{DateTime, NaiveDate, Utc};
use db::models::attendance_session::{AttendanceStatus, EntryMethod, Model as Session};
use db::models::{class, student};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use util::state::AppState;

use crate::actor::Actor;
use crate::correction::{CorrectionManager, CorrectionRequest};
use crate::error::{AttendanceError, with_storage_retry};
use crate::grading::{
    AttendanceSummary, DisplayStatus, Schedule, check_in_status, check_out_status, display_status,
    summarize,
};
use crate::identity::{
    ClassScopedResolver, DirectTableResolver, Identity, NameLookup, NameResolver, ResolvedName,
    ensure_enrolled, resolve_biometric,
};
use crate::ledger::SessionLedger;
use crate::side_effects::{RoomToggle, SideEffectDispatcher};

/// What the terminal says the scan is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum ScanKind {
    #[strum(to_string = "time_in", serialize = "Time In")]
    TimeIn,
    #[strum(to_string = "time_out", serialize = "Time Out")]
    TimeOut,
    #[strum(to_string = "room_control", serialize = "Room Control")]
    RoomControl,
}

/// What the engine ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ScanAction {
    TimeIn,
    TimeOut,
    ActivatorTrigger,
    Correction,
}

/// A scan as posted by a kiosk or a name-entry terminal.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanEvent {
    pub attendance_type: String,
    /// Device clock reading. Never used for grading.
    #[serde(default)]
    pub timestamp: Option<serde_json::Value>,
    #[serde(default)]
    pub class_id: Option<i64>,
    #[serde(default)]
    pub instructor_id: Option<i64>,
    #[serde(default)]
    pub fingerprint_slot_id: Option<i32>,
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default)]
    pub student_name: Option<String>,
    #[serde(default)]
    pub class_name: Option<String>,
    #[serde(default)]
    pub is_correction: bool,
    #[serde(default)]
    pub corrects_log_id: Option<i64>,
    /// Overrides the method recorded on a new session.
    #[serde(default)]
    pub entry_method: Option<EntryMethod>,
    /// Staff user keying the entry in, if any.
    #[serde(default)]
    pub actor_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScanOutcome {
    /// Student name, or the activator's name for room toggles.
    pub student_name: String,
    pub status: Option<AttendanceStatus>,
    pub action: ScanAction,
    pub session_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room: Option<RoomToggle>,
}

impl ScanOutcome {
    fn for_session(student: &student::Model, session: &Session, action: ScanAction) -> Self {
        Self {
            student_name: student.full_name.clone(),
            status: Some(session.status),
            action,
            session_id: Some(session.id),
            room: None,
        }
    }
}

/// Wire shape of a rejected scan.
#[derive(Debug, Clone, Serialize)]
pub struct ScanFailure {
    pub code: &'static str,
    pub message: String,
    pub student_name: Option<String>,
    pub duplicate: bool,
}

impl From<&AttendanceError> for ScanFailure {
    fn from(err: &AttendanceError) -> Self {
        Self {
            code: err.code(),
            message: err.to_string(),
            student_name: err.student_name().map(str::to_owned),
            duplicate: err.is_duplicate(),
        }
    }
}

/// A session together with its dashboard label.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    #[serde(flatten)]
    pub session: Session,
    pub display_status: DisplayStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassDayReport {
    pub class_id: i64,
    pub class_name: String,
    pub day: NaiveDate,
    pub summary: AttendanceSummary,
    pub sessions: Vec<SessionView>,
}

pub struct AttendanceEngine {
    db: DatabaseConnection,
    ledger: SessionLedger,
    corrections: CorrectionManager,
    effects: SideEffectDispatcher,
    /// Tried in order for name-based scans; later entries are fallbacks.
    resolvers: Vec<Box<dyn NameResolver>>,
}

impl AttendanceEngine {
    pub fn new(
        db: DatabaseConnection,
        ledger: SessionLedger,
        corrections: CorrectionManager,
        effects: SideEffectDispatcher,
    ) -> Self {
        Self {
            db,
            ledger,
            corrections,
            effects,
            resolvers: vec![Box::new(ClassScopedResolver), Box::new(DirectTableResolver)],
        }
    }

    /// Engine wired to the configured clock, windows and default collaborators.
    pub fn from_state(state: &AppState) -> Self {
        Self::new(
            state.db_clone(),
            SessionLedger::from_config(),
            CorrectionManager::from_config(),
            SideEffectDispatcher::from_state(state),
        )
    }

    pub fn with_resolvers(mut self, resolvers: Vec<Box<dyn NameResolver>>) -> Self {
        self.resolvers = resolvers;
        self
    }

    pub fn ledger(&self) -> &SessionLedger {
        &self.ledger
    }

    pub async fn handle(&self, event: &ScanEvent) -> Result<ScanOutcome, AttendanceError> {
        self.handle_at(event, Utc::now()).await
    }

    /// Routes `event` as if it had been received at `now`.
    pub async fn handle_at(
        &self,
        event: &ScanEvent,
        now: DateTime<Utc>,
    ) -> Result<ScanOutcome, AttendanceError> {
        let kind: ScanKind = event.attendance_type.trim().parse().map_err(|_| {
            AttendanceError::InvalidRequest(format!(
                "unknown attendance type '{}'",
                event.attendance_type
            ))
        })?;

        if event.is_correction {
            return self.handle_correction(event, kind, now).await;
        }

        if let (Some(slot), Some(device_id)) =
            (event.fingerprint_slot_id, event.device_id.as_deref())
        {
            return self.handle_biometric(event, kind, device_id, slot, now).await;
        }

        match event.student_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => self.handle_by_name(event, kind, name, now).await,
            _ => Err(AttendanceError::InvalidRequest(
                "scan carries neither a fingerprint nor a student name".into(),
            )),
        }
    }

    async fn handle_correction(
        &self,
        event: &ScanEvent,
        kind: ScanKind,
        now: DateTime<Utc>,
    ) -> Result<ScanOutcome, AttendanceError> {
        let corrects_session_id = event.corrects_log_id.ok_or_else(|| {
            AttendanceError::InvalidRequest("corrects_log_id is required for corrections".into())
        })?;
        let actor = self.load_actor(event.actor_id).await?;

        let request = CorrectionRequest {
            corrects_session_id,
            kind,
            actor,
        };
        let done = with_storage_retry("apply_correction", || {
            self.corrections.apply(&self.db, &self.ledger, request, now)
        })
        .await?;

        self.effects
            .after_correction(&done.class, &done.student, &done.voided, &done.replacement)
            .await;
        Ok(ScanOutcome::for_session(
            &done.student,
            &done.replacement,
            ScanAction::Correction,
        ))
    }

    async fn handle_biometric(
        &self,
        event: &ScanEvent,
        kind: ScanKind,
        device_id: &str,
        slot: i32,
        now: DateTime<Utc>,
    ) -> Result<ScanOutcome, AttendanceError> {
        let db = &self.db;
        let identity =
            with_storage_retry("resolve_biometric", || resolve_biometric(db, device_id, slot))
                .await?;

        let student = match identity {
            Identity::Activator { user, binding } => {
                let toggle = self.effects.toggle_room(binding.room_id).await?;
                tracing::info!(user_id = user.id, room_id = binding.room_id, "activator scan");
                return Ok(ScanOutcome {
                    student_name: user.full_name,
                    status: None,
                    action: ScanAction::ActivatorTrigger,
                    session_id: None,
                    room: Some(toggle),
                });
            }
            Identity::Student(student) => student,
        };

        if kind == ScanKind::RoomControl {
            return Err(AttendanceError::InvalidRequest(
                "room control scans are reserved for room activators".into(),
            ));
        }

        let class_id = event
            .class_id
            .ok_or_else(|| AttendanceError::InvalidRequest("class_id is required".into()))?;
        let class = with_storage_retry("load_class", || async move {
            Ok(class::Model::get_by_id(db, class_id).await?)
        })
        .await?
        .ok_or_else(|| AttendanceError::NotFound(format!("Class {class_id}")))?;

        let student_ref = &student;
        with_storage_retry("ensure_enrolled", || ensure_enrolled(db, student_ref, class.id)).await?;

        let method = event.entry_method.unwrap_or(EntryMethod::Biometric);
        self.record(kind, &student, &class, method, None, now).await
    }

    async fn handle_by_name(
        &self,
        event: &ScanEvent,
        kind: ScanKind,
        name: &str,
        now: DateTime<Utc>,
    ) -> Result<ScanOutcome, AttendanceError> {
        if kind == ScanKind::RoomControl {
            return Err(AttendanceError::InvalidRequest(
                "room control scans are reserved for room activators".into(),
            ));
        }

        let lookup = NameLookup {
            student_name: name,
            class_id: event.class_id,
            class_name: event.class_name.as_deref(),
            instructor_id: event.instructor_id,
        };
        let ResolvedName { student, class } = self.resolve_name(&lookup).await?;

        let db = &self.db;
        let student_ref = &student;
        with_storage_retry("ensure_enrolled", || ensure_enrolled(db, student_ref, class.id)).await?;

        let actor = self.load_actor(event.actor_id).await?;
        let method = event.entry_method.unwrap_or(EntryMethod::ManualOverride);
        self.record(kind, &student, &class, method, actor.map(|a| a.user_id), now)
            .await
    }

    /// Tries each resolver in turn; storage outages stop the chain.
    async fn resolve_name(&self, lookup: &NameLookup<'_>) -> Result<ResolvedName, AttendanceError> {
        let mut last_err = AttendanceError::IdentityNotFound;
        for resolver in &self.resolvers {
            let resolved =
                with_storage_retry(resolver.label(), || resolver.resolve(&self.db, lookup)).await;
            match resolved {
                Ok(found) => return Ok(found),
                Err(err) if err.is_transient() => return Err(err),
                Err(err) => {
                    tracing::debug!(
                        resolver = resolver.label(),
                        error = %err,
                        "name resolution failed"
                    );
                    last_err = err;
                }
            }
        }
        Err(last_err)
    }

    async fn record(
        &self,
        kind: ScanKind,
        student: &student::Model,
        class: &class::Model,
        method: EntryMethod,
        created_by: Option<i64>,
        now: DateTime<Utc>,
    ) -> Result<ScanOutcome, AttendanceError> {
        let schedule = Schedule::from(class);
        let tz = self.ledger.tz();
        let db = &self.db;
        let ledger = &self.ledger;

        match kind {
            ScanKind::TimeIn => {
                let status = check_in_status(now, &schedule, tz);
                let session = with_storage_retry("create_check_in", || {
                    ledger.create_check_in(db, student, class.id, method, now, status, created_by)
                })
                .await?;

                tracing::info!(
                    session_id = session.id,
                    student_id = student.id,
                    class_id = class.id,
                    %status,
                    "checked in"
                );
                self.effects.after_check_in(class, student, &session).await;
                Ok(ScanOutcome::for_session(student, &session, ScanAction::TimeIn))
            }
            ScanKind::TimeOut => {
                let day = ledger.day_of(now);
                let open = with_storage_retry("find_open_session", || {
                    ledger.find_open_session(db, student.id, class.id, day)
                })
                .await?
                .ok_or_else(|| AttendanceError::NoOpenSession {
                    student_name: student.full_name.clone(),
                })?;

                let status = check_out_status(&open, now, &schedule, tz);
                let session = with_storage_retry("complete_check_out", || {
                    ledger.complete_check_out(db, open.id, student, now, status)
                })
                .await?;

                tracing::info!(
                    session_id = session.id,
                    student_id = student.id,
                    class_id = class.id,
                    %status,
                    "checked out"
                );
                self.effects.after_check_out(class, student, &session).await;
                Ok(ScanOutcome::for_session(student, &session, ScanAction::TimeOut))
            }
            ScanKind::RoomControl => Err(AttendanceError::InvalidRequest(
                "room control scans are reserved for room activators".into(),
            )),
        }
    }

    async fn load_actor(&self, actor_id: Option<i64>) -> Result<Option<Actor>, AttendanceError> {
        match actor_id {
            Some(id) => Ok(Some(Actor::load(&self.db, id).await?)),
            None => Ok(None),
        }
    }

    /// Adds a staff note to a session on behalf of `actor_id`.
    pub async fn annotate(
        &self,
        session_id: i64,
        actor_id: i64,
        note: &str,
    ) -> Result<Session, AttendanceError> {
        let actor = Actor::load(&self.db, actor_id).await?;
        self.ledger
            .annotate(&self.db, session_id, &actor, note, Utc::now())
            .await
    }

    /// Tallies and per-session labels for one class on one campus day.
    pub async fn class_report(
        &self,
        class_id: i64,
        day: NaiveDate,
    ) -> Result<ClassDayReport, AttendanceError> {
        let class = class::Model::get_by_id(&self.db, class_id)
            .await?
            .ok_or_else(|| AttendanceError::NotFound(format!("Class {class_id}")))?;
        let sessions = self.ledger.list_for_class_day(&self.db, class_id, day).await?;

        let schedule = Schedule::from(&class);
        let tz = self.ledger.tz();
        let summary = summarize(&sessions, &schedule, tz);
        let sessions = sessions
            .into_iter()
            .map(|session| SessionView {
                display_status: display_status(&session, &schedule, tz),
                session,
            })
            .collect();

        Ok(ClassDayReport {
            class_id,
            class_name: class.name,
            day,
            summary,
            sessions,
        })
    }
}
