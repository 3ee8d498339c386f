//! Storage for per-student, per-class, per-day attendance sessions.
//!
//! Rows are append/update-only. A session is created on check-in, closed once on
//! check-out and afterwards only annotated. Corrections never rewrite a row in
//! place; they void it and insert a replacement (see [`Model::void`]).
//!
//! The natural key is `(student_id, class_id, session_day)`. The unique index
//! over that key plus `check_in_slot` guarantees a single live session per key
//! even when two kiosks race: the live row always has slot `0`, and voiding a row
//! moves it to a slot equal to its own id.

use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveEnum, ConnectionTrait, IntoActiveModel, QueryFilter, QueryOrder, Set};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Slot value held by the live (non-voided) session of a key.
pub const LIVE_SLOT: i64 = 0;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "attendance_sessions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub student_id: i64,
    pub class_id: i64,
    /// Calendar day of `check_in_at` in the campus time zone.
    pub session_day: NaiveDate,
    #[serde(skip)]
    pub check_in_slot: i64,
    pub check_in_at: DateTime<Utc>,
    /// `None` while the session is open.
    pub check_out_at: Option<DateTime<Utc>>,
    pub status: AttendanceStatus,
    pub entry_method: EntryMethod,
    pub is_correction: bool,
    /// Set on a replacement: the session it supersedes.
    pub corrects_session_id: Option<i64>,
    /// Set on a voided original: its check-in time at the moment of voiding.
    pub original_check_in_at: Option<DateTime<Utc>>,
    pub voided_at: Option<DateTime<Utc>>,
    pub admin_note: Option<String>,
    pub note_by: Option<i64>,
    pub note_at: Option<DateTime<Utc>>,
    /// Staff user that keyed the entry in; `None` for kiosk scans.
    pub created_by: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Stored attendance status.
///
/// The finer labels shown on dashboards (cut class, ghosting, invalid) are
/// derived from this plus the timestamps and are never persisted.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum AttendanceStatus {
    #[sea_orm(string_value = "present")]
    Present,
    #[sea_orm(string_value = "late")]
    Late,
    #[sea_orm(string_value = "absent")]
    Absent,
    #[sea_orm(string_value = "manually_verified")]
    ManuallyVerified,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum EntryMethod {
    #[sea_orm(string_value = "biometric")]
    Biometric,
    #[sea_orm(string_value = "manual_override")]
    ManualOverride,
    #[sea_orm(string_value = "rfid")]
    Rfid,
    #[sea_orm(string_value = "qr_verified")]
    QrVerified,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::student::Entity",
        from = "Column::StudentId",
        to = "super::student::Column::Id"
    )]
    Student,
    #[sea_orm(
        belongs_to = "super::class::Entity",
        from = "Column::ClassId",
        to = "super::class::Column::Id"
    )]
    Class,
}

impl Related<super::student::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Student.def()
    }
}

impl Related<super::class::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Class.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Column values for a freshly inserted session.
#[derive(Debug, Clone)]
pub struct NewSession {
    pub student_id: i64,
    pub class_id: i64,
    pub session_day: NaiveDate,
    pub check_in_at: DateTime<Utc>,
    pub check_out_at: Option<DateTime<Utc>>,
    pub status: AttendanceStatus,
    pub entry_method: EntryMethod,
    pub corrects_session_id: Option<i64>,
    pub created_by: Option<i64>,
}

impl Model {
    #[inline]
    pub fn is_open(&self) -> bool {
        self.check_out_at.is_none() && self.voided_at.is_none()
    }

    #[inline]
    pub fn is_voided(&self) -> bool {
        self.voided_at.is_some()
    }

    pub async fn get_by_id<C: ConnectionTrait>(db: &C, id: i64) -> Result<Option<Model>, DbErr> {
        Entity::find_by_id(id).one(db).await
    }

    /// Open, non-voided session for the key, most recent check-in first.
    pub async fn find_open<C: ConnectionTrait>(
        db: &C,
        student_id: i64,
        class_id: i64,
        day: NaiveDate,
    ) -> Result<Option<Model>, DbErr> {
        Entity::find()
            .filter(Column::StudentId.eq(student_id))
            .filter(Column::ClassId.eq(class_id))
            .filter(Column::SessionDay.eq(day))
            .filter(Column::CheckOutAt.is_null())
            .filter(Column::VoidedAt.is_null())
            .order_by_desc(Column::CheckInAt)
            .one(db)
            .await
    }

    /// Whether any non-voided session (open or closed) exists for the key.
    pub async fn exists_for_day<C: ConnectionTrait>(
        db: &C,
        student_id: i64,
        class_id: i64,
        day: NaiveDate,
    ) -> Result<bool, DbErr> {
        let count = Entity::find()
            .filter(Column::StudentId.eq(student_id))
            .filter(Column::ClassId.eq(class_id))
            .filter(Column::SessionDay.eq(day))
            .filter(Column::VoidedAt.is_null())
            .count(db)
            .await?;
        Ok(count > 0)
    }

    /// Inserts a live session. A racing insert for the same key fails on the unique index.
    pub async fn insert_live<C: ConnectionTrait>(db: &C, new: NewSession) -> Result<Model, DbErr> {
        let now = Utc::now();
        ActiveModel {
            student_id: Set(new.student_id),
            class_id: Set(new.class_id),
            session_day: Set(new.session_day),
            check_in_slot: Set(LIVE_SLOT),
            check_in_at: Set(new.check_in_at),
            check_out_at: Set(new.check_out_at),
            status: Set(new.status),
            entry_method: Set(new.entry_method),
            is_correction: Set(new.corrects_session_id.is_some()),
            corrects_session_id: Set(new.corrects_session_id),
            original_check_in_at: Set(None),
            voided_at: Set(None),
            admin_note: Set(None),
            note_by: Set(None),
            note_at: Set(None),
            created_by: Set(new.created_by),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await
    }

    /// Closes session `id` if, and only if, it is still open.
    ///
    /// The update is conditional, so of two concurrent check-outs exactly one
    /// wins; the loser gets `Ok(None)`.
    pub async fn close<C: ConnectionTrait>(
        db: &C,
        id: i64,
        at: DateTime<Utc>,
        status: AttendanceStatus,
    ) -> Result<Option<Model>, DbErr> {
        let res = Entity::update_many()
            .col_expr(Column::CheckOutAt, Expr::value(at))
            .col_expr(Column::Status, Expr::value(status.to_value()))
            .col_expr(Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(Column::Id.eq(id))
            .filter(Column::CheckOutAt.is_null())
            .filter(Column::VoidedAt.is_null())
            .exec(db)
            .await?;

        if res.rows_affected == 0 {
            return Ok(None);
        }
        Self::get_by_id(db, id).await
    }

    /// Marks `id` as superseded, freeing the live slot of its key.
    ///
    /// Substantive fields (times, status, method) are left as they were.
    /// Returns `Ok(None)` if the row is missing or was already voided.
    pub async fn void<C: ConnectionTrait>(
        db: &C,
        id: i64,
        at: DateTime<Utc>,
    ) -> Result<Option<Model>, DbErr> {
        let res = Entity::update_many()
            .col_expr(Column::IsCorrection, Expr::value(true))
            .col_expr(Column::OriginalCheckInAt, Expr::col(Column::CheckInAt).into())
            .col_expr(Column::VoidedAt, Expr::value(at))
            .col_expr(Column::CheckInSlot, Expr::col(Column::Id).into())
            .col_expr(Column::UpdatedAt, Expr::value(at))
            .filter(Column::Id.eq(id))
            .filter(Column::VoidedAt.is_null())
            .exec(db)
            .await?;

        if res.rows_affected == 0 {
            return Ok(None);
        }
        Self::get_by_id(db, id).await
    }

    /// Writes the annotation fields and, optionally, a new status.
    pub async fn set_note<C: ConnectionTrait>(
        db: &C,
        session: Model,
        note: &str,
        by: i64,
        at: DateTime<Utc>,
        status: Option<AttendanceStatus>,
    ) -> Result<Model, DbErr> {
        let mut active = session.into_active_model();
        active.admin_note = Set(Some(note.to_owned()));
        active.note_by = Set(Some(by));
        active.note_at = Set(Some(at));
        if let Some(status) = status {
            active.status = Set(status);
        }
        active.updated_at = Set(at);
        active.update(db).await
    }

    /// Non-voided sessions of a class on one day, in check-in order.
    pub async fn list_for_class_day<C: ConnectionTrait>(
        db: &C,
        class_id: i64,
        day: NaiveDate,
    ) -> Result<Vec<Model>, DbErr> {
        Entity::find()
            .filter(Column::ClassId.eq(class_id))
            .filter(Column::SessionDay.eq(day))
            .filter(Column::VoidedAt.is_null())
            .order_by_asc(Column::CheckInAt)
            .all(db)
            .await
    }

    /// Every session row (voided included) for the key, oldest first.
    pub async fn history_for_key<C: ConnectionTrait>(
        db: &C,
        student_id: i64,
        class_id: i64,
        day: NaiveDate,
    ) -> Result<Vec<Model>, DbErr> {
        Entity::find()
            .filter(Column::StudentId.eq(student_id))
            .filter(Column::ClassId.eq(class_id))
            .filter(Column::SessionDay.eq(day))
            .order_by_asc(Column::Id)
            .all(db)
            .await
    }
}
