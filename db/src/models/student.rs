//! Students as seen by the scan engine: identity, display names and the biometric lock.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::sea_query::{Func, Query};
use sea_orm::{Condition, ConnectionTrait, IntoActiveModel, QueryFilter, Set};
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "students")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub student_number: String,
    pub full_name: String,
    /// Secondary name accepted by legacy name-based terminals.
    pub alternate_name: Option<String>,
    pub email: String,
    /// Set by an administrator after suspected sensor abuse; blocks biometric scans.
    pub fingerprint_locked: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::enrollment::Entity")]
    Enrollments,
    #[sea_orm(has_many = "super::fingerprint::Entity")]
    Fingerprints,
    #[sea_orm(has_many = "super::attendance_session::Entity")]
    Sessions,
}

impl Related<super::enrollment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Enrollments.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub async fn create<C: ConnectionTrait>(
        db: &C,
        student_number: &str,
        full_name: &str,
        alternate_name: Option<&str>,
        email: &str,
    ) -> Result<Model, DbErr> {
        let now = Utc::now();
        ActiveModel {
            student_number: Set(student_number.to_owned()),
            full_name: Set(full_name.to_owned()),
            alternate_name: Set(alternate_name.map(str::to_owned)),
            email: Set(email.to_owned()),
            fingerprint_locked: Set(false),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await
    }

    pub async fn get_by_id<C: ConnectionTrait>(db: &C, id: i64) -> Result<Option<Model>, DbErr> {
        Entity::find_by_id(id).one(db).await
    }

    pub async fn set_fingerprint_locked<C: ConnectionTrait>(
        db: &C,
        id: i64,
        locked: bool,
    ) -> Result<Model, DbErr> {
        let Some(student) = Self::get_by_id(db, id).await? else {
            return Err(DbErr::RecordNotFound(format!("Student {id} not found")));
        };
        let mut active = student.into_active_model();
        active.fingerprint_locked = Set(locked);
        active.updated_at = Set(Utc::now());
        active.update(db).await
    }

    /// Students whose full or alternate name equals `name` (case-insensitive, trimmed)
    /// and who hold an active enrollment in any class taught by `instructor_id`.
    ///
    /// Callers treat anything other than exactly one row as unresolved.
    pub async fn find_by_name_for_instructor<C: ConnectionTrait>(
        db: &C,
        name: &str,
        instructor_id: i64,
    ) -> Result<Vec<Model>, DbErr> {
        let needle = name.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(Vec::new());
        }

        let owned_classes = Query::select()
            .column(super::class::Column::Id)
            .from(super::class::Entity)
            .and_where(super::class::Column::InstructorId.eq(instructor_id))
            .to_owned();

        let enrolled = Query::select()
            .column(super::enrollment::Column::StudentId)
            .from(super::enrollment::Entity)
            .and_where(super::enrollment::Column::Active.eq(true))
            .and_where(super::enrollment::Column::ClassId.in_subquery(owned_classes))
            .to_owned();

        Entity::find()
            .filter(Column::Id.in_subquery(enrolled))
            .filter(
                Condition::any()
                    .add(Expr::expr(Func::lower(Expr::col(Column::FullName))).eq(needle.clone()))
                    .add(Expr::expr(Func::lower(Expr::col(Column::AlternateName))).eq(needle)),
            )
            .all(db)
            .await
    }
}
