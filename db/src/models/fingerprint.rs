use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ConnectionTrait, QueryFilter, Set};

/// Enrolled fingerprint template slot on a specific sensor.
///
/// Slots are device-local: slot 12 on one kiosk says nothing about slot 12 on another.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "fingerprints")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub device_id: String,
    pub slot: i32,
    pub student_id: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::student::Entity",
        from = "Column::StudentId",
        to = "super::student::Column::Id"
    )]
    Student,
}

impl Related<super::student::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Student.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub async fn register<C: ConnectionTrait>(
        db: &C,
        device_id: &str,
        slot: i32,
        student_id: i64,
    ) -> Result<Model, DbErr> {
        ActiveModel {
            device_id: Set(device_id.to_owned()),
            slot: Set(slot),
            student_id: Set(student_id),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(db)
        .await
    }

    /// The student owning `slot` on `device_id`, if any.
    pub async fn find_student<C: ConnectionTrait>(
        db: &C,
        device_id: &str,
        slot: i32,
    ) -> Result<Option<super::student::Model>, DbErr> {
        let found = Entity::find()
            .filter(Column::DeviceId.eq(device_id))
            .filter(Column::Slot.eq(slot))
            .find_also_related(super::student::Entity)
            .one(db)
            .await?;
        Ok(found.and_then(|(_, student)| student))
    }
}
