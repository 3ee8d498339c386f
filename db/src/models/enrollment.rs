use sea_orm::entity::prelude::*;
use sea_orm::{ConnectionTrait, QueryFilter, Set};

/// Roster row linking a student to a class. Managed elsewhere; read here.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "enrollments")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub student_id: i64,
    #[sea_orm(primary_key, auto_increment = false)]
    pub class_id: i64,
    /// Dropped students keep their row with `active = false`.
    pub active: bool,
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

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub async fn enroll<C: ConnectionTrait>(
        db: &C,
        student_id: i64,
        class_id: i64,
    ) -> Result<Model, DbErr> {
        ActiveModel {
            student_id: Set(student_id),
            class_id: Set(class_id),
            active: Set(true),
        }
        .insert(db)
        .await
    }

    pub async fn set_active<C: ConnectionTrait>(
        db: &C,
        student_id: i64,
        class_id: i64,
        active: bool,
    ) -> Result<Model, DbErr> {
        ActiveModel {
            student_id: Set(student_id),
            class_id: Set(class_id),
            active: Set(active),
        }
        .update(db)
        .await
    }

    pub async fn is_enrolled<C: ConnectionTrait>(
        db: &C,
        student_id: i64,
        class_id: i64,
    ) -> Result<bool, DbErr> {
        let count = Entity::find()
            .filter(Column::StudentId.eq(student_id))
            .filter(Column::ClassId.eq(class_id))
            .filter(Column::Active.eq(true))
            .count(db)
            .await?;
        Ok(count > 0)
    }
}
