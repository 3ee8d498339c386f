use chrono::{DateTime, NaiveTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::sea_query::Func;
use sea_orm::{ConnectionTrait, QueryFilter, Set};
use serde::Serialize;

/// A scheduled class. Read-only to the attendance engine.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "classes")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub name: String,
    /// Owning instructor (`users.id`); receives scan notifications.
    pub instructor_id: i64,
    /// Room whose occupancy counter moves with check-ins.
    pub room_id: Option<i64>,
    /// Local wall-clock start in the campus time zone.
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::InstructorId",
        to = "super::user::Column::Id"
    )]
    Instructor,
    #[sea_orm(
        belongs_to = "super::room::Entity",
        from = "Column::RoomId",
        to = "super::room::Column::Id"
    )]
    Room,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Instructor.def()
    }
}

impl Related<super::room::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Room.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub async fn create<C: ConnectionTrait>(
        db: &C,
        name: &str,
        instructor_id: i64,
        room_id: Option<i64>,
        start_time: Option<NaiveTime>,
        end_time: Option<NaiveTime>,
    ) -> Result<Model, DbErr> {
        let now = Utc::now();
        ActiveModel {
            name: Set(name.to_owned()),
            instructor_id: Set(instructor_id),
            room_id: Set(room_id),
            start_time: Set(start_time),
            end_time: Set(end_time),
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

    /// Classes named `name` (case-insensitive), optionally restricted to one instructor.
    pub async fn find_by_name<C: ConnectionTrait>(
        db: &C,
        name: &str,
        instructor_id: Option<i64>,
    ) -> Result<Vec<Model>, DbErr> {
        let mut query = Entity::find().filter(
            Expr::expr(Func::lower(Expr::col(Column::Name))).eq(name.trim().to_lowercase()),
        );
        if let Some(instructor_id) = instructor_id {
            query = query.filter(Column::InstructorId.eq(instructor_id));
        }
        query.all(db).await
    }
}
