use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ConnectionTrait, QueryFilter, Set};
use serde::Serialize;

/// A physical room and its approximate head count.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "rooms")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub name: String,
    /// Eventually consistent with open sessions; never negative.
    pub occupancy: i64,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::iot_device::Entity")]
    Devices,
}

impl Related<super::iot_device::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Devices.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub async fn create<C: ConnectionTrait>(db: &C, name: &str) -> Result<Model, DbErr> {
        ActiveModel {
            name: Set(name.to_owned()),
            occupancy: Set(0),
            updated_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(db)
        .await
    }

    pub async fn get_by_id<C: ConnectionTrait>(db: &C, id: i64) -> Result<Option<Model>, DbErr> {
        Entity::find_by_id(id).one(db).await
    }

    /// Adds `delta` to the counter in one statement, clamping at zero.
    pub async fn adjust_occupancy<C: ConnectionTrait>(
        db: &C,
        id: i64,
        delta: i64,
    ) -> Result<(), DbErr> {
        let res = Entity::update_many()
            .col_expr(
                Column::Occupancy,
                Expr::cust_with_values("MAX(\"occupancy\" + ?, 0)", [delta]),
            )
            .col_expr(Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(Column::Id.eq(id))
            .exec(db)
            .await?;

        if res.rows_affected == 0 {
            return Err(DbErr::RecordNotFound(format!("Room {id} not found")));
        }
        Ok(())
    }
}
