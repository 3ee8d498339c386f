use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ConnectionTrait, IntoActiveModel, QueryFilter, QueryOrder, Set};
use serde::Serialize;

/// A switchable appliance (lights, projector, AC) in a room.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "iot_devices")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub room_id: i64,
    pub name: String,
    /// Identifier understood by the device gateway.
    pub external_id: String,
    /// Data-point code the gateway expects for the on/off switch.
    pub dp_code: String,
    /// Last state confirmed by the gateway.
    pub is_on: bool,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::room::Entity",
        from = "Column::RoomId",
        to = "super::room::Column::Id"
    )]
    Room,
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
        room_id: i64,
        name: &str,
        external_id: &str,
        dp_code: &str,
    ) -> Result<Model, DbErr> {
        ActiveModel {
            room_id: Set(room_id),
            name: Set(name.to_owned()),
            external_id: Set(external_id.to_owned()),
            dp_code: Set(dp_code.to_owned()),
            is_on: Set(false),
            updated_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(db)
        .await
    }

    pub async fn list_for_room<C: ConnectionTrait>(
        db: &C,
        room_id: i64,
    ) -> Result<Vec<Model>, DbErr> {
        Entity::find()
            .filter(Column::RoomId.eq(room_id))
            .order_by_asc(Column::Id)
            .all(db)
            .await
    }

    pub async fn set_on<C: ConnectionTrait>(
        db: &C,
        device: Model,
        is_on: bool,
    ) -> Result<Model, DbErr> {
        let mut active = device.into_active_model();
        active.is_on = Set(is_on);
        active.updated_at = Set(Utc::now());
        active.update(db).await
    }
}
