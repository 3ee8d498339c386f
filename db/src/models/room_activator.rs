use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ConnectionTrait, QueryFilter, Set};

/// Binds a staff fingerprint slot on one device to the room that device controls.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "room_activators")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub user_id: i64,
    pub room_id: i64,
    pub device_id: String,
    pub slot: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,
    #[sea_orm(
        belongs_to = "super::room::Entity",
        from = "Column::RoomId",
        to = "super::room::Column::Id"
    )]
    Room,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub async fn bind<C: ConnectionTrait>(
        db: &C,
        user_id: i64,
        room_id: i64,
        device_id: &str,
        slot: i32,
    ) -> Result<Model, DbErr> {
        ActiveModel {
            user_id: Set(user_id),
            room_id: Set(room_id),
            device_id: Set(device_id.to_owned()),
            slot: Set(slot),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(db)
        .await
    }

    /// Binding for exactly this device and slot, together with the staff account.
    pub async fn find_for_scan<C: ConnectionTrait>(
        db: &C,
        device_id: &str,
        slot: i32,
    ) -> Result<Option<(Model, super::user::Model)>, DbErr> {
        let found = Entity::find()
            .filter(Column::DeviceId.eq(device_id))
            .filter(Column::Slot.eq(slot))
            .find_also_related(super::user::Entity)
            .one(db)
            .await?;
        Ok(found.and_then(|(binding, user)| user.map(|u| (binding, u))))
    }
}
