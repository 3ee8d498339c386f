use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ConnectionTrait, QueryFilter, QueryOrder, Set};

/// Append-only security trail (lock rejections and similar).
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "audit_logs")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Free-form actor reference, e.g. `student:42` or `device:kiosk-3`.
    pub actor: String,
    pub action: String,
    pub detail: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub async fn record<C: ConnectionTrait>(
        db: &C,
        actor: &str,
        action: &str,
        detail: &str,
    ) -> Result<Model, DbErr> {
        ActiveModel {
            actor: Set(actor.to_owned()),
            action: Set(action.to_owned()),
            detail: Set(detail.to_owned()),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(db)
        .await
    }

    pub async fn find_by_action<C: ConnectionTrait>(
        db: &C,
        action: &str,
    ) -> Result<Vec<Model>, DbErr> {
        Entity::find()
            .filter(Column::Action.eq(action))
            .order_by_asc(Column::Id)
            .all(db)
            .await
    }
}
