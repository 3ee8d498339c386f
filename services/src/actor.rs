use db::models::user;
use sea_orm::ConnectionTrait;
use serde::{Deserialize, Serialize};

use crate::error::AttendanceError;

/// The staff member on whose behalf a correction or annotation is made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: i64,
    /// Administrators may edit frozen records.
    pub privileged: bool,
}

impl Actor {
    /// Looks up `user_id`; privilege follows the user's admin flag.
    pub async fn load<C: ConnectionTrait>(db: &C, user_id: i64) -> Result<Actor, AttendanceError> {
        let user = user::Model::get_by_id(db, user_id)
            .await?
            .ok_or_else(|| AttendanceError::NotFound(format!("User {user_id}")))?;
        Ok(Actor {
            user_id: user.id,
            privileged: user.admin,
        })
    }
}
