use axum::{
    Json,
    extract::{Path, State, ws::WebSocketUpgrade},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use db::models::user;
use util::state::AppState;
use util::ws::{notification_topic, serve::serve_topic};

use crate::response::ApiResponse;

/// GET /ws/notifications/{user_id}
///
/// Upgrades to a socket that receives every notification addressed to the
/// staff user, as `EventEnvelope` JSON frames. Unknown users get `404`.
pub async fn notifications_ws(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Response {
    match user::Model::get_by_id(state.db(), user_id).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(ApiResponse::<()>::error("User not found")),
            )
                .into_response();
        }
        Err(err) => {
            tracing::error!(user_id, error = %err, "failed to load ws subscriber");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<()>::error("Database error")),
            )
                .into_response();
        }
    }

    let manager = state.ws_clone();
    let topic = notification_topic(user_id);
    tracing::info!(user_id, %topic, "notification socket opened");
    ws.on_upgrade(move |socket| serve_topic(socket, manager, topic, user_id))
}
