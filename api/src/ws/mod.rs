//! WebSocket entry point for `/ws/...`.
//!
//! - `/notifications/{user_id}` → live instructor notifications

use axum::{Router, routing::get};
use util::state::AppState;

pub mod notifications;

pub fn ws_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/notifications/{user_id}", get(notifications::notifications_ws))
        .with_state(app_state)
}
