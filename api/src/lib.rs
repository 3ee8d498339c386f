//! HTTP and WebSocket surface of the attendance engine.

pub mod response;
pub mod routes;
pub mod ws;

use axum::Router;
use axum::http::header::CONTENT_TYPE;
use services::AttendanceEngine;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use util::state::AppState;

/// The complete application: `/api/...` routes and `/ws/...` subscriptions.
///
/// The engine is built once from `app_state` and the global configuration.
pub fn app(app_state: AppState) -> Router {
    let engine = Arc::new(AttendanceEngine::from_state(&app_state));
    app_with_engine(app_state, engine)
}

/// Same as [`app`] but with a caller-supplied engine.
pub fn app_with_engine(app_state: AppState, engine: Arc<AttendanceEngine>) -> Router {
    let cors = CorsLayer::very_permissive().expose_headers([CONTENT_TYPE]);

    Router::new()
        .nest("/api", routes::routes(app_state.clone(), engine))
        .nest("/ws", ws::ws_routes(app_state))
        .layer(cors)
}
