pub mod cameras;
pub mod error;
pub mod health;
pub mod wall;

use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;
use crate::websocket;

pub use error::ApiError;

pub fn router(state: AppState) -> Router {
    Router::new()
        // Health and metrics
        .route("/healthz", get(health::health_check))
        .route("/metrics", get(health::metrics))
        // Wall
        .route("/api/wall", get(wall::get_wall))
        .route("/api/wall/layout", put(wall::set_layout))
        .route("/api/wall/quality", put(wall::set_quality))
        .route("/api/wall/bitrate", put(wall::set_bitrate))
        .route("/api/wall/refresh", post(wall::refresh))
        .route(
            "/api/wall/slots/:index",
            put(wall::assign_slot).delete(wall::clear_slot),
        )
        .route("/api/wall/slots/:index/retry", post(wall::retry_slot))
        .route("/api/wall/slots/:index/candidates", get(wall::slot_candidates))
        // Camera picker
        .route("/api/cameras", get(cameras::list_cameras))
        // WebSocket for slot and session updates
        .route("/ws", get(websocket::ws_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
