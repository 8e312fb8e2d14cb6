use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde_json::{json, Value};

use super::error::ApiError;

pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "video-wall",
        "version": common::VERSION,
    }))
}

pub async fn metrics() -> Result<impl IntoResponse, ApiError> {
    let body = telemetry::encode_metrics().map_err(|e| ApiError::internal(e.to_string()))?;
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    ))
}
