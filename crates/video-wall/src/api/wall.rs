use axum::extract::{Path, Query, State};
use axum::Json;
use common::{validation, Camera};
use serde::Deserialize;
use serde_json::{json, Value};

use super::error::ApiError;
use crate::state::AppState;
use crate::wall::WallSnapshot;

#[derive(Debug, Deserialize)]
pub struct LayoutRequest {
    pub size: usize,
}

#[derive(Debug, Deserialize)]
pub struct QualityRequest {
    pub preset: String,
}

#[derive(Debug, Deserialize)]
pub struct BitrateRequest {
    pub bitrate_kbps: u32,
}

#[derive(Debug, Deserialize)]
pub struct AssignRequest {
    pub camera_id: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub search: Option<String>,
}

impl SearchQuery {
    pub fn text(&self) -> Result<&str, ApiError> {
        let text = self.search.as_deref().unwrap_or_default();
        validation::validate_search_text(text).map_err(|e| ApiError::bad_request(e.to_string()))?;
        Ok(text)
    }
}

pub async fn get_wall(State(state): State<AppState>) -> Json<WallSnapshot> {
    Json(state.wall.lock().await.snapshot())
}

pub async fn set_layout(
    State(state): State<AppState>,
    Json(req): Json<LayoutRequest>,
) -> Result<Json<WallSnapshot>, ApiError> {
    let mut wall = state.wall.lock().await;
    wall.set_grid_size(req.size)?;
    Ok(Json(wall.snapshot()))
}

pub async fn set_quality(
    State(state): State<AppState>,
    Json(req): Json<QualityRequest>,
) -> Result<Json<WallSnapshot>, ApiError> {
    let mut wall = state.wall.lock().await;
    wall.set_preset(&req.preset)?;
    Ok(Json(wall.snapshot()))
}

pub async fn set_bitrate(
    State(state): State<AppState>,
    Json(req): Json<BitrateRequest>,
) -> Result<Json<WallSnapshot>, ApiError> {
    let mut wall = state.wall.lock().await;
    wall.set_bitrate_override(req.bitrate_kbps)?;
    Ok(Json(wall.snapshot()))
}

pub async fn assign_slot(
    State(state): State<AppState>,
    Path(index): Path<usize>,
    Json(req): Json<AssignRequest>,
) -> Result<Json<WallSnapshot>, ApiError> {
    validation::validate_id(&req.camera_id, "camera_id")
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    let mut wall = state.wall.lock().await;
    wall.assign_camera(index, &req.camera_id)?;
    Ok(Json(wall.snapshot()))
}

pub async fn clear_slot(
    State(state): State<AppState>,
    Path(index): Path<usize>,
) -> Result<Json<WallSnapshot>, ApiError> {
    let mut wall = state.wall.lock().await;
    wall.clear_slot(index)?;
    Ok(Json(wall.snapshot()))
}

pub async fn retry_slot(
    State(state): State<AppState>,
    Path(index): Path<usize>,
) -> Result<Json<Value>, ApiError> {
    let mut wall = state.wall.lock().await;
    let retried = wall.retry_slot(index)?;
    Ok(Json(json!({
        "retried": retried,
        "slot": wall.slot_view(index),
    })))
}

/// Pull the directory now, then restart every stream.
pub async fn refresh(State(state): State<AppState>) -> Result<Json<WallSnapshot>, ApiError> {
    state.poller().refresh_once().await?;
    let mut wall = state.wall.lock().await;
    wall.restart_all();
    Ok(Json(wall.snapshot()))
}

pub async fn slot_candidates(
    State(state): State<AppState>,
    Path(index): Path<usize>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<Camera>>, ApiError> {
    let text = query.text()?;
    let wall = state.wall.lock().await;
    Ok(Json(wall.candidates_for(index, text)?))
}
