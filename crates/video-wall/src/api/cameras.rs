use axum::extract::{Query, State};
use axum::Json;
use common::Camera;
use serde::Serialize;

use super::error::ApiError;
use super::wall::SearchQuery;
use crate::picker;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct PickerEntry {
    #[serde(flatten)]
    pub camera: Camera,
    /// Already on the wall; shown greyed out in the picker
    pub assigned: bool,
}

pub async fn list_cameras(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<PickerEntry>>, ApiError> {
    let text = query.text()?;
    let wall = state.wall.lock().await;
    let assignment = wall.assignment();

    let entries = picker::query(wall.directory(), text)
        .iter()
        .map(|camera| PickerEntry {
            assigned: picker::is_assigned(&camera.id, assignment.iter().copied()),
            camera: camera.clone(),
        })
        .collect();
    Ok(Json(entries))
}
