use serde::Serialize;
use thiserror::Error;

/// Rejection of a wall operation. State is left unchanged whenever one is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WallError {
    #[error("invalid {field}: '{value}'")]
    InvalidConfiguration { field: &'static str, value: String },

    #[error("slot index {index} out of range for a grid of {size} slots")]
    IndexOutOfRange { index: usize, size: usize },

    #[error("camera '{camera_id}' is already assigned to slot {slot}")]
    DuplicateAssignment { camera_id: String, slot: usize },

    #[error("{field} {value} is outside [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: u32,
        min: u32,
        max: u32,
    },

    #[error("camera '{camera_id}' is not in the directory")]
    UnknownCamera { camera_id: String },
}

impl WallError {
    pub fn invalid(field: &'static str, value: impl ToString) -> Self {
        Self::InvalidConfiguration {
            field,
            value: value.to_string(),
        }
    }

    /// Stable machine-readable kind, shown next to the message in the console.
    pub fn kind(&self) -> &'static str {
        match self {
            WallError::InvalidConfiguration { .. } => "invalid_configuration",
            WallError::IndexOutOfRange { .. } => "index_out_of_range",
            WallError::DuplicateAssignment { .. } => "duplicate_assignment",
            WallError::OutOfRange { .. } => "out_of_range",
            WallError::UnknownCamera { .. } => "unknown_camera",
        }
    }
}
