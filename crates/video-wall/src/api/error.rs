use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::error::WallError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Wall(#[from] WallError),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind) = match &self {
            ApiError::Wall(err) => {
                let status = match err {
                    WallError::InvalidConfiguration { .. }
                    | WallError::IndexOutOfRange { .. }
                    | WallError::OutOfRange { .. } => StatusCode::BAD_REQUEST,
                    WallError::UnknownCamera { .. } => StatusCode::NOT_FOUND,
                    WallError::DuplicateAssignment { .. } => StatusCode::CONFLICT,
                };
                (status, err.kind())
            }
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        };

        let mut body = json!({ "error": self.to_string(), "kind": kind });
        if let ApiError::Wall(err) = &self {
            body["detail"] = serde_json::to_value(err).unwrap_or_default();
        }
        (status, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(value: anyhow::Error) -> Self {
        Self::internal(format!("{:#}", value))
    }
}
