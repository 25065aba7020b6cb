use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Invalid input")]
    Validation,

    #[error("User has already rated this teacher.")]
    Duplicate,

    #[error("Resource not found")]
    NotFound,

    #[error("{message}")]
    Storage {
        message: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

impl ApiError {
    pub fn storage(message: &'static str, source: anyhow::Error) -> Self {
        Self::Storage { message, source }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // Storage details stay in the server log; the client only sees the
        // generic message.
        if let ApiError::Storage { message, source } = &self {
            error!("{message}: {source:?}");
        }

        let status = match &self {
            ApiError::Validation | ApiError::Duplicate => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Storage { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (
            status,
            Json(json!({ "success": false, "error": self.to_string() })),
        )
            .into_response()
    }
}
