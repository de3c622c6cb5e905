//! Error types for the HTTP layer.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::registry::Algorithm;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0} must be provided")]
    MissingField(&'static str),

    #[error("{0}")]
    InvalidParameter(String),

    #[error("{0} model not trained")]
    NotTrained(Algorithm),

    #[error("{0}")]
    NotFound(String),

    #[error("Store error: {0}")]
    Store(#[from] object_store::Error),

    #[error(transparent)]
    Core(#[from] crate::error::Error),

    #[error("{0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::MissingField(_) | ApiError::InvalidParameter(_) | ApiError::NotTrained(_) => {
                (StatusCode::BAD_REQUEST, self.to_string())
            }
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            ApiError::Store(object_store::Error::NotFound { .. }) => {
                (StatusCode::NOT_FOUND, "File not found".to_string())
            }
            ApiError::Store(e) => {
                tracing::error!(detail = %e, "Object store error");
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
            ApiError::Core(e) => {
                tracing::error!(detail = %e, "Request handling failed");
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
            ApiError::Internal(msg) => {
                tracing::error!(detail = %msg, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, msg.clone())
            }
        };

        let body = Json(json!({ "error": message }));
        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;
