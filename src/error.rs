use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MicrError {
    /// Fatal configuration problems: missing "0" reference glyph, invalid
    /// log level, unknown translator name, invalid adaptive-threshold block
    /// size.
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid image: {0}")]
    InvalidImage(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Image too large: {size} bytes (max: {max} bytes)")]
    ImageTooLarge { size: usize, max: usize },

    /// A classifier backend failed. The failing translator is dropped from
    /// the response map; other translators still run.
    #[error("Translator '{name}' failed: {message}")]
    Translator { name: String, message: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl IntoResponse for MicrError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            MicrError::Configuration(_) => (StatusCode::INTERNAL_SERVER_ERROR, "CONFIGURATION"),
            MicrError::InvalidImage(_) => (StatusCode::BAD_REQUEST, "INVALID_IMAGE"),
            MicrError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "INVALID_REQUEST"),
            MicrError::ImageTooLarge { .. } => (StatusCode::PAYLOAD_TOO_LARGE, "IMAGE_TOO_LARGE"),
            MicrError::Translator { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "TRANSLATOR"),
            MicrError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };

        let body = Json(ErrorResponse {
            error: self.to_string(),
            code: code.to_string(),
        });

        (status, body).into_response()
    }
}
