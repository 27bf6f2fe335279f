use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::api::v1::response::ApiResponse;
use crate::decode::DecodeErrorKind;

#[derive(Error, Debug)]
pub enum FlightpassError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeErrorKind),

    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

}

/// Errors escaping a handler or extractor are rendered as the v1 envelope.
impl IntoResponse for FlightpassError {
    fn into_response(self) -> Response {
        ApiResponse::<()>::from(self).into_response()
    }
}

pub type Result<T> = std::result::Result<T, FlightpassError>;
