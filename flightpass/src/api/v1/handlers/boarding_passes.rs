use axum::extract::State;

use crate::api::extractors::PassUpload;
use crate::api::state::AppState;
use crate::api::v1::dto::DecodeResponse;
use crate::api::v1::response::ApiResponse;
use crate::error::FlightpassError;

/// `POST /api/v1/boarding-passes:decode`
///
/// Accepts a multipart form with a `file` field, decodes it and looks the
/// code up among known flights. A failed decode is a 422 carrying the
/// failure kind as `error.reason`.
pub async fn decode_boarding_pass(
    State(state): State<AppState>,
    upload: PassUpload,
) -> ApiResponse<DecodeResponse> {
    let code = match state.pipeline.decode(&upload.bytes).await.into_result() {
        Ok(code) => code,
        Err(kind) => return FlightpassError::Decode(kind).into(),
    };

    match state.flights.find_by_code(code.value()).await {
        Ok(flight) => ApiResponse::success(DecodeResponse::new(code, flight)),
        Err(e) => e.into(),
    }
}
