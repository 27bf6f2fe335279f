use axum::extract::State;
use serde::Serialize;

use crate::api::state::AppState;
use crate::api::v1::response::ApiResponse;
use crate::decode::RegionRect;

/// Health data returned inside the v1 envelope.
#[derive(Debug, Clone, Serialize)]
pub struct HealthData {
    pub status: String,
    pub version: String,
    pub ocr: OcrStatus,
    /// Rectangle the text recognizer reads.
    pub region: RegionRect,
}

#[derive(Debug, Clone, Serialize)]
pub struct OcrStatus {
    pub status: String,
    pub languages: String,
}

/// `GET /api/v1/health`
pub async fn health_check(State(state): State<AppState>) -> ApiResponse<HealthData> {
    let ocr_status = if state.pipeline.recognizer_available() {
        "available"
    } else {
        "unavailable"
    };

    ApiResponse::success(HealthData {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        ocr: OcrStatus {
            status: ocr_status.to_string(),
            languages: state.config.ocr.languages.clone(),
        },
        region: state.pipeline.region(),
    })
}
