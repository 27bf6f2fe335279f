use std::io;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{header, HeaderValue};
use axum::response::{IntoResponse, Response};
use tracing::{info, warn};

use crate::api::extractors::PassUpload;
use crate::api::state::AppState;
use crate::api::v1::dto::{BoardingPassUploadResponse, DecodeSummary};
use crate::api::v1::response::{ApiResponse, ErrorCode};
use crate::decode::{DecodeErrorKind, PersistRequest};
use crate::error::FlightpassError;
use crate::storage::PassSink;

/// `POST /api/v1/flights/{flightNumber}/boarding-pass`
///
/// Stores the uploaded pass for an existing flight and decodes it in the
/// same pass. Returns 202 once decoding finishes; the flight record gets
/// the pass URI when the write completes. An image that cannot be read at
/// all is rejected with 422 and nothing is stored.
pub async fn upload_boarding_pass(
    State(state): State<AppState>,
    Path(flight_number): Path<String>,
    upload: PassUpload,
) -> ApiResponse<BoardingPassUploadResponse> {
    let flight = match state.flights.find_by_code(&flight_number).await {
        Ok(Some(flight)) => flight,
        Ok(None) => {
            return FlightpassError::NotFound(format!("Flight {flight_number} not found")).into()
        }
        Err(e) => return e.into(),
    };

    let sink: Arc<dyn PassSink> = state.passes.clone();
    let report = state
        .pipeline
        .decode_and_persist(
            &upload.bytes,
            PersistRequest {
                flight_number: flight.flight_number.clone(),
                original_filename: upload.file_name,
            },
            sink,
        )
        .await;

    let (file_name, persistence) = match (report.file_name, report.persistence) {
        (Some(file_name), Some(persistence)) => (file_name, persistence),
        _ => {
            let kind = report
                .outcome
                .error()
                .unwrap_or(DecodeErrorKind::UnreadableImage);
            return FlightpassError::Decode(kind).into();
        }
    };

    let flights = state.flights.clone();
    let number = flight.flight_number.clone();
    state.pipeline.tasks().spawn(async move {
        match persistence.await {
            Ok(Ok(uri)) => match flights.attach_boarding_pass(&number, &uri).await {
                Ok(()) => info!(flight = %number, uri = %uri, "Boarding pass attached to flight"),
                Err(e) => warn!(flight = %number, error = %e, "Failed to attach boarding pass"),
            },
            // The pipeline already logged the storage failure.
            Ok(Err(_)) => {}
            Err(e) => warn!(flight = %number, error = %e, "Boarding pass persistence task failed"),
        }
    });

    ApiResponse::accepted(BoardingPassUploadResponse {
        boarding_pass: state.passes.locate(&file_name),
        flight_number: flight.flight_number,
        decode: DecodeSummary::from(report.outcome),
    })
}

/// `GET /api/v1/flights/image/{fileName}`
///
/// Serves a stored boarding pass with a content type guessed from its
/// extension.
pub async fn get_boarding_pass_image(
    State(state): State<AppState>,
    Path(file_name): Path<String>,
) -> Response {
    let bytes = match state.passes.load(&file_name).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::InvalidInput => {
            return ApiResponse::<()>::error(ErrorCode::InvalidRequest, "Invalid file name")
                .into_response();
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return ApiResponse::<()>::error(
                ErrorCode::NotFound,
                format!("Boarding pass {file_name} not found"),
            )
            .into_response();
        }
        Err(e) => return FlightpassError::Storage(e).into_response(),
    };

    let mime = mime_guess::from_path(&file_name).first_or_octet_stream();
    let mut response = bytes.into_response();
    if let Ok(value) = HeaderValue::from_str(mime.as_ref()) {
        response.headers_mut().insert(header::CONTENT_TYPE, value);
    }
    response
}
