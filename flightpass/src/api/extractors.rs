use axum::extract::multipart::MultipartError;
use axum::extract::{FromRequest, Multipart, Request};
use axum::http::StatusCode;

use crate::error::FlightpassError;

/// A boarding-pass image sent as the `file` field of a multipart form.
#[derive(Debug)]
pub struct PassUpload {
    pub bytes: Vec<u8>,
    /// Client-supplied file name, used only for its extension.
    pub file_name: Option<String>,
}

impl<S> FromRequest<S> for PassUpload
where
    S: Send + Sync,
{
    type Rejection = FlightpassError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let mut multipart = Multipart::from_request(req, state)
            .await
            .map_err(|rejection| FlightpassError::Validation(rejection.body_text()))?;

        let mut upload = None;
        while let Some(field) = multipart.next_field().await.map_err(map_multipart_error)? {
            if field.name() != Some("file") {
                continue;
            }
            let file_name = field
                .file_name()
                .map(str::to_string)
                .filter(|name| !name.is_empty());
            let bytes = field.bytes().await.map_err(map_multipart_error)?;
            upload = Some(PassUpload {
                bytes: bytes.to_vec(),
                file_name,
            });
        }

        upload.ok_or_else(|| FlightpassError::Validation("Missing required 'file' field".into()))
    }
}

fn map_multipart_error(err: MultipartError) -> FlightpassError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        FlightpassError::PayloadTooLarge(err.body_text())
    } else {
        FlightpassError::Validation(format!("Failed to read multipart body: {}", err.body_text()))
    }
}
