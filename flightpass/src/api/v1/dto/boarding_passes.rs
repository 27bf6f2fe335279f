//! Boarding-pass request/response DTOs for the v1 API.

use serde::{Deserialize, Serialize};

use crate::decode::{CodeSource, DecodeErrorKind, DecodeOutcome, DecodedCode};
use crate::flights::Flight;

/// Response body for `POST /v1/boarding-passes:decode`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecodeResponse {
    pub code: String,
    /// `"symbol"` or `"ocr"`.
    pub source: CodeSource,
    /// Flight matching `code`, `null` when no record exists.
    pub flight: Option<Flight>,
}

impl DecodeResponse {
    pub fn new(code: DecodedCode, flight: Option<Flight>) -> Self {
        Self {
            source: code.source(),
            code: code.into_value(),
            flight,
        }
    }
}

/// Decode result embedded in upload responses, where a failure does not
/// fail the request.
///
/// Wire format: `{ "code": "AF1234", "source": "symbol" }` or
/// `{ "error": "no_code_found" }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecodeSummary {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<CodeSource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<DecodeErrorKind>,
}

impl From<DecodeOutcome> for DecodeSummary {
    fn from(outcome: DecodeOutcome) -> Self {
        match outcome {
            DecodeOutcome::Success(code) => Self {
                source: Some(code.source()),
                code: Some(code.into_value()),
                error: None,
            },
            DecodeOutcome::Failure(kind) => Self {
                code: None,
                source: None,
                error: Some(kind),
            },
        }
    }
}

/// Response body for `POST /v1/flights/{flightNumber}/boarding-pass`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardingPassUploadResponse {
    pub flight_number: String,
    /// URI the stored pass will be served from.
    pub boarding_pass: String,
    pub decode: DecodeSummary,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_response_serializes_null_flight() {
        let code = DecodedCode::new("AF1234", CodeSource::Symbol).unwrap();
        let json = serde_json::to_value(DecodeResponse::new(code, None)).unwrap();
        assert_eq!(json["code"], "AF1234");
        assert_eq!(json["source"], "symbol");
        assert!(json["flight"].is_null());
    }

    #[test]
    fn summary_of_failure_has_only_error() {
        let summary = DecodeSummary::from(DecodeOutcome::Failure(DecodeErrorKind::NoCodeFound));
        let json = serde_json::to_value(summary).unwrap();
        assert_eq!(json, serde_json::json!({ "error": "no_code_found" }));
    }

    #[test]
    fn upload_response_is_camel_case() {
        let resp = BoardingPassUploadResponse {
            flight_number: "LH438".into(),
            boarding_pass: "http://localhost:3000/api/v1/flights/image/LH438.png".into(),
            decode: DecodeSummary::from(DecodeOutcome::Success(
                DecodedCode::new("LH438", CodeSource::Ocr).unwrap(),
            )),
        };
        let json = serde_json::to_value(resp).unwrap();
        assert_eq!(json["flightNumber"], "LH438");
        assert_eq!(json["decode"]["source"], "ocr");
        assert!(json["decode"].get("error").is_none());
    }
}
