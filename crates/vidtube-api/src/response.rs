use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use serde::Serialize;
use serde::de::DeserializeOwned;
use vidtube_types::api::ApiResponse;

use crate::error::{ApiError, ApiResult};

/// Success envelope with a matching HTTP status.
pub fn respond<T: Serialize>(status: StatusCode, data: T, message: &str) -> Response {
    (status, Json(ApiResponse::new(status.as_u16(), data, message))).into_response()
}

/// Parse an optional JSON body. An empty body yields `T::default()`, so
/// callers can report missing fields in the envelope rather than getting an
/// extractor rejection.
pub fn parse_json<T: DeserializeOwned + Default>(body: &Bytes) -> ApiResult<T> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| ApiError::invalid(format!("Malformed JSON body: {e}")))
}

/// Trimmed value when present and non-blank.
pub fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
