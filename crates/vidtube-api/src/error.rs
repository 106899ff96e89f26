use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use vidtube_types::api::ApiErrorBody;

/// Every way a VidTube request can fail. Rendered as the failure envelope
/// `{statusCode, message, errors, success}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    /// Failure with a message meant for the client.
    #[error("{0}")]
    Internal(String),

    /// Infrastructure failure. The cause is logged, the client gets a
    /// generic message.
    #[error(transparent)]
    Infra(#[from] anyhow::Error),
}

impl ApiError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        ApiError::InvalidInput(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        ApiError::Unauthorized(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        ApiError::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        ApiError::Conflict(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        ApiError::Internal(msg.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) | ApiError::Infra(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ApiError::Infra(e) => {
                tracing::error!("Internal error: {:#}", e);
                "Internal server error".to_string()
            }
            ApiError::Internal(msg) => {
                tracing::error!("Request failed: {}", msg);
                msg.clone()
            }
            other => other.to_string(),
        };

        let body = ApiErrorBody {
            status_code: status.as_u16(),
            errors: vec![message.clone()],
            message,
            success: false,
        };

        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn response_status(err: ApiError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn kinds_map_to_status_codes() {
        assert_eq!(response_status(ApiError::invalid("x")), StatusCode::BAD_REQUEST);
        assert_eq!(response_status(ApiError::unauthorized("x")), StatusCode::UNAUTHORIZED);
        assert_eq!(response_status(ApiError::not_found("x")), StatusCode::NOT_FOUND);
        assert_eq!(response_status(ApiError::conflict("x")), StatusCode::CONFLICT);
        assert_eq!(
            response_status(ApiError::internal("x")),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            response_status(anyhow::anyhow!("disk on fire").into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn infra_errors_render_generic_envelope() {
        let err: ApiError = anyhow::anyhow!("no such table: users").into();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: ApiErrorBody = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body.status_code, 500);
        assert_eq!(body.message, "Internal server error");
        assert!(!body.success);
    }
}
