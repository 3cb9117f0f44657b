use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use ccoa_core::AssistantError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("failed to bind {0}: {1}")]
    Bind(String, std::io::Error),
    #[error("server error: {0}")]
    Server(String),
}

#[derive(serde::Serialize)]
struct ErrorBody<'a> {
    detail: String,
    kind: &'a str,
}

/// Error returned from request handlers as `{"detail", "kind"}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    kind: &'static str,
    detail: String,
}

impl ApiError {
    pub(crate) fn invalid_request(status: StatusCode, detail: String) -> Self {
        Self {
            status,
            kind: "invalid_request",
            detail,
        }
    }
}

impl From<AssistantError> for ApiError {
    fn from(e: AssistantError) -> Self {
        Self {
            status: StatusCode::from_u16(e.status_code())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            kind: e.kind(),
            detail: e.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(kind = self.kind, status = %self.status, "request failed: {}", self.detail);
        } else {
            tracing::warn!(kind = self.kind, status = %self.status, "request rejected: {}", self.detail);
        }
        let body = ErrorBody {
            detail: self.detail,
            kind: self.kind,
        };
        (self.status, Json(body)).into_response()
    }
}
