use crate::backend::{BackendService, ForwardOutcome};
use crate::models::ErrorEnvelope;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Every failure the relay reports to the browser.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Invalid client input. Never reaches the backend.
    #[error("{0}")]
    BadRequest(String),
    /// The multipart upload could not be read (e.g. it exceeded the size ceiling).
    #[error("Upload error: {message}")]
    Upload { status: StatusCode, message: String },
    /// The request body could not be read at all.
    #[error("{message}")]
    Rejected { status: StatusCode, message: String },
    #[error("UI file not found.")]
    UiNotFound,
    /// The backend answered with a non-success status.
    #[error("{message}")]
    Backend { status: StatusCode, message: String },
    #[error("{0}")]
    BadGateway(&'static str),
    #[error("{0}")]
    GatewayTimeout(&'static str),
    #[error("{0}")]
    Internal(&'static str),
}

impl RelayError {
    pub fn status(&self) -> StatusCode {
        match self {
            RelayError::BadRequest(_) => StatusCode::BAD_REQUEST,
            RelayError::Upload { status, .. } => *status,
            RelayError::Rejected { status, .. } => *status,
            RelayError::UiNotFound => StatusCode::NOT_FOUND,
            RelayError::Backend { status, .. } => *status,
            RelayError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            RelayError::GatewayTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            RelayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Translates a forwarding outcome into the response the browser receives. Backend successes
    /// are passed through untouched; every other outcome becomes an [`ErrorEnvelope`].
    pub fn from_outcome(
        outcome: ForwardOutcome,
        service: BackendService,
    ) -> Result<Response, RelayError> {
        match outcome {
            ForwardOutcome::Success { status, body } => Ok((
                status,
                [(axum::http::header::CONTENT_TYPE, "application/json")],
                body,
            )
                .into_response()),
            ForwardOutcome::ErrorResponse { status, body } => Err(RelayError::Backend {
                status,
                message: ForwardOutcome::backend_error_message(&body)
                    .unwrap_or_else(|| service.error_response_message(status)),
            }),
            ForwardOutcome::Unreachable(_) => {
                Err(RelayError::BadGateway(service.unreachable_message()))
            }
            ForwardOutcome::TimedOut(_) => {
                Err(RelayError::GatewayTimeout(service.timeout_message()))
            }
            ForwardOutcome::Internal(_) => Err(RelayError::Internal(service.internal_message())),
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            err @ RelayError::UiNotFound => (status, err.to_string()).into_response(),
            other => (status, Json(ErrorEnvelope::new(other.to_string()))).into_response(),
        }
    }
}
