use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::error;

pub type AppResult<T> = Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    /// another extraction currently holds the single-flight lock
    #[error("extraction already in progress")]
    ExtractionBusy,

    /// the browser could not be launched even after internal retries
    #[error("browser launch failed: {0}")]
    BrowserLaunch(String),

    /// browser/tab context lost mid-operation; a fresh session usually
    /// succeeds, so this surfaces as retryable rather than fatal
    #[error("browser session corrupted: {0}")]
    SessionCorrupted(String),

    /// the flow ran to completion without observing a qualifying manifest
    #[error("no manifest URL observed")]
    ManifestNotFound,

    /// upstream fetch exhausted its retry budget; the final status is
    /// passed through to the client
    #[error("upstream returned {status}")]
    Upstream { status: u16 },

    #[error("internal server error")]
    InternalServerError,

    #[error("{0}")]
    InternalServerErrorWithContext(String),
}

impl Error {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::ExtractionBusy => StatusCode::TOO_MANY_REQUESTS,
            Self::SessionCorrupted(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Upstream { status } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            Self::BrowserLaunch(_)
            | Self::ManifestNotFound
            | Self::InternalServerError
            | Self::InternalServerErrorWithContext(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// recoverable conditions carry a retry hint the caller can act on
    fn retryable(&self) -> bool {
        matches!(self, Self::ExtractionBusy | Self::SessionCorrupted(_))
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            error!("request failed: {}", self);
        }

        let body = if self.retryable() {
            json!({ "success": false, "error": self.to_string(), "retry": true })
        } else {
            json!({ "success": false, "error": self.to_string() })
        };

        (status, Json(body)).into_response()
    }
}
