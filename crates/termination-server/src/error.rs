//! HTTP error type.
//!
//! Every handler returns `Result<_, ApiError>`. Bodies are the plain-text
//! reason phrase of the status code (`Conflict`, `Not Found`, ...).
//!
//! Storage faults and invariant violations are logged with full detail;
//! the caller only sees `Internal Server Error`.

use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use termination_core::DetectorError;
use termination_core::domain::InvalidId;
use thiserror::Error;
use tracing::{debug, error};

#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed body or unusable path parameter.
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("not found")]
    NotFound,

    /// Duplicate registration or rejected completion.
    #[error("conflict")]
    Conflict,

    #[error(transparent)]
    Detector(#[from] DetectorError),
}

impl From<InvalidId> for ApiError {
    fn from(e: InvalidId) -> Self {
        ApiError::BadRequest(e.to_string())
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Conflict => StatusCode::CONFLICT,
            ApiError::Detector(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// `text/plain` response whose body is the canonical reason phrase.
pub fn text_response(status: StatusCode) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        status.canonical_reason().unwrap_or_default(),
    )
        .into_response()
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            ApiError::BadRequest(reason) => debug!(%reason, "rejecting bad request"),
            ApiError::Detector(DetectorError::InvariantViolation(detail)) => {
                error!(%detail, "invariant violation while handling request");
            }
            ApiError::Detector(e) => error!(error = %e, "storage error while handling request"),
            ApiError::NotFound | ApiError::Conflict => {}
        }
        text_response(self.status())
    }
}
