//! Error types for outreach-campaigns
//!
//! `SendError` is the taxonomy of the send executor. Structural failures
//! (unknown campaign, bad step, nothing to send) abort before any email goes
//! out. Per-recipient transport failures are never errors; they are carried
//! in the batch result.
//!
//! `ApiError` maps both onto HTTP responses of the shape
//! `{ "error": "<message>", "code": "<CODE>" }`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use outreach_common::models::PipelineStage;
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

/// Send executor errors
#[derive(Debug, Error)]
pub enum SendError {
    /// Campaign id does not resolve
    #[error("Campaign not found")]
    NotFound(Uuid),

    /// Requested step has no sequence entry
    #[error("Step {0} not found in sequence")]
    InvalidStep(usize),

    /// `test_email` was supplied but blank
    #[error("test_email must not be blank")]
    BlankTestEmail,

    /// Eligibility filter yielded nothing
    #[error("No contacts at stage \"{stage}\" to send to")]
    NoEligibleContacts { stage: PipelineStage },

    /// Subject template does not compile
    #[error("Invalid subject template for step {step}: {message}")]
    Template { step: u32, message: String },

    /// Loading the campaign or its contacts failed
    #[error(transparent)]
    Persistence(#[from] outreach_common::Error),
}

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("{0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("{0}")]
    BadRequest(String),

    /// Nothing eligible to send (400, reports `sent: 0`)
    #[error("{0}")]
    NoEligibleContacts(String),

    /// Conflict (409) - e.g. replacing the sequence of an active campaign
    #[error("{0}")]
    Conflict(String),

    /// outreach-common error
    #[error(transparent)]
    Common(#[from] outreach_common::Error),
}

impl From<SendError> for ApiError {
    fn from(err: SendError) -> Self {
        match err {
            SendError::NotFound(_) => ApiError::NotFound(err.to_string()),
            SendError::InvalidStep(_) | SendError::BlankTestEmail | SendError::Template { .. } => {
                ApiError::BadRequest(err.to_string())
            }
            SendError::NoEligibleContacts { .. } => ApiError::NoEligibleContacts(err.to_string()),
            SendError::Persistence(inner) => ApiError::Common(inner),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        use outreach_common::Error as CommonError;

        let (status, error_code, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::NoEligibleContacts(msg) => {
                let body = Json(json!({
                    "error": msg,
                    "code": "NO_ELIGIBLE_CONTACTS",
                    "sent": 0,
                }));
                return (StatusCode::BAD_REQUEST, body).into_response();
            }
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg),
            ApiError::Common(CommonError::NotFound(msg)) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::Common(CommonError::InvalidInput(msg)) => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg)
            }
            ApiError::Common(CommonError::Conflict(msg)) => (StatusCode::CONFLICT, "CONFLICT", msg),
            ApiError::Common(ref err) => {
                tracing::error!(error = %err, "Request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "COMMON_ERROR",
                    err.to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": message,
            "code": error_code,
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
