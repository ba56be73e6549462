//! Domain error types for server operations.
//!
//! Every failure a request can hit maps to one `ApiError`, which renders as
//! a JSON body with a user-safe message.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use glyphdesk_staging::StagingError;
use rootcause::prelude::Report;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// Errors returned by the HTTP API.
#[derive(Debug)]
pub enum ApiError {
    /// Neither text nor an image was submitted.
    EmptySubmission,
    /// The multipart body could not be read.
    InvalidRequest { reason: String },
    /// The upload could not be staged.
    Storage(Report<StagingError>),
    /// The relay failed; the pending upload was discarded.
    Relay {
        message: String,
        discarded_upload: Option<PathBuf>,
    },
    /// Anything else that should not happen.
    Internal { details: String },
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptySubmission => write!(f, "nothing was submitted"),
            Self::InvalidRequest { reason } => write!(f, "invalid request: {reason}"),
            Self::Storage(report) => write!(f, "{report}"),
            Self::Relay { message, .. } => write!(f, "{message}"),
            Self::Internal { details } => write!(f, "internal error: {details}"),
        }
    }
}

impl ApiError {
    /// Returns the HTTP status for this error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::EmptySubmission | Self::InvalidRequest { .. } => StatusCode::BAD_REQUEST,
            Self::Storage(_) | Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Relay { .. } => StatusCode::BAD_GATEWAY,
        }
    }

    fn user_message(&self) -> String {
        match self {
            Self::EmptySubmission => "Enter some text or upload an image".to_string(),
            Self::InvalidRequest { reason } => format!("Invalid request: {reason}"),
            Self::Storage(_) => "The uploaded image could not be saved".to_string(),
            Self::Relay { message, .. } => message.clone(),
            Self::Internal { .. } => "Internal server error".to_string(),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    discarded_upload: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self.status() {
            StatusCode::INTERNAL_SERVER_ERROR => tracing::error!(error = %self, "request failed"),
            _ => tracing::warn!(error = %self, "request rejected"),
        }
        let discarded_upload = match &self {
            Self::Relay {
                discarded_upload, ..
            } => discarded_upload.as_ref().map(|p| p.display().to_string()),
            _ => None,
        };
        let body = ErrorBody {
            error: self.user_message(),
            discarded_upload,
        };
        (self.status(), Json(body)).into_response()
    }
}
