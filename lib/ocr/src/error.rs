//! Error types for the OCR crate.
//!
//! Errors are designed for layered context using rootcause:
//! - `OcrError`: OCR service and image loading failures

use std::fmt;

/// Errors from OCR operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OcrError {
    /// The request could not be sent or no response arrived.
    RequestFailed { reason: String },
    /// The service rejected the request.
    Service {
        status: u16,
        code: String,
        message: String,
        recommend: Option<String>,
    },
    /// Response parsing failed.
    ResponseParseFailed { reason: String },
    /// The image could not be read from disk.
    Io { path: String, reason: String },
    /// The image path is outside the directory the tool may read.
    PathNotAllowed { path: String },
    /// Invalid configuration.
    InvalidConfig { reason: String },
}

impl fmt::Display for OcrError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RequestFailed { reason } => write!(f, "OCR request failed: {reason}"),
            Self::Service {
                status,
                code,
                message,
                recommend,
            } => {
                write!(f, "OCR service returned {status} {code}: {message}")?;
                if let Some(recommend) = recommend {
                    write!(f, " (see {recommend})")?;
                }
                Ok(())
            }
            Self::ResponseParseFailed { reason } => {
                write!(f, "failed to parse OCR response: {reason}")
            }
            Self::Io { path, reason } => write!(f, "failed to read image '{path}': {reason}"),
            Self::PathNotAllowed { path } => {
                write!(f, "image path '{path}' is outside the upload directory")
            }
            Self::InvalidConfig { reason } => write!(f, "invalid OCR configuration: {reason}"),
        }
    }
}

impl std::error::Error for OcrError {}
