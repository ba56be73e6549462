//! OCR backend abstraction.

use crate::error::OcrError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Where the image to recognize comes from.
#[derive(Clone, PartialEq, Eq)]
pub enum ImageSource {
    /// A publicly reachable image URL.
    Url(String),
    /// Raw image bytes.
    Bytes(Vec<u8>),
}

impl std::fmt::Debug for ImageSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Url(url) => f.debug_tuple("Url").field(url).finish(),
            Self::Bytes(bytes) => write!(f, "Bytes({} bytes)", bytes.len()),
        }
    }
}

/// Result of a recognition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transcription {
    /// Service request identifier, for support lookups.
    pub request_id: Option<String>,
    /// Recognized content as returned by the service.
    pub text: String,
}

/// Trait for OCR services.
#[async_trait]
pub trait OcrBackend: Send + Sync {
    /// Recognizes the text in an image.
    ///
    /// # Errors
    ///
    /// Returns an error if the service call fails. Implementations make a
    /// single attempt.
    async fn recognize(&self, source: ImageSource) -> Result<Transcription, OcrError>;
}
