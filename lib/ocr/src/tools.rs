//! OCR tools offered to the model.

use crate::backend::{ImageSource, OcrBackend};
use crate::error::OcrError;
use async_trait::async_trait;
use glyphdesk_conversation::{ParamType, ParameterSpec, Tool, ToolArguments, ToolError, ToolSpec};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, instrument};

/// Name of the URL tool.
pub const OCR_FROM_URL: &str = "get_ocr_text";
/// Name of the file path tool.
pub const OCR_FROM_FILEPATH: &str = "get_ocr_text_from_filepath";

const MAX_URL_LEN: usize = 2048;

fn execution_failed(tool: &str, error: &OcrError) -> ToolError {
    ToolError::ExecutionFailed {
        name: tool.to_string(),
        reason: error.to_string(),
    }
}

/// Recognizes text in an image fetched by the OCR service from a URL.
#[derive(Clone)]
pub struct OcrFromUrlTool {
    backend: Arc<dyn OcrBackend>,
}

impl OcrFromUrlTool {
    /// Creates the tool over an OCR backend.
    #[must_use]
    pub fn new(backend: Arc<dyn OcrBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl Tool for OcrFromUrlTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec::new(
            OCR_FROM_URL,
            "Recognize the text in an image of any common type, reading the image from a url",
        )
        .with_parameter(ParameterSpec::required(
            "url",
            ParamType::String,
            "Image link (at most 2048 characters, base64 is not supported). Example: https://example.png",
        ))
    }

    #[instrument(skip_all, fields(tool = OCR_FROM_URL))]
    async fn execute(&self, arguments: ToolArguments) -> Result<String, ToolError> {
        let url = arguments.require_str(OCR_FROM_URL, "url")?;
        if url.chars().count() > MAX_URL_LEN {
            return Err(ToolError::ExecutionFailed {
                name: OCR_FROM_URL.to_string(),
                reason: format!("url is longer than {MAX_URL_LEN} characters"),
            });
        }
        if url.starts_with("data:") {
            return Err(ToolError::ExecutionFailed {
                name: OCR_FROM_URL.to_string(),
                reason: "base64 data urls are not supported".to_string(),
            });
        }

        let transcription = self
            .backend
            .recognize(ImageSource::Url(url.to_string()))
            .await
            .map_err(|e| execution_failed(OCR_FROM_URL, &e))?;
        info!(request_id = ?transcription.request_id, "recognized image from url");
        Ok(transcription.text)
    }
}

/// Recognizes text in an image stored on the server.
///
/// Only files inside `root` can be read.
#[derive(Clone)]
pub struct OcrFromFileTool {
    backend: Arc<dyn OcrBackend>,
    root: PathBuf,
}

impl OcrFromFileTool {
    /// Creates the tool over an OCR backend, reading only files under `root`.
    #[must_use]
    pub fn new(backend: Arc<dyn OcrBackend>, root: impl Into<PathBuf>) -> Self {
        Self {
            backend,
            root: root.into(),
        }
    }

    /// Resolves `path` and checks that it lies inside the root directory.
    async fn allowed_path(&self, path: &Path) -> Result<PathBuf, OcrError> {
        let not_allowed = || OcrError::PathNotAllowed {
            path: path.display().to_string(),
        };
        let root = tokio::fs::canonicalize(&self.root)
            .await
            .map_err(|_| not_allowed())?;
        let resolved = tokio::fs::canonicalize(path)
            .await
            .map_err(|e| OcrError::Io {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
        if resolved.starts_with(&root) {
            Ok(resolved)
        } else {
            Err(not_allowed())
        }
    }

    async fn load(&self, path: &Path) -> Result<Vec<u8>, OcrError> {
        let resolved = self.allowed_path(path).await?;
        tokio::fs::read(&resolved).await.map_err(|e| OcrError::Io {
            path: resolved.display().to_string(),
            reason: e.to_string(),
        })
    }
}

#[async_trait]
impl Tool for OcrFromFileTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec::new(
            OCR_FROM_FILEPATH,
            "Recognize the text in an image of any common type, reading the image from a filepath",
        )
        .with_parameter(ParameterSpec::required(
            "filepath",
            ParamType::String,
            "Image path. Example: /tmp/example.png",
        ))
    }

    #[instrument(skip_all, fields(tool = OCR_FROM_FILEPATH))]
    async fn execute(&self, arguments: ToolArguments) -> Result<String, ToolError> {
        let path = Path::new(arguments.require_str(OCR_FROM_FILEPATH, "filepath")?);
        let bytes = self
            .load(path)
            .await
            .map_err(|e| execution_failed(OCR_FROM_FILEPATH, &e))?;

        let transcription = self
            .backend
            .recognize(ImageSource::Bytes(bytes))
            .await
            .map_err(|e| execution_failed(OCR_FROM_FILEPATH, &e))?;
        info!(path = %path.display(), request_id = ?transcription.request_id, "recognized staged image");
        Ok(transcription.text)
    }
}
