//! OCR for glyphdesk.
//!
//! This crate provides:
//!
//! - **OCR Backend**: Trait for text recognition services
//! - **Aliyun Client**: Signed client for the Alibaba Cloud OCR API
//! - **OCR Tools**: `get_ocr_text` and `get_ocr_text_from_filepath`

pub mod aliyun;
pub mod backend;
pub mod error;
pub mod tools;

pub use aliyun::{AliyunOcrClient, OcrConfig};
pub use backend::{ImageSource, OcrBackend, Transcription};
pub use error::OcrError;
pub use tools::{OCR_FROM_FILEPATH, OCR_FROM_URL, OcrFromFileTool, OcrFromUrlTool};
