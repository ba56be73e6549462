//! Core domain types and utilities for glyphdesk.
//!
//! This crate provides the typed identifiers and the error-handling
//! foundation shared by the conversation, relay, OCR and server crates.

pub mod error;
pub mod id;

pub use error::Result;
pub use id::{ChatSessionId, ParseIdError, TurnId, UploadId};
