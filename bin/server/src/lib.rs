//! glyphdesk web server.
//!
//! Serves a single chat page and a small JSON API. Each browser gets its own
//! chat session; submissions go through the tool-call relay, which can read
//! uploaded images with OCR.

pub mod app;
pub mod chat;
pub mod config;
pub mod error;
pub mod state;

#[cfg(test)]
pub(crate) mod testing;
