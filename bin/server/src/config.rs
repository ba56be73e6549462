//! Centralized server configuration.
//!
//! This module provides strongly-typed configuration for the server,
//! loaded via the `config` crate from environment variables. Nested keys use
//! a double underscore, e.g. `COMPLETION__ENDPOINT` or `OCR__ACCESS_KEY_ID`.
//!
//! See [`LlmBackendConfig`] and [`OcrConfig`] for the service settings.

use crate::state::DEFAULT_SESSION_IDLE;
use glyphdesk_ai::{LlmBackendConfig, RelayConfig};
use glyphdesk_ocr::OcrConfig;
use glyphdesk_staging::DEFAULT_STAGING_DIR;
use serde::Deserialize;
use std::path::PathBuf;

/// Prompt placed at the start of every fresh conversation.
pub const DEFAULT_SYSTEM_PROMPT: &str = "Assistant is a helpful assistant that helps users get answers to questions. \
Assistant has access to several tools and sometimes you may need to call multiple tools in sequence to get answers for your users. \
When an image has been recognized, give the answer as JSON.";

/// Server configuration composed from library configs.
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// Address the HTTP listener binds to.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Directory uploads are staged into.
    #[serde(default = "default_staging_dir")]
    pub staging_dir: PathBuf,

    /// Directory holding the chat page.
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,

    /// Largest accepted request body, in bytes.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,

    /// System prompt for fresh conversations.
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    /// Seconds a chat session may sit unused before it is dropped.
    #[serde(default = "default_session_idle_seconds")]
    pub session_idle_seconds: u64,

    /// Completion endpoint configuration.
    pub completion: LlmBackendConfig,

    /// OCR service configuration.
    pub ocr: OcrConfig,

    /// Relay configuration.
    #[serde(default)]
    pub relay: RelayConfig,
}

fn default_bind_addr() -> String {
    "127.0.0.1:3000".to_string()
}

fn default_staging_dir() -> PathBuf {
    PathBuf::from(DEFAULT_STAGING_DIR)
}

fn default_static_dir() -> PathBuf {
    PathBuf::from("static")
}

fn default_max_upload_bytes() -> usize {
    20 * 1024 * 1024
}

fn default_session_idle_seconds() -> u64 {
    DEFAULT_SESSION_IDLE.as_secs()
}

fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.to_string()
}

impl ServerConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required configuration is missing or invalid.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(
                config::Environment::default()
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}
