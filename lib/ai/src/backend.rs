//! Completion backend abstraction.
//!
//! Provides a unified interface for chat-completion providers that support
//! function calling (Azure OpenAI, OpenAI-compatible APIs).

use crate::error::LlmError;
use async_trait::async_trait;
use glyphdesk_conversation::{FunctionCall, ToolSpec, Turn};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Available completion providers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LlmProvider {
    /// Azure OpenAI deployment.
    #[default]
    #[serde(rename = "azure_openai")]
    AzureOpenAi,
    /// Generic OpenAI-compatible API.
    #[serde(rename = "openai_compatible")]
    OpenAiCompatible,
}

impl fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AzureOpenAi => f.write_str("azure_openai"),
            Self::OpenAiCompatible => f.write_str("openai_compatible"),
        }
    }
}

/// Configuration for a completion backend.
///
/// Fields with defaults can be omitted when loading from environment variables.
#[derive(Clone, Serialize, Deserialize)]
pub struct LlmBackendConfig {
    /// The provider type.
    #[serde(default)]
    pub provider: LlmProvider,
    /// Base URL for the API (e.g., "https://example.openai.azure.com").
    pub endpoint: String,
    /// API key.
    pub api_key: String,
    /// Model identifier; the deployment name for Azure.
    #[serde(default = "default_model")]
    pub model: String,
    /// API version query parameter (Azure only).
    #[serde(default = "default_api_version")]
    pub api_version: String,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

fn default_model() -> String {
    "gpt-4".to_string()
}

fn default_api_version() -> String {
    "2024-02-15-preview".to_string()
}

fn default_timeout_seconds() -> u64 {
    120
}

impl fmt::Debug for LlmBackendConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmBackendConfig")
            .field("provider", &self.provider)
            .field("endpoint", &self.endpoint)
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("api_version", &self.api_version)
            .field("timeout_seconds", &self.timeout_seconds)
            .finish()
    }
}

impl LlmBackendConfig {
    /// Creates a new Azure OpenAI backend configuration.
    #[must_use]
    pub fn azure(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        deployment: impl Into<String>,
    ) -> Self {
        Self {
            provider: LlmProvider::AzureOpenAi,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            model: deployment.into(),
            api_version: default_api_version(),
            timeout_seconds: default_timeout_seconds(),
        }
    }

    /// Creates a new OpenAI-compatible backend configuration.
    #[must_use]
    pub fn openai_compatible(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            provider: LlmProvider::OpenAiCompatible,
            ..Self::azure(endpoint, api_key, model)
        }
    }
}

/// How the model may use the declared tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolChoice {
    /// The model decides whether to call a tool.
    Auto,
    /// The model must answer in text.
    None,
}

/// A request to a completion backend.
#[derive(Debug, Clone)]
pub struct LlmRequest {
    /// The full ordered conversation.
    pub turns: Vec<Turn>,
    /// Tool declarations offered to the model.
    pub tools: Vec<ToolSpec>,
    /// Tool selection mode; omitted from the wire when `None`.
    pub tool_choice: Option<ToolChoice>,
}

impl LlmRequest {
    /// Creates a request without tools.
    #[must_use]
    pub fn new(turns: Vec<Turn>) -> Self {
        Self {
            turns,
            tools: Vec::new(),
            tool_choice: None,
        }
    }

    /// Offers tools, letting the model choose automatically.
    #[must_use]
    pub fn with_tools(mut self, tools: Vec<ToolSpec>) -> Self {
        self.tool_choice = if tools.is_empty() {
            None
        } else {
            Some(ToolChoice::Auto)
        };
        self.tools = tools;
        self
    }
}

/// A response from a completion backend.
#[derive(Debug, Clone, Default)]
pub struct LlmResponse {
    /// Generated text, if any.
    pub content: Option<String>,
    /// The first tool call the model requested, if any.
    pub function_call: Option<FunctionCall>,
    /// Token usage statistics.
    pub usage: TokenUsage,
    /// Model that generated the response.
    pub model: String,
}

impl LlmResponse {
    /// Creates a plain text response.
    #[must_use]
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::default()
        }
    }

    /// Creates a response requesting a tool call.
    #[must_use]
    pub fn call(name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            function_call: Some(FunctionCall::new(name, arguments)),
            ..Self::default()
        }
    }
}

/// Token usage statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Number of input tokens.
    pub input_tokens: u32,
    /// Number of output tokens.
    pub output_tokens: u32,
}

impl TokenUsage {
    /// Returns the total number of tokens.
    #[must_use]
    pub fn total(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }
}

/// Trait for completion backends.
///
/// This trait defines the interface that all providers must implement.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Generates a response for the given request.
    ///
    /// # Errors
    ///
    /// Returns an error if the completion call fails. Implementations make a
    /// single attempt.
    async fn generate(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError>;

    /// Returns the provider type.
    fn provider(&self) -> LlmProvider;

    /// Returns the model name.
    fn model(&self) -> &str;
}
