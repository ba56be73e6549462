//! Chat-completion backend for Azure OpenAI and OpenAI-compatible APIs.

use crate::backend::{
    LlmBackend, LlmBackendConfig, LlmProvider, LlmRequest, LlmResponse, TokenUsage, ToolChoice,
};
use crate::error::LlmError;
use async_trait::async_trait;
use glyphdesk_conversation::{FunctionCall, Turn};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::time::{Duration, Instant};
use tracing::{debug, instrument, warn};

/// Completion backend speaking the chat-completions wire format.
#[derive(Debug, Clone)]
pub struct OpenAiBackend {
    client: reqwest::Client,
    config: LlmBackendConfig,
}

impl OpenAiBackend {
    /// Creates a backend from configuration.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the endpoint is empty or the HTTP client
    /// cannot be built.
    pub fn new(config: LlmBackendConfig) -> Result<Self, LlmError> {
        if config.endpoint.trim().is_empty() {
            return Err(LlmError::InvalidConfig {
                reason: "endpoint is empty".to_string(),
            });
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| LlmError::InvalidConfig {
                reason: e.to_string(),
            })?;
        Ok(Self { client, config })
    }

    /// Returns the chat-completions URL for the configured provider.
    #[must_use]
    pub fn completions_url(&self) -> String {
        let base = self.config.endpoint.trim_end_matches('/');
        match self.config.provider {
            LlmProvider::AzureOpenAi => format!(
                "{base}/openai/deployments/{}/chat/completions?api-version={}",
                self.config.model, self.config.api_version
            ),
            LlmProvider::OpenAiCompatible => format!("{base}/chat/completions"),
        }
    }

    fn request_body<'a>(&'a self, request: &'a LlmRequest) -> ChatRequest<'a> {
        ChatRequest::from_request(request, self.model_field())
    }

    fn model_field(&self) -> Option<&str> {
        // Azure routes by deployment in the URL.
        match self.config.provider {
            LlmProvider::AzureOpenAi => None,
            LlmProvider::OpenAiCompatible => Some(self.config.model.as_str()),
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    messages: Vec<WireMessage<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<ToolChoice>,
}

impl<'a> ChatRequest<'a> {
    fn from_request(request: &'a LlmRequest, model: Option<&'a str>) -> Self {
        Self {
            model,
            messages: request.turns.iter().map(WireMessage::from).collect(),
            tools: request.tools.iter().map(|t| t.to_llm_format()).collect(),
            tool_choice: request.tool_choice,
        }
    }
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    function_call: Option<&'a FunctionCall>,
}

impl<'a> From<&'a Turn> for WireMessage<'a> {
    fn from(turn: &'a Turn) -> Self {
        Self {
            role: turn.role.as_str(),
            content: turn.content.as_deref(),
            name: turn.name.as_deref(),
            function_call: turn.function_call.as_ref(),
        }
    }
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<WireUsage>,
    model: Option<String>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
    tool_calls: Option<Vec<WireToolCall>>,
    function_call: Option<FunctionCall>,
}

#[derive(Deserialize)]
struct WireToolCall {
    function: FunctionCall,
}

#[derive(Deserialize)]
struct WireUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

impl ChatResponse {
    fn into_response(self) -> Result<LlmResponse, LlmError> {
        let usage = self
            .usage
            .map(|u| TokenUsage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
            })
            .unwrap_or_default();
        let message = self
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::ResponseParseFailed {
                reason: "response has no choices".to_string(),
            })?
            .message;

        // Only the first requested call is serviced.
        let function_call = message
            .tool_calls
            .and_then(|calls| calls.into_iter().next())
            .map(|call| call.function)
            .or(message.function_call);

        Ok(LlmResponse {
            content: message.content,
            function_call,
            usage,
            model: self.model.unwrap_or_default(),
        })
    }
}

#[async_trait]
impl LlmBackend for OpenAiBackend {
    #[instrument(skip_all, fields(provider = %self.config.provider, model = %self.config.model, turns = request.turns.len()))]
    async fn generate(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        let started = Instant::now();
        let mut http = self
            .client
            .post(self.completions_url())
            .json(&self.request_body(request));
        http = match self.config.provider {
            LlmProvider::AzureOpenAi => http.header("api-key", &self.config.api_key),
            LlmProvider::OpenAiCompatible => http.bearer_auth(&self.config.api_key),
        };

        let response = http.send().await.map_err(|e| {
            if e.is_timeout() {
                LlmError::Timeout
            } else {
                LlmError::RequestFailed {
                    reason: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "completion endpoint returned an error");
            return Err(LlmError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse =
            response
                .json()
                .await
                .map_err(|e| LlmError::ResponseParseFailed {
                    reason: e.to_string(),
                })?;
        let result = parsed.into_response()?;

        debug!(
            latency_ms = started.elapsed().as_millis() as u64,
            tokens = result.usage.total(),
            tool_call = ?result.function_call.as_ref().map(|c| &c.name),
            "completion received"
        );
        Ok(result)
    }

    fn provider(&self) -> LlmProvider {
        self.config.provider
    }

    fn model(&self) -> &str {
        &self.config.model
    }
}
