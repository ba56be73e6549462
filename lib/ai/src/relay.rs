//! Tool-call relay.
//!
//! The relay asks the model for a completion, services at most one tool call
//! the model requests, and asks the model again with the tool's output:
//!
//! 1. Send the conversation plus tool declarations (`tool_choice = auto`)
//! 2. No tool call: the text is the final answer
//! 3. Tool call: resolve, validate, invoke, append call + result turns
//! 4. Send the extended conversation without tools; that text is the answer
//!
//! Only one tool call is serviced per `converse` unless
//! [`RelayConfig::max_tool_calls`] is raised, in which case follow-up rounds
//! keep offering tools until the budget is spent. The last permitted round
//! never offers tools, so the loop always terminates.

use crate::backend::{LlmBackend, LlmRequest, LlmResponse};
use crate::error::RelayError;
use glyphdesk_conversation::{Conversation, FunctionCall, ToolError, ToolRegistry, Turn};
use rootcause::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument, warn};

/// Configuration for the relay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Maximum tool calls serviced per `converse`.
    #[serde(default = "default_max_tool_calls")]
    pub max_tool_calls: u32,
}

fn default_max_tool_calls() -> u32 {
    1
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            max_tool_calls: default_max_tool_calls(),
        }
    }
}

/// How a `converse` invocation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayOutcome {
    /// The model answered without calling a tool.
    Answered { answer: String },
    /// The model answered after seeing a tool's output.
    ToolAssisted { answer: String, call: FunctionCall },
    /// The requested call was rejected before any tool ran.
    Rejected { error: ToolError },
}

impl RelayOutcome {
    /// Returns the text shown to the user.
    ///
    /// For rejected calls this is the rejection message.
    #[must_use]
    pub fn answer(&self) -> String {
        match self {
            Self::Answered { answer } | Self::ToolAssisted { answer, .. } => answer.clone(),
            Self::Rejected { error } => error.to_string(),
        }
    }

    /// Returns the tool call that contributed to the answer, if any.
    #[must_use]
    pub fn call(&self) -> Option<&FunctionCall> {
        match self {
            Self::ToolAssisted { call, .. } => Some(call),
            _ => None,
        }
    }
}

/// Relays a conversation between the completion backend and the tools.
#[derive(Clone)]
pub struct Relay {
    backend: Arc<dyn LlmBackend>,
    config: RelayConfig,
}

impl std::fmt::Debug for Relay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Relay")
            .field("provider", &self.backend.provider())
            .field("model", &self.backend.model())
            .field("config", &self.config)
            .finish()
    }
}

impl Relay {
    /// Creates a relay with the default single-call budget.
    #[must_use]
    pub fn new(backend: Arc<dyn LlmBackend>) -> Self {
        Self {
            backend,
            config: RelayConfig::default(),
        }
    }

    /// Sets the configuration.
    #[must_use]
    pub fn with_config(mut self, config: RelayConfig) -> Self {
        self.config = config;
        self
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Runs the ask-model, maybe-invoke-tool, ask-again sequence.
    ///
    /// On a serviced call the conversation grows by exactly two turns: the
    /// assistant's call (content null) and the function result. Validation
    /// failures leave it untouched and come back as
    /// [`RelayOutcome::Rejected`].
    ///
    /// # Errors
    ///
    /// - `EndpointFailure` when a completion round fails
    /// - `ToolExecutionFailure` when the invoked tool fails
    /// - `EmptyCompletion` when the final round has no text
    #[instrument(skip_all, fields(turns = conversation.len(), tools = tools.len()))]
    pub async fn converse(
        &self,
        conversation: &mut Conversation,
        tools: &ToolRegistry,
    ) -> Result<RelayOutcome, Report<RelayError>> {
        let mut round = 1;
        let mut calls_made = 0;
        let mut last_call = None;
        let mut offer_tools = !tools.is_empty() && self.config.max_tool_calls > 0;

        loop {
            let mut request = LlmRequest::new(conversation.turns().to_vec());
            if offer_tools {
                request = request.with_tools(tools.specs().cloned().collect());
            }
            let response = self.complete(&request, round).await?;

            let call = match response.function_call {
                Some(call) if offer_tools => call,
                Some(call) => {
                    warn!(tool = %call.name, round, "ignoring tool call on a round without tools");
                    return finish(response.content, last_call, round);
                }
                None => return finish(response.content, last_call, round),
            };
            info!(tool = %call.name, round, "model requested tool");

            let (tool, arguments) = match tools.resolve(&call) {
                Ok(resolved) => resolved,
                Err(error) => {
                    warn!(tool = %call.name, %error, "rejected tool call");
                    return Ok(RelayOutcome::Rejected { error });
                }
            };

            let started = Instant::now();
            let output = match tool.execute(arguments).await {
                Ok(output) => output,
                Err(error) => {
                    let reason = error.to_string();
                    return Err(error).context(RelayError::ToolExecutionFailure {
                        tool: call.name.clone(),
                        reason,
                    });
                }
            };
            info!(
                tool = %call.name,
                latency_ms = started.elapsed().as_millis() as u64,
                output_len = output.len(),
                "tool finished"
            );

            conversation
                .append(Turn::function_call(call.clone()))
                .and_then(|()| conversation.append(Turn::function_result(&call.name, output)))
                .map_err(|e| RelayError::ConversationRejected {
                    reason: e.to_string(),
                })?;

            calls_made += 1;
            round += 1;
            offer_tools = calls_made < self.config.max_tool_calls;
            last_call = Some(call);
        }
    }

    async fn complete(
        &self,
        request: &LlmRequest,
        round: u32,
    ) -> Result<LlmResponse, Report<RelayError>> {
        let started = Instant::now();
        let response = match self.backend.generate(request).await {
            Ok(response) => response,
            Err(error) => {
                let reason = error.to_string();
                return Err(error).context(RelayError::EndpointFailure { round, reason });
            }
        };
        info!(
            round,
            latency_ms = started.elapsed().as_millis() as u64,
            tokens = response.usage.total(),
            "completion round finished"
        );
        Ok(response)
    }
}

fn finish(
    content: Option<String>,
    last_call: Option<FunctionCall>,
    round: u32,
) -> Result<RelayOutcome, Report<RelayError>> {
    let answer = content.ok_or(RelayError::EmptyCompletion { round })?;
    Ok(match last_call {
        Some(call) => RelayOutcome::ToolAssisted { answer, call },
        None => RelayOutcome::Answered { answer },
    })
}
