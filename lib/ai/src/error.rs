//! Error types for the AI crate.
//!
//! Errors are designed for layered context using rootcause:
//! - `LlmError`: Low-level completion backend operations
//! - `RelayError`: Tool-call relay failures (wraps lower errors via context)

use std::fmt;

/// Errors from completion backend operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LlmError {
    /// The request could not be sent or no response arrived.
    RequestFailed { reason: String },
    /// The endpoint answered with a non-success status.
    Http { status: u16, body: String },
    /// Response parsing failed.
    ResponseParseFailed { reason: String },
    /// Timeout waiting for response.
    Timeout,
    /// Invalid configuration.
    InvalidConfig { reason: String },
}

impl fmt::Display for LlmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RequestFailed { reason } => {
                write!(f, "completion request failed: {reason}")
            }
            Self::Http { status, body } => {
                write!(f, "completion endpoint returned {status}: {body}")
            }
            Self::ResponseParseFailed { reason } => {
                write!(f, "failed to parse completion response: {reason}")
            }
            Self::Timeout => write!(f, "completion request timed out"),
            Self::InvalidConfig { reason } => {
                write!(f, "invalid completion configuration: {reason}")
            }
        }
    }
}

impl std::error::Error for LlmError {}

/// Errors from a `converse` invocation.
///
/// Use these to add context when wrapping lower-level errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayError {
    /// Completion endpoint failure (use as context wrapper).
    ///
    /// `reason` holds the endpoint error's message.
    EndpointFailure { round: u32, reason: String },
    /// The invoked tool failed (use as context wrapper).
    ToolExecutionFailure { tool: String, reason: String },
    /// The model returned neither text nor a tool call.
    EmptyCompletion { round: u32 },
    /// The relay could not record the call in the conversation.
    ConversationRejected { reason: String },
}

impl fmt::Display for RelayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EndpointFailure { round, reason } => {
                write!(f, "completion round {round} failed: {reason}")
            }
            Self::ToolExecutionFailure { tool, reason } => {
                write!(f, "tool '{tool}' failed: {reason}")
            }
            Self::EmptyCompletion { round } => {
                write!(f, "completion round {round} returned no content")
            }
            Self::ConversationRejected { reason } => {
                write!(f, "conversation rejected the tool call: {reason}")
            }
        }
    }
}

impl std::error::Error for RelayError {}
