//! Completion backends and the tool-call relay for glyphdesk.
//!
//! This crate provides:
//!
//! - **Backend**: The completion-provider abstraction and its request/response types
//! - **OpenAI backend**: Azure OpenAI and OpenAI-compatible chat completions over HTTP
//! - **Relay**: The ask-model, maybe-invoke-tool, ask-again sequence

pub mod backend;
pub mod error;
pub mod openai;
pub mod relay;

pub use backend::{
    LlmBackend, LlmBackendConfig, LlmProvider, LlmRequest, LlmResponse, TokenUsage, ToolChoice,
};
pub use error::{LlmError, RelayError};
pub use openai::OpenAiBackend;
pub use relay::{Relay, RelayConfig, RelayOutcome};
