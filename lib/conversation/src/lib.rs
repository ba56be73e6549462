//! Conversation service for glyphdesk.
//!
//! This crate provides:
//!
//! - **Conversation Store**: Append-only turn history for one session
//! - **Tool Registry**: Declared tools and argument validation
//! - **Chat Session**: Pending upload slot and display transcript

pub mod conversation;
pub mod error;
pub mod session;
pub mod tool;
pub mod turn;

pub use conversation::Conversation;
pub use error::{ConversationError, ToolError};
pub use session::{ChatSession, Exchange, PendingUpload, UserEntry, compose_user_content};
pub use tool::{ParamType, ParameterSpec, Tool, ToolArguments, ToolRegistry, ToolSpec};
pub use turn::{FunctionCall, Turn, TurnRole};
