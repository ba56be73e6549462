//! Error types for the conversation crate.
//!
//! Errors are designed for layered context using rootcause:
//! - `ConversationError`: Violations of the conversation store's ordering rules
//! - `ToolError`: Tool resolution, argument validation and execution failures

use std::fmt;

/// Errors from conversation store operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationError {
    /// A function-result turn was appended without a preceding function call.
    OrphanFunctionResult { name: Option<String> },
    /// A function-result turn names a different function than the call it follows.
    FunctionNameMismatch { expected: String, actual: String },
}

impl fmt::Display for ConversationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OrphanFunctionResult { name: Some(name) } => {
                write!(f, "function result for '{name}' does not follow a function call")
            }
            Self::OrphanFunctionResult { name: None } => {
                write!(f, "function result does not follow a function call")
            }
            Self::FunctionNameMismatch { expected, actual } => {
                write!(
                    f,
                    "function result names '{actual}' but the preceding call was '{expected}'"
                )
            }
        }
    }
}

impl std::error::Error for ConversationError {}

/// Errors from tool resolution, validation and execution.
///
/// The first four variants are detected before a tool runs; the relay turns
/// them into a textual answer instead of failing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolError {
    /// The model requested a tool that is not registered.
    UnknownTool { name: String },
    /// The argument payload is not a JSON object.
    MalformedArguments { name: String, reason: String },
    /// An argument was supplied that the tool does not declare.
    UnexpectedArgument { name: String, argument: String },
    /// A required argument without a default was not supplied.
    MissingRequiredArgument { name: String, argument: String },
    /// The tool ran and failed.
    ExecutionFailed { name: String, reason: String },
    /// A tool with the same name is already registered.
    DuplicateTool { name: String },
}

impl ToolError {
    /// Returns true for errors detected before the tool was invoked.
    #[must_use]
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::UnknownTool { .. }
                | Self::MalformedArguments { .. }
                | Self::UnexpectedArgument { .. }
                | Self::MissingRequiredArgument { .. }
        )
    }
}

impl fmt::Display for ToolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownTool { name } => write!(f, "Function {name} does not exist"),
            Self::MalformedArguments { name, reason } => {
                write!(f, "Malformed arguments for function {name}: {reason}")
            }
            Self::UnexpectedArgument { name, argument } => {
                write!(f, "Unexpected argument '{argument}' for function {name}")
            }
            Self::MissingRequiredArgument { name, argument } => {
                write!(f, "Missing required argument '{argument}' for function {name}")
            }
            Self::ExecutionFailed { name, reason } => {
                write!(f, "tool '{name}' execution failed: {reason}")
            }
            Self::DuplicateTool { name } => write!(f, "tool '{name}' is already registered"),
        }
    }
}

impl std::error::Error for ToolError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversation_error_display() {
        let err = ConversationError::FunctionNameMismatch {
            expected: "get_ocr_text".to_string(),
            actual: "get_ocr_text_from_filepath".to_string(),
        };
        assert!(err.to_string().contains("get_ocr_text_from_filepath"));
    }

    #[test]
    fn unknown_tool_display() {
        let err = ToolError::UnknownTool {
            name: "translate".to_string(),
        };
        assert_eq!(err.to_string(), "Function translate does not exist");
    }

    #[test]
    fn execution_failure_is_not_a_rejection() {
        let err = ToolError::ExecutionFailed {
            name: "get_ocr_text".to_string(),
            reason: "timeout".to_string(),
        };
        assert!(!err.is_rejection());
        assert!(err.to_string().contains("timeout"));

        let err = ToolError::MissingRequiredArgument {
            name: "get_ocr_text".to_string(),
            argument: "url".to_string(),
        };
        assert!(err.is_rejection());
    }
}
