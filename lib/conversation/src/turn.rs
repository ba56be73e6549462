//! Turn types for conversations.

use chrono::{DateTime, Utc};
use glyphdesk_core::TurnId;
use serde::{Deserialize, Serialize};

/// The role of a turn's author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    /// Instructions framing the whole conversation.
    System,
    /// User/human turn.
    User,
    /// Assistant/model turn.
    Assistant,
    /// Output of a function the assistant asked to run.
    Function,
}

impl TurnRole {
    /// Returns the wire name of the role.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Function => "function",
        }
    }
}

impl std::fmt::Display for TurnRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A function call requested by the assistant.
///
/// `arguments` is kept as the raw text the model produced so the exact
/// payload can be replayed to the completion endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionCall {
    /// The function name.
    pub name: String,
    /// Raw JSON argument text.
    pub arguments: String,
}

impl FunctionCall {
    /// Creates a new function call.
    #[must_use]
    pub fn new(name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arguments: arguments.into(),
        }
    }
}

/// A turn in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    /// Unique turn identifier.
    pub id: TurnId,
    /// Who authored the turn.
    pub role: TurnRole,
    /// Turn text. `None` for assistant turns that only carry a function call.
    pub content: Option<String>,
    /// Function call requested by the assistant, if any.
    pub function_call: Option<FunctionCall>,
    /// Function name a function-result turn answers.
    pub name: Option<String>,
    /// When the turn was created.
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    fn new(role: TurnRole, content: Option<String>) -> Self {
        Self {
            id: TurnId::new(),
            role,
            content,
            function_call: None,
            name: None,
            timestamp: Utc::now(),
        }
    }

    /// Creates a system turn.
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(TurnRole::System, Some(content.into()))
    }

    /// Creates a user turn.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(TurnRole::User, Some(content.into()))
    }

    /// Creates an assistant turn with text content.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(TurnRole::Assistant, Some(content.into()))
    }

    /// Creates an assistant turn recording a function call, with null content.
    #[must_use]
    pub fn function_call(call: FunctionCall) -> Self {
        let mut turn = Self::new(TurnRole::Assistant, None);
        turn.function_call = Some(call);
        turn
    }

    /// Creates a function-result turn tagged with the function name.
    #[must_use]
    pub fn function_result(name: impl Into<String>, output: impl Into<String>) -> Self {
        let mut turn = Self::new(TurnRole::Function, Some(output.into()));
        turn.name = Some(name.into());
        turn
    }

    /// Returns true if this turn requests a function call.
    #[must_use]
    pub fn has_function_call(&self) -> bool {
        self.function_call.is_some()
    }

    /// Returns the text content, or an empty string for content-less turns.
    #[must_use]
    pub fn text(&self) -> &str {
        self.content.as_deref().unwrap_or_default()
    }
}
