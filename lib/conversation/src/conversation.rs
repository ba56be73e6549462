//! Append-only conversation store.
//!
//! Holds the ordered turns of one session. Turns are never edited after they
//! are appended; the only way to drop them is [`Conversation::reset`].

use crate::error::ConversationError;
use crate::turn::{Turn, TurnRole};
use serde::{Deserialize, Serialize};

/// Ordered sequence of turns for a single session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Conversation {
    turns: Vec<Turn>,
}

impl Conversation {
    /// Creates an empty conversation.
    #[must_use]
    pub fn new() -> Self {
        Self { turns: Vec::new() }
    }

    /// Appends a turn to the end of the conversation.
    ///
    /// # Errors
    ///
    /// A function-result turn must directly follow a turn carrying a
    /// function call with the same name.
    pub fn append(&mut self, turn: Turn) -> Result<(), ConversationError> {
        if turn.role == TurnRole::Function {
            let call = self.last().and_then(|t| t.function_call.as_ref());
            match (call, &turn.name) {
                (None, name) => {
                    return Err(ConversationError::OrphanFunctionResult { name: name.clone() });
                }
                (Some(call), Some(name)) if &call.name != name => {
                    return Err(ConversationError::FunctionNameMismatch {
                        expected: call.name.clone(),
                        actual: name.clone(),
                    });
                }
                (Some(call), None) => {
                    return Err(ConversationError::FunctionNameMismatch {
                        expected: call.name.clone(),
                        actual: String::new(),
                    });
                }
                _ => {}
            }
        }
        self.turns.push(turn);
        Ok(())
    }

    /// Empties the conversation.
    pub fn reset(&mut self) {
        self.turns.clear();
    }

    /// Returns the most recent turn, if any.
    #[must_use]
    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// Returns all turns in order.
    #[must_use]
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Returns the number of turns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Returns whether the conversation has no turns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Returns whether no system turn has been appended yet.
    #[must_use]
    pub fn is_fresh(&self) -> bool {
        !self.turns.iter().any(|t| t.role == TurnRole::System)
    }
}
