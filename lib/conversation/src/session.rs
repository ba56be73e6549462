//! Chat session state.
//!
//! A session owns everything one browser accumulates: the conversation sent
//! to the model, the pending-upload slot, and the transcript shown back to
//! the user.

use crate::conversation::Conversation;
use chrono::{DateTime, Utc};
use glyphdesk_core::ChatSessionId;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A staged file waiting to be referenced by the next user turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingUpload {
    /// Path of the staged copy.
    pub path: PathBuf,
    /// When the upload was staged.
    pub staged_at: DateTime<Utc>,
}

impl PendingUpload {
    /// Creates a pending upload for a staged path.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            staged_at: Utc::now(),
        }
    }
}

/// What the user contributed to an exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum UserEntry {
    /// Typed text.
    Text(String),
    /// An uploaded image, by staged path.
    Image(PathBuf),
}

/// One row of the transcript.
///
/// `reply` starts as `None` and is filled once the answer arrives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exchange {
    /// The user's side.
    pub user: UserEntry,
    /// The assistant's reply, once known.
    pub reply: Option<String>,
}

/// A chat session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSession {
    /// Unique session identifier.
    pub id: ChatSessionId,
    /// Turns sent to the model.
    pub conversation: Conversation,
    /// Staged upload awaiting the next user turn.
    pending_upload: Option<PendingUpload>,
    /// Display history.
    transcript: Vec<Exchange>,
    /// When the session was created.
    pub created_at: DateTime<Utc>,
    /// When the session was last active.
    pub last_active_at: DateTime<Utc>,
}

impl ChatSession {
    /// Creates a new, empty session.
    #[must_use]
    pub fn new() -> Self {
        Self::with_id(ChatSessionId::new())
    }

    /// Creates a new, empty session with a known identifier.
    #[must_use]
    pub fn with_id(id: ChatSessionId) -> Self {
        let now = Utc::now();
        Self {
            id,
            conversation: Conversation::new(),
            pending_upload: None,
            transcript: Vec::new(),
            created_at: now,
            last_active_at: now,
        }
    }

    /// Offers a staged file to the pending-upload slot.
    ///
    /// The slot only accepts a file when the previous one was consumed.
    /// Returns whether the file was accepted.
    pub fn offer_upload(&mut self, path: impl Into<PathBuf>) -> bool {
        self.touch();
        if self.pending_upload.is_some() {
            return false;
        }
        self.pending_upload = Some(PendingUpload::new(path));
        true
    }

    /// Returns the pending upload, if any.
    #[must_use]
    pub fn pending_upload(&self) -> Option<&PendingUpload> {
        self.pending_upload.as_ref()
    }

    /// Takes the pending upload, leaving the slot empty.
    pub fn take_pending_upload(&mut self) -> Option<PendingUpload> {
        self.pending_upload.take()
    }

    /// Appends a transcript row with an empty reply and returns its index.
    pub fn record(&mut self, user: UserEntry) -> usize {
        self.touch();
        self.transcript.push(Exchange { user, reply: None });
        self.transcript.len() - 1
    }

    /// Fills the reply of a transcript row that has none yet.
    ///
    /// Returns false if the row does not exist or already has a reply.
    pub fn fill_reply(&mut self, index: usize, reply: impl Into<String>) -> bool {
        match self.transcript.get_mut(index) {
            Some(exchange) if exchange.reply.is_none() => {
                exchange.reply = Some(reply.into());
                true
            }
            _ => false,
        }
    }

    /// Returns the display history.
    #[must_use]
    pub fn transcript(&self) -> &[Exchange] {
        &self.transcript
    }

    /// Returns whether the newest transcript row is an image.
    #[must_use]
    pub fn last_entry_is_image(&self) -> bool {
        matches!(
            self.transcript.last(),
            Some(Exchange {
                user: UserEntry::Image(_),
                ..
            })
        )
    }

    /// Starts over: clears the conversation, the pending upload and the
    /// transcript.
    pub fn reset(&mut self) {
        self.conversation.reset();
        self.pending_upload = None;
        self.transcript.clear();
        self.touch();
    }

    fn touch(&mut self) {
        self.last_active_at = Utc::now();
    }
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new()
    }
}

/// Formats the user turn content, referencing a staged file when present.
#[must_use]
pub fn compose_user_content(text: Option<&str>, upload: Option<&Path>) -> Option<String> {
    let text = text.map(str::trim).filter(|t| !t.is_empty());
    match (text, upload) {
        (Some(text), Some(path)) => Some(format!("{text} filepath={}", path.display())),
        (None, Some(path)) => Some(format!("filepath={}", path.display())),
        (Some(text), None) => Some(text.to_string()),
        (None, None) => None,
    }
}
