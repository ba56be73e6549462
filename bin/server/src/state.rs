//! Shared application state.

use crate::config::ServerConfig;
use glyphdesk_ai::{OpenAiBackend, Relay};
use glyphdesk_conversation::{ChatSession, ToolRegistry};
use glyphdesk_core::ChatSessionId;
use glyphdesk_ocr::{AliyunOcrClient, OcrFromFileTool, OcrFromUrlTool};
use glyphdesk_staging::StagingArea;
use chrono::{TimeDelta, Utc};
use rootcause::prelude::*;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};

/// Errors building the application state at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartupError {
    /// The completion backend could not be created.
    CompletionBackend,
    /// The OCR client could not be created.
    OcrClient,
    /// A tool could not be registered.
    ToolRegistration,
}

impl fmt::Display for StartupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CompletionBackend => write!(f, "failed to create the completion backend"),
            Self::OcrClient => write!(f, "failed to create the OCR client"),
            Self::ToolRegistration => write!(f, "failed to register tools"),
        }
    }
}

impl std::error::Error for StartupError {}

/// A session shared between requests; one submission holds the lock at a time.
pub type SharedSession = Arc<Mutex<ChatSession>>;

/// How long a session may sit unused before it is dropped.
pub const DEFAULT_SESSION_IDLE: Duration = Duration::from_secs(60 * 60);

/// In-memory chat sessions keyed by cookie.
///
/// Sessions idle for longer than the idle timeout are dropped whenever a new
/// session is created.
#[derive(Debug)]
pub struct SessionStore {
    sessions: RwLock<HashMap<ChatSessionId, SharedSession>>,
    idle_timeout: TimeDelta,
}

impl SessionStore {
    /// Creates an empty store with the default idle timeout.
    #[must_use]
    pub fn new() -> Self {
        Self::with_idle_timeout(DEFAULT_SESSION_IDLE)
    }

    /// Creates an empty store that drops sessions idle for `idle_timeout`.
    #[must_use]
    pub fn with_idle_timeout(idle_timeout: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            idle_timeout: TimeDelta::from_std(idle_timeout).unwrap_or(TimeDelta::MAX),
        }
    }

    /// Returns an existing session.
    pub async fn get(&self, id: ChatSessionId) -> Option<SharedSession> {
        self.sessions.read().await.get(&id).cloned()
    }

    /// Returns the session for `id`, or a new session when `id` is unknown.
    pub async fn get_or_create(&self, id: Option<ChatSessionId>) -> (ChatSessionId, SharedSession) {
        if let Some(id) = id
            && let Some(session) = self.get(id).await
        {
            return (id, session);
        }

        let session = ChatSession::new();
        let id = session.id;
        let shared = Arc::new(Mutex::new(session));
        let mut sessions = self.sessions.write().await;
        let dropped = self.drop_idle(&mut sessions);
        sessions.insert(id, Arc::clone(&shared));
        tracing::debug!(session = %id, dropped, "created chat session");
        (id, shared)
    }

    /// Drops idle sessions and returns how many were dropped.
    pub async fn prune_idle(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        self.drop_idle(&mut sessions)
    }

    fn drop_idle(&self, sessions: &mut HashMap<ChatSessionId, SharedSession>) -> usize {
        let Some(cutoff) = Utc::now().checked_sub_signed(self.idle_timeout) else {
            return 0;
        };
        let before = sessions.len();
        // A locked session is serving a request.
        sessions.retain(|_, session| {
            session
                .try_lock()
                .map_or(true, |session| session.last_active_at >= cutoff)
        });
        before - sessions.len()
    }

    /// Returns the number of sessions.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

/// State shared by all handlers.
#[derive(Debug)]
pub struct AppState {
    /// Relay between the model and the tools.
    pub relay: Relay,
    /// Tools offered to the model.
    pub tools: ToolRegistry,
    /// Where uploads are copied.
    pub staging: StagingArea,
    /// Chat sessions.
    pub sessions: SessionStore,
    /// Prompt for fresh conversations.
    pub system_prompt: String,
}

impl AppState {
    /// Creates a new application state.
    pub fn new(
        relay: Relay,
        tools: ToolRegistry,
        staging: StagingArea,
        system_prompt: impl Into<String>,
    ) -> Self {
        Self {
            relay,
            tools,
            staging,
            sessions: SessionStore::new(),
            system_prompt: system_prompt.into(),
        }
    }

    /// Wires the completion backend, OCR client and tools from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if a backend rejects its configuration.
    pub fn from_config(config: &ServerConfig) -> Result<Self, Report<StartupError>> {
        let backend =
            OpenAiBackend::new(config.completion.clone()).context(StartupError::CompletionBackend)?;
        let relay = Relay::new(Arc::new(backend)).with_config(config.relay.clone());

        let ocr = Arc::new(AliyunOcrClient::new(config.ocr.clone()).context(StartupError::OcrClient)?);
        let mut tools = ToolRegistry::new();
        tools
            .register(OcrFromUrlTool::new(ocr.clone()))
            .context(StartupError::ToolRegistration)?;
        tools
            .register(OcrFromFileTool::new(ocr, &config.staging_dir))
            .context(StartupError::ToolRegistration)?;

        let mut state = Self::new(
            relay,
            tools,
            StagingArea::new(&config.staging_dir),
            &config.system_prompt,
        );
        state.sessions =
            SessionStore::with_idle_timeout(Duration::from_secs(config.session_idle_seconds));
        Ok(state)
    }
}
