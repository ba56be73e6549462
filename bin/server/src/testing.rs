//! Test doubles shared by the handler tests.

use crate::state::AppState;
use async_trait::async_trait;
use glyphdesk_ai::{LlmBackend, LlmError, LlmProvider, LlmRequest, LlmResponse, Relay};
use glyphdesk_conversation::ToolRegistry;
use glyphdesk_ocr::{
    ImageSource, OcrBackend, OcrError, OcrFromFileTool, OcrFromUrlTool, Transcription,
};
use glyphdesk_staging::StagingArea;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Backend replaying canned responses; fails once they run out.
#[derive(Default)]
pub(crate) struct ScriptedBackend {
    responses: Mutex<VecDeque<LlmResponse>>,
    requests: Mutex<Vec<LlmRequest>>,
}

impl ScriptedBackend {
    pub(crate) fn push(&self, response: LlmResponse) {
        self.responses.lock().expect("lock").push_back(response);
    }

    pub(crate) fn requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().expect("lock").clone()
    }
}

#[async_trait]
impl LlmBackend for ScriptedBackend {
    async fn generate(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        self.requests.lock().expect("lock").push(request.clone());
        self.responses
            .lock()
            .expect("lock")
            .pop_front()
            .ok_or(LlmError::Http {
                status: 503,
                body: "service unavailable".to_string(),
            })
    }

    fn provider(&self) -> LlmProvider {
        LlmProvider::OpenAiCompatible
    }

    fn model(&self) -> &str {
        "scripted"
    }
}

/// OCR backend returning a fixed text.
pub(crate) struct StubOcr {
    text: String,
}

impl StubOcr {
    pub(crate) fn ok(text: &str) -> Self {
        Self {
            text: text.to_string(),
        }
    }
}

#[async_trait]
impl OcrBackend for StubOcr {
    async fn recognize(&self, _source: ImageSource) -> Result<Transcription, OcrError> {
        Ok(Transcription {
            request_id: None,
            text: self.text.clone(),
        })
    }
}

/// Builds state with the real OCR tools over a stub OCR backend.
pub(crate) fn state_with(
    staging_dir: &Path,
    responses: Vec<LlmResponse>,
    ocr: StubOcr,
) -> (AppState, Arc<ScriptedBackend>) {
    let backend = Arc::new(ScriptedBackend::default());
    for response in responses {
        backend.push(response);
    }
    let ocr: Arc<dyn OcrBackend> = Arc::new(ocr);
    let mut tools = ToolRegistry::new();
    tools
        .register(OcrFromUrlTool::new(ocr.clone()))
        .expect("url tool");
    tools
        .register(OcrFromFileTool::new(ocr, staging_dir))
        .expect("file tool");

    let state = AppState::new(
        Relay::new(backend.clone()),
        tools,
        StagingArea::new(staging_dir),
        "You are a test assistant.",
    );
    (state, backend)
}
