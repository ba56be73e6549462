//! Chat submission flow.
//!
//! One submission carries optional text and an optional image. The image is
//! staged and parked in the session's pending-upload slot; the next text turn
//! references it by path so the model can call the file OCR tool.

use crate::error::ApiError;
use crate::state::AppState;
use glyphdesk_conversation::{ChatSession, Turn, UserEntry, compose_user_content};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

/// Reply given when only an image was submitted.
pub const IMAGE_ONLY_REPLY: &str =
    "If you have a specific question or need help with the image, tell me what you need.";

/// What the user sent.
#[derive(Debug, Clone, Default)]
pub struct Submission {
    /// Typed text.
    pub text: Option<String>,
    /// Local path of the received image, before staging.
    pub image: Option<PathBuf>,
}

impl Submission {
    fn text(&self) -> Option<&str> {
        self.text.as_deref().map(str::trim).filter(|t| !t.is_empty())
    }
}

/// What the assistant answered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatReply {
    /// Text shown to the user.
    pub answer: String,
    /// Tool that contributed to the answer, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
    /// Staged upload still waiting for a text turn.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_upload: Option<PathBuf>,
}

/// Runs one submission against a session.
///
/// # Errors
///
/// - `EmptySubmission` when there is neither text nor an image
/// - `Storage` when the image cannot be staged; nothing reaches the model
/// - `Relay` when the relay fails; the pending upload is discarded
#[instrument(skip_all, fields(session = %session.id, has_image = submission.image.is_some()))]
pub async fn submit(
    state: &AppState,
    session: &mut ChatSession,
    submission: Submission,
) -> Result<ChatReply, ApiError> {
    let text = submission.text();
    if text.is_none() && submission.image.is_none() {
        return Err(ApiError::EmptySubmission);
    }

    if let Some(image) = &submission.image {
        let staged = state.staging.store(image).await.map_err(ApiError::Storage)?;
        if !session.offer_upload(&staged.path) {
            warn!(path = %staged.path.display(), "an earlier upload is still pending; keeping it");
        }
        session.record(UserEntry::Image(staged.path));
    }

    let Some(text) = text else {
        let index = session.transcript().len() - 1;
        session.fill_reply(index, IMAGE_ONLY_REPLY);
        return Ok(ChatReply {
            answer: IMAGE_ONLY_REPLY.to_string(),
            tool: None,
            pending_upload: session.pending_upload().map(|p| p.path.clone()),
        });
    };

    let index = session.record(UserEntry::Text(text.to_string()));
    let upload = session.take_pending_upload().map(|p| p.path);
    if session.conversation.is_fresh() {
        append(session, Turn::system(&state.system_prompt))?;
    }
    let content = compose_user_content(Some(text), upload.as_deref())
        .unwrap_or_else(|| text.to_string());
    append(session, Turn::user(content))?;

    let outcome = match state
        .relay
        .converse(&mut session.conversation, &state.tools)
        .await
    {
        Ok(outcome) => outcome,
        Err(report) => {
            warn!(
                error = %report,
                discarded_upload = ?upload.as_deref().map(Path::display),
                "relay failed"
            );
            return Err(ApiError::Relay {
                message: report.current_context().to_string(),
                discarded_upload: upload,
            });
        }
    };

    let answer = outcome.answer();
    session.fill_reply(index, &answer);
    append(session, Turn::assistant(&answer))?;
    let tool = outcome.call().map(|call| call.name.clone());
    info!(tool = ?tool, answer_len = answer.len(), "submission answered");

    Ok(ChatReply {
        answer,
        tool,
        pending_upload: None,
    })
}

fn append(session: &mut ChatSession, turn: Turn) -> Result<(), ApiError> {
    session
        .conversation
        .append(turn)
        .map_err(|e| ApiError::Internal {
            details: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{StubOcr, state_with};
    use glyphdesk_ai::LlmResponse;
    use glyphdesk_conversation::TurnRole;

    fn image_file(dir: &Path) -> PathBuf {
        let path = dir.join("upload.png");
        std::fs::write(&path, b"PNGDATA").expect("write image");
        path
    }

    fn text(value: &str) -> Submission {
        Submission {
            text: Some(value.to_string()),
            image: None,
        }
    }

    #[tokio::test]
    async fn empty_submission_rejected() {
        let staging = tempfile::tempdir().expect("staging");
        let (state, backend) = state_with(staging.path(), vec![], StubOcr::ok("unused"));
        let mut session = ChatSession::new();

        let err = submit(&state, &mut session, text("   ")).await.unwrap_err();

        assert!(matches!(err, ApiError::EmptySubmission));
        assert!(session.transcript().is_empty());
        assert!(backend.requests().is_empty());
    }

    #[tokio::test]
    async fn plain_question_is_answered() {
        let staging = tempfile::tempdir().expect("staging");
        let (state, backend) = state_with(
            staging.path(),
            vec![LlmResponse::text("Hello! How can I help?")],
            StubOcr::ok("unused"),
        );
        let mut session = ChatSession::new();

        let reply = submit(&state, &mut session, text("hello")).await.expect("reply");

        assert_eq!(reply.answer, "Hello! How can I help?");
        assert_eq!(reply.tool, None);

        let turns = session.conversation.turns();
        assert_eq!(turns.len(), 3);
        assert_eq!(turns[0].role, TurnRole::System);
        assert_eq!(turns[1].text(), "hello");
        assert_eq!(turns[2].role, TurnRole::Assistant);
        assert_eq!(
            session.transcript()[0].reply.as_deref(),
            Some("Hello! How can I help?")
        );
        assert_eq!(backend.requests().len(), 1);
    }

    #[tokio::test]
    async fn image_only_parks_upload() {
        let sources = tempfile::tempdir().expect("sources");
        let staging = tempfile::tempdir().expect("staging");
        let (state, backend) = state_with(staging.path(), vec![], StubOcr::ok("unused"));
        let mut session = ChatSession::new();

        let reply = submit(
            &state,
            &mut session,
            Submission {
                text: None,
                image: Some(image_file(sources.path())),
            },
        )
        .await
        .expect("reply");

        assert_eq!(reply.answer, IMAGE_ONLY_REPLY);
        let pending = reply.pending_upload.expect("pending upload");
        assert!(pending.starts_with(staging.path()));
        assert!(session.last_entry_is_image());
        assert_eq!(session.transcript()[0].reply.as_deref(), Some(IMAGE_ONLY_REPLY));
        assert!(session.conversation.is_empty());
        assert!(backend.requests().is_empty());
    }

    #[tokio::test]
    async fn image_then_text_runs_file_ocr() {
        let sources = tempfile::tempdir().expect("sources");
        let staging = tempfile::tempdir().expect("staging");
        let (state, backend) = state_with(
            staging.path(),
            vec![],
            StubOcr::ok(r#"{"content":"INVOICE 42"}"#),
        );
        let mut session = ChatSession::new();

        submit(
            &state,
            &mut session,
            Submission {
                text: None,
                image: Some(image_file(sources.path())),
            },
        )
        .await
        .expect("image");
        let staged = session.pending_upload().expect("pending").path.clone();

        backend.push(LlmResponse::call(
            "get_ocr_text_from_filepath",
            serde_json::json!({ "filepath": staged }).to_string(),
        ));
        backend.push(LlmResponse::text(r#"{"invoice": 42}"#));

        let reply = submit(&state, &mut session, text("recognize this image,"))
            .await
            .expect("reply");

        assert_eq!(reply.answer, r#"{"invoice": 42}"#);
        assert_eq!(reply.tool.as_deref(), Some("get_ocr_text_from_filepath"));
        assert!(session.pending_upload().is_none());

        let requests = backend.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(
            requests[0].turns[1].text(),
            format!("recognize this image, filepath={}", staged.display())
        );
        let follow_up = &requests[1].turns;
        assert_eq!(follow_up[follow_up.len() - 1].role, TurnRole::Function);
        assert_eq!(follow_up[follow_up.len() - 1].text(), r#"{"content":"INVOICE 42"}"#);

        let transcript = session.transcript();
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript[1].reply.as_deref(), Some(r#"{"invoice": 42}"#));
    }

    #[tokio::test]
    async fn image_with_text_in_one_submission() {
        let sources = tempfile::tempdir().expect("sources");
        let staging = tempfile::tempdir().expect("staging");
        let (state, backend) = state_with(
            staging.path(),
            vec![LlmResponse::text("It is a receipt.")],
            StubOcr::ok("unused"),
        );
        let mut session = ChatSession::new();

        let reply = submit(
            &state,
            &mut session,
            Submission {
                text: Some("what is this?".to_string()),
                image: Some(image_file(sources.path())),
            },
        )
        .await
        .expect("reply");

        assert_eq!(reply.answer, "It is a receipt.");
        assert_eq!(session.transcript().len(), 2);
        assert!(session.transcript()[0].reply.is_none());
        assert!(session.pending_upload().is_none());
        assert!(
            backend.requests()[0].turns[1]
                .text()
                .starts_with("what is this? filepath=")
        );
    }

    #[tokio::test]
    async fn relay_failure_discards_upload() {
        let sources = tempfile::tempdir().expect("sources");
        let staging = tempfile::tempdir().expect("staging");
        let (state, _backend) = state_with(staging.path(), vec![], StubOcr::ok("unused"));
        let mut session = ChatSession::new();

        let err = submit(
            &state,
            &mut session,
            Submission {
                text: Some("read it".to_string()),
                image: Some(image_file(sources.path())),
            },
        )
        .await
        .unwrap_err();

        match err {
            ApiError::Relay {
                message,
                discarded_upload,
            } => {
                assert_eq!(
                    message,
                    "completion round 1 failed: completion endpoint returned 503: service unavailable"
                );
                assert!(discarded_upload.is_some());
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(session.pending_upload().is_none());
        assert!(session.transcript()[1].reply.is_none());
    }

    #[tokio::test]
    async fn staging_failure_skips_model() {
        let staging = tempfile::tempdir().expect("staging");
        let (state, backend) = state_with(staging.path(), vec![], StubOcr::ok("unused"));
        let mut session = ChatSession::new();

        let err = submit(
            &state,
            &mut session,
            Submission {
                text: Some("read it".to_string()),
                image: Some(staging.path().join("vanished.png")),
            },
        )
        .await
        .unwrap_err();

        assert!(matches!(err, ApiError::Storage(_)));
        assert!(session.transcript().is_empty());
        assert!(backend.requests().is_empty());
    }

    #[tokio::test]
    async fn rejected_call_answers_with_reason() {
        let staging = tempfile::tempdir().expect("staging");
        let (state, _backend) = state_with(
            staging.path(),
            vec![LlmResponse::call("translate", "{}")],
            StubOcr::ok("unused"),
        );
        let mut session = ChatSession::new();

        let reply = submit(&state, &mut session, text("translate this")).await.expect("reply");

        assert_eq!(reply.answer, "Function translate does not exist");
        assert_eq!(
            session.conversation.last().map(Turn::text),
            Some("Function translate does not exist")
        );
    }

    #[tokio::test]
    async fn tool_failure_fails_submission() {
        let sources = tempfile::tempdir().expect("sources");
        let staging = tempfile::tempdir().expect("staging");
        let (state, backend) = state_with(staging.path(), vec![], StubOcr::ok("unused"));
        let mut session = ChatSession::new();
        let missing = staging.path().join("never-staged.png");
        backend.push(LlmResponse::call(
            "get_ocr_text_from_filepath",
            serde_json::json!({ "filepath": missing }).to_string(),
        ));

        let err = submit(
            &state,
            &mut session,
            Submission {
                text: Some("read it".to_string()),
                image: Some(image_file(sources.path())),
            },
        )
        .await
        .unwrap_err();

        assert!(matches!(err, ApiError::Relay { .. }));
        assert!(err.to_string().contains("get_ocr_text_from_filepath"));
        assert!(err.to_string().contains("failed to read image"));
        assert!(session.pending_upload().is_none());
        assert_eq!(backend.requests().len(), 1);
    }

    #[tokio::test]
    async fn reset_starts_over_with_system_turn() {
        let sources = tempfile::tempdir().expect("sources");
        let staging = tempfile::tempdir().expect("staging");
        let (state, backend) = state_with(
            staging.path(),
            vec![LlmResponse::text("one"), LlmResponse::text("two")],
            StubOcr::ok("unused"),
        );
        let mut session = ChatSession::new();

        submit(&state, &mut session, text("first")).await.expect("first");
        submit(
            &state,
            &mut session,
            Submission {
                text: None,
                image: Some(image_file(sources.path())),
            },
        )
        .await
        .expect("image");

        session.reset();
        assert!(session.pending_upload().is_none());

        submit(&state, &mut session, text("again")).await.expect("again");

        let last_request = backend.requests().pop().expect("request");
        assert_eq!(last_request.turns.len(), 2);
        assert_eq!(last_request.turns[0].role, TurnRole::System);
        assert_eq!(last_request.turns[1].text(), "again");
    }

    #[tokio::test]
    async fn system_prompt_only_once() {
        let staging = tempfile::tempdir().expect("staging");
        let (state, _backend) = state_with(
            staging.path(),
            vec![LlmResponse::text("one"), LlmResponse::text("two")],
            StubOcr::ok("unused"),
        );
        let mut session = ChatSession::new();

        submit(&state, &mut session, text("first")).await.expect("first");
        submit(&state, &mut session, text("second")).await.expect("second");

        let systems = session
            .conversation
            .turns()
            .iter()
            .filter(|t| t.role == TurnRole::System)
            .count();
        assert_eq!(systems, 1);
        assert_eq!(session.conversation.len(), 5);
    }
}
