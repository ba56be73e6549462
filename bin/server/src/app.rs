//! HTTP routes.

use crate::chat::{self, ChatReply, Submission};
use crate::error::ApiError;
use crate::state::{AppState, SharedSession};
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use glyphdesk_conversation::Exchange;
use glyphdesk_core::ChatSessionId;
use std::path::Path;
use std::sync::Arc;
use tempfile::NamedTempFile;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

/// Session cookie name.
pub const SESSION_COOKIE: &str = "glyphdesk_session";

/// Builds the application router.
pub fn router(state: Arc<AppState>, static_dir: &Path, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/api/chat", post(submit_chat))
        .route("/api/reset", post(reset))
        .route("/api/history", get(history))
        .route("/health", get(health))
        .fallback_service(ServeDir::new(static_dir))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cookie_session_id(jar: &CookieJar) -> Option<ChatSessionId> {
    jar.get(SESSION_COOKIE)
        .and_then(|cookie| cookie.value().parse::<ChatSessionId>().ok())
}

async fn session_for(state: &AppState, jar: CookieJar) -> (CookieJar, SharedSession) {
    let known = cookie_session_id(&jar);
    let (id, session) = state.sessions.get_or_create(known).await;
    if known == Some(id) {
        return (jar, session);
    }
    let cookie = Cookie::build((SESSION_COOKIE, id.to_string()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax);
    (jar.add(cookie), session)
}

async fn existing_session(state: &AppState, jar: &CookieJar) -> Option<SharedSession> {
    state.sessions.get(cookie_session_id(jar)?).await
}

/// A received upload, held in a temporary file until it is staged.
struct ReceivedImage {
    file: NamedTempFile,
}

async fn read_submission(
    mut multipart: Multipart,
) -> Result<(Option<String>, Option<ReceivedImage>), ApiError> {
    let invalid = |e: axum::extract::multipart::MultipartError| ApiError::InvalidRequest {
        reason: e.body_text(),
    };
    let mut text = None;
    let mut image = None;

    while let Some(field) = multipart.next_field().await.map_err(invalid)? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("text") => text = Some(field.text().await.map_err(invalid)?),
            Some("image") => {
                let extension = field
                    .file_name()
                    .and_then(|name| Path::new(name).extension())
                    .and_then(|ext| ext.to_str())
                    .map(|ext| format!(".{ext}"))
                    .unwrap_or_default();
                let bytes = field.bytes().await.map_err(invalid)?;
                // Browsers send an empty part when no file was chosen.
                if bytes.is_empty() {
                    continue;
                }
                let file = tempfile::Builder::new()
                    .prefix("glyphdesk-")
                    .suffix(&extension)
                    .tempfile()
                    .map_err(|e| ApiError::Internal {
                        details: e.to_string(),
                    })?;
                tokio::fs::write(file.path(), &bytes)
                    .await
                    .map_err(|e| ApiError::Internal {
                        details: e.to_string(),
                    })?;
                image = Some(ReceivedImage { file });
            }
            _ => {}
        }
    }
    Ok((text, image))
}

async fn submit_chat(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    multipart: Multipart,
) -> Result<(CookieJar, Result<Json<ChatReply>, ApiError>), ApiError> {
    let (text, image) = read_submission(multipart).await?;
    let (jar, session) = session_for(&state, jar).await;

    let submission = Submission {
        text,
        image: image.as_ref().map(|i| i.file.path().to_path_buf()),
    };
    let mut session = session.lock().await;
    let reply = chat::submit(&state, &mut session, submission).await.map(Json);
    Ok((jar, reply))
}

async fn reset(State(state): State<Arc<AppState>>, jar: CookieJar) -> StatusCode {
    if let Some(session) = existing_session(&state, &jar).await {
        session.lock().await.reset();
        tracing::info!("chat session reset");
    }
    StatusCode::NO_CONTENT
}

async fn history(State(state): State<Arc<AppState>>, jar: CookieJar) -> Json<Vec<Exchange>> {
    let transcript = match existing_session(&state, &jar).await {
        Some(session) => session.lock().await.transcript().to_vec(),
        None => Vec::new(),
    };
    Json(transcript)
}

async fn health() -> &'static str {
    "ok"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{StubOcr, state_with};
    use axum::body::Body;
    use axum::http::{Request, header};
    use glyphdesk_ai::LlmResponse;
    use tower::ServiceExt;

    const BOUNDARY: &str = "glyphdesk-test-boundary";

    fn multipart_body(text: Option<&str>, image: Option<(&str, &[u8])>) -> Vec<u8> {
        let mut body = Vec::new();
        if let Some(text) = text {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"text\"\r\n\r\n{text}\r\n"
                )
                .as_bytes(),
            );
        }
        if let Some((name, bytes)) = image {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"{name}\"\r\nContent-Type: image/png\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(bytes);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn chat_request(body: Vec<u8>, cookie: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/api/chat")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            );
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder.body(Body::from(body)).expect("request")
    }

    fn session_cookie(response: &axum::response::Response) -> String {
        let raw = response
            .headers()
            .get(header::SET_COOKIE)
            .expect("set-cookie")
            .to_str()
            .expect("ascii");
        raw.split(';').next().expect("pair").to_string()
    }

    async fn json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        serde_json::from_slice(&bytes).expect("json")
    }

    #[tokio::test]
    async fn health_is_ok() {
        let staging = tempfile::tempdir().expect("staging");
        let (state, _) = state_with(staging.path(), vec![], StubOcr::ok("unused"));
        let app = router(Arc::new(state), staging.path(), 1024);

        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).expect("request"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn chat_sets_cookie_and_answers() {
        let staging = tempfile::tempdir().expect("staging");
        let (state, _) = state_with(
            staging.path(),
            vec![LlmResponse::text("Hi there")],
            StubOcr::ok("unused"),
        );
        let app = router(Arc::new(state), staging.path(), 1024 * 1024);

        let response = app
            .oneshot(chat_request(multipart_body(Some("hello"), None), None))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        assert!(session_cookie(&response).starts_with("glyphdesk_session=sess_"));
        assert_eq!(json(response).await["answer"], "Hi there");
    }

    #[tokio::test]
    async fn upload_then_question_uses_same_session() {
        let staging = tempfile::tempdir().expect("staging");
        let (state, backend) = state_with(staging.path(), vec![], StubOcr::ok("TOTAL 12.50"));
        let state = Arc::new(state);
        let app = router(state.clone(), staging.path(), 1024 * 1024);

        let response = app
            .clone()
            .oneshot(chat_request(
                multipart_body(None, Some(("receipt.png", b"PNGDATA"))),
                None,
            ))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let cookie = session_cookie(&response);
        let body = json(response).await;
        let staged = body["pending_upload"].as_str().expect("pending").to_string();
        assert!(staged.ends_with(".png"));

        backend.push(LlmResponse::call(
            "get_ocr_text_from_filepath",
            serde_json::json!({ "filepath": staged }).to_string(),
        ));
        backend.push(LlmResponse::text("The total is 12.50"));

        let response = app
            .clone()
            .oneshot(chat_request(
                multipart_body(Some("what is the total?"), None),
                Some(&cookie),
            ))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let body = json(response).await;
        assert_eq!(body["answer"], "The total is 12.50");
        assert_eq!(body["tool"], "get_ocr_text_from_filepath");

        let history = app
            .oneshot(
                Request::get("/api/history")
                    .header(header::COOKIE, &cookie)
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        let transcript = json(history).await;
        assert_eq!(transcript.as_array().map(Vec::len), Some(2));
        assert_eq!(transcript[0]["user"]["kind"], "image");
        assert_eq!(transcript[1]["reply"], "The total is 12.50");
    }

    #[tokio::test]
    async fn empty_submission_is_bad_request() {
        let staging = tempfile::tempdir().expect("staging");
        let (state, _) = state_with(staging.path(), vec![], StubOcr::ok("unused"));
        let app = router(Arc::new(state), staging.path(), 1024);

        let response = app
            .oneshot(chat_request(multipart_body(Some(""), None), None))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn relay_failure_is_bad_gateway() {
        let staging = tempfile::tempdir().expect("staging");
        let (state, _) = state_with(staging.path(), vec![], StubOcr::ok("unused"));
        let app = router(Arc::new(state), staging.path(), 1024 * 1024);

        let response = app
            .oneshot(chat_request(
                multipart_body(Some("read it"), Some(("scan.jpg", b"JPEG"))),
                None,
            ))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let body = json(response).await;
        assert!(
            body["error"]
                .as_str()
                .is_some_and(|e| e.contains("503: service unavailable"))
        );
        assert!(
            body["discarded_upload"]
                .as_str()
                .is_some_and(|p| p.ends_with(".jpg"))
        );
    }

    #[tokio::test]
    async fn reset_clears_history() {
        let staging = tempfile::tempdir().expect("staging");
        let (state, _) = state_with(
            staging.path(),
            vec![LlmResponse::text("Hi")],
            StubOcr::ok("unused"),
        );
        let app = router(Arc::new(state), staging.path(), 1024 * 1024);

        let response = app
            .clone()
            .oneshot(chat_request(multipart_body(Some("hello"), None), None))
            .await
            .expect("response");
        let cookie = session_cookie(&response);

        let reset = app
            .clone()
            .oneshot(
                Request::post("/api/reset")
                    .header(header::COOKIE, &cookie)
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(reset.status(), StatusCode::NO_CONTENT);

        let history = app
            .oneshot(
                Request::get("/api/history")
                    .header(header::COOKIE, &cookie)
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(json(history).await, serde_json::json!([]));
    }

    #[tokio::test]
    async fn cookieless_reads_create_no_session() {
        let staging = tempfile::tempdir().expect("staging");
        let (state, _) = state_with(staging.path(), vec![], StubOcr::ok("unused"));
        let state = Arc::new(state);
        let app = router(state.clone(), staging.path(), 1024);

        for _ in 0..3 {
            let history = app
                .clone()
                .oneshot(Request::get("/api/history").body(Body::empty()).expect("request"))
                .await
                .expect("response");
            assert!(history.headers().get(header::SET_COOKIE).is_none());
            assert_eq!(json(history).await, serde_json::json!([]));

            let reset = app
                .clone()
                .oneshot(Request::post("/api/reset").body(Body::empty()).expect("request"))
                .await
                .expect("response");
            assert_eq!(reset.status(), StatusCode::NO_CONTENT);
        }

        let unknown = app
            .oneshot(
                Request::get("/api/history")
                    .header(header::COOKIE, "glyphdesk_session=sess_01ARZ3NDEKTSV4RRFFQ69G5FAV")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(unknown.status(), StatusCode::OK);
        assert_eq!(state.sessions.len().await, 0);
    }

    #[tokio::test]
    async fn static_page_served_at_root() {
        let staging = tempfile::tempdir().expect("staging");
        let site = tempfile::tempdir().expect("site");
        std::fs::write(site.path().join("index.html"), "<h1>glyphdesk</h1>").expect("write");
        let (state, _) = state_with(staging.path(), vec![], StubOcr::ok("unused"));
        let app = router(Arc::new(state), site.path(), 1024);

        let response = app
            .oneshot(Request::get("/").body(Body::empty()).expect("request"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
    }
}
