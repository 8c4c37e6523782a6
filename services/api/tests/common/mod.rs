//! Shared test harness: the real router over in-memory storage, a scripted
//! language model and a mailer that records what it would have sent.

#![allow(dead_code)]

use api_lib::adapters::InMemoryDb;
use api_lib::config::{Config, StorageBackend};
use api_lib::web::{build_router, AppState};
use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, HeaderMap, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use study_assistant_core::domain::{ArtifactKind, CodePurpose};
use study_assistant_core::ports::{
    CompletionRequest, CompletionService, MailService, PortError, PortResult,
};
use study_assistant_core::StudyMaterialGenerator;
use tokio::sync::{Notify, Semaphore};
use tower::util::ServiceExt;

pub const SUMMARY: &str = "## Photosynthesis\n- Plants convert light into chemical energy.";

pub const FLASHCARDS: &str = r#"```json
[
  {"question": "Where does photosynthesis happen?", "answer": "In the chloroplasts."},
  {"question": "What gas is released?", "answer": "Oxygen."},
  {"question": "What pigment absorbs light?", "answer": "Chlorophyll."}
]
```"#;

pub const PRACTICE_QUESTIONS: &str = r#"[
  {"question": "Which organelle hosts photosynthesis?", "options": ["Nucleus", "Chloroplast", "Ribosome", "Vacuole"], "correctAnswer": "Chloroplast", "explanation": "Chloroplasts contain chlorophyll."},
  {"question": "Which gas is consumed?", "options": ["Oxygen", "Nitrogen", "Carbon dioxide", "Helium"], "correctAnswer": "C", "explanation": "CO2 is fixed into sugar."}
]"#;

//=========================================================================================
// Scripted Completion Service
//=========================================================================================

/// Answers each artifact prompt with a canned reply. An optional gate holds every
/// call until permits are added, signalling `entered` as each call arrives.
pub struct ScriptedCompletion {
    replies: Mutex<HashMap<ArtifactKind, Result<String, String>>>,
    calls: Mutex<Vec<CompletionRequest>>,
    gate: Option<Arc<Semaphore>>,
    pub entered: Arc<Notify>,
}

impl ScriptedCompletion {
    pub fn new() -> Self {
        let replies = HashMap::from([
            (ArtifactKind::Summary, Ok(SUMMARY.to_string())),
            (ArtifactKind::Flashcards, Ok(FLASHCARDS.to_string())),
            (
                ArtifactKind::PracticeQuestions,
                Ok(PRACTICE_QUESTIONS.to_string()),
            ),
        ]);
        Self {
            replies: Mutex::new(replies),
            calls: Mutex::new(Vec::new()),
            gate: None,
            entered: Arc::new(Notify::new()),
        }
    }

    pub fn gated(gate: Arc<Semaphore>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::new()
        }
    }

    pub fn reply(&self, artifact: ArtifactKind, text: &str) {
        self.replies
            .lock()
            .unwrap()
            .insert(artifact, Ok(text.to_string()));
    }

    pub fn fail(&self, artifact: ArtifactKind, message: &str) {
        self.replies
            .lock()
            .unwrap()
            .insert(artifact, Err(message.to_string()));
    }

    pub fn calls(&self) -> Vec<ArtifactKind> {
        self.calls.lock().unwrap().iter().map(|c| c.artifact).collect()
    }

    pub fn last_prompt(&self, artifact: ArtifactKind) -> Option<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|c| c.artifact == artifact)
            .map(|c| c.user.clone())
    }
}

#[async_trait]
impl CompletionService for ScriptedCompletion {
    async fn complete(&self, request: &CompletionRequest) -> PortResult<String> {
        self.calls.lock().unwrap().push(request.clone());
        self.entered.notify_one();
        if let Some(gate) = &self.gate {
            let _permit = gate.acquire().await.expect("gate closed");
        }
        let reply = self.replies.lock().unwrap().get(&request.artifact).cloned();
        match reply {
            Some(Ok(text)) => Ok(text),
            Some(Err(message)) => Err(PortError::Upstream(message)),
            None => Err(PortError::Upstream("no scripted reply".to_string())),
        }
    }
}

//=========================================================================================
// Recording Mailer
//=========================================================================================

#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<(String, String, CodePurpose)>>,
}

impl RecordingMailer {
    pub fn last_code(&self, email: &str) -> Option<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(to, _, _)| to == email)
            .map(|(_, code, _)| code.clone())
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl MailService for RecordingMailer {
    async fn send_verification_code(
        &self,
        email: &str,
        code: &str,
        purpose: CodePurpose,
    ) -> PortResult<()> {
        self.sent
            .lock()
            .unwrap()
            .push((email.to_string(), code.to_string(), purpose));
        Ok(())
    }
}

//=========================================================================================
// Test Application
//=========================================================================================

pub struct TestApp {
    pub router: Router,
    pub db: Arc<InMemoryDb>,
    pub completion: Arc<ScriptedCompletion>,
    pub mailer: Arc<RecordingMailer>,
}

pub fn test_config() -> Config {
    Config {
        storage: StorageBackend::Memory,
        ..Config::default()
    }
}

pub fn test_app() -> TestApp {
    test_app_with(test_config(), ScriptedCompletion::new())
}

pub fn test_app_with(config: Config, completion: ScriptedCompletion) -> TestApp {
    let db = Arc::new(InMemoryDb::new());
    let completion = Arc::new(completion);
    let mailer = Arc::new(RecordingMailer::default());
    let generator = Arc::new(StudyMaterialGenerator::new(completion.clone()));
    let state = Arc::new(AppState::new(
        db.clone(),
        Arc::new(config),
        generator,
        mailer.clone(),
    ));
    TestApp {
        router: build_router(state),
        db,
        completion,
        mailer,
    }
}

//=========================================================================================
// Request Helpers
//=========================================================================================

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    /// The `session=<id>` pair from `Set-Cookie`, ready to send back.
    pub fn session_cookie(&self) -> Option<String> {
        self.headers
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .map(str::to_string)
    }
}

pub fn json_request(method: &str, uri: &str, cookie: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap()
}

pub fn empty_request(method: &str, uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

pub async fn send(router: &Router, request: Request<Body>) -> TestResponse {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };
    TestResponse {
        status,
        headers,
        body,
    }
}

/// Signs up with a password and returns the session cookie.
pub async fn sign_up(app: &TestApp, email: &str) -> String {
    let response = send(
        &app.router,
        json_request(
            "POST",
            "/auth/signup",
            None,
            json!({"email": email, "password": "correct horse"}),
        ),
    )
    .await;
    assert_eq!(response.status, StatusCode::CREATED, "{:?}", response.body);
    response.session_cookie().expect("signup sets a session cookie")
}

/// Stores a pasted document and returns its id.
pub async fn create_document(app: &TestApp, cookie: &str, title: &str, content: &str) -> String {
    let response = send(
        &app.router,
        json_request(
            "POST",
            "/documents",
            Some(cookie),
            json!({"title": title, "content": content}),
        ),
    )
    .await;
    assert_eq!(response.status, StatusCode::CREATED, "{:?}", response.body);
    response.body["id"].as_str().unwrap().to_string()
}

/// Runs generation for a stored document.
pub async fn process_document(app: &TestApp, cookie: &str, document_id: &str) -> TestResponse {
    send(
        &app.router,
        json_request(
            "POST",
            "/functions/process-document",
            Some(cookie),
            json!({"documentId": document_id}),
        ),
    )
    .await
}
