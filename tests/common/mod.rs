#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::Path;
use std::sync::{ Arc, Mutex };

use async_trait::async_trait;
use axum::body::{ to_bytes, Body };
use axum::http::{ Request, StatusCode };
use axum::Router;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use faq_chat_backend::agent::{ FaqAgent, LlmState, Readiness };
use faq_chat_backend::error::LlmError;
use faq_chat_backend::llm::chat::{ ChatClient, Completion };
use faq_chat_backend::llm::session::ChatSessions;
use faq_chat_backend::llm::LlmMode;
use faq_chat_backend::models::chat::Turn;
use faq_chat_backend::store::FaqStore;

/// Replays queued outcomes and records every transcript it was sent.
/// Once the queue is drained it answers "ok".
#[derive(Default)]
pub struct ScriptedClient {
    outcomes: Mutex<VecDeque<Result<Completion, String>>>,
    calls: Mutex<Vec<Vec<Turn>>>,
}

impl ScriptedClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_outcomes(outcomes: Vec<Result<Completion, String>>) -> Arc<Self> {
        Arc::new(Self {
            outcomes: Mutex::new(outcomes.into()),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<Vec<Turn>> {
        self.calls.lock().unwrap().clone()
    }

    pub fn last_prompt(&self) -> String {
        self.calls
            .lock()
            .unwrap()
            .last()
            .and_then(|turns| turns.last())
            .map(|turn| turn.content.clone())
            .expect("client was never called")
    }
}

#[async_trait]
impl ChatClient for ScriptedClient {
    async fn generate(&self, turns: &[Turn]) -> Result<Completion, LlmError> {
        self.calls.lock().unwrap().push(turns.to_vec());
        match self.outcomes.lock().unwrap().pop_front() {
            Some(Ok(completion)) => Ok(completion),
            Some(Err(message)) => Err(LlmError::Api { status: 503, message }),
            None => Ok(Completion::Text("ok".to_string())),
        }
    }

    fn get_model(&self) -> String {
        "scripted".to_string()
    }
}

pub fn sqlite_url(dir: &Path) -> String {
    format!("sqlite://{}?mode=rwc", dir.join("faq.db").display())
}

pub fn temp_store() -> (TempDir, FaqStore) {
    let dir = tempfile::tempdir().unwrap();
    let store = FaqStore::connect(&sqlite_url(dir.path()), 1).unwrap();
    (dir, store)
}

/// A store whose database file can never be opened.
pub fn unreachable_store() -> (TempDir, FaqStore) {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("missing").join("faq.db").display());
    let store = FaqStore::connect(&url, 1).unwrap();
    (dir, store)
}

pub fn ready_agent(
    store: Option<FaqStore>,
    client: Arc<ScriptedClient>,
    mode: LlmMode
) -> FaqAgent {
    FaqAgent::new(
        store,
        Readiness::Ok,
        LlmState::Ready(ChatSessions::new(client, mode)),
        None
    )
}

pub fn app(agent: FaqAgent) -> Router {
    faq_chat_backend::server::api::router(Arc::new(agent))
}

pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, String) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

pub async fn get_json(app: &Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let (status, body) = send(app, request).await;
    (status, serde_json::from_str(&body).unwrap())
}

pub async fn post_chat(app: &Router, body: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri("/api/chat")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let (status, body) = send(app, request).await;
    (status, serde_json::from_str(&body).unwrap())
}
