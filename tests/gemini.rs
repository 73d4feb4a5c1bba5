mod common;

use std::sync::{ Arc, Mutex };
use std::time::Duration;

use axum::extract::State;
use axum::http::{ HeaderMap, StatusCode, Uri };
use axum::response::IntoResponse;
use axum::{ Json, Router };
use serde_json::{ json, Value };

use common::{ app, post_chat, temp_store };
use faq_chat_backend::agent::{ FaqAgent, LlmState, Readiness };
use faq_chat_backend::error::LlmError;
use faq_chat_backend::llm::chat::gemini::GeminiChatClient;
use faq_chat_backend::llm::chat::{ ChatClient, Completion };
use faq_chat_backend::llm::session::ChatSessions;
use faq_chat_backend::llm::LlmMode;
use faq_chat_backend::models::chat::Turn;
use faq_chat_backend::store::DEFAULT_FAQS;

#[derive(Debug, Clone)]
struct Recorded {
    path: String,
    api_key: Option<String>,
    body: Value,
}

#[derive(Clone)]
struct Stub {
    status: StatusCode,
    reply: Value,
    seen: Arc<Mutex<Vec<Recorded>>>,
}

async fn stub_handler(
    State(stub): State<Stub>,
    uri: Uri,
    headers: HeaderMap,
    Json(body): Json<Value>
) -> impl IntoResponse {
    stub.seen.lock().unwrap().push(Recorded {
        path: uri.path().to_string(),
        api_key: headers
            .get("x-goog-api-key")
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned),
        body,
    });
    (stub.status, Json(stub.reply.clone()))
}

/// Serves a fake Gemini API on a random local port. Returns its base URL.
async fn spawn_stub(status: StatusCode, reply: Value) -> (String, Arc<Mutex<Vec<Recorded>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let stub = Stub { status, reply, seen: seen.clone() };
    let router = Router::new().fallback(stub_handler).with_state(stub);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    (format!("http://{}/v1beta", addr), seen)
}

fn client(base_url: String) -> GeminiChatClient {
    GeminiChatClient::new(
        "test-key".to_string(),
        "gemini-test".to_string(),
        base_url,
        Duration::from_secs(5)
    ).unwrap()
}

fn text_reply(text: &str) -> Value {
    json!({
        "candidates": [{
            "content": { "role": "model", "parts": [{ "text": text }] },
            "finishReason": "STOP"
        }]
    })
}

#[tokio::test]
async fn sends_prompt_to_generate_content() {
    let (base_url, seen) = spawn_stub(StatusCode::OK, text_reply("Hi there")).await;

    let completion = client(base_url).complete("Hello?").await.unwrap();
    assert_eq!(completion, Completion::Text("Hi there".to_string()));

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].path, "/v1beta/models/gemini-test:generateContent");
    assert_eq!(seen[0].api_key.as_deref(), Some("test-key"));
    assert_eq!(
        seen[0].body,
        json!({ "contents": [{ "role": "user", "parts": [{ "text": "Hello?" }] }] })
    );
}

#[tokio::test]
async fn transcript_roles_are_preserved() {
    let (base_url, seen) = spawn_stub(StatusCode::OK, text_reply("sure")).await;
    let turns = vec![Turn::user("a"), Turn::model("b"), Turn::user("c")];

    client(base_url).generate(&turns).await.unwrap();

    let body = &seen.lock().unwrap()[0].body;
    let roles: Vec<&str> = body["contents"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["role"].as_str().unwrap())
        .collect();
    assert_eq!(roles, vec!["user", "model", "user"]);
}

#[tokio::test]
async fn safety_stop_is_blocked() {
    let reply = json!({
        "candidates": [{ "content": { "parts": [{ "text": "nope" }] }, "finishReason": "SAFETY" }]
    });
    let (base_url, _) = spawn_stub(StatusCode::OK, reply).await;

    let completion = client(base_url).complete("Hello?").await.unwrap();
    assert_eq!(completion, Completion::Blocked("SAFETY".to_string()));
}

#[tokio::test]
async fn provider_error_carries_message() {
    let reply = json!({
        "error": { "code": 403, "message": "API key not valid.", "status": "PERMISSION_DENIED" }
    });
    let (base_url, _) = spawn_stub(StatusCode::FORBIDDEN, reply).await;

    let err = client(base_url).complete("Hello?").await.unwrap_err();
    match err {
        LlmError::Api { status, message } => {
            assert_eq!(status, 403);
            assert_eq!(message, "API key not valid.");
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn unreachable_provider_is_an_http_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = client(format!("http://{}/v1beta", addr)).complete("Hello?").await.unwrap_err();
    assert!(matches!(err, LlmError::Http(_)));
}

#[tokio::test]
async fn chat_endpoint_reaches_gemini_with_faq_context() {
    let (base_url, seen) = spawn_stub(StatusCode::OK, text_reply("Nine to six.")).await;
    let (_dir, store) = temp_store();
    store.prepare(&DEFAULT_FAQS).await.unwrap();

    let agent = FaqAgent::new(
        Some(store),
        Readiness::Ok,
        LlmState::Ready(ChatSessions::new(Arc::new(client(base_url)), LlmMode::Stateless)),
        None
    );
    let app = app(agent);

    let (status, body) = post_chat(&app, r#"{"message":"What are your hours?"}"#).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["reply"], "Nine to six.");

    let seen = seen.lock().unwrap();
    let prompt = seen[0].body["contents"][0]["parts"][0]["text"].as_str().unwrap();
    assert!(prompt.contains(DEFAULT_FAQS[0].answer));
    assert!(prompt.ends_with("Answer:"));
}
