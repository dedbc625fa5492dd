//! End-to-end tests for the HTTP router.
//!
//! Retrieval runs on the hash embedder so no model download is needed, and
//! the chat API is a wiremock server.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

use sentence_rag::chat::GrokClient;
use sentence_rag::config::Config;
use sentence_rag::corpus;
use sentence_rag::rag::RagService;
use sentence_rag::retriever::Retriever;
use sentence_rag::server::{router, AppState};

async fn app(api_url: String, api_key: Option<&str>) -> Router {
    app_with_timeout(api_url, api_key, 5).await
}

async fn app_with_timeout(api_url: String, api_key: Option<&str>, timeout_secs: u64) -> Router {
    let mut config = Config::default();
    config.embedding.provider = "hash".to_string();
    config.chat.api_url = api_url;
    config.chat.timeout_secs = timeout_secs;

    let retriever = Retriever::from_config(&config.embedding).await.unwrap();
    let chat = GrokClient::with_api_key(&config.chat, api_key.map(String::from)).unwrap();
    let rag = RagService::new(Arc::new(retriever), Arc::new(chat), &config);

    router(AppState::new(Arc::new(config), Arc::new(rag))).unwrap()
}

async fn app_with_mock(server: &MockServer) -> Router {
    app(
        format!("{}/v1/chat/completions", server.uri()),
        Some("test-key"),
    )
    .await
}

async fn offline_app() -> Router {
    app(UNREACHABLE_API_URL.to_string(), None).await
}

async fn send(app: Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn completion(content: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "model": "grok-4-0709",
        "choices": [{"message": {"role": "assistant", "content": content}}],
        "usage": {"total_tokens": 42}
    }))
}

// ============ GET / and /health ============

#[tokio::test]
async fn test_root_returns_message() {
    let (status, body) = send(offline_app().await, get("/")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["message"].as_str().unwrap().contains("running"));
}

#[tokio::test]
async fn test_health_reports_corpus() {
    let (status, body) = send(offline_app().await, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["documents"], corpus::DOCUMENTS.len());
    assert_eq!(body["embedding_model"], "hash");
}

// ============ GET /search ============

#[tokio::test]
async fn test_search_faiss_top1() {
    let (status, body) = send(offline_app().await, get("/search?query=FAISS&k=1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["query"], "FAISS");

    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 1);
    assert!(results[0].as_str().unwrap().contains("FAISS"));
}

#[tokio::test]
async fn test_search_default_k_is_two() {
    let (_, body) = send(
        offline_app().await,
        get("/search?query=vector%20databases"),
    )
    .await;
    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 2);
    assert!(results[0].as_str().unwrap().starts_with("Vector databases"));
}

#[tokio::test]
async fn test_search_k_capped_at_corpus_size() {
    let (_, body) = send(offline_app().await, get("/search?query=embeddings&k=10")).await;
    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), corpus::DOCUMENTS.len());
}

#[tokio::test]
async fn test_search_empty_query_is_error_body() {
    let (status, body) = send(offline_app().await, get("/search?query=")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["error"]
        .as_str()
        .unwrap()
        .starts_with("Retrieval error:"));
}

#[tokio::test]
async fn test_search_missing_query_is_rejected() {
    let (status, _) = send(offline_app().await, get("/search")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ============ POST /chat ============

#[tokio::test]
async fn test_chat_without_key() {
    let (status, body) = send(
        offline_app().await,
        post_json(
            "/chat",
            json!({"messages": [{"role": "user", "content": "hello"}]}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"error": "GROK_API_KEY not configured"}));
}

#[tokio::test]
async fn test_chat_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(completion("hello back"))
        .expect(1)
        .mount(&server)
        .await;

    let (status, body) = send(
        app_with_mock(&server).await,
        post_json(
            "/chat",
            json!({"messages": [{"role": "user", "content": "hello"}]}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["content"], "hello back");
    assert_eq!(body["model"], "grok-4-0709");
    assert_eq!(body["usage"]["total_tokens"], 42);

    let received = server.received_requests().await.unwrap();
    let sent: Value = received[0].body_json().unwrap();
    assert_eq!(sent["model"], "grok-4-latest");
    assert_eq!(sent["temperature"], 0.7);
    assert_eq!(sent["stream"], false);
    assert_eq!(sent["messages"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_chat_overrides_model_and_temperature() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(completion("ok"))
        .mount(&server)
        .await;

    send(
        app_with_mock(&server).await,
        post_json(
            "/chat",
            json!({
                "messages": [{"role": "user", "content": "hello"}],
                "model": "grok-3-mini",
                "temperature": 0.2
            }),
        ),
    )
    .await;

    let received = server.received_requests().await.unwrap();
    let sent: Value = received[0].body_json().unwrap();
    assert_eq!(sent["model"], "grok-3-mini");
    assert_eq!(sent["temperature"], 0.2);
}

#[tokio::test]
async fn test_chat_remote_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let (status, body) = send(
        app_with_mock(&server).await,
        post_json(
            "/chat",
            json!({"messages": [{"role": "user", "content": "hello"}]}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["error"]
        .as_str()
        .unwrap()
        .starts_with("Grok API error: "));
}

/// Nothing listens on the discard port, so the request fails at connect.
const UNREACHABLE_API_URL: &str = "http://127.0.0.1:9/v1/chat/completions";

#[tokio::test]
async fn test_chat_transport_failure_is_error_body() {
    let app = app(UNREACHABLE_API_URL.to_string(), Some("test-key")).await;
    let (status, body) = send(
        app,
        post_json(
            "/chat",
            json!({"messages": [{"role": "user", "content": "hello"}]}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["error"]
        .as_str()
        .unwrap()
        .starts_with("Grok API error: "));
}

#[tokio::test]
async fn test_chat_timeout_is_error_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(completion("too late").set_delay(std::time::Duration::from_secs(3)))
        .mount(&server)
        .await;

    let app = app_with_timeout(
        format!("{}/v1/chat/completions", server.uri()),
        Some("test-key"),
        1,
    )
    .await;
    let (status, body) = send(
        app,
        post_json(
            "/chat",
            json!({"messages": [{"role": "user", "content": "hello"}]}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"error": "Grok API error: request timed out after 1s"})
    );
}

#[tokio::test]
async fn test_chat_unknown_role_is_rejected() {
    let (status, _) = send(
        offline_app().await,
        post_json(
            "/chat",
            json!({"messages": [{"role": "wizard", "content": "hello"}]}),
        ),
    )
    .await;
    assert!(status.is_client_error());
}

// ============ POST /chat-with-context ============

#[tokio::test]
async fn test_chat_with_context_prepends_system_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(completion("FAISS does similarity search."))
        .expect(1)
        .mount(&server)
        .await;

    let (status, body) = send(
        app_with_mock(&server).await,
        post_json(
            "/chat-with-context?query=What%20is%20FAISS%3F",
            json!({"messages": [{"role": "user", "content": "What is FAISS?"}]}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["content"], "FAISS does similarity search.");

    let context = body["context"].as_array().unwrap();
    assert!(!context.is_empty() && context.len() <= 2);
    for doc in context {
        assert!(corpus::DOCUMENTS.contains(&doc.as_str().unwrap()));
    }
    assert!(context[0].as_str().unwrap().contains("FAISS"));

    let received = server.received_requests().await.unwrap();
    let sent: Value = received[0].body_json().unwrap();
    let messages = sent["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["role"], "system");
    assert!(messages[0]["content"]
        .as_str()
        .unwrap()
        .starts_with("You are a helpful assistant."));
    assert!(messages[0]["content"]
        .as_str()
        .unwrap()
        .contains(context[0].as_str().unwrap()));
    assert_eq!(messages[1]["content"], "What is FAISS?");
}

#[tokio::test]
async fn test_chat_with_context_accepts_bare_array() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(completion("ok"))
        .mount(&server)
        .await;

    let (status, body) = send(
        app_with_mock(&server).await,
        post_json(
            "/chat-with-context?query=embeddings",
            json!([{"role": "user", "content": "Tell me about embeddings"}]),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["content"], "ok");
    assert_eq!(body["context"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_chat_with_context_without_key_skips_remote() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(completion("unused"))
        .expect(0)
        .mount(&server)
        .await;

    let app = app(
        format!("{}/v1/chat/completions", server.uri()),
        None,
    )
    .await;
    let (_, body) = send(
        app,
        post_json(
            "/chat-with-context?query=FAISS",
            json!({"messages": [{"role": "user", "content": "What is FAISS?"}]}),
        ),
    )
    .await;

    assert_eq!(body, json!({"error": "GROK_API_KEY not configured"}));
}

#[tokio::test]
async fn test_chat_with_context_transport_failure_is_error_body() {
    let app = app(UNREACHABLE_API_URL.to_string(), Some("test-key")).await;
    let (status, body) = send(
        app,
        post_json(
            "/chat-with-context?query=FAISS",
            json!({"messages": [{"role": "user", "content": "What is FAISS?"}]}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["error"]
        .as_str()
        .unwrap()
        .starts_with("Grok API error: "));
    assert!(body.get("context").is_none());
}

// ============ POST /chat-langchain ============

#[tokio::test]
async fn test_qa_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(completion("A library for similarity search."))
        .expect(1)
        .mount(&server)
        .await;

    let (status, body) = send(
        app_with_mock(&server).await,
        post_json("/chat-langchain?query=What%20does%20FAISS%20do%3F", json!({})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["query"], "What does FAISS do?");
    assert_eq!(body["answer"], "A library for similarity search.");
    assert_eq!(body["method"], "langchain-rag");

    let received = server.received_requests().await.unwrap();
    let sent: Value = received[0].body_json().unwrap();
    let messages = sent["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["role"], "user");
    let prompt = messages[0]["content"].as_str().unwrap();
    assert!(prompt.contains("Question: What does FAISS do?"));
    assert!(prompt.contains(corpus::DOCUMENTS[1]));
}

#[tokio::test]
async fn test_qa_failure_is_prefixed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let (status, body) = send(
        app_with_mock(&server).await,
        post_json("/chat-langchain?query=FAISS", json!({})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["error"]
        .as_str()
        .unwrap()
        .starts_with("LangChain error: Grok API error: "));
}

#[tokio::test]
async fn test_qa_without_key() {
    let (_, body) = send(
        offline_app().await,
        post_json("/chat-langchain?query=FAISS", json!({})),
    )
    .await;
    assert_eq!(
        body,
        json!({"error": "LangChain error: GROK_API_KEY not configured"})
    );
}

// ============ CORS ============

#[tokio::test]
async fn test_cors_allows_configured_origin() {
    let req = Request::builder()
        .method("OPTIONS")
        .uri("/search?query=FAISS")
        .header(header::ORIGIN, "http://localhost:5173")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
        .body(Body::empty())
        .unwrap();

    let response = offline_app().await.oneshot(req).await.unwrap();
    let headers = response.headers();
    assert_eq!(
        headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
        "http://localhost:5173"
    );
    assert_eq!(
        headers
            .get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS)
            .unwrap(),
        "true"
    );
}

#[tokio::test]
async fn test_cors_ignores_unknown_origin() {
    let req = Request::builder()
        .uri("/")
        .header(header::ORIGIN, "http://evil.example")
        .body(Body::empty())
        .unwrap();

    let response = offline_app().await.oneshot(req).await.unwrap();
    assert!(response
        .headers()
        .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
        .is_none());
}
