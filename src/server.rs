//! HTTP server.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/` | Liveness message |
//! | `GET`  | `/health` | Status, version, corpus size, embedding model |
//! | `GET`  | `/search?query=..&k=2` | Nearest documents to `query` |
//! | `POST` | `/chat` | Forward a conversation to the chat API |
//! | `POST` | `/chat-with-context?query=..` | Chat with retrieved documents as a system message |
//! | `POST` | `/chat-langchain?query=..` | Answer a question through the QA prompt template |
//!
//! # Error Contract
//!
//! Retrieval and chat failures are reported in the body, with status `200`:
//!
//! ```json
//! { "error": "GROK_API_KEY not configured" }
//! ```
//!
//! Malformed requests (missing `query`, invalid JSON) are rejected by the
//! extractors with the usual `4xx` statuses.
//!
//! # CORS
//!
//! Origins come from `[server].allowed_origins`; credentials are allowed and
//! request methods and headers are mirrored.

use anyhow::{Context, Result};
use axum::{
    extract::{Query, State},
    http::HeaderValue,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::chat::{ChatReply, GrokClient, Message};
use crate::config::Config;
use crate::error::RagError;
use crate::rag::{ChatOptions, ContextReply, RagService};
use crate::retriever::Retriever;

/// Reported in the `method` field of `/chat-langchain` responses.
const QA_METHOD: &str = "langchain-rag";

/// Process-wide state shared by all handlers.
///
/// Built once at startup; everything inside is read-only afterwards.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub rag: Arc<RagService>,
}

impl AppState {
    pub fn new(config: Arc<Config>, rag: Arc<RagService>) -> Self {
        Self { config, rag }
    }

    /// Loads the embedding model, indexes the built-in corpus and creates
    /// the chat client described by `config`.
    pub async fn build(config: Config) -> Result<Self> {
        let retriever = Retriever::from_config(&config.embedding).await?;
        let chat = GrokClient::new(&config.chat)?;
        let rag = RagService::new(Arc::new(retriever), Arc::new(chat), &config);

        Ok(Self::new(Arc::new(config), Arc::new(rag)))
    }
}

/// Starts the HTTP server on `[server].bind` and runs until Ctrl-C.
pub async fn run_server(config: &Config) -> Result<()> {
    let bind_addr = config.server.bind.clone();
    let state = AppState::build(config.clone()).await?;
    let app = router(state)?;

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", bind_addr))?;
    tracing::info!("server listening on http://{}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
}

/// Builds the router with CORS and request tracing applied.
pub fn router(state: AppState) -> Result<Router> {
    let cors = cors_layer(&state.config.server.allowed_origins)?;

    Ok(Router::new()
        .route("/", get(handle_root))
        .route("/health", get(handle_health))
        .route("/search", get(handle_search))
        .route("/chat", post(handle_chat))
        .route("/chat-with-context", post(handle_chat_with_context))
        .route("/chat-langchain", post(handle_chat_qa))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}

fn cors_layer(origins: &[String]) -> Result<CorsLayer> {
    if origins.iter().any(|o| o == "*") {
        // Wildcard origins cannot be combined with credentials.
        return Ok(CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any));
    }

    let origins = origins
        .iter()
        .map(|o| {
            o.parse::<HeaderValue>()
                .with_context(|| format!("Invalid CORS origin: {}", o))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request()))
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

/// A failure reported to the client as `{"error": message}`.
#[derive(Debug)]
pub struct ApiError {
    message: String,
}

impl ApiError {
    fn with_prefix(prefix: &str, err: RagError) -> Self {
        tracing::warn!(kind = err.kind(), error = %err, "request failed");
        Self {
            message: format!("{}{}", prefix, err),
        }
    }
}

impl From<RagError> for ApiError {
    fn from(err: RagError) -> Self {
        Self::with_prefix("", err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        Json(ErrorBody {
            error: self.message,
        })
        .into_response()
    }
}

// ============ GET / ============

#[derive(Serialize)]
struct RootResponse {
    message: String,
}

async fn handle_root() -> Json<RootResponse> {
    Json(RootResponse {
        message: "sentence-rag is running".to_string(),
    })
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    documents: usize,
    embedding_model: String,
}

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    let retriever = state.rag.retriever();
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        documents: retriever.len(),
        embedding_model: retriever.model_name().to_string(),
    })
}

// ============ GET /search ============

#[derive(Deserialize)]
struct SearchParams {
    query: String,
    k: Option<usize>,
}

#[derive(Serialize)]
struct SearchResponse {
    query: String,
    results: Vec<String>,
}

async fn handle_search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, ApiError> {
    let k = params.k.unwrap_or(state.config.retrieval.default_k);
    let results = state.rag.retriever().retrieve(&params.query, k).await?;
    Ok(Json(SearchResponse {
        query: params.query,
        results,
    }))
}

// ============ POST /chat ============

/// Body of `/chat`, and the object form of `/chat-with-context`.
#[derive(Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<Message>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub temperature: Option<f64>,
}

impl ChatRequest {
    fn options(&self) -> ChatOptions {
        ChatOptions {
            model: self.model.clone(),
            temperature: self.temperature,
        }
    }
}

async fn handle_chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatReply>, ApiError> {
    let reply = state.rag.chat(&req.messages, &req.options()).await?;
    Ok(Json(reply))
}

// ============ POST /chat-with-context ============

#[derive(Deserialize)]
struct ContextParams {
    query: String,
}

/// Accepts either `{"messages": [...]}` or a bare message array.
#[derive(Deserialize)]
#[serde(untagged)]
enum ContextChatBody {
    Request(ChatRequest),
    Messages(Vec<Message>),
}

async fn handle_chat_with_context(
    State(state): State<AppState>,
    Query(params): Query<ContextParams>,
    Json(body): Json<ContextChatBody>,
) -> Result<Json<ContextReply>, ApiError> {
    let (messages, options) = match body {
        ContextChatBody::Request(req) => {
            let options = req.options();
            (req.messages, options)
        }
        ContextChatBody::Messages(messages) => (messages, ChatOptions::default()),
    };

    let reply = state
        .rag
        .answer(&params.query, &messages, &options)
        .await?;
    Ok(Json(reply))
}

// ============ POST /chat-langchain ============

#[derive(Deserialize)]
struct AskParams {
    query: String,
}

async fn handle_chat_qa(
    State(state): State<AppState>,
    Query(params): Query<AskParams>,
) -> Result<Json<Value>, ApiError> {
    let answer = state
        .rag
        .ask(&params.query)
        .await
        .map_err(|e| ApiError::with_prefix("LangChain error: ", e))?;

    Ok(Json(serde_json::json!({
        "query": params.query,
        "answer": answer,
        "method": QA_METHOD,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cors_accepts_default_origins() {
        let cfg = Config::default();
        assert!(cors_layer(&cfg.server.allowed_origins).is_ok());
    }

    #[test]
    fn test_cors_wildcard() {
        assert!(cors_layer(&["*".to_string()]).is_ok());
    }

    #[test]
    fn test_cors_rejects_invalid_origin() {
        assert!(cors_layer(&["http://bad\norigin".to_string()]).is_err());
    }

    #[test]
    fn test_error_prefix() {
        let err = ApiError::with_prefix(
            "LangChain error: ",
            RagError::RemoteCallFailed("timeout".to_string()),
        );
        assert_eq!(err.message, "LangChain error: Grok API error: timeout");
    }

    #[test]
    fn test_context_body_forms() {
        let bare: ContextChatBody =
            serde_json::from_str(r#"[{"role": "user", "content": "hi"}]"#).unwrap();
        assert!(matches!(bare, ContextChatBody::Messages(ref m) if m.len() == 1));

        let object: ContextChatBody = serde_json::from_str(
            r#"{"messages": [{"role": "user", "content": "hi"}], "model": "grok-3"}"#,
        )
        .unwrap();
        match object {
            ContextChatBody::Request(req) => assert_eq!(req.model.as_deref(), Some("grok-3")),
            ContextChatBody::Messages(_) => panic!("expected object form"),
        }
    }
}
