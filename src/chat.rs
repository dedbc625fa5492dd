//! Chat-completion client.
//!
//! [`ChatClient`] is the capability the rest of the crate depends on: send a
//! conversation, get a [`ChatReply`]. [`GrokClient`] implements it against
//! an OpenAI-compatible `chat/completions` endpoint (xAI Grok by default).
//!
//! # Wire format
//!
//! Request:
//!
//! ```json
//! { "messages": [{"role": "user", "content": "hi"}],
//!   "model": "grok-4-latest", "stream": false, "temperature": 0.7 }
//! ```
//!
//! Response fields read: `choices[0].message.content`, `model`, `usage`.
//! Any of them may be missing; they default to `""`, the requested model,
//! and `{}` respectively.
//!
//! # Failures
//!
//! - No API key → [`RagError::ConfigurationMissing`], no request is sent.
//! - Transport error, timeout, non-2xx status, or a non-JSON body →
//!   [`RagError::RemoteCallFailed`]. Nothing is retried.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{Duration, Instant};

use crate::config::ChatConfig;
use crate::error::RagError;

/// Longest slice of an error response body carried into the error message.
const MAX_ERROR_BODY_CHARS: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// The assistant's reply plus whatever metadata the API echoed back.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatReply {
    pub content: String,
    pub model: String,
    /// Opaque token accounting from the API; `{}` when absent.
    pub usage: Value,
}

#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Sends `conversation` verbatim and returns the first completion.
    async fn complete(
        &self,
        conversation: &[Message],
        model: &str,
        temperature: f64,
    ) -> Result<ChatReply, RagError>;

    /// Fails with [`RagError::ConfigurationMissing`] when `complete` could
    /// never succeed for lack of credentials.
    fn ensure_configured(&self) -> Result<(), RagError> {
        Ok(())
    }
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    messages: &'a [Message],
    model: &'a str,
    stream: bool,
    temperature: f64,
}

pub struct GrokClient {
    http: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
    api_key_env: String,
    timeout_secs: u64,
}

impl GrokClient {
    /// Creates a client, reading the API key from `config.api_key_env`.
    pub fn new(config: &ChatConfig) -> Result<Self> {
        Self::with_api_key(config, config.api_key())
    }

    /// Creates a client with an explicit key (or none).
    pub fn with_api_key(config: &ChatConfig, api_key: Option<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        if api_key.is_none() {
            tracing::warn!(
                var = %config.api_key_env,
                "chat API key not set; chat endpoints will report a configuration error"
            );
        }

        Ok(Self {
            http,
            api_url: config.api_url.clone(),
            api_key,
            api_key_env: config.api_key_env.clone(),
            timeout_secs: config.timeout_secs,
        })
    }

    fn map_transport_error(&self, err: reqwest::Error) -> RagError {
        if err.is_timeout() {
            RagError::RemoteCallFailed(format!(
                "request timed out after {}s",
                self.timeout_secs
            ))
        } else {
            RagError::from(err)
        }
    }
}

#[async_trait]
impl ChatClient for GrokClient {
    async fn complete(
        &self,
        conversation: &[Message],
        model: &str,
        temperature: f64,
    ) -> Result<ChatReply, RagError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| RagError::ConfigurationMissing(self.api_key_env.clone()))?;

        let body = CompletionRequest {
            messages: conversation,
            model,
            stream: false,
            temperature,
        };

        let started = Instant::now();
        let response = self
            .http
            .post(&self.api_url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            let body_text: String = body_text.chars().take(MAX_ERROR_BODY_CHARS).collect();
            tracing::warn!(%status, model, "chat completion rejected");
            return Err(RagError::RemoteCallFailed(format!(
                "{} for url: {}: {}",
                status, self.api_url, body_text
            )));
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let reply = parse_completion(&json, model);

        tracing::info!(
            model = %reply.model,
            messages = conversation.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "chat completion succeeded"
        );

        Ok(reply)
    }

    fn ensure_configured(&self) -> Result<(), RagError> {
        match self.api_key {
            Some(_) => Ok(()),
            None => Err(RagError::ConfigurationMissing(self.api_key_env.clone())),
        }
    }
}

/// Extracts a [`ChatReply`] from a completion response, defaulting every
/// missing field instead of failing.
pub fn parse_completion(json: &Value, requested_model: &str) -> ChatReply {
    let content = json
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .unwrap_or_default()
        .to_string();

    let model = json
        .get("model")
        .and_then(|m| m.as_str())
        .unwrap_or(requested_model)
        .to_string();

    let usage = match json.get("usage") {
        Some(Value::Null) | None => Value::Object(Default::default()),
        Some(u) => u.clone(),
    };

    ChatReply {
        content,
        model,
        usage,
    }
}
