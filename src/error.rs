//! Failure taxonomy for retrieval and chat operations.
//!
//! Every failure that can reach an HTTP client is one of three kinds:
//!
//! | Variant | Cause |
//! |---------|-------|
//! | [`RagError::ConfigurationMissing`] | The chat API credential is not set |
//! | [`RagError::RemoteCallFailed`] | Transport error, timeout, or non-2xx from the chat API |
//! | [`RagError::RetrievalFailed`] | Embedding or index failure while answering a query |
//!
//! The `Display` strings double as the `{"error": ...}` payloads returned by
//! the server, so they match what existing clients expect.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RagError {
    /// The environment variable holding the API key is unset or empty.
    #[error("{0} not configured")]
    ConfigurationMissing(String),

    #[error("Grok API error: {0}")]
    RemoteCallFailed(String),

    #[error("Retrieval error: {0}")]
    RetrievalFailed(String),
}

impl RagError {
    /// Short machine-readable label, used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            RagError::ConfigurationMissing(_) => "configuration_missing",
            RagError::RemoteCallFailed(_) => "remote_call_failed",
            RagError::RetrievalFailed(_) => "retrieval_failed",
        }
    }
}

impl From<reqwest::Error> for RagError {
    fn from(err: reqwest::Error) -> Self {
        RagError::RemoteCallFailed(err.to_string())
    }
}
