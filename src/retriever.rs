//! Query → top-k documents.
//!
//! A [`Retriever`] owns the document set, the provider that embedded it and
//! the [`FlatIndex`] over those embeddings. It is built once at startup and
//! is read-only afterwards, so one instance can be shared across requests
//! behind an `Arc` without locking.

use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::sync::Arc;

use crate::config::EmbeddingConfig;
use crate::corpus;
use crate::embedding::{create_provider, embed_query, EmbeddingProvider};
use crate::error::RagError;
use crate::index::FlatIndex;

/// A retrieved document with its position in the corpus and its distance
/// to the query.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredDocument {
    pub index: usize,
    pub distance: f32,
    pub text: String,
}

pub struct Retriever {
    documents: Vec<String>,
    provider: Arc<dyn EmbeddingProvider>,
    index: FlatIndex,
}

impl Retriever {
    /// Embeds `documents` with `provider` and indexes the result.
    pub async fn build(documents: Vec<String>, provider: Arc<dyn EmbeddingProvider>) -> Result<Self> {
        if documents.is_empty() {
            bail!("cannot build a retriever over an empty document set");
        }

        let vectors = provider
            .embed(&documents)
            .await
            .context("Failed to embed document set")?;

        if vectors.len() != documents.len() {
            bail!(
                "embedding provider returned {} vectors for {} documents",
                vectors.len(),
                documents.len()
            );
        }

        let index = FlatIndex::build(provider.dims(), &vectors)?;

        tracing::info!(
            documents = documents.len(),
            dims = index.dims(),
            model = provider.model_name(),
            "built similarity index"
        );

        Ok(Self {
            documents,
            provider,
            index,
        })
    }

    /// Creates the configured provider and indexes the built-in corpus.
    ///
    /// Provider creation may load model files, so it runs on the blocking pool.
    pub async fn from_config(config: &EmbeddingConfig) -> Result<Self> {
        let config = config.clone();
        let provider = tokio::task::spawn_blocking(move || create_provider(&config))
            .await
            .context("Embedding provider initialisation panicked")??;
        Self::build(corpus::documents(), provider).await
    }

    /// Returns up to `k` documents nearest to `query`, closest first.
    ///
    /// `k` larger than the corpus returns the whole corpus.
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<String>, RagError> {
        Ok(self
            .retrieve_scored(query, k)
            .await?
            .into_iter()
            .map(|d| d.text)
            .collect())
    }

    /// Like [`retrieve`](Self::retrieve) but keeps index and distance.
    pub async fn retrieve_scored(
        &self,
        query: &str,
        k: usize,
    ) -> Result<Vec<ScoredDocument>, RagError> {
        if query.trim().is_empty() {
            return Err(RagError::RetrievalFailed(
                "query must not be empty".to_string(),
            ));
        }
        if k == 0 {
            return Err(RagError::RetrievalFailed("k must be >= 1".to_string()));
        }

        let query_vec = embed_query(self.provider.as_ref(), query)
            .await
            .map_err(|e| RagError::RetrievalFailed(e.to_string()))?;

        let hits = self
            .index
            .search(&query_vec, k)
            .map_err(|e| RagError::RetrievalFailed(e.to_string()))?;

        tracing::debug!(query, k, hits = hits.len(), "retrieved documents");

        Ok(hits
            .into_iter()
            .map(|hit| ScoredDocument {
                index: hit.index,
                distance: hit.distance,
                text: self.documents[hit.index].clone(),
            })
            .collect())
    }

    pub fn documents(&self) -> &[String] {
        &self.documents
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn model_name(&self) -> &str {
        self.provider.model_name()
    }
}
