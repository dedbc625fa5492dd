//! Retrieve-then-generate composition.
//!
//! [`RagService`] ties a [`Retriever`] to a [`ChatClient`] and provides the
//! three chat flows served over HTTP:
//!
//! | Method | Flow |
//! |--------|------|
//! | [`chat`](RagService::chat) | Forward a conversation unchanged |
//! | [`answer`](RagService::answer) | Retrieve context, prepend it as a system message, forward |
//! | [`ask`](RagService::ask) | Retrieve context, fill the QA prompt template, send as one user message |
//!
//! Each flow is all-or-nothing: a retrieval or chat failure aborts it and no
//! partial result is returned.

use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

use crate::chat::{ChatClient, ChatReply, Message};
use crate::config::Config;
use crate::error::RagError;
use crate::retriever::Retriever;

/// Leads the system message built by [`RagService::answer`].
pub const CONTEXT_PREAMBLE: &str =
    "You are a helpful assistant. Use the following context to answer questions:\n\n";

const QA_TEMPLATE: &str = "Use the following pieces of context to answer the question at the end.
If you don't know the answer, just say that you don't know, don't try to make up an answer.

Context: {context}

Question: {question}
Answer:";

/// Per-request overrides of the configured model and temperature.
#[derive(Debug, Clone, Default)]
pub struct ChatOptions {
    pub model: Option<String>,
    pub temperature: Option<f64>,
}

/// A [`ChatReply`] plus the documents that were injected as context.
#[derive(Debug, Clone, Serialize)]
pub struct ContextReply {
    pub content: String,
    pub model: String,
    pub context: Vec<String>,
    pub usage: Value,
}

pub struct RagService {
    retriever: Arc<Retriever>,
    chat: Arc<dyn ChatClient>,
    model: String,
    temperature: f64,
    context_k: usize,
}

impl RagService {
    pub fn new(retriever: Arc<Retriever>, chat: Arc<dyn ChatClient>, config: &Config) -> Self {
        Self {
            retriever,
            chat,
            model: config.chat.model.clone(),
            temperature: config.chat.temperature,
            context_k: config.retrieval.context_k,
        }
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    pub fn chat_client(&self) -> &dyn ChatClient {
        self.chat.as_ref()
    }

    /// Forwards `conversation` as-is.
    pub async fn chat(
        &self,
        conversation: &[Message],
        options: &ChatOptions,
    ) -> Result<ChatReply, RagError> {
        let (model, temperature) = self.resolve(options);
        self.chat.complete(conversation, model, temperature).await
    }

    /// Retrieves documents for `query` and answers `conversation` with them
    /// as a leading system message.
    ///
    /// The system message is always prepended, even if the conversation
    /// already starts with one.
    pub async fn answer(
        &self,
        query: &str,
        conversation: &[Message],
        options: &ChatOptions,
    ) -> Result<ContextReply, RagError> {
        self.chat.ensure_configured()?;

        let context = self.retriever.retrieve(query, self.context_k).await?;

        let mut augmented = Vec::with_capacity(conversation.len() + 1);
        augmented.push(context_message(&context));
        augmented.extend_from_slice(conversation);

        let (model, temperature) = self.resolve(options);
        let reply = self.chat.complete(&augmented, model, temperature).await?;

        Ok(ContextReply {
            content: reply.content,
            model: reply.model,
            context,
            usage: reply.usage,
        })
    }

    /// Answers a standalone question from retrieved context using the QA
    /// prompt template.
    ///
    /// The context is the top `context_k` documents for `question`, not the
    /// whole corpus.
    pub async fn ask(&self, question: &str) -> Result<String, RagError> {
        self.chat.ensure_configured()?;

        let context = self.retriever.retrieve(question, self.context_k).await?;
        let prompt = render_qa_prompt(&context, question);

        let reply = self
            .chat
            .complete(&[Message::user(prompt)], &self.model, self.temperature)
            .await?;
        Ok(reply.content)
    }

    fn resolve<'a>(&'a self, options: &'a ChatOptions) -> (&'a str, f64) {
        (
            options.model.as_deref().unwrap_or(&self.model),
            options.temperature.unwrap_or(self.temperature),
        )
    }
}

/// Builds the system message carrying retrieved documents, one per line.
pub fn context_message(documents: &[String]) -> Message {
    Message::system(format!("{}{}", CONTEXT_PREAMBLE, documents.join("\n")))
}

/// Fills the QA template. Documents are separated by blank lines.
pub fn render_qa_prompt(documents: &[String], question: &str) -> String {
    QA_TEMPLATE
        .replace("{context}", &documents.join("\n\n"))
        .replace("{question}", question)
}
