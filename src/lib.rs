//! # sentence-rag
//!
//! A small retrieval-augmented chat backend. A fixed set of sentences is
//! embedded at startup and indexed for exact nearest-neighbour lookup; HTTP
//! endpoints return the nearest sentences to a query or forward a chat
//! conversation to the xAI Grok chat-completion API, optionally with the
//! retrieved sentences spliced in as context.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌───────────┐   ┌───────────┐
//! │  Corpus  │──▶│ Embedding │──▶│ FlatIndex │   (startup)
//! └──────────┘   └───────────┘   └─────┬─────┘
//!                                      │
//!                 ┌────────────────────┤
//!                 ▼                    ▼
//!           ┌───────────┐        ┌───────────┐      ┌──────────┐
//!           │ Retriever │───────▶│RagService │─────▶│ChatClient│──▶ Grok API
//!           └───────────┘        └─────┬─────┘      └──────────┘
//!                                      ▼
//!                               ┌─────────────┐
//!                               │ HTTP / CLI  │
//!                               └─────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration |
//! | [`corpus`] | Built-in document set |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`index`] | Exact L2 nearest-neighbour index |
//! | [`retriever`] | Query → top-k documents |
//! | [`chat`] | Chat-completion client |
//! | [`rag`] | Context-augmented chat and QA prompt flows |
//! | [`server`] | HTTP server |
//! | [`error`] | Failure taxonomy |
//! | [`logging`] | Tracing subscriber setup |

pub mod chat;
pub mod config;
pub mod corpus;
pub mod embedding;
pub mod error;
pub mod index;
pub mod logging;
pub mod rag;
pub mod retriever;
pub mod server;
