//! # sentence-rag CLI (`srag`)
//!
//! ## Usage
//!
//! ```bash
//! srag [--config ./config/srag.toml] <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `srag serve` | Start the HTTP server |
//! | `srag search "<query>"` | Print the nearest documents with distances |
//! | `srag chat "<message>"` | One-turn chat, optionally with retrieved context |
//! | `srag ask "<question>"` | Answer a question through the QA prompt |
//! | `srag ping` | Check that the chat API key and endpoint work |
//!
//! ## Examples
//!
//! ```bash
//! # Offline retrieval, no model download
//! srag search "similarity search" --k 3
//!
//! # Context-augmented chat (needs GROK_API_KEY)
//! GROK_API_KEY=... srag chat "What is FAISS?" --context
//! ```

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use sentence_rag::chat::{ChatClient, GrokClient, Message};
use sentence_rag::config::{self, Config};
use sentence_rag::rag::{ChatOptions, RagService};
use sentence_rag::retriever::Retriever;
use sentence_rag::{logging, server};

/// sentence-rag: retrieval-augmented chat over a built-in sentence corpus.
#[derive(Parser)]
#[command(
    name = "srag",
    about = "sentence-rag: retrieval-augmented chat over a built-in sentence corpus",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// When omitted, built-in defaults are used.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server.
    ///
    /// Binds to `[server].bind` and serves `/search`, `/chat`,
    /// `/chat-with-context` and `/chat-langchain`.
    Serve,

    /// Print the documents nearest to a query.
    Search {
        /// The search query string.
        query: String,

        /// Number of documents to return (capped at the corpus size).
        #[arg(long)]
        k: Option<usize>,
    },

    /// Send a single user message to the chat API.
    Chat {
        /// The user message.
        message: String,

        /// Retrieve documents for the message and include them as context.
        #[arg(long)]
        context: bool,

        /// Override `[chat].model`.
        #[arg(long)]
        model: Option<String>,

        /// Override `[chat].temperature`.
        #[arg(long)]
        temperature: Option<f64>,
    },

    /// Answer a question from retrieved context via the QA prompt.
    Ask {
        /// The question.
        question: String,
    },

    /// Send a fixed test conversation to the chat API and print the raw reply.
    Ping,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let cfg = match &cli.config {
        Some(path) => config::load_config(path)?,
        None => Config::default(),
    };

    logging::init(&cfg.logging)?;

    match cli.command {
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Search { query, k } => {
            run_search(&cfg, &query, k).await?;
        }
        Commands::Chat {
            message,
            context,
            model,
            temperature,
        } => {
            let options = ChatOptions { model, temperature };
            run_chat(&cfg, &message, context, &options).await?;
        }
        Commands::Ask { question } => {
            let rag = build_service(&cfg).await?;
            let answer = rag.ask(&question).await?;
            println!("{}", answer);
        }
        Commands::Ping => {
            run_ping(&cfg).await?;
        }
    }

    Ok(())
}

async fn build_service(cfg: &Config) -> Result<RagService> {
    let retriever = Retriever::from_config(&cfg.embedding).await?;
    let chat = GrokClient::new(&cfg.chat)?;
    Ok(RagService::new(Arc::new(retriever), Arc::new(chat), cfg))
}

async fn run_search(cfg: &Config, query: &str, k: Option<usize>) -> Result<()> {
    let retriever = Retriever::from_config(&cfg.embedding).await?;
    let k = k.unwrap_or(cfg.retrieval.default_k);
    let hits = retriever.retrieve_scored(query, k).await?;

    if hits.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (rank, hit) in hits.iter().enumerate() {
        println!(
            "{}. [doc {}] distance={:.4}\n   {}",
            rank + 1,
            hit.index,
            hit.distance,
            hit.text
        );
    }
    Ok(())
}

async fn run_chat(
    cfg: &Config,
    message: &str,
    with_context: bool,
    options: &ChatOptions,
) -> Result<()> {
    let rag = build_service(cfg).await?;
    let conversation = [Message::user(message)];

    if with_context {
        let reply = rag.answer(message, &conversation, options).await?;
        println!("{}", reply.content);
        println!();
        println!("model: {}", reply.model);
        println!("context:");
        for doc in &reply.context {
            println!("  - {}", doc);
        }
    } else {
        let reply = rag.chat(&conversation, options).await?;
        println!("{}", reply.content);
        println!();
        println!("model: {}", reply.model);
    }
    Ok(())
}

/// Sends a fixed, cheap conversation at temperature 0 to verify the key and
/// endpoint without touching the embedding model.
async fn run_ping(cfg: &Config) -> Result<()> {
    let client = GrokClient::new(&cfg.chat)?;
    if let Err(e) = client.ensure_configured() {
        bail!("{}", e);
    }

    let conversation = [
        Message::system("You are a test assistant."),
        Message::user("Testing. Just say hi and hello world and nothing else."),
    ];

    let reply = client
        .complete(&conversation, &cfg.chat.model, 0.0)
        .await?;

    println!("Model: {}", reply.model);
    println!("Usage: {}", serde_json::to_string_pretty(&reply.usage)?);
    println!("Response:");
    println!("{}", reply.content);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offline_config() -> Config {
        let mut cfg = Config::default();
        cfg.embedding.provider = "hash".to_string();
        cfg
    }

    #[tokio::test]
    async fn test_search_blank_query_is_retrieval_error() {
        let err = run_search(&offline_config(), "   ", None).await.unwrap_err();
        assert!(err.to_string().starts_with("Retrieval error:"));
    }

    #[tokio::test]
    async fn test_search_prints_hits() {
        assert!(run_search(&offline_config(), "FAISS", Some(1)).await.is_ok());
    }
}
