//! The built-in document set.
//!
//! Documents are identified by their position in [`DOCUMENTS`]; the order is
//! part of the contract because retrieval breaks distance ties by index.

pub const DOCUMENTS: &[&str] = &[
    "FastAPI is a modern web framework for building APIs with Python.",
    "FAISS is a library for efficient similarity search and clustering of dense vectors.",
    "Sentence transformers are used to convert text into numerical embeddings.",
    "Vector databases store and retrieve high-dimensional vectors efficiently.",
    "Semantic search finds documents based on meaning rather than exact keyword matches.",
];

/// Returns an owned copy of the built-in corpus.
pub fn documents() -> Vec<String> {
    DOCUMENTS.iter().map(|d| d.to_string()).collect()
}
