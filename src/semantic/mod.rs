//! Ranking and embedding code.
//!
//! - `hybrid`: reciprocal rank fusion of lexical and vector rankings
//! - `index`: brute-force cosine similarity over stored embeddings
//! - `embeddings`: local fastembed models
//! - `service`: the search entry point used by the app layer

pub mod embeddings;
pub mod hybrid;
pub mod index;
mod service;

pub use embeddings::EmbeddingModel;
pub use hybrid::{rrf_fusion, HybridResult, RankedId, RRF_K};
pub use index::VectorSearch;
pub use service::SearchService;

/// Default local embedding model.
pub const DEFAULT_MODEL: &str = "bge-small-en-v1.5";
