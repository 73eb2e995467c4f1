//! Search and ranking for the emdx knowledge base.
//!
//! Four modes over the document store: keyword (BM25 over the FTS mirror),
//! fuzzy (string similarity salvage for near-miss queries), semantic
//! (cosine over stored embeddings), and hybrid (reciprocal-rank fusion of
//! keyword and semantic). Every mode applies the same document filter; the
//! SQL predicates are built once in the storage crate's filter builder.

pub mod embedder;
pub mod engine;
pub mod fuzzy;
pub mod hybrid;
pub mod semantic;

pub use embedder::{cosine_similarity, Embedder};
pub use engine::{SearchEngine, SearchError, SearchMode, SearchResult};
pub use hybrid::reciprocal_rank_fusion;
