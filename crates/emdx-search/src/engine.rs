//! The search engine: mode dispatch over the document store.

use serde::Serialize;
use tracing::debug;

use emdx_core::document::Document;
use emdx_core::filter::DocumentFilter;
use emdx_storage::{SqliteStore, StorageError};

use crate::embedder::Embedder;
use crate::fuzzy::{fuzzy_score, FUZZY_THRESHOLD};
use crate::hybrid::reciprocal_rank_fusion;
use crate::semantic::semantic_search_ids;

/// Default keyword/semantic balance for hybrid mode.
pub const DEFAULT_HYBRID_ALPHA: f64 = 0.5;

/// Errors from the search layer.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// The embedding collaborator failed.
    #[error("embedding failed: {0}")]
    Embedding(String),

    /// A semantic or hybrid query was issued with no embedder configured.
    #[error("no embedder configured; semantic search is unavailable")]
    NoEmbedder,

    /// The storage layer failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Convenience alias for search operations.
pub type Result<T> = std::result::Result<T, SearchError>;

/// Which ranking mode to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    Keyword,
    Fuzzy,
    Semantic,
    Hybrid,
}

/// One ranked search result.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub document: Document,
    /// Higher is better in every mode; keyword BM25 ranks are negated so
    /// this holds there too.
    pub score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
}

/// Search over a document store, with an optional embedding collaborator.
///
/// Holds references only; construct one per operation or hold it for the
/// process lifetime, either is fine.
pub struct SearchEngine<'a> {
    store: &'a SqliteStore,
    embedder: Option<&'a dyn Embedder>,
}

impl<'a> SearchEngine<'a> {
    pub fn new(store: &'a SqliteStore, embedder: Option<&'a dyn Embedder>) -> Self {
        Self { store, embedder }
    }

    /// Runs a query in the given mode. All modes apply the same filter.
    pub fn search(
        &self,
        query: &str,
        mode: SearchMode,
        filter: &DocumentFilter,
    ) -> Result<Vec<SearchResult>> {
        debug!(query, ?mode, "search");
        match mode {
            SearchMode::Keyword => self.keyword(query, filter, false),
            SearchMode::Fuzzy => self.fuzzy(query, filter),
            SearchMode::Semantic => self.semantic(query, filter),
            SearchMode::Hybrid => self.hybrid(query, filter, DEFAULT_HYBRID_ALPHA),
        }
    }

    /// Keyword mode, optionally extracting a snippet per hit.
    pub fn keyword(
        &self,
        query: &str,
        filter: &DocumentFilter,
        with_snippet: bool,
    ) -> Result<Vec<SearchResult>> {
        let hits = self.store.keyword_search(query, filter, with_snippet)?;
        Ok(hits
            .into_iter()
            .map(|hit| SearchResult {
                document: hit.document,
                // BM25 rank ascends as relevance drops; negate so higher is
                // better like the other modes.
                score: -hit.rank,
                snippet: hit.snippet,
            })
            .collect())
    }

    /// Fuzzy mode: string-similarity salvage over title + content prefix.
    pub fn fuzzy(&self, query: &str, filter: &DocumentFilter) -> Result<Vec<SearchResult>> {
        let candidates = self.store.fuzzy_candidates(filter)?;
        let mut scored: Vec<(i64, f64)> = candidates
            .into_iter()
            .map(|(id, title, prefix)| (id, fuzzy_score(query, &title, &prefix)))
            .filter(|(_, score)| *score >= FUZZY_THRESHOLD)
            .collect();
        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        scored.truncate(filter.effective_limit() as usize);
        self.hydrate(scored)
    }

    /// Semantic mode: cosine over stored embeddings for the current model.
    pub fn semantic(&self, query: &str, filter: &DocumentFilter) -> Result<Vec<SearchResult>> {
        let embedder = self.embedder.ok_or(SearchError::NoEmbedder)?;
        let top_k = filter.effective_limit() as usize;
        let scored = semantic_search_ids(self.store, embedder, query, filter, top_k)?;
        self.hydrate(scored.into_iter().map(|(id, s)| (id, s as f64)).collect())
    }

    /// Hybrid mode: RRF over the top-N of keyword and semantic.
    ///
    /// `alpha` weights keyword; ties break by keyword rank.
    pub fn hybrid(
        &self,
        query: &str,
        filter: &DocumentFilter,
        alpha: f64,
    ) -> Result<Vec<SearchResult>> {
        let embedder = self.embedder.ok_or(SearchError::NoEmbedder)?;
        let limit = filter.effective_limit() as usize;

        // Pull a deeper slate from each source than the caller asked for,
        // so fusion has something to reorder.
        let source_filter = DocumentFilter {
            limit: Some((limit * 2) as i64),
            ..filter.clone()
        };

        let keyword_ids: Vec<i64> = self
            .store
            .keyword_search(query, &source_filter, false)?
            .into_iter()
            .map(|hit| hit.document.id)
            .collect();
        let semantic_ids: Vec<i64> =
            semantic_search_ids(self.store, embedder, query, &source_filter, limit * 2)?
                .into_iter()
                .map(|(id, _)| id)
                .collect();

        let mut fused = reciprocal_rank_fusion(&keyword_ids, &semantic_ids, alpha);
        fused.truncate(limit);
        self.hydrate(fused)
    }

    /// Fetches full documents for scored ids, preserving order.
    fn hydrate(&self, scored: Vec<(i64, f64)>) -> Result<Vec<SearchResult>> {
        let mut results = Vec::with_capacity(scored.len());
        for (id, score) in scored {
            // Candidates already passed the filter; a row vanishing between
            // the scan and here just drops out of the results.
            match self.store.get_document_any(id) {
                Ok(document) => results.push(SearchResult {
                    document,
                    score,
                    snippet: None,
                }),
                Err(err) if err.is_not_found() => continue,
                Err(err) => return Err(err.into()),
            }
        }
        Ok(results)
    }
}
