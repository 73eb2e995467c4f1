//! Semantic search over stored embeddings.

use emdx_core::filter::DocumentFilter;
use emdx_storage::SqliteStore;

use crate::embedder::{cosine_similarity, Embedder};
use crate::engine::{Result, SearchError};

/// Ranks filter-matching documents by cosine similarity to the query.
///
/// Only documents with a stored vector for the embedder's current model
/// participate; the rest are skipped, not zero-scored.
pub fn semantic_search_ids(
    store: &SqliteStore,
    embedder: &dyn Embedder,
    query: &str,
    filter: &DocumentFilter,
    top_k: usize,
) -> Result<Vec<(i64, f32)>> {
    let query_vec = embedder
        .embed_text(query)
        .map_err(SearchError::Embedding)?;

    let candidates = store.embedding_candidates(embedder.model_id(), filter)?;
    let mut scored: Vec<(i64, f32)> = candidates
        .into_iter()
        .map(|(id, vector)| (id, cosine_similarity(&query_vec, &vector)))
        .collect();

    scored.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
    scored.truncate(top_k);
    Ok(scored)
}

#[cfg(test)]
mod tests {
    use super::*;
    use emdx_storage::SaveOptions;
    use pretty_assertions::assert_eq;

    /// Deterministic toy embedder: counts a few marker words.
    struct MarkerEmbedder;

    impl Embedder for MarkerEmbedder {
        fn embed_text(&self, text: &str) -> std::result::Result<Vec<f32>, String> {
            let lower = text.to_lowercase();
            Ok(vec![
                lower.matches("database").count() as f32,
                lower.matches("terminal").count() as f32,
                lower.matches("parser").count() as f32,
            ])
        }

        fn model_id(&self) -> &str {
            "marker-v1"
        }
    }

    fn seeded_store() -> (SqliteStore, i64, i64) {
        let store = SqliteStore::open_in_memory().unwrap();
        let embedder = MarkerEmbedder;

        let db_doc = store
            .save_document("Storage", "database database tuning notes", &SaveOptions::default())
            .unwrap();
        let term_doc = store
            .save_document("TTY", "terminal attribute handling", &SaveOptions::default())
            .unwrap();

        for id in [db_doc, term_doc] {
            let doc = store.get_document(id).unwrap();
            let vector = embedder.embed_text(&doc.content).unwrap();
            store
                .upsert_embedding(id, embedder.model_id(), &vector)
                .unwrap();
        }
        (store, db_doc, term_doc)
    }

    #[test]
    fn ranks_by_similarity() {
        let (store, db_doc, term_doc) = seeded_store();
        let results = semantic_search_ids(
            &store,
            &MarkerEmbedder,
            "database tuning",
            &DocumentFilter::default(),
            10,
        )
        .unwrap();

        assert_eq!(results[0].0, db_doc);
        assert!(results[0].1 > 0.9);
        // The terminal doc is orthogonal to the query.
        let term_score = results.iter().find(|(id, _)| *id == term_doc).unwrap().1;
        assert_eq!(term_score, 0.0);
    }

    #[test]
    fn documents_without_vectors_are_skipped() {
        let (store, _, _) = seeded_store();
        let extra = store
            .save_document("No vector", "content long enough", &SaveOptions::default())
            .unwrap();

        let results = semantic_search_ids(
            &store,
            &MarkerEmbedder,
            "database",
            &DocumentFilter::default(),
            10,
        )
        .unwrap();
        assert!(results.iter().all(|(id, _)| *id != extra));
    }

    #[test]
    fn top_k_truncates() {
        let (store, _, _) = seeded_store();
        let results = semantic_search_ids(
            &store,
            &MarkerEmbedder,
            "database terminal",
            &DocumentFilter::default(),
            1,
        )
        .unwrap();
        assert_eq!(results.len(), 1);
    }
}
