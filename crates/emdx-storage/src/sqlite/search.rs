//! Search-facing queries: FTS keyword matches and candidate scans.
//!
//! Ranking, fusion, and similarity scoring live in the search crate; this
//! module only runs SQL. Every query here goes through the shared document
//! filter builder so the wildcard, FTS, fuzzy, and semantic paths agree on
//! filter semantics.

use rusqlite::types::ToSql;

use emdx_core::document::Document;
use emdx_core::filter::DocumentFilter;

use crate::error::Result;
use crate::sqlite::documents::{scan_document, DOC_COLUMNS};
use crate::sqlite::embeddings::blob_to_vec;
use crate::sqlite::filter_sql::document_filter_sql;
use crate::sqlite::store::SqliteStore;
use crate::sqlite::tags::get_document_tags_on_conn;

/// Upper bound on rows pulled into the fuzzy and semantic candidate scans.
const CANDIDATE_SCAN_CAP: i64 = 10_000;

/// One keyword-search hit: the document, its BM25 rank (lower is better),
/// and an optional excerpt around the best match.
#[derive(Debug, Clone)]
pub struct KeywordHit {
    pub document: Document,
    pub rank: f64,
    pub snippet: Option<String>,
}

/// Escapes a user query for FTS5 MATCH.
///
/// Each whitespace-separated term becomes a quoted phrase, which disarms
/// FTS5 operators and barewords that would otherwise be syntax errors.
pub fn sanitize_fts5_query(query: &str) -> String {
    query
        .split_whitespace()
        .map(|term| format!("\"{}\"", term.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(" ")
}

impl SqliteStore {
    /// Keyword search over the FTS mirror, BM25-ranked.
    ///
    /// The wildcard query `*` bypasses MATCH and lists matching documents
    /// newest first -- with the same filter predicates applied.
    pub fn keyword_search(
        &self,
        query: &str,
        filter: &DocumentFilter,
        with_snippet: bool,
    ) -> Result<Vec<KeywordHit>> {
        if query.trim() == "*" {
            let docs = self.list_documents(filter)?;
            return Ok(docs
                .into_iter()
                .map(|document| KeywordHit {
                    document,
                    rank: 0.0,
                    snippet: None,
                })
                .collect());
        }

        let conn = self.lock_conn()?;
        let built = document_filter_sql(filter, 2);
        let filter_sql = if built.clauses.is_empty() {
            String::new()
        } else {
            format!(" AND {}", built.clauses.join(" AND "))
        };
        let snippet_sql = if with_snippet {
            ", snippet(document_fts, 1, '[', ']', '…', 12) AS snip"
        } else {
            ", NULL AS snip"
        };

        let sql = format!(
            "SELECT {DOC_COLUMNS}, bm25(document_fts) AS rank{snippet_sql}
             FROM documents
             INNER JOIN document_fts ON document_fts.rowid = documents.id
             WHERE document_fts MATCH ?1{filter_sql}
             ORDER BY rank ASC, documents.created_at DESC
             LIMIT {}",
            filter.effective_limit()
        );

        let sanitized = sanitize_fts5_query(query);
        let mut params: Vec<&dyn ToSql> = vec![&sanitized];
        let filter_refs = built.param_refs();
        params.extend(filter_refs);

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params.as_slice(), |row| {
            let document = scan_document(row)?;
            let rank: f64 = row.get("rank")?;
            let snippet: Option<String> = row.get("snip")?;
            Ok(KeywordHit {
                document,
                rank,
                snippet,
            })
        })?;

        let mut hits = Vec::new();
        for row in rows {
            hits.push(row?);
        }
        for hit in hits.iter_mut() {
            hit.document.tags = get_document_tags_on_conn(&conn, hit.document.id)?;
        }
        Ok(hits)
    }

    /// Rows for the fuzzy scorer: id, title, and a content prefix.
    pub fn fuzzy_candidates(
        &self,
        filter: &DocumentFilter,
    ) -> Result<Vec<(i64, String, String)>> {
        let conn = self.lock_conn()?;
        let built = document_filter_sql(filter, 1);
        let sql = format!(
            "SELECT documents.id, documents.title, substr(documents.content, 1, 256)
             FROM documents{}
             ORDER BY documents.created_at DESC
             LIMIT {CANDIDATE_SCAN_CAP}",
            built.where_sql()
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(built.param_refs().as_slice(), |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;
        let mut candidates = Vec::new();
        for row in rows {
            candidates.push(row?);
        }
        Ok(candidates)
    }

    /// Rows for the semantic scorer: id and stored vector for a model.
    ///
    /// Documents without a vector for this model are simply absent.
    pub fn embedding_candidates(
        &self,
        model: &str,
        filter: &DocumentFilter,
    ) -> Result<Vec<(i64, Vec<f32>)>> {
        let conn = self.lock_conn()?;
        let built = document_filter_sql(filter, 2);
        let filter_sql = if built.clauses.is_empty() {
            String::new()
        } else {
            format!(" AND {}", built.clauses.join(" AND "))
        };
        let sql = format!(
            "SELECT documents.id, e.vector
             FROM documents
             INNER JOIN embeddings e ON e.document_id = documents.id
             WHERE e.model = ?1{filter_sql}
             LIMIT {CANDIDATE_SCAN_CAP}"
        );

        let mut params: Vec<&dyn ToSql> = vec![&model];
        let filter_refs = built.param_refs();
        params.extend(filter_refs);

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params.as_slice(), |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, Vec<u8>>(1)?))
        })?;
        let mut candidates = Vec::new();
        for row in rows {
            let (id, blob) = row?;
            candidates.push((id, blob_to_vec(&blob)?));
        }
        Ok(candidates)
    }
}
