//! The single document-filter SQL builder.
//!
//! Every code path that lists or searches documents -- wildcard listing,
//! FTS keyword search, fuzzy and semantic candidate scans -- builds its
//! WHERE clause here. Duplicating these predicates per path is how filters
//! drift; there is exactly one builder.

use rusqlite::types::ToSql;

use emdx_core::filter::DocumentFilter;

use crate::sqlite::documents::format_datetime;

/// A built WHERE fragment: clauses to AND together plus their parameters.
///
/// Parameters are numbered `?<start_idx>..` so callers can prepend their own
/// (e.g. the FTS MATCH parameter).
pub struct FilterSql {
    pub clauses: Vec<String>,
    pub params: Vec<Box<dyn ToSql>>,
}

impl FilterSql {
    /// Renders `WHERE a AND b AND ...`, or an empty string with no clauses.
    pub fn where_sql(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.clauses.join(" AND "))
        }
    }

    /// Parameter references for `rusqlite` positional binding.
    pub fn param_refs(&self) -> Vec<&dyn ToSql> {
        self.params.iter().map(|p| p.as_ref()).collect()
    }
}

/// Builds the WHERE clauses for a [`DocumentFilter`].
///
/// Clauses reference the `documents` table by name, so the query must not
/// alias it away.
pub fn document_filter_sql(filter: &DocumentFilter, start_idx: usize) -> FilterSql {
    let mut clauses: Vec<String> = Vec::new();
    let mut params: Vec<Box<dyn ToSql>> = Vec::new();
    let mut idx = start_idx;

    if !filter.include_deleted {
        clauses.push("documents.deleted_at IS NULL".to_string());
    }
    if !filter.include_archived {
        clauses.push("documents.archived_at IS NULL".to_string());
    }

    if let Some(ref project) = filter.project {
        clauses.push(format!("documents.project = ?{idx}"));
        params.push(Box::new(project.clone()));
        idx += 1;
    }

    if let Some(parent_id) = filter.parent_id {
        clauses.push(format!("documents.parent_id = ?{idx}"));
        params.push(Box::new(parent_id));
        idx += 1;
    }

    // Date ranges compare ISO 8601 TEXT, which orders lexicographically.
    if let Some(created_after) = filter.created_after {
        clauses.push(format!("documents.created_at >= ?{idx}"));
        params.push(Box::new(format_datetime(&created_after)));
        idx += 1;
    }
    if let Some(created_before) = filter.created_before {
        clauses.push(format!("documents.created_at <= ?{idx}"));
        params.push(Box::new(format_datetime(&created_before)));
        idx += 1;
    }
    if let Some(modified_after) = filter.modified_after {
        clauses.push(format!("documents.updated_at >= ?{idx}"));
        params.push(Box::new(format_datetime(&modified_after)));
        idx += 1;
    }
    if let Some(modified_before) = filter.modified_before {
        clauses.push(format!("documents.updated_at <= ?{idx}"));
        params.push(Box::new(format_datetime(&modified_before)));
        idx += 1;
    }

    // Tag filters (AND semantics).
    for tag in &filter.tags_all {
        clauses.push(format!(
            "EXISTS (SELECT 1 FROM document_tags dt
                     INNER JOIN tags t ON t.id = dt.tag_id
                     WHERE dt.document_id = documents.id AND t.name = ?{idx} COLLATE NOCASE)"
        ));
        params.push(Box::new(tag.clone()));
        idx += 1;
    }

    // Tag filters (OR semantics).
    if !filter.tags_any.is_empty() {
        let placeholders: Vec<String> = filter
            .tags_any
            .iter()
            .enumerate()
            .map(|(j, _)| format!("?{}", idx + j))
            .collect();
        clauses.push(format!(
            "EXISTS (SELECT 1 FROM document_tags dt
                     INNER JOIN tags t ON t.id = dt.tag_id
                     WHERE dt.document_id = documents.id
                       AND t.name COLLATE NOCASE IN ({}))",
            placeholders.join(",")
        ));
        for tag in &filter.tags_any {
            params.push(Box::new(tag.clone()));
        }
    }

    FilterSql { clauses, params }
}
