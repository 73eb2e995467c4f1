//! Embedding vector storage for [`SqliteStore`].
//!
//! Vectors are little-endian f32 BLOBs keyed by (document_id, model). A
//! document may carry vectors for several models; semantic search only
//! consults the model currently configured.

use rusqlite::{params, OptionalExtension};

use crate::error::{Result, StorageError};
use crate::sqlite::store::SqliteStore;

/// Serializes a vector as a little-endian f32 blob.
pub(crate) fn vec_to_blob(vector: &[f32]) -> Vec<u8> {
    let mut blob = Vec::with_capacity(vector.len() * 4);
    for v in vector {
        blob.extend_from_slice(&v.to_le_bytes());
    }
    blob
}

/// Deserializes a little-endian f32 blob back into a vector.
pub(crate) fn blob_to_vec(blob: &[u8]) -> Result<Vec<f32>> {
    if blob.len() % 4 != 0 {
        return Err(StorageError::Corrupt(format!(
            "embedding blob length {} is not a multiple of 4",
            blob.len()
        )));
    }
    Ok(blob
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

impl SqliteStore {
    /// Stores (or replaces) a document's embedding for a model.
    pub fn upsert_embedding(&self, document_id: i64, model: &str, vector: &[f32]) -> Result<()> {
        if vector.is_empty() {
            return Err(StorageError::invalid_input("embedding vector is empty"));
        }
        self.run_in_transaction(|conn| {
            crate::sqlite::tags::require_document(conn, document_id)?;
            conn.execute(
                "INSERT OR REPLACE INTO embeddings (document_id, model, dims, vector, created_at)
                 VALUES (?1, ?2, ?3, ?4, strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))",
                params![document_id, model, vector.len() as i64, vec_to_blob(vector)],
            )?;
            Ok(())
        })
    }

    /// Fetches a document's embedding for a model, if present.
    pub fn get_embedding(&self, document_id: i64, model: &str) -> Result<Option<Vec<f32>>> {
        let conn = self.lock_conn()?;
        let blob: Option<Vec<u8>> = conn
            .query_row(
                "SELECT vector FROM embeddings WHERE document_id = ?1 AND model = ?2",
                params![document_id, model],
                |row| row.get(0),
            )
            .optional()?;
        blob.map(|b| blob_to_vec(&b)).transpose()
    }

    /// Ids of live documents missing an embedding for the given model.
    ///
    /// Used by the index backfill after the embedder model changes.
    pub fn documents_missing_embedding(&self, model: &str) -> Result<Vec<i64>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(
            "SELECT id FROM documents
             WHERE deleted_at IS NULL
               AND NOT EXISTS (SELECT 1 FROM embeddings e
                               WHERE e.document_id = documents.id AND e.model = ?1)",
        )?;
        let rows = stmt.query_map(params![model], |row| row.get::<_, i64>(0))?;
        let mut ids = Vec::new();
        for row in rows {
            ids.push(row?);
        }
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::documents::SaveOptions;
    use pretty_assertions::assert_eq;

    #[test]
    fn blob_round_trip() {
        let vector = vec![0.5_f32, -1.25, 3.0];
        let blob = vec_to_blob(&vector);
        assert_eq!(blob.len(), 12);
        assert_eq!(blob_to_vec(&blob).unwrap(), vector);
    }

    #[test]
    fn truncated_blob_is_corrupt() {
        assert!(matches!(
            blob_to_vec(&[0, 1, 2]),
            Err(StorageError::Corrupt(_))
        ));
    }

    #[test]
    fn upsert_and_get() {
        let store = SqliteStore::open_in_memory().unwrap();
        let id = store
            .save_document("Doc", "content long enough", &SaveOptions::default())
            .unwrap();

        assert!(store.get_embedding(id, "minilm").unwrap().is_none());
        store.upsert_embedding(id, "minilm", &[1.0, 0.0]).unwrap();
        assert_eq!(
            store.get_embedding(id, "minilm").unwrap().unwrap(),
            vec![1.0, 0.0]
        );

        // Different model is a separate row.
        assert!(store.get_embedding(id, "other").unwrap().is_none());
    }

    #[test]
    fn missing_embedding_backfill_list() {
        let store = SqliteStore::open_in_memory().unwrap();
        let a = store
            .save_document("A", "content long enough", &SaveOptions::default())
            .unwrap();
        let b = store
            .save_document("B", "content long enough", &SaveOptions::default())
            .unwrap();
        store.upsert_embedding(a, "minilm", &[1.0]).unwrap();

        assert_eq!(store.documents_missing_embedding("minilm").unwrap(), vec![b]);
    }
}
