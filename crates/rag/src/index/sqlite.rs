//! SQLite-backed vector index.
//!
//! Embeddings are stored as little-endian f32 BLOBs with metadata as JSON;
//! similarity is brute-force cosine in Rust over the requested namespace.
//! Suited to the scale where a single file beats running a vector database.

use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::Mutex;
use uuid::Uuid;

use docanchor_core::{AppError, AppResult};

use crate::index::{rank_records, QueryFilter, VectorIndex};
use crate::types::{ChunkMetadata, ScoredRecord, VectorRecord};

/// SQLite index adapter. The namespace column is part of the primary key and
/// every statement is namespace-qualified.
pub struct SqliteIndex {
    conn: Mutex<Connection>,
}

impl SqliteIndex {
    /// Open (or create) the index database at the given path.
    pub fn open(db_path: &Path) -> AppResult<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                AppError::IndexUnavailable(format!("Failed to create index directory: {}", e))
            })?;
        }

        let conn = Connection::open(db_path).map_err(|e| {
            AppError::IndexUnavailable(format!("Failed to open SQLite index: {}", e))
        })?;

        init_schema(&conn)?;

        tracing::debug!("Opened SQLite vector index at {:?}", db_path);
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database, handy for tests.
    pub fn open_in_memory() -> AppResult<Self> {
        let conn = Connection::open_in_memory().map_err(|e| {
            AppError::IndexUnavailable(format!("Failed to open in-memory index: {}", e))
        })?;

        init_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn load_namespace(&self, namespace: &str) -> AppResult<Vec<VectorRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT chunk_id, embedding, text, metadata FROM vectors WHERE namespace = ?1",
            )
            .map_err(|e| AppError::IndexUnavailable(format!("Failed to prepare query: {}", e)))?;

        let rows = stmt
            .query_map(params![namespace], |row| {
                let chunk_id: String = row.get(0)?;
                let embedding_bytes: Vec<u8> = row.get(1)?;
                let text: String = row.get(2)?;
                let metadata_json: String = row.get(3)?;
                Ok((chunk_id, embedding_bytes, text, metadata_json))
            })
            .map_err(|e| AppError::IndexUnavailable(format!("Failed to query vectors: {}", e)))?;

        let mut records = Vec::new();
        for row in rows {
            let (chunk_id, embedding_bytes, text, metadata_json) = row.map_err(|e| {
                AppError::IndexUnavailable(format!("Failed to read vector row: {}", e))
            })?;

            let metadata: ChunkMetadata = serde_json::from_str(&metadata_json)?;
            records.push(VectorRecord {
                chunk_id,
                embedding: bytes_to_embedding(&embedding_bytes)?,
                text,
                metadata,
            });
        }

        Ok(records)
    }
}

#[async_trait::async_trait]
impl VectorIndex for SqliteIndex {
    async fn upsert(&self, namespace: &str, records: Vec<VectorRecord>) -> AppResult<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn
            .transaction()
            .map_err(|e| AppError::IndexUnavailable(format!("Failed to begin upsert: {}", e)))?;

        for record in &records {
            let metadata_json = serde_json::to_string(&record.metadata)?;
            tx.execute(
                "INSERT OR REPLACE INTO vectors (namespace, chunk_id, document_id, embedding, text, metadata)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    namespace,
                    record.chunk_id,
                    record.metadata.document_id.to_string(),
                    embedding_to_bytes(&record.embedding),
                    record.text,
                    metadata_json,
                ],
            )
            .map_err(|e| AppError::IndexUnavailable(format!("Failed to upsert vector: {}", e)))?;
        }

        tx.commit()
            .map_err(|e| AppError::IndexUnavailable(format!("Failed to commit upsert: {}", e)))
    }

    async fn query(
        &self,
        namespace: &str,
        query_vector: &[f32],
        top_k: usize,
        filter: Option<&QueryFilter>,
    ) -> AppResult<Vec<ScoredRecord>> {
        let records = self.load_namespace(namespace)?;
        Ok(rank_records(records.into_iter(), query_vector, top_k, filter))
    }

    async fn delete(&self, namespace: &str, chunk_ids: &[String]) -> AppResult<()> {
        let conn = self.conn.lock().unwrap();
        for chunk_id in chunk_ids {
            conn.execute(
                "DELETE FROM vectors WHERE namespace = ?1 AND chunk_id = ?2",
                params![namespace, chunk_id],
            )
            .map_err(|e| AppError::IndexUnavailable(format!("Failed to delete vector: {}", e)))?;
        }
        Ok(())
    }

    async fn delete_document(&self, namespace: &str, document_id: Uuid) -> AppResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "DELETE FROM vectors WHERE namespace = ?1 AND document_id = ?2",
            params![namespace, document_id.to_string()],
        )
        .map_err(|e| {
            AppError::IndexUnavailable(format!("Failed to delete document vectors: {}", e))
        })?;
        Ok(())
    }

    async fn delete_namespace(&self, namespace: &str) -> AppResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "DELETE FROM vectors WHERE namespace = ?1",
            params![namespace],
        )
        .map_err(|e| AppError::IndexUnavailable(format!("Failed to delete namespace: {}", e)))?;
        Ok(())
    }
}

fn init_schema(conn: &Connection) -> AppResult<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS vectors (
            namespace TEXT NOT NULL,
            chunk_id TEXT NOT NULL,
            document_id TEXT NOT NULL,
            embedding BLOB NOT NULL,
            text TEXT NOT NULL,
            metadata TEXT NOT NULL,
            PRIMARY KEY (namespace, chunk_id)
        );

        CREATE INDEX IF NOT EXISTS idx_vectors_document
            ON vectors(namespace, document_id);
        "#,
    )
    .map_err(|e| AppError::IndexUnavailable(format!("Failed to create tables: {}", e)))
}

/// Convert an embedding vector to bytes for storage.
fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(embedding.len() * 4);
    for &value in embedding {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// Convert stored bytes back to an embedding vector.
fn bytes_to_embedding(bytes: &[u8]) -> AppResult<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(AppError::IndexUnavailable(
            "Invalid embedding blob length".to_string(),
        ));
    }

    Ok(bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}
