use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::Row;
use thiserror::Error;

pub type DbPool = sqlx::SqlitePool;

pub async fn connect_with_settings(
    database_url: &str,
    max_connections: u32,
    timeout_secs: u64,
) -> Result<DbPool, sqlx::Error> {
    SqlitePoolOptions::new()
        .max_connections(max_connections.max(1))
        .acquire_timeout(Duration::from_secs(timeout_secs.max(1)))
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                sqlx::query("PRAGMA foreign_keys = ON").execute(&mut *conn).await?;
                sqlx::query("PRAGMA journal_mode = WAL").execute(&mut *conn).await?;
                sqlx::query("PRAGMA busy_timeout = 5000").execute(&mut *conn).await?;
                Ok(())
            })
        })
        .connect(database_url)
        .await
}

/// One indexed document chunk with its embedding vector.
#[derive(Clone, Debug, PartialEq)]
pub struct ChunkRecord {
    pub id: String,
    pub content: String,
    pub metadata: Value,
    pub embedding: Vec<f32>,
}

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("similarity index query failed: {0}")]
    Query(#[from] sqlx::Error),
    #[error("chunk `{id}` is corrupt: {reason}")]
    CorruptChunk { id: String, reason: String },
}

#[async_trait]
pub trait SimilarityIndex: Send + Sync {
    async fn load_chunks(&self) -> Result<Vec<ChunkRecord>, IndexError>;
}

/// Sqlite-backed chunk store. The ingestion pipeline that fills this table
/// lives outside this repository; ranking happens in `semantic`.
pub struct SqliteSimilarityIndex {
    pool: DbPool,
}

impl SqliteSimilarityIndex {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn ensure_schema(pool: &DbPool) -> Result<(), sqlx::Error> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS issue_chunks (
                id TEXT PRIMARY KEY,
                content TEXT NOT NULL,
                metadata TEXT NOT NULL DEFAULT '{}',
                embedding BLOB NOT NULL
            )",
        )
        .execute(pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl SimilarityIndex for SqliteSimilarityIndex {
    async fn load_chunks(&self) -> Result<Vec<ChunkRecord>, IndexError> {
        let rows = sqlx::query("SELECT id, content, metadata, embedding FROM issue_chunks")
            .fetch_all(&self.pool)
            .await?;

        let mut chunks = Vec::with_capacity(rows.len());
        for row in rows {
            let id: String = row.try_get("id")?;
            let content: String = row.try_get("content")?;
            let metadata_raw: String = row.try_get("metadata")?;
            let embedding_raw: Vec<u8> = row.try_get("embedding")?;

            let metadata =
                serde_json::from_str(&metadata_raw).map_err(|error| IndexError::CorruptChunk {
                    id: id.clone(),
                    reason: format!("metadata is not valid JSON: {error}"),
                })?;
            let embedding =
                decode_embedding(&embedding_raw).ok_or_else(|| IndexError::CorruptChunk {
                    id: id.clone(),
                    reason: "embedding blob length is not a multiple of 4".to_owned(),
                })?;

            chunks.push(ChunkRecord { id, content, metadata, embedding });
        }

        Ok(chunks)
    }
}

/// Embeddings are stored as little-endian f32 blobs.
pub fn decode_embedding(raw: &[u8]) -> Option<Vec<f32>> {
    if raw.len() % 4 != 0 {
        return None;
    }
    Some(
        raw.chunks_exact(4)
            .map(|bytes| f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
            .collect(),
    )
}

pub fn encode_embedding(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|component| component.to_le_bytes()).collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use sqlx::sqlite::SqlitePoolOptions;

    use super::{
        decode_embedding, encode_embedding, SimilarityIndex, SqliteSimilarityIndex,
    };

    #[test]
    fn embedding_blob_round_trips() {
        let vector = vec![0.25_f32, -1.5, 3.0];
        let decoded = decode_embedding(&encode_embedding(&vector)).expect("decode");
        assert_eq!(decoded, vector);
    }

    #[test]
    fn truncated_blob_is_rejected() {
        assert!(decode_embedding(&[0, 1, 2]).is_none());
    }

    #[tokio::test]
    async fn chunks_load_with_metadata_and_vectors() {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("pool should connect");
        SqliteSimilarityIndex::ensure_schema(&pool).await.expect("schema");

        sqlx::query("INSERT INTO issue_chunks (id, content, metadata, embedding) VALUES (?, ?, ?, ?)")
            .bind("chunk-1")
            .bind("Login loop after password reset")
            .bind(json!({ "issue_key": "SUP-9" }).to_string())
            .bind(encode_embedding(&[1.0, 0.0]))
            .execute(&pool)
            .await
            .expect("insert");

        let index = SqliteSimilarityIndex::new(pool.clone());
        let chunks = index.load_chunks().await.expect("load");

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].metadata["issue_key"], "SUP-9");
        assert_eq!(chunks[0].embedding, vec![1.0, 0.0]);

        pool.close().await;
    }
}
