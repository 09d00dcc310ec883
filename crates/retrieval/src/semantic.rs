use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use tickety_core::capability::FailureDetail;

use crate::embedding::{EmbeddingClient, EmbeddingError};
use crate::index::{IndexError, SimilarityIndex};
use crate::records::SimilarityRecord;

pub const DEFAULT_LIMIT: u32 = 5;

#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
    #[error(transparent)]
    Index(#[from] IndexError),
}

impl From<RetrievalError> for FailureDetail {
    fn from(error: RetrievalError) -> Self {
        match error {
            RetrievalError::Embedding(inner) => inner.into(),
            RetrievalError::Index(inner) => {
                FailureDetail::message(inner.to_string()).named("SimilarityIndexError")
            }
        }
    }
}

/// Semantic strategy: embed the query and cosine-rank indexed chunks.
///
/// Records at or below the relevance floor are never returned; results are
/// ordered by descending score and capped at the caller-supplied limit.
pub struct SemanticSearch {
    embedding: Arc<dyn EmbeddingClient>,
    index: Arc<dyn SimilarityIndex>,
    relevance_floor: f32,
}

impl SemanticSearch {
    pub fn new(
        embedding: Arc<dyn EmbeddingClient>,
        index: Arc<dyn SimilarityIndex>,
        relevance_floor: f32,
    ) -> Self {
        Self { embedding, index, relevance_floor }
    }

    pub async fn search(
        &self,
        query: &str,
        limit: Option<u32>,
    ) -> Result<Vec<SimilarityRecord>, RetrievalError> {
        let limit = limit.unwrap_or(DEFAULT_LIMIT).max(1) as usize;
        let query_vector = self.embedding.embed(query).await?;
        let chunks = self.index.load_chunks().await?;
        let candidates = chunks.len();

        let mut records: Vec<SimilarityRecord> = chunks
            .into_iter()
            .filter_map(|chunk| {
                let score = cosine_similarity(&query_vector, &chunk.embedding)?;
                if score <= self.relevance_floor {
                    return None;
                }
                Some(SimilarityRecord {
                    content: chunk.content,
                    metadata: chunk.metadata,
                    relevance_score: score,
                })
            })
            .collect();

        records.sort_by(|a, b| {
            b.relevance_score
                .partial_cmp(&a.relevance_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        records.truncate(limit);

        debug!(
            event_name = "retrieval.semantic.search",
            candidates,
            matched = records.len(),
            "semantic search completed"
        );
        Ok(records)
    }
}

/// Cosine similarity of two vectors; `None` for mismatched dimensions or a
/// zero vector.
fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }

    let mut dot = 0.0_f32;
    let mut norm_a = 0.0_f32;
    let mut norm_b = 0.0_f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return None;
    }
    Some(dot / (norm_a.sqrt() * norm_b.sqrt()))
}
