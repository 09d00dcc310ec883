//! Similarity retrieval over prior issues.
//!
//! Two independent strategies, each exposed to the model as its own
//! capability: semantic (embed the query, cosine-rank indexed chunks above a
//! relevance floor) and lexical (tracker text query scoped to the configured
//! project, most recent first). Both produce the same candidate record shape
//! so the model can present either uniformly.
//!
//! The bulk ingestion pipeline that populates the chunk index is out of
//! scope; this crate only reads it.

pub mod embedding;
pub mod index;
pub mod lexical;
pub mod records;
pub mod semantic;

pub use embedding::{EmbeddingClient, EmbeddingError, HttpEmbeddingClient};
pub use index::{
    connect_with_settings, ChunkRecord, DbPool, IndexError, SimilarityIndex, SqliteSimilarityIndex,
};
pub use lexical::RecentTicketSearch;
pub use records::{IssueCandidate, SimilarityRecord};
pub use semantic::{RetrievalError, SemanticSearch};
