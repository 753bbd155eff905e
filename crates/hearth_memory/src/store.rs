use crate::embedding::{Embedder, HashingEmbedder};
use crate::index::{SqliteVectorIndex, VectorIndex};
use crate::ranker::{self, CANDIDATE_MULTIPLIER};
use crate::types::{MemoryMetadata, MemoryRecord, ScoredMemory};
use anyhow::Result;
use chrono::{DateTime, Utc};
use hearth_core::config::MemoryConfig;
use hearth_core::{HearthError, HearthResult};
use std::path::Path;
use std::sync::Arc;

/// The memory boundary. Collaborator failures are logged as
/// `DependencyUnavailable` and degrade to empty results.
#[derive(Clone)]
pub struct MemoryStore {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
}

impl MemoryStore {
    pub fn new(embedder: Arc<dyn Embedder>, index: Arc<dyn VectorIndex>) -> Self {
        Self { embedder, index }
    }

    /// SQLite index at `db_path` with the hashing embedder.
    pub async fn open(db_path: impl AsRef<Path>, config: &MemoryConfig) -> Result<Self> {
        let index = SqliteVectorIndex::open(db_path, &config.collection).await?;
        Ok(Self::new(
            Arc::new(HashingEmbedder::new(config.embedding_dim)),
            Arc::new(index),
        ))
    }

    /// Embed and store `text`. Returns the new id, or `None` when the
    /// embedder or index is unavailable.
    pub async fn add(&self, text: &str, metadata: MemoryMetadata) -> Option<String> {
        let embedding = match self.embedder.embed(text).await {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!("{}", HearthError::dependency("embedder", format!("{e:#}")));
                return None;
            }
        };

        let mut metadata = metadata;
        metadata.timestamp.get_or_insert_with(Utc::now);
        metadata.salience = metadata.salience.map(|s| {
            if s.is_finite() {
                s.clamp(0.0, 1.0)
            } else {
                ranker::DEFAULT_SALIENCE
            }
        });

        let record = MemoryRecord {
            id: uuid::Uuid::new_v4().to_string(),
            text: text.to_string(),
            embedding,
            metadata,
        };
        match self.index.upsert(&record).await {
            Ok(()) => {
                tracing::debug!(id = %record.id, kind = %record.metadata.kind, "Memory stored");
                Some(record.id)
            }
            Err(e) => {
                tracing::warn!("{}", HearthError::dependency("vector index", format!("{e:#}")));
                None
            }
        }
    }

    pub async fn retrieve(&self, query: &str, limit: usize) -> Vec<ScoredMemory> {
        self.retrieve_at(query, limit, Utc::now()).await
    }

    /// Retrieval as of `now`, for deterministic freshness.
    pub async fn retrieve_at(&self, query: &str, limit: usize, now: DateTime<Utc>) -> Vec<ScoredMemory> {
        if limit == 0 {
            return Vec::new();
        }
        let query_embedding = match self.embedder.embed(query).await {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!("{}", HearthError::dependency("embedder", format!("{e:#}")));
                return Vec::new();
            }
        };
        let hits = match self
            .index
            .search(&query_embedding, limit.saturating_mul(CANDIDATE_MULTIPLIER))
            .await
        {
            Ok(hits) => hits,
            Err(e) => {
                tracing::warn!("{}", HearthError::dependency("vector index", format!("{e:#}")));
                return Vec::new();
            }
        };
        ranker::rank(hits, limit, now)
    }

    /// Irreversibly clear every memory in the collection.
    pub async fn wipe(&self) -> HearthResult<()> {
        self.index
            .reset()
            .await
            .map_err(|e| HearthError::dependency("vector index", format!("{e:#}")))?;
        tracing::warn!("Memory collection wiped");
        Ok(())
    }

    pub async fn count(&self) -> Option<u64> {
        self.index.count().await.ok()
    }
}
