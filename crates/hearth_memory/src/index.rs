//! Vector index collaborator and its SQLite implementation.

use crate::embedding::cosine_similarity;
use crate::types::{MemoryMetadata, MemoryRecord};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use sqlx::{sqlite::SqlitePoolOptions, Pool, Row, Sqlite};
use std::path::Path;

/// Raw nearest-neighbour hit, before composite reranking.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexHit {
    pub id: String,
    pub text: String,
    pub metadata: MemoryMetadata,
    pub similarity: f32,
}

#[async_trait]
pub trait VectorIndex: Send + Sync {
    async fn upsert(&self, record: &MemoryRecord) -> Result<()>;
    /// Up to `k` hits ordered by similarity, highest first.
    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<IndexHit>>;
    /// Drop and recreate the collection.
    async fn reset(&self) -> Result<()>;
    async fn count(&self) -> Result<u64>;
}

/// One table per collection; embeddings stored as bincode blobs and
/// searched by brute-force cosine similarity.
#[derive(Clone)]
pub struct SqliteVectorIndex {
    pool: Pool<Sqlite>,
    table: String,
}

fn validate_collection(name: &str) -> Result<()> {
    if name.is_empty()
        || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        || name.starts_with(|c: char| c.is_ascii_digit())
    {
        bail!("invalid collection name: {name:?}");
    }
    Ok(())
}

impl SqliteVectorIndex {
    pub async fn open<P: AsRef<Path>>(db_path: P, collection: &str) -> Result<Self> {
        validate_collection(collection)?;
        if let Some(parent) = db_path.as_ref().parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let db_url = format!("sqlite://{}?mode=rwc", db_path.as_ref().display());
        let pool = SqlitePoolOptions::new()
            .connect(&db_url)
            .await
            .context("Failed to connect to SQLite database")?;

        let index = Self {
            pool,
            table: collection.to_string(),
        };
        index.migrate().await?;
        Ok(index)
    }

    /// Private in-memory database, for tests and ephemeral sessions.
    pub async fn in_memory(collection: &str) -> Result<Self> {
        validate_collection(collection)?;
        // Every connection to :memory: is a separate database
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .context("Failed to open in-memory SQLite database")?;
        let index = Self {
            pool,
            table: collection.to_string(),
        };
        index.migrate().await?;
        Ok(index)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                id TEXT PRIMARY KEY,
                body TEXT NOT NULL,
                embedding BLOB NOT NULL,
                timestamp INTEGER,
                salience REAL,
                kind TEXT NOT NULL,
                source TEXT NOT NULL
            );
            "#,
            self.table
        ))
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to create {} table", self.table))?;
        Ok(())
    }
}

#[async_trait]
impl VectorIndex for SqliteVectorIndex {
    async fn upsert(&self, record: &MemoryRecord) -> Result<()> {
        let blob = bincode::serialize(&record.embedding).context("Failed to serialize embedding")?;
        sqlx::query(&format!(
            r#"
            INSERT OR REPLACE INTO {} (id, body, embedding, timestamp, salience, kind, source)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
            self.table
        ))
        .bind(&record.id)
        .bind(&record.text)
        .bind(blob)
        .bind(record.metadata.timestamp.map(|t| t.timestamp_millis()))
        .bind(record.metadata.salience.map(|s| s as f64))
        .bind(&record.metadata.kind)
        .bind(&record.metadata.source)
        .execute(&self.pool)
        .await
        .context("Failed to insert memory")?;
        Ok(())
    }

    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<IndexHit>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let rows = sqlx::query(&format!(
            "SELECT id, body, embedding, timestamp, salience, kind, source FROM {}",
            self.table
        ))
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch memories for vector search")?;

        let mut hits = Vec::with_capacity(rows.len());
        for row in rows {
            let blob: Vec<u8> = row.get("embedding");
            let embedding = match bincode::deserialize::<Vec<f32>>(&blob) {
                Ok(e) => e,
                Err(e) => {
                    let id: String = row.get("id");
                    tracing::warn!("Skipping memory {id} with unreadable embedding: {e}");
                    continue;
                }
            };
            let timestamp: Option<i64> = row.get("timestamp");
            let salience: Option<f64> = row.get("salience");
            hits.push(IndexHit {
                id: row.get("id"),
                text: row.get("body"),
                metadata: MemoryMetadata {
                    timestamp: timestamp.and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
                    salience: salience.map(|s| s as f32),
                    kind: row.get("kind"),
                    source: row.get("source"),
                },
                similarity: cosine_similarity(query, &embedding),
            });
        }

        hits.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(k);
        Ok(hits)
    }

    async fn reset(&self) -> Result<()> {
        sqlx::query(&format!("DROP TABLE IF EXISTS {}", self.table))
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to drop {} table", self.table))?;
        self.migrate().await
    }

    async fn count(&self) -> Result<u64> {
        let row = sqlx::query(&format!("SELECT COUNT(*) AS n FROM {}", self.table))
            .fetch_one(&self.pool)
            .await
            .context("Failed to count memories")?;
        let n: i64 = row.get("n");
        Ok(n.max(0) as u64)
    }
}
