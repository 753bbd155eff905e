//! Memory store integration tests: real SQLite in a temp dir.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use hearth_core::config::MemoryConfig;
use hearth_memory::{
    Embedder, HashingEmbedder, IndexHit, MemoryMetadata, MemoryRecord, MemoryStore, VectorIndex,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

async fn open_store(dir: &TempDir) -> MemoryStore {
    MemoryStore::open(dir.path().join("memory.db"), &MemoryConfig::default())
        .await
        .unwrap()
}

#[tokio::test]
async fn test_add_then_retrieve_same_text() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir).await;

    let id = store
        .add("We adopted a cat named Miso", MemoryMetadata::default())
        .await
        .unwrap();
    store
        .add("The car needs new tyres before winter", MemoryMetadata::default())
        .await
        .unwrap();

    let results = store.retrieve("We adopted a cat named Miso", 1).await;
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].id, id);
    assert!((results[0].similarity - 1.0).abs() < 1e-4);
}

#[tokio::test]
async fn test_memories_survive_reopen() {
    let dir = TempDir::new().unwrap();
    {
        let store = open_store(&dir).await;
        store.add("first day at the new job", MemoryMetadata::default()).await.unwrap();
    }
    let store = open_store(&dir).await;
    assert_eq!(store.count().await, Some(1));
}

#[tokio::test]
async fn test_salience_is_clamped_and_timestamp_defaulted() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir).await;
    store
        .add("ran a marathon", MemoryMetadata::new("milestone", "user").with_salience(7.0))
        .await
        .unwrap();

    let results = store.retrieve("ran a marathon", 1).await;
    assert_eq!(results[0].metadata.salience, Some(1.0));
    assert!(results[0].metadata.timestamp.is_some());
    assert_eq!(results[0].metadata.kind, "milestone");
}

#[tokio::test]
async fn test_fresher_memory_wins_tie() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir).await;
    let now = Utc::now();
    let old = store
        .add("coffee with Sam", MemoryMetadata::default().at(now - Duration::days(60)))
        .await
        .unwrap();
    let new = store
        .add("coffee with Sam", MemoryMetadata::default().at(now))
        .await
        .unwrap();

    let results = store.retrieve_at("coffee with Sam", 2, now).await;
    assert_eq!(results[0].id, new);
    assert_eq!(results[1].id, old);
}

#[tokio::test]
async fn test_wipe_clears_everything() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir).await;
    store.add("something to forget", MemoryMetadata::default()).await.unwrap();
    store.wipe().await.unwrap();
    assert!(store.retrieve("something to forget", 5).await.is_empty());
    assert_eq!(store.count().await, Some(0));
}

// ============================================================================
// Failure handling
// ============================================================================

struct CountingIndex {
    searches: AtomicUsize,
}

#[async_trait]
impl VectorIndex for CountingIndex {
    async fn upsert(&self, _record: &MemoryRecord) -> Result<()> {
        Err(anyhow!("connection refused"))
    }
    async fn search(&self, _query: &[f32], _k: usize) -> Result<Vec<IndexHit>> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        Err(anyhow!("connection refused"))
    }
    async fn reset(&self) -> Result<()> {
        Err(anyhow!("connection refused"))
    }
    async fn count(&self) -> Result<u64> {
        Err(anyhow!("connection refused"))
    }
}

struct BrokenEmbedder;

#[async_trait]
impl Embedder for BrokenEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(anyhow!("model not loaded"))
    }
    fn dimension(&self) -> usize {
        0
    }
}

#[tokio::test]
async fn test_index_failure_degrades_to_empty() {
    let index = Arc::new(CountingIndex { searches: AtomicUsize::new(0) });
    let store = MemoryStore::new(Arc::new(HashingEmbedder::default()), index.clone());

    assert!(store.add("hello", MemoryMetadata::default()).await.is_none());
    assert!(store.retrieve("hello", 3).await.is_empty());
    assert!(store.wipe().await.is_err());
    assert_eq!(index.searches.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_zero_limit_never_touches_index() {
    let index = Arc::new(CountingIndex { searches: AtomicUsize::new(0) });
    let store = MemoryStore::new(Arc::new(HashingEmbedder::default()), index.clone());
    assert!(store.retrieve("hello", 0).await.is_empty());
    assert_eq!(index.searches.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_embedder_failure_degrades_to_empty() {
    let dir = TempDir::new().unwrap();
    let index = hearth_memory::SqliteVectorIndex::open(dir.path().join("memory.db"), "memories")
        .await
        .unwrap();
    let store = MemoryStore::new(Arc::new(BrokenEmbedder), Arc::new(index));
    assert!(store.add("hello", MemoryMetadata::default()).await.is_none());
    assert!(store.retrieve("hello", 3).await.is_empty());
}
