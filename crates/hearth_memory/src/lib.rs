//! # Hearth Memory
//!
//! Append-only semantic memory. Text goes in through an [`Embedder`], vectors
//! live in a [`VectorIndex`], and retrieval reranks the nearest neighbours by
//! a composite of similarity, freshness and salience (see [`ranker`]).
//!
//! The [`MemoryStore`] is the boundary: embedding or index failures stop
//! there and come out as empty results, never as errors.

pub mod embedding;
pub mod index;
pub mod ranker;
mod store;
mod types;

pub use embedding::{cosine_similarity, Embedder, HashingEmbedder};
#[cfg(feature = "fastembed")]
pub use embedding::FastEmbedder;
pub use index::{IndexHit, SqliteVectorIndex, VectorIndex};
pub use store::MemoryStore;
pub use types::{MemoryMetadata, MemoryRecord, ScoredMemory};
