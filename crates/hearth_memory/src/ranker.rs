//! Composite retrieval ranking.
//!
//! `score = 0.7·similarity + 0.2·freshness + 0.1·salience`, where
//! `freshness = 1 / (1 + age_hours / 168)`: a week-old memory is half as
//! fresh as a new one.

use crate::index::IndexHit;
use crate::types::ScoredMemory;
use chrono::{DateTime, Utc};

pub const SIMILARITY_WEIGHT: f32 = 0.7;
pub const FRESHNESS_WEIGHT: f32 = 0.2;
pub const SALIENCE_WEIGHT: f32 = 0.1;
pub const FRESHNESS_SCALE_HOURS: f32 = 168.0;
pub const DEFAULT_SALIENCE: f32 = 0.5;
/// Nearest neighbours fetched per requested result before reranking.
pub const CANDIDATE_MULTIPLIER: usize = 3;

/// Future (or missing) timestamps count as brand new.
pub fn freshness(timestamp: Option<DateTime<Utc>>, now: DateTime<Utc>) -> f32 {
    let Some(ts) = timestamp else {
        return 1.0;
    };
    let age_ms = (now - ts).num_milliseconds().max(0);
    let age_hours = age_ms as f32 / 3_600_000.0;
    1.0 / (1.0 + age_hours / FRESHNESS_SCALE_HOURS)
}

pub fn composite_score(similarity: f32, freshness: f32, salience: f32) -> f32 {
    similarity * SIMILARITY_WEIGHT + freshness * FRESHNESS_WEIGHT + salience * SALIENCE_WEIGHT
}

/// Rerank raw hits and keep the best `limit`.
pub fn rank(hits: Vec<IndexHit>, limit: usize, now: DateTime<Utc>) -> Vec<ScoredMemory> {
    let mut scored: Vec<ScoredMemory> = hits
        .into_iter()
        .map(|hit| {
            let fresh = freshness(hit.metadata.timestamp, now);
            let salience = hit
                .metadata
                .salience
                .filter(|s| s.is_finite())
                .unwrap_or(DEFAULT_SALIENCE)
                .clamp(0.0, 1.0);
            let similarity = if hit.similarity.is_finite() { hit.similarity } else { 0.0 };
            ScoredMemory {
                score: composite_score(similarity, fresh, salience),
                id: hit.id,
                text: hit.text,
                metadata: hit.metadata,
                similarity,
                freshness: fresh,
            }
        })
        .collect();

    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(limit);
    scored
}
