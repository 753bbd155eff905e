use anyhow::{bail, Result};
use async_trait::async_trait;

pub type Embedding = Vec<f32>;

/// Text to vector. Implementations must be deterministic for equal input.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Embedding>;
    fn dimension(&self) -> usize;
}

/// Feature-hashing embedder. Local, deterministic and dependency-free.
///
/// Each lowercased word and adjacent word pair is hashed into a signed
/// bucket; the vector is L2-normalized. Good enough for lexical recall and
/// for tests. Enable the `fastembed` feature for a real model.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dim: usize,
}

impl HashingEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim: dim.max(8) }
    }

    fn fnv1a(token: &str) -> u64 {
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in token.as_bytes() {
            hash ^= *byte as u64;
            hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
        }
        hash
    }

    fn add_token(&self, v: &mut [f32], token: &str, weight: f32) {
        let h = Self::fnv1a(token);
        let bucket = (h % self.dim as u64) as usize;
        let sign = if (h >> 63) == 0 { 1.0 } else { -1.0 };
        v[bucket] += sign * weight;
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    async fn embed(&self, text: &str) -> Result<Embedding> {
        let words: Vec<String> = text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(|w| w.to_lowercase())
            .collect();
        if words.is_empty() {
            bail!("nothing to embed");
        }

        let mut v = vec![0.0f32; self.dim];
        for w in &words {
            self.add_token(&mut v, w, 1.0);
        }
        for pair in words.windows(2) {
            self.add_token(&mut v, &format!("{} {}", pair[0], pair[1]), 0.5);
        }

        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            v.iter_mut().for_each(|x| *x /= norm);
        }
        Ok(v)
    }

    fn dimension(&self) -> usize {
        self.dim
    }
}

#[cfg(feature = "fastembed")]
mod fast {
    use super::{Embedder, Embedding};
    use anyhow::{Context, Result};
    use async_trait::async_trait;
    use fastembed::{EmbeddingModel as FastEmbedModel, InitOptions, TextEmbedding};
    use std::sync::Arc;

    /// Local ONNX embedding model (multilingual-e5-small, 384 dims).
    #[derive(Clone)]
    pub struct FastEmbedder {
        model: Arc<TextEmbedding>,
    }

    impl FastEmbedder {
        pub fn new() -> Result<Self> {
            let mut options = InitOptions::default();
            options.model_name = FastEmbedModel::MultilingualE5Small;
            options.show_download_progress = true;

            let model = TextEmbedding::try_new(options).context("Failed to load embedding model")?;
            Ok(Self {
                model: Arc::new(model),
            })
        }
    }

    #[async_trait]
    impl Embedder for FastEmbedder {
        async fn embed(&self, text: &str) -> Result<Embedding> {
            let model = Arc::clone(&self.model);
            let text = text.to_string();
            let embeddings = tokio::task::spawn_blocking(move || model.embed(vec![text], None))
                .await
                .context("Embedding task panicked")??;
            embeddings
                .into_iter()
                .next()
                .ok_or_else(|| anyhow::anyhow!("Failed to generate embedding"))
        }

        fn dimension(&self) -> usize {
            384
        }
    }
}

#[cfg(feature = "fastembed")]
pub use fast::FastEmbedder;

/// Calculate cosine similarity between two vectors
/// Returns a value between -1.0 and 1.0 (1.0 = identical direction)
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    (dot_product / (norm_a * norm_b)).clamp(-1.0, 1.0)
}
