use std::sync::Arc;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use tokio::sync::RwLock;

/// Document held by a vector store, embedding included.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: String,
    pub title: String,
    pub content: String,
    pub embedding: Vec<f32>,
}

/// Search hit returned by [`VectorStore::search`]. Candidates arrive ordered
/// descending by `score`, already filtered against the caller's threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchCandidate {
    pub id: String,
    pub title: String,
    pub content: String,
    pub score: f32,
}

/// Nearest-neighbour lookup over the knowledge corpus. Implementations must
/// be safe to share across concurrent requests.
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn search(
        &self,
        query: &[f32],
        threshold: f32,
        top_k: usize,
    ) -> Result<Vec<SearchCandidate>>;
}

#[derive(Default)]
struct StoreInner {
    docs: Vec<Document>,
    dimension: Option<usize>,
}

/// Cosine-similarity store backed by a plain vector. Enough for tests and
/// for the CLI demo path; production deployments point the retriever at an
/// external store behind the same trait.
#[derive(Clone, Default)]
pub struct InMemoryVectorStore {
    inner: Arc<RwLock<StoreInner>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add(&self, docs: Vec<Document>) -> Result<()> {
        let mut inner = self.inner.write().await;
        for doc in docs {
            if doc.id.trim().is_empty() {
                return Err(anyhow!("document id must not be empty"));
            }
            let dimension = doc.embedding.len();
            match inner.dimension {
                Some(expected) if expected != dimension => {
                    return Err(anyhow!(
                        "embedding dimension mismatch: expected {expected}, got {dimension}"
                    ));
                }
                None => inner.dimension = Some(dimension),
                _ => {}
            }
            inner.docs.push(doc);
        }
        Ok(())
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.docs.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn search(
        &self,
        query: &[f32],
        threshold: f32,
        top_k: usize,
    ) -> Result<Vec<SearchCandidate>> {
        let inner = self.inner.read().await;
        if let Some(expected) = inner.dimension {
            if expected != query.len() {
                return Err(anyhow!(
                    "query dimension mismatch: expected {expected}, got {}",
                    query.len()
                ));
            }
        }

        let mut scored: Vec<SearchCandidate> = inner
            .docs
            .iter()
            .filter_map(|doc| {
                let score = cosine_similarity(query, &doc.embedding);
                if score.is_nan() || score < threshold {
                    return None;
                }
                Some(SearchCandidate {
                    id: doc.id.clone(),
                    title: doc.title.clone(),
                    content: doc.content.clone(),
                    score,
                })
            })
            .collect();

        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(top_k);
        Ok(scored)
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return f32::NAN;
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}
