use std::sync::Arc;
use std::time::Duration;

use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use super::{Corpus, KnowledgeSnippet};
use crate::cache::{PersistentCache, embedding_key};
use crate::llm::{EmbeddingProvider, LlmError};

/// A retrieved passage and its cosine similarity to the query
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredSnippet {
    pub snippet: KnowledgeSnippet,
    pub score: f32,
}

/// Cosine similarity; zero when either vector is zero or lengths differ
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let (dot, norm_a, norm_b) = a
        .iter()
        .zip(b)
        .fold((0.0_f32, 0.0_f32, 0.0_f32), |(dot, na, nb), (x, y)| {
            (dot + x * y, na + x * x, nb + y * y)
        });
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a.sqrt() * norm_b.sqrt())
    }
}

/// Corpus passages paired with their embeddings
#[derive(Debug, Default)]
pub struct KnowledgeIndex {
    entries: Vec<(KnowledgeSnippet, Vec<f32>)>,
}

impl KnowledgeIndex {
    /// Embed every passage, serving vectors from `cache` where present.
    /// Cache errors are logged and otherwise ignored.
    pub async fn build(
        corpus: &Corpus,
        embedder: &dyn EmbeddingProvider,
        cache: Option<&PersistentCache>,
        ttl: Duration,
    ) -> Result<Self, LlmError> {
        let snippets = corpus.snippets();
        let texts: Vec<String> = snippets.iter().map(KnowledgeSnippet::embedding_text).collect();
        let keys: Vec<String> = texts
            .iter()
            .map(|text| embedding_key(embedder.model(), text))
            .collect();

        let mut vectors: Vec<Option<Vec<f32>>> = vec![None; snippets.len()];
        if let Some(cache) = cache {
            for (slot, key) in vectors.iter_mut().zip(&keys) {
                match cache.get::<Vec<f32>>(key).await {
                    Ok(hit) => *slot = hit,
                    Err(e) => warn!("Embedding cache read failed: {:#}", e),
                }
            }
        }

        let missing: Vec<usize> = (0..snippets.len()).filter(|i| vectors[*i].is_none()).collect();
        info!(
            "Building knowledge index: {} passages, {} cached, {} to embed",
            snippets.len(),
            snippets.len() - missing.len(),
            missing.len()
        );

        if !missing.is_empty() {
            let batch: Vec<String> = missing.iter().map(|i| texts[*i].clone()).collect();
            let embedded = embedder.embed(&batch).await?;
            if embedded.len() != missing.len() {
                return Err(LlmError::InvalidResponse(format!(
                    "expected {} embeddings, got {}",
                    missing.len(),
                    embedded.len()
                )));
            }

            for (i, vector) in missing.into_iter().zip(embedded) {
                if let Some(cache) = cache {
                    if let Err(e) = cache.put(&keys[i], vector.clone(), ttl).await {
                        warn!("Embedding cache write failed: {:#}", e);
                    }
                }
                vectors[i] = Some(vector);
            }
        }

        let entries = snippets
            .iter()
            .cloned()
            .zip(vectors)
            .filter_map(|(snippet, vector)| vector.map(|v| (snippet, v)))
            .collect();

        Ok(Self { entries })
    }

    /// Top `k` passages by similarity; ties keep corpus order
    #[must_use]
    pub fn search(&self, query: &[f32], k: usize) -> Vec<ScoredSnippet> {
        let mut scored: Vec<ScoredSnippet> = self
            .entries
            .iter()
            .map(|(snippet, vector)| ScoredSnippet {
                snippet: snippet.clone(),
                score: cosine_similarity(query, vector),
            })
            .collect();
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(k);
        scored
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Lazily-built index plus the query side of retrieval
pub struct Retriever {
    corpus: Arc<Corpus>,
    embedder: Arc<dyn EmbeddingProvider>,
    cache: Option<Arc<PersistentCache>>,
    cache_ttl: Duration,
    top_k: usize,
    index: OnceCell<KnowledgeIndex>,
}

impl Retriever {
    pub fn new(
        corpus: Arc<Corpus>,
        embedder: Arc<dyn EmbeddingProvider>,
        cache: Option<Arc<PersistentCache>>,
        cache_ttl: Duration,
        top_k: usize,
    ) -> Self {
        Self {
            corpus,
            embedder,
            cache,
            cache_ttl,
            top_k,
            index: OnceCell::new(),
        }
    }

    /// Build the index on first use. A failed build is retried on the next call.
    async fn index(&self) -> Result<&KnowledgeIndex, LlmError> {
        self.index
            .get_or_try_init(|| {
                KnowledgeIndex::build(
                    &self.corpus,
                    self.embedder.as_ref(),
                    self.cache.as_deref(),
                    self.cache_ttl,
                )
            })
            .await
    }

    /// Passages most similar to `query`
    pub async fn retrieve(&self, query: &str) -> Result<Vec<ScoredSnippet>, LlmError> {
        let index = self.index().await?;
        if index.is_empty() {
            return Ok(Vec::new());
        }

        let mut query_vectors = self.embedder.embed(&[query.to_string()]).await?;
        let query_vector = query_vectors
            .pop()
            .ok_or_else(|| LlmError::InvalidResponse("no embedding for query".to_string()))?;

        let results = index.search(&query_vector, self.top_k);
        debug!(
            "Retrieved sections: {:?}",
            results
                .iter()
                .map(|r| format!("{} ({:.3})", r.snippet.section, r.score))
                .collect::<Vec<_>>()
        );
        Ok(results)
    }
}
