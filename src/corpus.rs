//! Documents and the embedded chunk corpus derived from them.
//!
//! A corpus is the retrieval index for one document: its text split into
//! overlapping windows, each paired with an embedding vector. Corpora are
//! cached by content hash, so two sessions bound to byte-identical documents
//! share one build.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::cache::Cache;
use crate::chunk::split_text;
use crate::config::Config;
use crate::embedding::EmbeddingProvider;
use crate::error::ChatError;

/// An uploaded document: extracted text plus a lazily populated summary.
#[derive(Debug, Clone)]
pub struct Document {
    pub filename: String,
    pub text: String,
    /// Populated when the document is bound to a session.
    pub summary: Option<String>,
}

impl Document {
    pub fn new(filename: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            text: text.into(),
            summary: None,
        }
    }

    /// Deterministic digest of the full text. Identifies the corpus
    /// independently of filename or session.
    pub fn content_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.text.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

/// One chunk of the retrieval index: position, text, and embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorpusEntry {
    pub index: usize,
    pub text: String,
    pub embedding: Vec<f32>,
}

/// Builds (and caches) the embedded corpus for a document.
pub struct CorpusBuilder {
    cache: Cache,
    embedder: Arc<dyn EmbeddingProvider>,
    chunk_size: usize,
    overlap: usize,
    ttl: Duration,
}

impl CorpusBuilder {
    pub fn new(config: &Config, cache: Cache, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            cache,
            embedder,
            chunk_size: config.chunking.corpus_chunk_size,
            overlap: config.chunking.corpus_overlap,
            ttl: Duration::from_secs(config.cache.corpus_ttl_secs),
        }
    }

    /// Return the corpus for `document`, building it on a cache miss.
    ///
    /// A fresh build splits the text, requests embeddings for all chunks in
    /// one batched call, and zips them into entries with `index` = chunk
    /// position. For a fixed content hash and a deterministic embedder,
    /// repeated builds are identical, so cross-session reuse is safe.
    ///
    /// # Errors
    ///
    /// Embedding provider failures propagate as [`ChatError::Upstream`] —
    /// fatal for this build attempt, retryable by the caller.
    pub async fn build(&self, document: &Document) -> Result<Vec<CorpusEntry>, ChatError> {
        let key = format!("corpus:{}", document.content_hash());
        self.cache
            .get_or_compute(&key, self.ttl, || self.build_fresh(document))
            .await
    }

    async fn build_fresh(&self, document: &Document) -> Result<Vec<CorpusEntry>, ChatError> {
        let chunks = split_text(&document.text, self.chunk_size, self.overlap)?;
        info!(
            filename = %document.filename,
            chunks = chunks.len(),
            model = self.embedder.model_name(),
            "building corpus"
        );

        let embeddings = self.embedder.embed_batch(&chunks).await?;
        if embeddings.len() != chunks.len() {
            return Err(ChatError::Upstream(format!(
                "embedding count mismatch: {} chunks, {} vectors",
                chunks.len(),
                embeddings.len()
            )));
        }

        Ok(chunks
            .into_iter()
            .zip(embeddings)
            .enumerate()
            .map(|(index, (text, embedding))| CorpusEntry {
                index,
                text,
                embedding,
            })
            .collect())
    }
}
