//! Semantic top-k retrieval over an embedded corpus.

use crate::corpus::CorpusEntry;
use crate::embedding::{cosine_similarity, EmbeddingProvider};
use crate::error::ChatError;

/// Rank `corpus` against `query` and return the `k` most similar entries.
///
/// The query is embedded with `embedder`, which must be the same provider
/// and model that built the corpus — vectors from different models are not
/// comparable, and this precondition is not checked here.
///
/// Results are ordered by descending cosine similarity; ties break by
/// ascending corpus index so repeated queries return identical orderings.
/// If `k` exceeds the corpus size, all entries are returned in score order.
pub async fn top_k(
    embedder: &dyn EmbeddingProvider,
    query: &str,
    corpus: &[CorpusEntry],
    k: usize,
) -> Result<Vec<CorpusEntry>, ChatError> {
    let query_vec = embedder.embed_query(query).await?;
    Ok(top_k_by_vector(&query_vec, corpus, k))
}

/// Rank `corpus` against an already-embedded query vector.
pub fn top_k_by_vector(query_vec: &[f32], corpus: &[CorpusEntry], k: usize) -> Vec<CorpusEntry> {
    let mut scored: Vec<(f32, &CorpusEntry)> = corpus
        .iter()
        .map(|entry| (cosine_similarity(query_vec, &entry.embedding), entry))
        .collect();

    scored.sort_by(|a, b| {
        b.0.partial_cmp(&a.0)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.1.index.cmp(&b.1.index))
    });

    scored
        .into_iter()
        .take(k)
        .map(|(_, entry)| entry.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(index: usize, embedding: Vec<f32>) -> CorpusEntry {
        CorpusEntry {
            index,
            text: format!("chunk {}", index),
            embedding,
        }
    }

    #[test]
    fn test_returns_k_entries_by_descending_similarity() {
        let corpus = vec![
            entry(0, vec![1.0, 0.0]),
            entry(1, vec![0.0, 1.0]),
            entry(2, vec![0.7, 0.7]),
        ];
        let results = top_k_by_vector(&[1.0, 0.0], &corpus, 2);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].index, 0);
        assert_eq!(results[1].index, 2);
    }

    #[test]
    fn test_k_larger_than_corpus_returns_all() {
        let corpus = vec![entry(0, vec![1.0, 0.0]), entry(1, vec![0.0, 1.0])];
        let results = top_k_by_vector(&[0.0, 1.0], &corpus, 10);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].index, 1);
    }

    #[test]
    fn test_ties_break_by_ascending_index() {
        // All three entries score identically against the query.
        let corpus = vec![
            entry(2, vec![1.0, 0.0]),
            entry(0, vec![1.0, 0.0]),
            entry(1, vec![1.0, 0.0]),
        ];
        let results = top_k_by_vector(&[1.0, 0.0], &corpus, 3);
        let order: Vec<usize> = results.iter().map(|e| e.index).collect();
        assert_eq!(order, vec![0, 1, 2]);
    }

    #[test]
    fn test_repeated_query_is_deterministic() {
        let corpus = vec![
            entry(0, vec![0.9, 0.1]),
            entry(1, vec![0.5, 0.5]),
            entry(2, vec![0.1, 0.9]),
        ];
        let first = top_k_by_vector(&[0.6, 0.4], &corpus, 3);
        let second = top_k_by_vector(&[0.6, 0.4], &corpus, 3);
        assert_eq!(first, second);
    }

    #[test]
    fn test_entries_keep_identity() {
        let corpus = vec![entry(0, vec![1.0]), entry(1, vec![-1.0])];
        let results = top_k_by_vector(&[1.0], &corpus, 1);
        assert_eq!(results[0].text, "chunk 0");
        assert_eq!(results[0].embedding, vec![1.0]);
    }

    #[test]
    fn test_zero_k_returns_nothing() {
        let corpus = vec![entry(0, vec![1.0])];
        assert!(top_k_by_vector(&[1.0], &corpus, 0).is_empty());
    }
}
