//! Hierarchical (map-then-reduce) document summarization.
//!
//! Long documents do not fit in one completion request, so summarization
//! runs in two levels: each chunk is summarized independently (map), then
//! the ordered chunk summaries are combined into one final summary (reduce).
//! Both levels are cached — chunk summaries for an hour (they only change
//! when the chunk text changes), the final summary for five minutes (cheap
//! to regenerate and sensitive to chunk-summary staleness).

use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::cache::{Cache, CacheKey};
use crate::chunk::split_text;
use crate::config::Config;
use crate::error::ChatError;
use crate::llm::{LlmGateway, Message};

const CHUNK_SUMMARY_PROMPT: &str = "You will be provided with a piece of text enclosed in \
    triple quotes. Summarize the text in about 150 words.";

const FINAL_SUMMARY_PROMPT: &str = "You will be provided with a batch of summaries enclosed \
    in triple quotes. Each summary is generated from a chunk of the same article. \
    Please generate a final summary for the article in about 150 words.";

/// Two-level cached summarizer over the LLM gateway.
pub struct SummarizationPipeline {
    cache: Cache,
    llm: Arc<dyn LlmGateway>,
    chunk_size: usize,
    overlap: usize,
    chunk_ttl: Duration,
    final_ttl: Duration,
}

impl SummarizationPipeline {
    pub fn new(config: &Config, cache: Cache, llm: Arc<dyn LlmGateway>) -> Self {
        Self {
            cache,
            llm,
            chunk_size: config.chunking.summary_chunk_size,
            overlap: config.chunking.summary_overlap,
            chunk_ttl: Duration::from_secs(config.cache.chunk_summary_ttl_secs),
            final_ttl: Duration::from_secs(config.cache.summary_ttl_secs),
        }
    }

    /// Summarize `text` in about 150 words.
    ///
    /// # Errors
    ///
    /// LLM gateway failures propagate as [`ChatError::Upstream`].
    pub async fn summarize(&self, text: &str) -> Result<String, ChatError> {
        let key = CacheKey::new("summary.final").arg(text).digest();
        self.cache
            .get_or_compute(&key, self.final_ttl, || self.summarize_fresh(text))
            .await
    }

    async fn summarize_fresh(&self, text: &str) -> Result<String, ChatError> {
        let chunks = split_text(text, self.chunk_size, self.overlap)?;
        let total = chunks.len();
        let mut chunk_summaries = Vec::with_capacity(total);

        // The reduce step depends on chunk summaries arriving in original
        // chunk order; the final summary reads as a narrative only then.
        for (idx, chunk) in chunks.iter().enumerate() {
            info!(chunk = idx + 1, total, "summarizing chunk");
            let key = CacheKey::new("summary.chunk").arg(chunk).digest();
            let summary = self
                .cache
                .get_or_compute(&key, self.chunk_ttl, || self.summarize_chunk(chunk))
                .await?;
            chunk_summaries.push(summary);
        }

        info!("combining {} chunk summaries", total);
        let combined = chunk_summaries
            .iter()
            .map(|s| format!("\"\"\"{}\"\"\"", s))
            .collect::<Vec<_>>()
            .join("\n");

        let replies = self
            .llm
            .complete(&[
                Message::system(FINAL_SUMMARY_PROMPT),
                Message::user(combined),
            ])
            .await?;

        first_reply(replies)
    }

    async fn summarize_chunk(&self, piece: &str) -> Result<String, ChatError> {
        let replies = self
            .llm
            .complete(&[
                Message::system(CHUNK_SUMMARY_PROMPT),
                Message::user(format!("\"\"\"{}\"\"\"", piece)),
            ])
            .await?;
        first_reply(replies)
    }
}

fn first_reply(replies: Vec<Message>) -> Result<String, ChatError> {
    replies
        .into_iter()
        .next()
        .map(|m| m.content)
        .ok_or_else(|| ChatError::Upstream("completion returned no messages".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryBackend;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Gateway fake that echoes a canned reply and records every prompt.
    struct RecordingGateway {
        calls: AtomicUsize,
        prompts: Mutex<Vec<Vec<Message>>>,
    }

    impl RecordingGateway {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LlmGateway for RecordingGateway {
        async fn complete(&self, messages: &[Message]) -> Result<Vec<Message>, ChatError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            self.prompts.lock().unwrap().push(messages.to_vec());
            Ok(vec![Message::assistant(format!("reply {}", n))])
        }
    }

    fn pipeline(chunk_size: usize) -> (SummarizationPipeline, Arc<RecordingGateway>) {
        let mut config = Config::default();
        config.chunking.summary_chunk_size = chunk_size;
        config.chunking.summary_overlap = 0;
        let gateway = Arc::new(RecordingGateway::new());
        let cache = Cache::new(Arc::new(MemoryBackend::new()));
        (
            SummarizationPipeline::new(&config, cache, gateway.clone()),
            gateway,
        )
    }

    #[tokio::test]
    async fn test_one_call_per_chunk_plus_reduce() {
        let (pipeline, gateway) = pipeline(4);
        // 10 chars, chunk size 4 => 3 chunks => 3 map calls + 1 reduce.
        let summary = pipeline.summarize("abcdefghij").await.unwrap();
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 4);
        assert_eq!(summary, "reply 3");
    }

    #[tokio::test]
    async fn test_second_summarize_is_fully_cached() {
        let (pipeline, gateway) = pipeline(4);
        let first = pipeline.summarize("abcdefghij").await.unwrap();
        let second = pipeline.summarize("abcdefghij").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_reduce_preserves_chunk_order() {
        let (pipeline, gateway) = pipeline(4);
        pipeline.summarize("abcdefghij").await.unwrap();

        let prompts = gateway.prompts.lock().unwrap();
        let reduce = prompts.last().unwrap();
        assert_eq!(reduce[0].content, FINAL_SUMMARY_PROMPT);
        // Map replies were "reply 0".."reply 2"; the reduce input must list
        // them in that order.
        assert_eq!(
            reduce[1].content,
            "\"\"\"reply 0\"\"\"\n\"\"\"reply 1\"\"\"\n\"\"\"reply 2\"\"\""
        );
    }

    #[tokio::test]
    async fn test_chunk_prompt_wraps_text_in_triple_quotes() {
        let (pipeline, gateway) = pipeline(64);
        pipeline.summarize("short text").await.unwrap();

        let prompts = gateway.prompts.lock().unwrap();
        let map = &prompts[0];
        assert_eq!(map[0].content, CHUNK_SUMMARY_PROMPT);
        assert_eq!(map[1].content, "\"\"\"short text\"\"\"");
    }

    #[tokio::test]
    async fn test_shared_chunks_reuse_cached_summaries() {
        let (pipeline, gateway) = pipeline(4);
        pipeline.summarize("abcdXXXX").await.unwrap();
        let after_first = gateway.calls.load(Ordering::SeqCst);

        // Same leading chunk "abcd"; only the new chunk and the new reduce
        // should cost calls.
        pipeline.summarize("abcdYYYY").await.unwrap();
        assert_eq!(gateway.calls.load(Ordering::SeqCst), after_first + 2);
    }
}
