use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    /// Window size (characters) for corpus chunks used in retrieval.
    #[serde(default = "default_corpus_chunk_size")]
    pub corpus_chunk_size: usize,
    #[serde(default = "default_corpus_overlap")]
    pub corpus_overlap: usize,
    /// Window size (characters) for summarization chunks.
    #[serde(default = "default_summary_chunk_size")]
    pub summary_chunk_size: usize,
    #[serde(default)]
    pub summary_overlap: usize,
}

fn default_corpus_chunk_size() -> usize {
    512
}
fn default_corpus_overlap() -> usize {
    32
}
fn default_summary_chunk_size() -> usize {
    3000
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            corpus_chunk_size: default_corpus_chunk_size(),
            corpus_overlap: default_corpus_overlap(),
            summary_chunk_size: default_summary_chunk_size(),
            summary_overlap: 0,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    /// `memory` or `filesystem`.
    #[serde(default = "default_cache_backend")]
    pub backend: String,
    /// Record directory for the filesystem backend.
    #[serde(default = "default_cache_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_corpus_ttl")]
    pub corpus_ttl_secs: u64,
    #[serde(default = "default_chunk_summary_ttl")]
    pub chunk_summary_ttl_secs: u64,
    #[serde(default = "default_summary_ttl")]
    pub summary_ttl_secs: u64,
}

fn default_cache_backend() -> String {
    "memory".to_string()
}
fn default_cache_dir() -> PathBuf {
    PathBuf::from("./data/cache")
}
fn default_corpus_ttl() -> u64 {
    12 * 60 * 60
}
fn default_chunk_summary_ttl() -> u64 {
    60 * 60
}
fn default_summary_ttl() -> u64 {
    5 * 60
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: default_cache_backend(),
            dir: default_cache_dir(),
            corpus_ttl_secs: default_corpus_ttl(),
            chunk_summary_ttl_secs: default_chunk_summary_ttl(),
            summary_ttl_secs: default_summary_ttl(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    /// `openai`, `ollama`, or `local`.
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL override (Ollama, or an OpenAI-compatible endpoint).
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_embedding_provider() -> String {
    "openai".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: Some("text-embedding-3-small".to_string()),
            dims: Some(1536),
            url: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    /// Environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_llm_base_url() -> String {
    "https://openrouter.ai/api/v1".to_string()
}
fn default_llm_model() -> String {
    "mistralai/mistral-7b-instruct".to_string()
}
fn default_api_key_env() -> String {
    "OPENROUTER_API_KEY".to_string()
}
fn default_llm_timeout_secs() -> u64 {
    60
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            model: default_llm_model(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChatConfig {
    /// Rolling history capacity; oldest messages are dropped first.
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
    /// Number of corpus passages retrieved per question.
    #[serde(default = "default_retrieval_top_k")]
    pub retrieval_top_k: usize,
}

fn default_history_capacity() -> usize {
    6
}
fn default_retrieval_top_k() -> usize {
    3
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            history_capacity: default_history_capacity(),
            retrieval_top_k: default_retrieval_top_k(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

fn default_bind() -> String {
    "127.0.0.1:8462".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

/// Validate a config assembled in code (tests, embedding callers).
pub fn validate(config: &Config) -> Result<()> {
    // Chunking: a non-positive stride would make the splitter loop forever.
    for (name, size, overlap) in [
        (
            "corpus",
            config.chunking.corpus_chunk_size,
            config.chunking.corpus_overlap,
        ),
        (
            "summary",
            config.chunking.summary_chunk_size,
            config.chunking.summary_overlap,
        ),
    ] {
        if size == 0 {
            anyhow::bail!("chunking.{}_chunk_size must be > 0", name);
        }
        if overlap >= size {
            anyhow::bail!(
                "chunking.{}_overlap ({}) must be smaller than the chunk size ({})",
                name,
                overlap,
                size
            );
        }
    }

    match config.cache.backend.as_str() {
        "memory" | "filesystem" => {}
        other => anyhow::bail!(
            "Unknown cache backend: '{}'. Must be memory or filesystem.",
            other
        ),
    }

    match config.embedding.provider.as_str() {
        "openai" | "ollama" | "local" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be openai, ollama, or local.",
            other
        ),
    }

    if config.chat.history_capacity == 0 {
        anyhow::bail!("chat.history_capacity must be >= 1");
    }
    if config.chat.retrieval_top_k == 0 {
        anyhow::bail!("chat.retrieval_top_k must be >= 1");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        validate(&Config::default()).unwrap();
    }

    #[test]
    fn test_empty_toml_gets_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.chunking.corpus_chunk_size, 512);
        assert_eq!(config.chat.history_capacity, 6);
        assert_eq!(config.cache.corpus_ttl_secs, 43200);
        assert_eq!(config.llm.base_url, "https://openrouter.ai/api/v1");
    }

    #[test]
    fn test_overlap_must_be_smaller_than_chunk_size() {
        let mut config = Config::default();
        config.chunking.corpus_overlap = config.chunking.corpus_chunk_size;
        assert!(validate(&config).is_err());

        config = Config::default();
        config.chunking.summary_overlap = config.chunking.summary_chunk_size + 1;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_unknown_backend_rejected() {
        let mut config = Config::default();
        config.cache.backend = "redis".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_partial_toml_overrides() {
        let config: Config = toml::from_str(
            r#"
            [chunking]
            corpus_chunk_size = 4
            corpus_overlap = 0

            [chat]
            history_capacity = 2
            "#,
        )
        .unwrap();
        assert_eq!(config.chunking.corpus_chunk_size, 4);
        assert_eq!(config.chat.history_capacity, 2);
        assert_eq!(config.chat.retrieval_top_k, 3);
    }
}
