//! # docchat
//!
//! A conversational retrieval-augmented question answering service for
//! uploaded documents.
//!
//! Upload a PDF, get back a summary, then ask questions about it. Answers
//! are grounded in the document: each question retrieves the most relevant
//! passages from an embedded chunk corpus and sends them, together with the
//! document summary and the rolling conversation history, to a remote LLM.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌───────────────┐   ┌─────────────────┐
//! │ PDF text │──▶│ ChunkSplitter  │──▶│ CorpusBuilder    │──▶ corpus
//! └──────────┘   └───────────────┘   │ (cached by hash) │   (chunks +
//!       │                            └─────────────────┘    vectors)
//!       ▼                                                      │
//! ┌───────────────┐        question ──▶ ┌────────────┐         │
//! │ Summarization │                     │ Retrieval  │◀────────┘
//! │ (map-reduce,  │                     │ (top-k)    │
//! │  cached)      │                     └─────┬──────┘
//! └──────┬────────┘                           ▼
//!        │              ┌──────────────────────────────┐
//!        └─────────────▶│ ConversationSession           │──▶ LLM gateway
//!                       │ summary + history + passages  │
//!                       └──────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`error`] | Typed error taxonomy |
//! | [`chunk`] | Fixed-size overlapping text chunking |
//! | [`cache`] | Content-addressed get-or-compute cache |
//! | [`extract`] | PDF text extraction |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`llm`] | Message types and LLM completion gateway |
//! | [`corpus`] | Documents and the embedded chunk corpus |
//! | [`retrieval`] | Cosine top-k retrieval |
//! | [`summarize`] | Hierarchical document summarization |
//! | [`session`] | Conversation sessions and prompt assembly |
//! | [`registry`] | Process-wide session registry |
//! | [`server`] | HTTP API |

pub mod cache;
pub mod chunk;
pub mod config;
pub mod corpus;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod llm;
pub mod registry;
pub mod retrieval;
pub mod server;
pub mod session;
pub mod summarize;

use std::sync::Arc;

use cache::{Cache, CacheBackend, FsBackend, MemoryBackend};
use config::Config;
use corpus::CorpusBuilder;
use error::ChatError;
use session::ChatEngine;
use summarize::SummarizationPipeline;

/// Build the cache configured by `[cache]`.
pub fn build_cache(config: &Config) -> Cache {
    let backend: Arc<dyn CacheBackend> = match config.cache.backend.as_str() {
        "filesystem" => Arc::new(FsBackend::new(&config.cache.dir)),
        _ => Arc::new(MemoryBackend::new()),
    };
    Cache::new(backend)
}

/// Wire up the full engine from configuration: cache, embedding provider,
/// LLM gateway, summarizer, and corpus builder.
pub fn build_engine(config: &Config) -> Result<ChatEngine, ChatError> {
    let cache = build_cache(config);
    let embedder = embedding::create_provider(&config.embedding)?;
    let llm: Arc<dyn llm::LlmGateway> = Arc::new(llm::OpenRouterGateway::new(&config.llm)?);

    let summarizer = SummarizationPipeline::new(config, cache.clone(), llm.clone());
    let corpus_builder = CorpusBuilder::new(config, cache, embedder.clone());

    Ok(ChatEngine::new(
        config,
        summarizer,
        corpus_builder,
        embedder,
        llm,
    ))
}
