//! Conversation sessions: one bound document, a bounded rolling history,
//! and the per-question orchestration of retrieval and prompt assembly.
//!
//! A session moves through three states, monotonically:
//!
//! ```text
//! Created ──bind──▶ Bound ──ensure_corpus──▶ CorpusReady
//! ```
//!
//! `bind` summarizes the document; `ask` lazily builds the corpus, retrieves
//! the most relevant passages for the question, and sends a prompt of
//! `[summary system message, rolling history, passages system message]` to
//! the LLM gateway. Session state (history, corpus) is only committed after
//! awaits complete, so a canceled call leaves the session untouched.

use std::collections::VecDeque;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::config::Config;
use crate::corpus::{CorpusBuilder, CorpusEntry, Document};
use crate::embedding::EmbeddingProvider;
use crate::error::ChatError;
use crate::llm::{LlmGateway, Message};
use crate::retrieval;
use crate::summarize::SummarizationPipeline;

// ============ Engine ============

/// Shared collaborators for all sessions: summarizer, corpus builder, and
/// the provider/gateway handles. Built once at startup, cheap to share.
pub struct ChatEngine {
    pub summarizer: SummarizationPipeline,
    pub corpus_builder: CorpusBuilder,
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub llm: Arc<dyn LlmGateway>,
    history_capacity: usize,
    retrieval_top_k: usize,
}

impl ChatEngine {
    pub fn new(
        config: &Config,
        summarizer: SummarizationPipeline,
        corpus_builder: CorpusBuilder,
        embedder: Arc<dyn EmbeddingProvider>,
        llm: Arc<dyn LlmGateway>,
    ) -> Self {
        Self {
            summarizer,
            corpus_builder,
            embedder,
            llm,
            history_capacity: config.chat.history_capacity,
            retrieval_top_k: config.chat.retrieval_top_k,
        }
    }

    /// Create a fresh, unbound session.
    pub fn new_session(&self) -> ConversationSession {
        ConversationSession::new(self.history_capacity)
    }
}

// ============ History ============

/// Ordered message history bounded at a fixed capacity. Pushing onto a full
/// history drops the oldest message first.
#[derive(Debug, Clone)]
pub struct ConversationHistory {
    capacity: usize,
    messages: VecDeque<Message>,
}

impl ConversationHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            messages: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, message: Message) {
        if self.messages.len() == self.capacity {
            self.messages.pop_front();
        }
        self.messages.push_back(message);
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter()
    }
}

// ============ Session ============

/// Lifecycle state of a session, derived from what has been attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Created,
    Bound,
    CorpusReady,
}

/// One conversation: an id, at most one bound document, the corpus derived
/// from it, and the rolling history.
pub struct ConversationSession {
    pub id: String,
    document: Option<Document>,
    corpus: Option<Vec<CorpusEntry>>,
    history: ConversationHistory,
}

impl ConversationSession {
    pub fn new(history_capacity: usize) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            document: None,
            corpus: None,
            history: ConversationHistory::new(history_capacity),
        }
    }

    pub fn state(&self) -> SessionState {
        match (&self.document, &self.corpus) {
            (None, _) => SessionState::Created,
            (Some(_), None) => SessionState::Bound,
            (Some(_), Some(_)) => SessionState::CorpusReady,
        }
    }

    /// The bound document, if any.
    pub fn document(&self) -> Option<&Document> {
        self.document.as_ref()
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    /// Attach a document and populate its summary.
    ///
    /// # Errors
    ///
    /// [`ChatError::AlreadyBound`] if a document is already attached;
    /// summarization failures propagate and leave the session unbound.
    pub async fn bind(&mut self, engine: &ChatEngine, mut document: Document) -> Result<(), ChatError> {
        if self.document.is_some() {
            return Err(ChatError::AlreadyBound);
        }

        let summary = engine.summarizer.summarize(&document.text).await?;
        document.summary = Some(summary);
        info!(session = %self.id, filename = %document.filename, "document bound");
        self.document = Some(document);
        Ok(())
    }

    /// Build the corpus if it is not built yet. Idempotent once ready.
    ///
    /// # Errors
    ///
    /// [`ChatError::NotBound`] before `bind`; embedding failures propagate
    /// and leave the session without a corpus.
    pub async fn ensure_corpus(&mut self, engine: &ChatEngine) -> Result<(), ChatError> {
        if self.corpus.is_some() {
            return Ok(());
        }
        let document = self.document.as_ref().ok_or(ChatError::NotBound)?;
        let corpus = engine.corpus_builder.build(document).await?;
        info!(session = %self.id, entries = corpus.len(), "corpus ready");
        self.corpus = Some(corpus);
        Ok(())
    }

    /// Answer a question about the bound document.
    ///
    /// Pushes the question onto the history (FIFO cap applied), retrieves
    /// the most relevant passages, sends the assembled prompt, appends the
    /// replies to the history, and returns them.
    ///
    /// # Errors
    ///
    /// [`ChatError::NotBound`] before `bind`; provider failures propagate
    /// with the history unchanged.
    pub async fn ask(
        &mut self,
        engine: &ChatEngine,
        question: &str,
    ) -> Result<Vec<Message>, ChatError> {
        self.ensure_corpus(engine).await?;
        let (document, corpus) = match (&self.document, &self.corpus) {
            (Some(d), Some(c)) => (d, c),
            _ => return Err(ChatError::NotBound),
        };

        let passages = retrieval::top_k(
            engine.embedder.as_ref(),
            question,
            corpus,
            engine.retrieval_top_k,
        )
        .await?;

        // Work on a copy of the history so a failed or canceled gateway
        // call leaves the session exactly as it was.
        let mut next_history = self.history.clone();
        next_history.push(Message::user(question));

        let summary = document.summary.as_deref().unwrap_or_default();
        let mut prompt = Vec::with_capacity(next_history.len() + 2);
        prompt.push(Message::system(format!(
            "You are a chatbot to answer questions about a PDF file.\n\
             If the user ask you a question in Chinese, please reply in Chinese.\n\
             The summary of the PDF content is:\n{}",
            summary
        )));
        prompt.extend(next_history.iter().cloned());
        prompt.push(Message::system(format!(
            "Some relevant parts about this user question are listed below \
             (each enclosed in triple quotes):\n{}\n\
             Please give user a concise answer based on information in this context. \
             If you can't find any exact information, don't make up an answer.",
            passages
                .iter()
                .map(|e| format!("\"\"\"{}\"\"\"", e.text))
                .collect::<Vec<_>>()
                .join("\n")
        )));

        let replies = engine.llm.complete(&prompt).await?;

        for reply in &replies {
            next_history.push(reply.clone());
        }
        self.history = next_history;

        Ok(replies)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Role;

    #[test]
    fn test_history_cap_keeps_last_n_in_push_order() {
        let capacity = 4;
        let mut history = ConversationHistory::new(capacity);
        for i in 0..capacity + 3 {
            history.push(Message::user(format!("m{}", i)));
        }
        assert_eq!(history.len(), capacity);
        let contents: Vec<&str> = history.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["m3", "m4", "m5", "m6"]);
    }

    #[test]
    fn test_history_under_capacity_keeps_everything() {
        let mut history = ConversationHistory::new(6);
        history.push(Message::user("one"));
        history.push(Message::assistant("two"));
        assert_eq!(history.len(), 2);
        assert_eq!(history.iter().next().unwrap().role, Role::User);
    }

    #[test]
    fn test_new_session_state_is_created() {
        let session = ConversationSession::new(6);
        assert_eq!(session.state(), SessionState::Created);
        assert!(session.document().is_none());
        assert!(session.history().is_empty());
    }

    #[test]
    fn test_session_ids_are_unique() {
        let a = ConversationSession::new(6);
        let b = ConversationSession::new(6);
        assert_ne!(a.id, b.id);
    }
}
