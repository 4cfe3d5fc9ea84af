//! Error types for the chat pipeline.

/// Errors surfaced by the document chat core.
///
/// Cache misses and corrupt cache records are deliberately *not* represented
/// here: the cache absorbs them and recomputes (the pipeline stays correct,
/// only slower).
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    /// Invalid configuration value, caught before use (e.g. a chunk overlap
    /// that is not smaller than the chunk size).
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The operation requires a bound document, but none is attached.
    #[error("no document bound to this session")]
    NotBound,

    /// A document is already attached; sessions bind exactly once.
    #[error("session already has a bound document")]
    AlreadyBound,

    /// Unknown session id.
    #[error("session not found: {0}")]
    SessionNotFound(String),

    /// Text extraction from the uploaded document failed.
    #[error("text extraction failed: {0}")]
    Extract(String),

    /// The embedding or LLM provider returned a failure. Fatal for the
    /// triggering call; the caller may retry.
    #[error("upstream provider error: {0}")]
    Upstream(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        assert_eq!(
            ChatError::NotBound.to_string(),
            "no document bound to this session"
        );
        assert_eq!(
            ChatError::AlreadyBound.to_string(),
            "session already has a bound document"
        );
        assert_eq!(
            ChatError::SessionNotFound("abc".into()).to_string(),
            "session not found: abc"
        );
        assert_eq!(
            ChatError::Config("overlap too large".into()).to_string(),
            "invalid configuration: overlap too large"
        );
        assert_eq!(
            ChatError::Upstream("503".into()).to_string(),
            "upstream provider error: 503"
        );
    }
}
