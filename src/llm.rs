//! Chat message types and the LLM completion gateway.
//!
//! [`Message`] is the unit of conversation everywhere in the pipeline: the
//! rolling session history, the outbound prompt, and the gateway wire format
//! are all sequences of messages.
//!
//! [`LlmGateway`] is the boundary to the remote completion service. The
//! default implementation speaks the OpenRouter chat-completions API. A
//! non-success response is surfaced as [`ChatError::Upstream`] with no
//! internal retry — the caller decides whether to try again.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::LlmConfig;
use crate::error::ChatError;

// ============ Messages ============

/// Who authored a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    System,
    Assistant,
}

/// A single conversation message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

// ============ Gateway ============

/// Boundary to the remote LLM completion service.
#[async_trait]
pub trait LlmGateway: Send + Sync {
    /// Send a prompt and return the replies, one message per choice.
    async fn complete(&self, messages: &[Message]) -> Result<Vec<Message>, ChatError>;
}

/// OpenRouter chat-completions client.
pub struct OpenRouterGateway {
    base_url: String,
    model: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenRouterGateway {
    /// Build a gateway from configuration. The API key is read from the
    /// environment variable named by `api_key_env`.
    pub fn new(config: &LlmConfig) -> Result<Self, ChatError> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            ChatError::Config(format!(
                "environment variable {} not set",
                config.api_key_env
            ))
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ChatError::Upstream(e.to_string()))?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
            client,
        })
    }
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: Message,
}

#[async_trait]
impl LlmGateway for OpenRouterGateway {
    async fn complete(&self, messages: &[Message]) -> Result<Vec<Message>, ChatError> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": messages,
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| ChatError::Upstream(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(ChatError::Upstream(format!(
                "completion API error {}: {}",
                status, body_text
            )));
        }

        let parsed: CompletionResponse = response
            .json()
            .await
            .map_err(|e| ChatError::Upstream(format!("invalid completion response: {}", e)))?;

        if parsed.choices.is_empty() {
            return Err(ChatError::Upstream(
                "completion response contained no choices".to_string(),
            ));
        }

        Ok(parsed.choices.into_iter().map(|c| c.message).collect())
    }
}
