//! Language-model backend ("oracle")
//!
//! The rest of the assistant only sees the [`Oracle`] trait. A missing
//! endpoint is represented by [`UnavailableOracle`] rather than an absent
//! client, so every caller goes through the same failure path.

mod json;
mod ollama;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

pub use json::extract_json_object;
pub use ollama::OllamaClient;

/// Stream of text deltas from a streamed completion
pub type TextStream = BoxStream<'static, Result<String>>;

/// Role of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A role-tagged utterance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Sampling options forwarded to the backend
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SamplingOptions {
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_predict: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_ctx: Option<u32>,
}

impl SamplingOptions {
    /// Near-deterministic settings for JSON classification
    pub const CLASSIFY: Self = Self {
        temperature: 0.1,
        num_predict: Some(512),
        num_ctx: Some(4096),
    };

    /// Settings for task confirmations
    pub const TASK_RESPONSE: Self = Self {
        temperature: 0.5,
        num_predict: Some(512),
        num_ctx: Some(4096),
    };

    /// Settings for open conversation
    pub const CHAT: Self = Self {
        temperature: 0.7,
        num_predict: None,
        num_ctx: None,
    };
}

/// A remote text-completion service that may fail or return malformed text
#[async_trait]
pub trait Oracle: Send + Sync {
    /// Single-shot completion of a bare prompt
    async fn generate(&self, prompt: &str, options: SamplingOptions) -> Result<String>;

    /// Single-shot completion of a conversation
    async fn chat(&self, messages: &[ChatMessage], options: SamplingOptions) -> Result<String>;

    /// Streamed completion of a conversation
    ///
    /// The default implementation yields the single-shot reply as one delta.
    async fn chat_stream(
        &self,
        messages: &[ChatMessage],
        options: SamplingOptions,
    ) -> Result<TextStream> {
        let text = self.chat(messages, options).await?;
        Ok(Box::pin(futures::stream::once(async move { Ok(text) })))
    }

    /// Model identifier, for logging
    fn model(&self) -> &str;
}

/// Oracle used when no endpoint is configured; every call fails
#[derive(Debug, Clone)]
pub struct UnavailableOracle {
    reason: String,
}

impl UnavailableOracle {
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl Oracle for UnavailableOracle {
    async fn generate(&self, _prompt: &str, _options: SamplingOptions) -> Result<String> {
        Err(Error::OracleUnavailable(self.reason.clone()))
    }

    async fn chat(&self, _messages: &[ChatMessage], _options: SamplingOptions) -> Result<String> {
        Err(Error::OracleUnavailable(self.reason.clone()))
    }

    async fn chat_stream(
        &self,
        _messages: &[ChatMessage],
        _options: SamplingOptions,
    ) -> Result<TextStream> {
        Err(Error::OracleUnavailable(self.reason.clone()))
    }

    fn model(&self) -> &str {
        "unavailable"
    }
}

/// Shorten oracle output for log lines
#[must_use]
pub fn truncate_for_log(text: &str) -> &str {
    const MAX: usize = 200;
    if text.len() <= MAX {
        return text;
    }
    let mut end = MAX;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}
