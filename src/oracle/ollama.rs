//! Ollama HTTP client
//!
//! Uses `/api/generate` for bare prompts and `/api/chat` for conversations.
//! Streamed chat replies arrive as newline-delimited JSON objects.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use super::{ChatMessage, Oracle, SamplingOptions, TextStream, truncate_for_log};
use crate::{Error, Result};

/// Upper bound for a whole streamed reply
const STREAM_TIMEOUT: Duration = Duration::from_secs(60);

/// Oracle backed by an Ollama server
#[derive(Debug, Clone)]
pub struct OllamaClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    timeout: Duration,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: SamplingOptions,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    options: SamplingOptions,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: Option<ResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: String,
}

/// One line of a streamed chat reply
#[derive(Debug, Deserialize)]
struct ChatChunk {
    message: Option<ResponseMessage>,
    #[serde(default)]
    done: bool,
    error: Option<String>,
}

impl OllamaClient {
    /// Create a client for the server at `base_url`
    ///
    /// # Errors
    ///
    /// Returns error if the URL is empty or the HTTP client cannot be built
    pub fn new(base_url: &str, model: impl Into<String>, timeout: Duration) -> Result<Self> {
        let base_url = base_url.trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(Error::Config("oracle URL is empty".to_string()));
        }

        let client = reqwest::Client::builder().connect_timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url,
            model: model.into(),
            timeout,
        })
    }

    /// Base URL of the server
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post_chat(
        &self,
        messages: &[ChatMessage],
        options: SamplingOptions,
        stream: bool,
    ) -> Result<reqwest::Response> {
        let request = ChatRequest {
            model: &self.model,
            messages,
            stream,
            options,
        };

        let timeout = if stream { STREAM_TIMEOUT } else { self.timeout };

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .timeout(timeout)
            .json(&request)
            .send()
            .await?;

        Ok(response.error_for_status()?)
    }
}

#[async_trait]
impl Oracle for OllamaClient {
    async fn generate(&self, prompt: &str, options: SamplingOptions) -> Result<String> {
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options,
        };

        tracing::debug!(model = %self.model, prompt_len = prompt.len(), "ollama generate");

        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .timeout(self.timeout)
            .json(&request)
            .send()
            .await?
            .error_for_status()?;

        let body: GenerateResponse = response.json().await?;
        let text = body.response.trim().to_string();

        tracing::trace!(reply = truncate_for_log(&text), "ollama generate reply");
        Ok(text)
    }

    async fn chat(&self, messages: &[ChatMessage], options: SamplingOptions) -> Result<String> {
        tracing::debug!(model = %self.model, messages = messages.len(), "ollama chat");

        let response = self.post_chat(messages, options, false).await?;
        let body: ChatResponse = response.json().await?;

        let text = body
            .message
            .map(|m| m.content.trim().to_string())
            .unwrap_or_default();

        tracing::trace!(reply = truncate_for_log(&text), "ollama chat reply");
        Ok(text)
    }

    async fn chat_stream(
        &self,
        messages: &[ChatMessage],
        options: SamplingOptions,
    ) -> Result<TextStream> {
        tracing::debug!(model = %self.model, messages = messages.len(), "ollama chat (streaming)");

        let response = self.post_chat(messages, options, true).await?;
        let bytes = response
            .bytes_stream()
            .map(|chunk| chunk.map(|b| b.to_vec()))
            .boxed();

        Ok(ndjson_deltas(bytes))
    }

    fn model(&self) -> &str {
        &self.model
    }
}

struct NdjsonState {
    bytes: BoxStream<'static, reqwest::Result<Vec<u8>>>,
    buffer: Vec<u8>,
    done: bool,
}

/// Turn a newline-delimited JSON byte stream into content deltas
fn ndjson_deltas(bytes: BoxStream<'static, reqwest::Result<Vec<u8>>>) -> TextStream {
    let state = NdjsonState {
        bytes,
        buffer: Vec::new(),
        done: false,
    };

    futures::stream::unfold(state, |mut st| async move {
        loop {
            if st.done {
                return None;
            }

            if let Some(pos) = st.buffer.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = st.buffer.drain(..=pos).collect();
                if let Some(item) = parse_line(&line, &mut st.done) {
                    return Some((item, st));
                }
                continue;
            }

            match st.bytes.next().await {
                Some(Ok(chunk)) => st.buffer.extend_from_slice(&chunk),
                Some(Err(e)) => {
                    st.done = true;
                    return Some((Err(Error::Http(e)), st));
                }
                None => {
                    let rest = std::mem::take(&mut st.buffer);
                    st.done = true;
                    let mut ignored = false;
                    return parse_line(&rest, &mut ignored).map(|item| (item, st));
                }
            }
        }
    })
    .boxed()
}

/// Parse one NDJSON line; `None` means nothing to emit
fn parse_line(line: &[u8], done: &mut bool) -> Option<Result<String>> {
    let line = String::from_utf8_lossy(line);
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let chunk: ChatChunk = match serde_json::from_str(line) {
        Ok(chunk) => chunk,
        Err(e) => {
            tracing::warn!(error = %e, line = truncate_for_log(line), "skipping malformed stream chunk");
            return None;
        }
    };

    if chunk.done {
        *done = true;
    }

    if let Some(error) = chunk.error {
        *done = true;
        return Some(Err(Error::Oracle(error)));
    }

    let content = chunk.message.map(|m| m.content).unwrap_or_default();
    if content.is_empty() {
        return None;
    }

    Some(Ok(content))
}
