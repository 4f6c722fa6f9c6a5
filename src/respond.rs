//! Natural-language replies
//!
//! Every path ends in something sayable: oracle failures fall back to fixed
//! apologies, and a few task outcomes are answered from templates without
//! asking the oracle at all.

use std::sync::Arc;

use chrono::NaiveDate;
use futures::StreamExt;
use serde::Deserialize;

use crate::nlu::{TaskIntentKind, parse_json_reply};
use crate::oracle::{ChatMessage, Oracle, SamplingOptions, truncate_for_log};
use crate::prompt::{persona_prompt, task_response_prompt};
use crate::tasks::{TaskOutcome, TaskPayload};
use crate::voice::Speaker;

/// Spoken when the oracle cannot be reached for a task reply
pub const CONNECTION_FALLBACK: &str =
    "I'm having trouble connecting to my response generator right now.";

/// Spoken when the task went through but the oracle reply was unusable
pub const PROCESSED_FALLBACK: &str =
    "I successfully processed that, but I had a little trouble generating a perfect response.";

/// Spoken when a chat or search answer could not be generated
pub const ANSWER_FALLBACK: &str =
    "I'm sorry, I failed to generate a complete answer for that question.";

/// Minimum words before a sentence ending flushes
const MIN_SENTENCE_WORDS: usize = 2;

/// Buffer length that forces a flush at the last sentence break
const MAX_BUFFER_CHARS: usize = 100;

/// A sentence break this close to the end is left for the next delta
const BREAK_TAIL_CHARS: usize = 10;

/// Spoken confirmation of a task plus the report shown on screen
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskReply {
    pub speech: String,
    pub report: Option<String>,
}

/// A chat or search answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    /// Already spoken sentence by sentence while streaming
    pub spoken: bool,
}

#[derive(Debug, Deserialize)]
struct TaskResponseReply {
    structured_text: Option<String>,
    conversational_speech: Option<String>,
}

/// Turns task outcomes and conversations into replies
#[derive(Clone)]
pub struct ResponseGenerator {
    oracle: Arc<dyn Oracle>,
    assistant_name: String,
    stream_speech: bool,
}

impl ResponseGenerator {
    #[must_use]
    pub fn new(oracle: Arc<dyn Oracle>, assistant_name: impl Into<String>) -> Self {
        Self {
            oracle,
            assistant_name: assistant_name.into(),
            stream_speech: false,
        }
    }

    /// Speak chat answers sentence by sentence as they stream in
    #[must_use]
    pub const fn with_stream_speech(mut self, enabled: bool) -> Self {
        self.stream_speech = enabled;
        self
    }

    #[must_use]
    pub fn assistant_name(&self) -> &str {
        &self.assistant_name
    }

    /// Reply for a finished task operation
    pub async fn task_response(&self, outcome: &TaskOutcome, today: NaiveDate) -> TaskReply {
        if let Some(reply) = template_reply(outcome) {
            tracing::debug!(intent = %outcome.intent, "task reply from template");
            return reply;
        }

        let payload = outcome.payload.to_json().to_string();
        let prompt = task_response_prompt(
            &self.assistant_name,
            outcome.intent,
            &outcome.user,
            &payload,
            today,
        );

        let text = match self
            .oracle
            .generate(&prompt, SamplingOptions::TASK_RESPONSE)
            .await
        {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(error = %e, intent = %outcome.intent, "task reply generation failed");
                let speech = if e.is_connection() {
                    CONNECTION_FALLBACK
                } else {
                    PROCESSED_FALLBACK
                };
                return TaskReply {
                    speech: speech.to_string(),
                    report: None,
                };
            }
        };

        match parse_json_reply::<TaskResponseReply>(&text) {
            Ok(reply) => {
                let speech = reply
                    .conversational_speech
                    .map(|s| sanitize_speech(&s))
                    .filter(|s| !s.is_empty());

                let Some(speech) = speech else {
                    tracing::warn!(raw = truncate_for_log(&text), "task reply missing speech");
                    return TaskReply {
                        speech: PROCESSED_FALLBACK.to_string(),
                        report: reply.structured_text,
                    };
                };

                TaskReply {
                    speech,
                    report: reply.structured_text.filter(|r| !r.trim().is_empty()),
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, raw = truncate_for_log(&text), "unparseable task reply");
                TaskReply {
                    speech: PROCESSED_FALLBACK.to_string(),
                    report: None,
                }
            }
        }
    }

    /// Conversation sent for a chat or search turn
    #[must_use]
    pub fn chat_messages(
        &self,
        user: Option<&str>,
        history: &[ChatMessage],
        prompt: &str,
    ) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatMessage::system(persona_prompt(&self.assistant_name, user)));
        messages.extend_from_slice(history);
        messages.push(ChatMessage::user(prompt));
        messages
    }

    /// Generate an answer; `None` when nothing usable came back
    ///
    /// With streaming speech enabled, sentences are spoken through `speaker`
    /// as they arrive and the reply is marked as spoken.
    pub async fn converse(&self, messages: &[ChatMessage], speaker: &dyn Speaker) -> Option<Reply> {
        if self.stream_speech {
            return self.converse_streaming(messages, speaker).await;
        }

        match self.oracle.chat(messages, SamplingOptions::CHAT).await {
            Ok(text) if !text.trim().is_empty() => Some(Reply {
                text: text.trim().to_string(),
                spoken: false,
            }),
            Ok(_) => {
                tracing::warn!("oracle returned an empty answer");
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, "chat generation failed");
                None
            }
        }
    }

    async fn converse_streaming(
        &self,
        messages: &[ChatMessage],
        speaker: &dyn Speaker,
    ) -> Option<Reply> {
        let mut stream = match self.oracle.chat_stream(messages, SamplingOptions::CHAT).await {
            Ok(stream) => stream,
            Err(e) => {
                tracing::warn!(error = %e, "chat stream failed to start");
                return None;
            }
        };

        let mut full = String::new();
        let mut sentences = SentenceBuffer::default();

        while let Some(delta) = stream.next().await {
            match delta {
                Ok(delta) => {
                    full.push_str(&delta);
                    for sentence in sentences.push(&delta) {
                        say(speaker, &sentence).await;
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, received = full.len(), "chat stream interrupted");
                    break;
                }
            }
        }

        if let Some(rest) = sentences.finish() {
            say(speaker, &rest).await;
        }

        let text = full.trim().to_string();
        if text.is_empty() {
            return None;
        }

        Some(Reply { text, spoken: true })
    }
}

pub(crate) async fn say(speaker: &dyn Speaker, text: &str) {
    let text = sanitize_speech(text);
    if text.is_empty() {
        return;
    }
    if let Err(e) = speaker.speak(&text).await {
        tracing::warn!(error = %e, "failed to speak streamed sentence");
    }
}

/// Replies that need no oracle: an empty list and a keyword with no match
fn template_reply(outcome: &TaskOutcome) -> Option<TaskReply> {
    let user = &outcome.user;

    match &outcome.payload {
        TaskPayload::Listed { reminders } if reminders.is_empty() => Some(TaskReply {
            speech: format!(
                "You're all caught up, {user}! There's nothing on your list right now."
            ),
            report: Some("ACTION: LISTED TASKS\nNo pending tasks".to_string()),
        }),
        TaskPayload::NotFound { intent, keyword } => {
            let (speech, report) = match intent {
                TaskIntentKind::RescheduleTask => (
                    format!(
                        "Hmm, I couldn't find a task matching {keyword}, so I didn't move anything."
                    ),
                    format!("ACTION: FAILED TO RESCHEDULE TASK\nKeywords: {keyword}"),
                ),
                _ => (
                    format!(
                        "Hmm, I couldn't find a task matching {keyword}, so nothing was marked done."
                    ),
                    format!("ACTION: FAILED TO COMPLETE TASK\nKeywords: {keyword}"),
                ),
            };
            Some(TaskReply {
                speech,
                report: Some(report),
            })
        }
        _ => None,
    }
}

/// Strip markup and quotation marks that a speech engine would read aloud
///
/// Apostrophes inside words survive so contractions stay intact.
#[must_use]
pub fn sanitize_speech(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());

    for (i, &c) in chars.iter().enumerate() {
        match c {
            '*' | '#' | '`' | '"' | '\u{201C}' | '\u{201D}' | '_' | '~' => {}
            '\'' | '\u{2019}' | '\u{2018}' => {
                let inside_word = i > 0
                    && chars[i - 1].is_alphanumeric()
                    && chars.get(i + 1).is_some_and(|n| n.is_alphanumeric());
                if inside_word {
                    out.push('\'');
                }
            }
            c => out.push(c),
        }
    }

    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Groups streamed deltas into speakable sentences
#[derive(Debug, Default)]
pub struct SentenceBuffer {
    buffer: String,
}

impl SentenceBuffer {
    /// Append a delta, returning any sentences ready to speak
    pub fn push(&mut self, delta: &str) -> Vec<String> {
        self.buffer.push_str(delta);
        let mut ready = Vec::new();

        let ends_sentence = delta.trim_end().ends_with(['.', '!', '?']);
        if ends_sentence && self.buffer.split_whitespace().count() > MIN_SENTENCE_WORDS {
            if let Some(sentence) = self.take_all() {
                ready.push(sentence);
            }
            return ready;
        }

        if self.buffer.len() <= MAX_BUFFER_CHARS {
            return ready;
        }

        let len = self.buffer.len();
        let Some(idx) = self
            .buffer
            .rfind(['.', '!', '?'])
            .filter(|idx| idx + BREAK_TAIL_CHARS < len)
        else {
            return ready;
        };

        let rest = self.buffer.split_off(idx + 1);
        let sentence = std::mem::replace(&mut self.buffer, rest);
        let sentence = sentence.trim();
        if !sentence.is_empty() {
            ready.push(sentence.to_string());
        }

        ready
    }

    /// Whatever is left once the stream ends
    pub fn finish(&mut self) -> Option<String> {
        self.take_all()
    }

    fn take_all(&mut self) -> Option<String> {
        let text = std::mem::take(&mut self.buffer);
        let text = text.trim();
        (!text.is_empty()).then(|| text.to_string())
    }
}
