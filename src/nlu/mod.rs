//! Oracle-backed intent classification
//!
//! Three independent classifiers share one oracle: identity (who is
//! speaking), task (reminder CRUD intent) and router (search or chat).
//! Each has a fallible `try_*` form returning [`ClassificationError`] and an
//! infallible [`Classify`] form that maps every failure to its default.

mod identity;
mod router;
mod task;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::de::DeserializeOwned;

use crate::oracle::{ChatMessage, Oracle, SamplingOptions, extract_json_object, truncate_for_log};

pub use identity::{identity_prompt, parse_identity};
pub use router::{RouteDecision, parse_route, router_messages};
pub use task::{TaskAction, TaskCommand, TaskIntentKind, parse_task, task_prompt};

/// Why a classifier could not produce a result
#[derive(Debug, thiserror::Error)]
pub enum ClassificationError {
    #[error("oracle call failed: {0}")]
    Oracle(#[from] crate::Error),

    #[error("no JSON object in oracle output")]
    MissingJson,

    #[error("malformed JSON: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("unrecognised value: {0}")]
    Unrecognised(String),
}

/// What the turn cascade decided to do with an utterance
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassifierResult {
    /// Exit phrase; reply already chosen
    Exit(String),
    /// Answered locally without the oracle
    LocalHandled(String),
    /// Speaker identified themselves
    Identified(String),
    Task(TaskCommand),
    Search(String),
    Chat,
}

/// Inputs the task classifier needs besides the utterance
#[derive(Debug, Clone, Copy)]
pub struct TaskContext<'a> {
    pub known_users: &'a [String],
    /// Current speaker, or the default user when nobody is identified
    pub active_user: &'a str,
    pub today: NaiveDate,
}

/// Intent classification with documented fail-safe defaults
#[async_trait]
pub trait Classify: Send + Sync {
    /// Match the utterance to one of `known_users`; `None` on any failure
    async fn identify_user(&self, utterance: &str, known_users: &[String]) -> Option<String>;

    /// Classify a task command; `None` means no task intent (or failure)
    async fn classify_task(&self, utterance: &str, ctx: &TaskContext<'_>) -> Option<TaskCommand>;

    /// Choose between search and chat; chat on any failure
    async fn route(&self, utterance: &str, history: &[ChatMessage]) -> RouteDecision;
}

/// [`Classify`] implementation backed by an [`Oracle`]
#[derive(Clone)]
pub struct OracleClassifier {
    oracle: Arc<dyn Oracle>,
}

impl OracleClassifier {
    #[must_use]
    pub fn new(oracle: Arc<dyn Oracle>) -> Self {
        Self { oracle }
    }

    /// Identity classification without the default applied
    ///
    /// # Errors
    ///
    /// Returns error if the oracle fails or its output cannot be parsed
    pub async fn try_identify_user(
        &self,
        utterance: &str,
        known_users: &[String],
    ) -> Result<Option<String>, ClassificationError> {
        let prompt = identity_prompt(utterance, known_users);
        let text = self.oracle.generate(&prompt, SamplingOptions::CLASSIFY).await?;
        parse_identity(&text, known_users)
    }

    /// Task classification without the default applied
    ///
    /// # Errors
    ///
    /// Returns error if the oracle fails or its output cannot be parsed
    pub async fn try_classify_task(
        &self,
        utterance: &str,
        ctx: &TaskContext<'_>,
    ) -> Result<Option<TaskCommand>, ClassificationError> {
        let prompt = task_prompt(utterance, ctx);
        let text = self.oracle.generate(&prompt, SamplingOptions::CLASSIFY).await?;
        parse_task(&text, ctx)
    }

    /// Routing without the default applied
    ///
    /// # Errors
    ///
    /// Returns error if the oracle fails or its output cannot be parsed
    pub async fn try_route(
        &self,
        utterance: &str,
        history: &[ChatMessage],
    ) -> Result<RouteDecision, ClassificationError> {
        let messages = router_messages(utterance, history);
        let text = self.oracle.chat(&messages, SamplingOptions::CLASSIFY).await?;
        parse_route(&text, utterance)
    }
}

#[async_trait]
impl Classify for OracleClassifier {
    async fn identify_user(&self, utterance: &str, known_users: &[String]) -> Option<String> {
        match self.try_identify_user(utterance, known_users).await {
            Ok(name) => name,
            Err(e) => {
                tracing::warn!(error = %e, "identity classification failed; treating speaker as unknown");
                None
            }
        }
    }

    async fn classify_task(&self, utterance: &str, ctx: &TaskContext<'_>) -> Option<TaskCommand> {
        match self.try_classify_task(utterance, ctx).await {
            Ok(command) => command,
            Err(e) => {
                tracing::warn!(error = %e, "task classification failed; treating as no task");
                None
            }
        }
    }

    async fn route(&self, utterance: &str, history: &[ChatMessage]) -> RouteDecision {
        match self.try_route(utterance, history).await {
            Ok(decision) => decision,
            Err(e) => {
                tracing::warn!(error = %e, "routing failed; falling back to chat");
                RouteDecision::Chat
            }
        }
    }
}

/// Extract and deserialize the JSON object embedded in oracle output
pub(crate) fn parse_json_reply<T: DeserializeOwned>(text: &str) -> Result<T, ClassificationError> {
    let Some(json) = extract_json_object(text) else {
        tracing::debug!(raw = truncate_for_log(text), "oracle output has no JSON object");
        return Err(ClassificationError::MissingJson);
    };

    serde_json::from_str(&json).map_err(|e| {
        tracing::debug!(raw = truncate_for_log(text), "oracle output is not valid JSON");
        ClassificationError::Malformed(e)
    })
}

/// Normalise a loosely-typed JSON field to trimmed text
///
/// Strings pass through, string arrays are joined with spaces, and null,
/// empty, `"NULL"` and `"None"` become `None`.
pub(crate) fn field_text(value: Option<&serde_json::Value>) -> Option<String> {
    let text = match value? {
        serde_json::Value::String(s) => s.trim().to_string(),
        serde_json::Value::Array(items) => items
            .iter()
            .filter_map(serde_json::Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" "),
        serde_json::Value::Number(n) => n.to_string(),
        _ => return None,
    };

    if text.is_empty() || text.eq_ignore_ascii_case("null") || text.eq_ignore_ascii_case("none") {
        None
    } else {
        Some(text)
    }
}

/// Canonical spelling of `name` in `known_users`, compared case-insensitively
pub(crate) fn canonical_name(name: &str, known_users: &[String]) -> Option<String> {
    let name = name.trim();
    known_users
        .iter()
        .find(|known| known.eq_ignore_ascii_case(name))
        .cloned()
}
