//! Search-or-chat routing

use serde::Deserialize;

use super::{ClassificationError, field_text, parse_json_reply};
use crate::oracle::ChatMessage;

const ROUTER_PROMPT: &str = r#"You are a command router. Analyze the user's current question together with the conversation history and decide:
1. Whether the request needs a real-time web search or can be answered from general knowledge and conversation.
2. If the action is SEARCH, the best context-aware search query. Resolve pronouns and references using the history.

JSON Output Format (a single JSON object):
{
  "action": "SEARCH" or "CHAT",
  "search_query": "The exact, context-aware search query for SEARCH (e.g. 'album recommendations for Cara Tivey'), or the user's original question for CHAT."
}

Rules:
1. Choose "SEARCH" for current events, specific facts, or anything needing up-to-date external information.
2. Choose "CHAT" for conversation, roleplay, general knowledge, or simple questions that need no external facts.
3. The entire output must be the JSON object above."#;

/// Where a non-task utterance should go
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    Search { query: String },
    Chat,
}

#[derive(Debug, Deserialize)]
struct RouteReply {
    action: Option<serde_json::Value>,
    search_query: Option<serde_json::Value>,
}

/// Router conversation: instructions, prior exchanges, then the question
#[must_use]
pub fn router_messages(utterance: &str, history: &[ChatMessage]) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(ChatMessage::system(ROUTER_PROMPT));
    messages.extend_from_slice(history);
    messages.push(ChatMessage::user(format!(
        "User's current question: '{utterance}'"
    )));
    messages
}

/// Parse router output; a search without a query searches the utterance
///
/// # Errors
///
/// Returns error if the output holds no parseable JSON object or an
/// unknown action
pub fn parse_route(text: &str, utterance: &str) -> Result<RouteDecision, ClassificationError> {
    let reply: RouteReply = parse_json_reply(text)?;

    let action = field_text(reply.action.as_ref())
        .map(|a| a.to_uppercase())
        .unwrap_or_default();

    match action.as_str() {
        "" | "CHAT" => Ok(RouteDecision::Chat),
        "SEARCH" => {
            let query = field_text(reply.search_query.as_ref())
                .unwrap_or_else(|| utterance.trim().to_string());
            Ok(RouteDecision::Search { query })
        }
        other => Err(ClassificationError::Unrecognised(other.to_string())),
    }
}
