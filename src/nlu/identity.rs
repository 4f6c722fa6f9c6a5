//! Speaker identification from a spoken reply to "who is speaking?"

use serde::Deserialize;

use super::{ClassificationError, canonical_name, field_text, parse_json_reply};

#[derive(Debug, Deserialize)]
struct IdentityReply {
    identified_user: Option<serde_json::Value>,
}

/// Prompt asking the oracle to pick a name out of `known_users`
#[must_use]
pub fn identity_prompt(utterance: &str, known_users: &[String]) -> String {
    format!(
        r#"You are a user identity service. Analyze the user response and output ONLY the JSON object below, with no commentary, introduction, or conversation.

Available USER NAMES: {names}

User Response: "{utterance}"

JSON Output Format (a single JSON object):
{{
  "identified_user": "Name from the Available USER NAMES list, or NULL if no listed name is present."
}}

Rules:
1. Your entire output must be the JSON object above.
2. Only return a name that appears in Available USER NAMES.
3. The name must be capitalized exactly as listed."#,
        names = known_users.join(", "),
    )
}

/// Parse identity output; names outside `known_users` are discarded
///
/// # Errors
///
/// Returns error if the output holds no parseable JSON object
pub fn parse_identity(
    text: &str,
    known_users: &[String],
) -> Result<Option<String>, ClassificationError> {
    let reply: IdentityReply = parse_json_reply(text)?;

    let Some(name) = field_text(reply.identified_user.as_ref()) else {
        return Ok(None);
    };

    let matched = canonical_name(&name, known_users);
    if matched.is_none() {
        tracing::debug!(name = %name, "oracle named a speaker outside the known users");
    }

    Ok(matched)
}
