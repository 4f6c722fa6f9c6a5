//! Extraction of the JSON object embedded in free-form oracle output

/// Pull the single JSON object out of an oracle reply
///
/// Code-fence markers are removed, then the span from the first `{` to the
/// last `}` is returned. Anything outside that span is ignored.
#[must_use]
pub fn extract_json_object(text: &str) -> Option<String> {
    let cleaned = text
        .replace("```json", "")
        .replace("```text", "")
        .replace("```", "");

    let start = cleaned.find('{')?;
    let end = cleaned.rfind('}')?;
    if end < start {
        return None;
    }

    Some(cleaned[start..=end].trim().to_string())
}
