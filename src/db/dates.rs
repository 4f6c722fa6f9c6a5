//! Due-date phrase normalization
//!
//! Only a handful of relative phrases are resolved. Anything else (for
//! example "next Tuesday") is stored exactly as spoken.

use chrono::{Days, Local, NaiveDate};

/// Storage format for resolved dates
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Today's date in the local timezone
#[must_use]
pub fn local_today() -> NaiveDate {
    Local::now().date_naive()
}

/// Resolve a due-date phrase against `today`
///
/// Returns `None` for a missing or blank phrase (no due date).
#[must_use]
pub fn normalize_due_date(phrase: Option<&str>, today: NaiveDate) -> Option<String> {
    let phrase = phrase?.trim();
    if phrase.is_empty() {
        return None;
    }

    let lower = phrase.to_lowercase();
    let resolved = match lower.as_str() {
        "today" | "now" => Some(today),
        "tomorrow" | "tmr" => today.checked_add_days(Days::new(1)),
        _ if lower.contains("next week") => today.checked_add_days(Days::new(7)),
        _ => None,
    };

    Some(resolved.map_or_else(
        || phrase.to_string(),
        |date| date.format(DATE_FORMAT).to_string(),
    ))
}
