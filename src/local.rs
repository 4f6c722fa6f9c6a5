//! Zero-latency handlers answered without the oracle
//!
//! Exit phrases and local clock questions are matched on normalised text at
//! word boundaries, so "stop" ends a session but "stopwatch" does not.

use chrono::NaiveDateTime;
use regex::Regex;

use crate::{Error, Result};

/// Phrases that end a conversation
pub const DEFAULT_EXIT_PHRASES: &[&str] = &[
    "stop",
    "exit conversation",
    "shut down",
    "thanks goodbye",
    "that'll be all",
    "that will be all",
    "thank you that'll be all",
    "thank you that will be all",
    "nothing else",
    "stop listening",
];

/// Spoken when a session ends on an exit phrase
pub const EXIT_REPLY: &str = "Sure thing. Catch you later!";

const TIME_PATTERN: &str =
    r"\b(?:what time|what's the time|whats the time|time is it|current time|tell me the time|o'clock)\b";

const DATE_PATTERN: &str = r"\b(?:what's the date|whats the date|what is the date|what day is it|today's date|todays date|current date)\b|\bwhat(?:'s| is) today$";

/// Places that turn a clock question into a search
const OTHER_PLACES: &str =
    r"\b(?:toronto|new york|london|tokyo|paris|city|canada|us|uk|gmt)\b";

/// Outcome of a local check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalOutcome {
    Exit(String),
    Answered(String),
}

/// Exit-phrase and clock matchers
#[derive(Debug, Clone)]
pub struct LocalTools {
    exit: Option<Regex>,
    time: Regex,
    date: Regex,
    other_places: Regex,
}

impl LocalTools {
    /// Build matchers for the given exit phrases
    ///
    /// # Errors
    ///
    /// Returns error if a pattern fails to compile
    pub fn new<S: AsRef<str>>(exit_phrases: &[S]) -> Result<Self> {
        let alternatives: Vec<String> = exit_phrases
            .iter()
            .map(|p| normalize(p.as_ref()))
            .filter(|p| !p.is_empty())
            .map(|p| regex::escape(&p))
            .collect();

        let exit = if alternatives.is_empty() {
            None
        } else {
            Some(compile(&format!(r"\b(?:{})\b", alternatives.join("|")))?)
        };

        Ok(Self {
            exit,
            time: compile(TIME_PATTERN)?,
            date: compile(DATE_PATTERN)?,
            other_places: compile(OTHER_PLACES)?,
        })
    }

    /// Build matchers for [`DEFAULT_EXIT_PHRASES`]
    ///
    /// # Errors
    ///
    /// Returns error if a pattern fails to compile
    pub fn with_defaults() -> Result<Self> {
        Self::new(DEFAULT_EXIT_PHRASES)
    }

    /// Whether the utterance contains an exit phrase
    #[must_use]
    pub fn is_exit(&self, utterance: &str) -> bool {
        self.exit
            .as_ref()
            .is_some_and(|re| re.is_match(&normalize(utterance)))
    }

    /// Exit reply when the utterance contains an exit phrase
    #[must_use]
    pub fn check_exit(&self, utterance: &str) -> Option<LocalOutcome> {
        self.is_exit(utterance)
            .then(|| LocalOutcome::Exit(EXIT_REPLY.to_string()))
    }

    /// Answer a question about the local time or date
    ///
    /// Questions naming another place are left for search.
    #[must_use]
    pub fn check_clock(&self, utterance: &str, now: NaiveDateTime) -> Option<LocalOutcome> {
        let text = normalize(utterance);
        if self.other_places.is_match(&text) {
            return None;
        }

        if self.time.is_match(&text) {
            return Some(LocalOutcome::Answered(time_reply(now)));
        }

        if self.date.is_match(&text) {
            return Some(LocalOutcome::Answered(date_reply(now)));
        }

        None
    }
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| Error::Config(format!("invalid utterance pattern: {e}")))
}

/// Lower-case, drop punctuation other than apostrophes, collapse whitespace
#[must_use]
pub fn normalize(text: &str) -> String {
    let cleaned: String = text
        .chars()
        .map(|c| match c {
            '\u{2019}' | '\u{2018}' | '\'' => '\'',
            c if c.is_alphanumeric() => c,
            _ => ' ',
        })
        .collect::<String>()
        .to_lowercase();

    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// "Oh sure! It's currently 9:05 PM over here."
#[must_use]
pub fn time_reply(now: NaiveDateTime) -> String {
    format!("Oh sure! It's currently {} over here.", now.format("%-I:%M %p"))
}

/// "Today's Monday, October 19th, 2026."
#[must_use]
pub fn date_reply(now: NaiveDateTime) -> String {
    let day = chrono::Datelike::day(&now);
    format!(
        "Today's {}, {} {day}{}, {}.",
        now.format("%A"),
        now.format("%B"),
        ordinal_suffix(day),
        now.format("%Y"),
    )
}

/// English ordinal suffix for a day of the month
#[must_use]
pub const fn ordinal_suffix(day: u32) -> &'static str {
    match (day % 10, day % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    }
}
