//! Per-activation conversation state
//!
//! A session lives from wake word to exit phrase or inactivity timeout and
//! is never persisted.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::oracle::ChatMessage;

/// History entries kept (five user/assistant pairs)
pub const HISTORY_LIMIT: usize = 10;

/// Bounded conversation history; the oldest entries drop first
#[derive(Debug, Clone)]
pub struct History {
    entries: VecDeque<ChatMessage>,
    limit: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::new(HISTORY_LIMIT)
    }
}

impl History {
    #[must_use]
    pub fn new(limit: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(limit + 1),
            limit,
        }
    }

    pub fn push(&mut self, message: ChatMessage) {
        self.entries.push_back(message);
        while self.entries.len() > self.limit {
            self.entries.pop_front();
        }
    }

    /// Record a completed user/assistant exchange
    pub fn push_exchange(&mut self, user: &str, assistant: &str) {
        self.push(ChatMessage::user(user));
        self.push(ChatMessage::assistant(assistant));
    }

    /// Oldest-first snapshot for an oracle request
    #[must_use]
    pub fn messages(&self) -> Vec<ChatMessage> {
        self.entries.iter().cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Where the dialogue is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DialogueState {
    /// Waiting for the wake word
    WakeListening,
    /// Active, speaker not yet known
    IdentifyingUser,
    Conversing,
}

/// State of one wake-word activation
#[derive(Debug)]
pub struct Session {
    history: History,
    current_user: Option<String>,
    last_activity: Instant,
    active: bool,
    identity_prompted: bool,
    follow_up_timeout: Duration,
}

impl Session {
    #[must_use]
    pub fn new(follow_up_timeout: Duration) -> Self {
        Self {
            history: History::default(),
            current_user: None,
            last_activity: Instant::now(),
            active: false,
            identity_prompted: false,
            follow_up_timeout,
        }
    }

    /// Start a fresh activation: history and speaker are cleared
    pub fn activate(&mut self, now: Instant) {
        self.reset();
        self.active = true;
        self.last_activity = now;
    }

    /// End the activation and forget everything
    pub fn end(&mut self) {
        self.reset();
        self.active = false;
    }

    fn reset(&mut self) {
        self.history.clear();
        self.current_user = None;
        self.identity_prompted = false;
    }

    /// Record activity, postponing the inactivity timeout
    pub fn touch(&mut self, now: Instant) {
        self.last_activity = now;
    }

    /// Whether an active session has been idle past the follow-up timeout
    #[must_use]
    pub fn is_expired(&self, now: Instant) -> bool {
        self.active && now.saturating_duration_since(self.last_activity) > self.follow_up_timeout
    }

    #[must_use]
    pub fn state(&self) -> DialogueState {
        match (self.active, &self.current_user) {
            (false, _) => DialogueState::WakeListening,
            (true, None) => DialogueState::IdentifyingUser,
            (true, Some(_)) => DialogueState::Conversing,
        }
    }

    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active
    }

    #[must_use]
    pub fn current_user(&self) -> Option<&str> {
        self.current_user.as_deref()
    }

    pub fn set_user(&mut self, name: impl Into<String>) {
        self.current_user = Some(name.into());
    }

    #[must_use]
    pub const fn history(&self) -> &History {
        &self.history
    }

    pub fn history_mut(&mut self) -> &mut History {
        &mut self.history
    }

    #[must_use]
    pub const fn follow_up_timeout(&self) -> Duration {
        self.follow_up_timeout
    }

    /// Mark the identity question as asked; true the first time per activation
    pub fn take_identity_prompt(&mut self) -> bool {
        !std::mem::replace(&mut self.identity_prompted, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::Role;

    #[test]
    fn test_history_keeps_last_ten() {
        let mut history = History::default();
        for i in 0..7 {
            history.push_exchange(&format!("q{i}"), &format!("a{i}"));
        }

        let messages = history.messages();
        assert_eq!(messages.len(), HISTORY_LIMIT);
        assert_eq!(messages[0].content, "q2");
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[9].content, "a6");
    }

    #[test]
    fn test_state_transitions() {
        let start = Instant::now();
        let mut session = Session::new(Duration::from_secs(8));
        assert_eq!(session.state(), DialogueState::WakeListening);

        session.activate(start);
        assert_eq!(session.state(), DialogueState::IdentifyingUser);

        session.set_user("Surya");
        session.history_mut().push_exchange("hi", "hey!");
        assert_eq!(session.state(), DialogueState::Conversing);

        session.end();
        assert_eq!(session.state(), DialogueState::WakeListening);
        assert!(session.history().is_empty());
        assert_eq!(session.current_user(), None);
    }

    #[test]
    fn test_expiry() {
        let start = Instant::now();
        let mut session = Session::new(Duration::from_secs(8));
        assert!(!session.is_expired(start + Duration::from_secs(60)));

        session.activate(start);
        assert!(!session.is_expired(start + Duration::from_secs(8)));
        assert!(session.is_expired(start + Duration::from_secs(9)));

        session.touch(start + Duration::from_secs(5));
        assert!(!session.is_expired(start + Duration::from_secs(9)));
    }

    #[test]
    fn test_identity_prompt_once_per_activation() {
        let mut session = Session::new(Duration::from_secs(8));
        session.activate(Instant::now());
        assert!(session.take_identity_prompt());
        assert!(!session.take_identity_prompt());

        session.activate(Instant::now());
        assert!(session.take_identity_prompt());
    }
}
