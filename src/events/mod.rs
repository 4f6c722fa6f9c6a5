//! Assistant events for presentation layers
//!
//! Publishing is best-effort: with no subscribers events are dropped, and a
//! slow subscriber only loses its own backlog.

use serde::Serialize;
use tokio::sync::broadcast;

use crate::db::Reminder;
use crate::nlu::TaskIntentKind;
use crate::session::DialogueState;

/// Backlog kept for each subscriber
const DEFAULT_CAPACITY: usize = 64;

/// Something a face or dashboard may want to react to
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AssistantEvent {
    StateChanged { state: DialogueState },
    UserIdentified { name: String },
    Speaking { text: String },
    TaskReport {
        intent: TaskIntentKind,
        report: String,
    },
    /// Pending reminders after a task command
    TasksChanged {
        user: String,
        reminders: Vec<Reminder>,
    },
}

/// Broadcast channel for [`AssistantEvent`]s
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<AssistantEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl EventBus {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<AssistantEvent> {
        self.sender.subscribe()
    }

    /// Publish an event; never fails
    pub fn publish(&self, event: AssistantEvent) {
        if self.sender.send(event).is_err() {
            tracing::trace!("no event subscribers");
        }
    }
}
