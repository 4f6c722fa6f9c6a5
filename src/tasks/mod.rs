//! Reminder task execution
//!
//! The executor turns a classified [`TaskCommand`](crate::nlu::TaskCommand)
//! into store operations and a [`TaskPayload`] describing what happened. The
//! payload is what the response generator talks about.

mod executor;

use serde_json::{Value, json};

use crate::db::Reminder;
use crate::nlu::TaskIntentKind;

pub use executor::{STORE_FAILURE_REPLY, TaskExecutor};

/// What a task command did to the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskPayload {
    Added {
        task: String,
        due_date: Option<String>,
    },
    Listed {
        reminders: Vec<Reminder>,
    },
    Completed {
        description: String,
    },
    Rescheduled {
        description: String,
        old_date: Option<String>,
        new_date: Option<String>,
    },
    /// No pending reminder matched the keyword; nothing was changed
    NotFound {
        intent: TaskIntentKind,
        keyword: String,
    },
}

impl TaskPayload {
    /// JSON handed to the response generator
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::Added { task, due_date } => json!({
                "task": task,
                "due_date": due_date,
            }),
            Self::Listed { reminders } => json!({
                "reminders": reminders
                    .iter()
                    .map(|r| json!({ "task": r.task, "due_date": r.due_date, "id": r.id }))
                    .collect::<Vec<_>>(),
            }),
            Self::Completed { description } => json!({
                "success": true,
                "description": description,
            }),
            Self::Rescheduled {
                description,
                old_date,
                new_date,
            } => json!({
                "success": true,
                "description": description,
                "old_date": old_date,
                "new_date": new_date,
            }),
            Self::NotFound { keyword, .. } => json!({
                "success": false,
                "keyword": keyword,
            }),
        }
    }

    /// Whether the store was modified
    #[must_use]
    pub const fn is_mutation(&self) -> bool {
        matches!(
            self,
            Self::Added { .. } | Self::Completed { .. } | Self::Rescheduled { .. }
        )
    }
}

/// Result of running a task command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskExecution {
    /// Spoken as-is: clarification requests, unknown users, store failures
    Direct(String),
    /// Store operation finished; the payload still needs a reply
    Outcome(TaskOutcome),
}

/// A completed task operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskOutcome {
    pub intent: TaskIntentKind,
    pub user_id: i64,
    pub user: String,
    pub payload: TaskPayload,
}
