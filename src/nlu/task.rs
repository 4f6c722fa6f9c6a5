//! Task intent classification

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{ClassificationError, TaskContext, canonical_name, field_text, parse_json_reply};
use crate::db::dates::DATE_FORMAT;

/// Task intent names as they appear in oracle output and reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskIntentKind {
    AddTask,
    ListTasks,
    CompleteTask,
    RescheduleTask,
}

impl TaskIntentKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AddTask => "ADD_TASK",
            Self::ListTasks => "LIST_TASKS",
            Self::CompleteTask => "COMPLETE_TASK",
            Self::RescheduleTask => "RESCHEDULE_TASK",
        }
    }
}

impl fmt::Display for TaskIntentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified task intent with the fields it carries
///
/// Fields are optional because the oracle may omit them; the executor asks
/// for clarification instead of guessing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskAction {
    Add {
        description: Option<String>,
        due_date: Option<String>,
    },
    List,
    Complete {
        keyword: Option<String>,
    },
    Reschedule {
        keyword: Option<String>,
        due_date: Option<String>,
    },
}

impl TaskAction {
    #[must_use]
    pub const fn kind(&self) -> TaskIntentKind {
        match self {
            Self::Add { .. } => TaskIntentKind::AddTask,
            Self::List => TaskIntentKind::ListTasks,
            Self::Complete { .. } => TaskIntentKind::CompleteTask,
            Self::Reschedule { .. } => TaskIntentKind::RescheduleTask,
        }
    }
}

/// Task intent resolved to the user it applies to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskCommand {
    /// Known user name, or the name as spoken when it is not known
    pub user: String,
    pub action: TaskAction,
}

#[derive(Debug, Deserialize)]
struct TaskReply {
    intent: Option<serde_json::Value>,
    user_name: Option<serde_json::Value>,
    task_description: Option<serde_json::Value>,
    due_date: Option<serde_json::Value>,
    keywords: Option<serde_json::Value>,
}

/// Conservative task-classification prompt
#[must_use]
pub fn task_prompt(utterance: &str, ctx: &TaskContext<'_>) -> String {
    format!(
        r#"You are a natural language understanding service for task management. Your goal is to STRICTLY and ONLY identify requests that involve scheduling, remembering, or completing a future action.

Available USER NAMES: {names}
Currently Active User (default if no name is given): {active}
Today's Date: {today}

Question: "{utterance}"

JSON Output Format (a single JSON object):
{{
  "intent": "ADD_TASK" or "LIST_TASKS" or "COMPLETE_TASK" or "RESCHEDULE_TASK" or "NONE",
  "user_name": "Name from the Available USER NAMES list, or the active user '{active}' if the request does not name anyone (e.g. 'my tasks').",
  "task_description": "The full task description for ADD_TASK, or NULL otherwise.",
  "due_date": "The date for ADD_TASK or RESCHEDULE_TASK (e.g. '2025-11-27', 'tomorrow', 'next Tuesday'), or NULL if not given. Use YYYY-MM-DD when possible, otherwise the phrase.",
  "keywords": "A short lower-case pattern of 1-2 unique words for matching an existing task, wrapped in percent signs (e.g. '%speech%', '%assembly%'), for COMPLETE_TASK/RESCHEDULE_TASK, or NULL otherwise. Prefer short unique terms over long phrases."
}}

Rules:
1. 'user_name' must be a capitalized name from the list.
2. A task must contain explicit verbs or phrases about remembering, scheduling, or completing an action. A request to move a task to another date is RESCHEDULE_TASK, not NONE.
   Examples of tasks: 'Remind me to call John', 'Add a meeting to my list', 'I need to check the server logs', 'What's on my list?'
   Examples of NON-TASKS (intent NONE): 'What's the time?', 'What's the best way to make a smoothie?', 'Who is Nelson Mandela?', 'I need a good NUC computer model.'
3. If the request seeks information or general knowledge, the intent is NONE.
4. When unsure, the intent is NONE."#,
        names = ctx.known_users.join(", "),
        active = ctx.active_user,
        today = ctx.today.format(DATE_FORMAT),
    )
}

/// Parse task-classifier output; `Ok(None)` is the NONE intent
///
/// # Errors
///
/// Returns error if the output holds no parseable JSON object or names an
/// intent outside the known set
pub fn parse_task(
    text: &str,
    ctx: &TaskContext<'_>,
) -> Result<Option<TaskCommand>, ClassificationError> {
    let reply: TaskReply = parse_json_reply(text)?;

    let intent = field_text(reply.intent.as_ref())
        .map(|i| i.to_uppercase().replace([' ', '-'], "_"))
        .unwrap_or_default();

    let description = field_text(reply.task_description.as_ref());
    let due_date = field_text(reply.due_date.as_ref());
    let keyword = field_text(reply.keywords.as_ref());

    let action = match intent.as_str() {
        "" | "NONE" => return Ok(None),
        "ADD_TASK" => TaskAction::Add {
            description,
            due_date,
        },
        "LIST_TASKS" => TaskAction::List,
        "COMPLETE_TASK" => TaskAction::Complete { keyword },
        "RESCHEDULE_TASK" => TaskAction::Reschedule { keyword, due_date },
        other => return Err(ClassificationError::Unrecognised(other.to_string())),
    };

    let user = resolve_user(field_text(reply.user_name.as_ref()), ctx);

    Ok(Some(TaskCommand { user, action }))
}

fn resolve_user(spoken: Option<String>, ctx: &TaskContext<'_>) -> String {
    let Some(spoken) = spoken else {
        return ctx.active_user.to_string();
    };

    canonical_name(&spoken, ctx.known_users).unwrap_or_else(|| capitalize(&spoken))
}

fn capitalize(name: &str) -> String {
    let lower = name.to_lowercase();
    let mut chars = lower.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}
