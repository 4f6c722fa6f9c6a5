//! Task command execution against the reminder store

use super::{TaskExecution, TaskOutcome, TaskPayload};
use crate::Result;
use crate::db::{Reminder, ReminderRepo, UserRepo};
use crate::nlu::{TaskAction, TaskCommand};

/// Spoken when the store cannot be reached; nothing was changed
pub const STORE_FAILURE_REPLY: &str =
    "Hmm, I couldn't reach your task list just now, so nothing changed.";

/// Runs classified task commands
#[derive(Clone)]
pub struct TaskExecutor {
    users: UserRepo,
    reminders: ReminderRepo,
}

impl TaskExecutor {
    #[must_use]
    pub const fn new(users: UserRepo, reminders: ReminderRepo) -> Self {
        Self { users, reminders }
    }

    /// Execute a command; store failures are logged and reported as a reply
    pub fn execute(&self, command: &TaskCommand) -> TaskExecution {
        match self.try_execute(command) {
            Ok(execution) => execution,
            Err(e) => {
                tracing::error!(
                    error = %e,
                    user = %command.user,
                    intent = %command.action.kind(),
                    "task store operation failed"
                );
                TaskExecution::Direct(STORE_FAILURE_REPLY.to_string())
            }
        }
    }

    /// Execute a command, propagating store errors
    ///
    /// # Errors
    ///
    /// Returns error if a store operation fails
    pub fn try_execute(&self, command: &TaskCommand) -> Result<TaskExecution> {
        let user = command.user.as_str();

        let Some(user_id) = self.users.get_user_id(user)? else {
            tracing::info!(user, "task command for unknown user");
            return Ok(TaskExecution::Direct(format!(
                "Well, I can't seem to find a user named {user} in my system. Sorry."
            )));
        };

        let intent = command.action.kind();
        tracing::debug!(user, user_id, %intent, "executing task command");

        let payload = match &command.action {
            TaskAction::Add {
                description,
                due_date,
            } => {
                let Some(description) = description.as_deref().filter(|d| !d.trim().is_empty())
                else {
                    return Ok(TaskExecution::Direct(format!(
                        "Oh, I need a task description for {user} before I can add it."
                    )));
                };

                let reminder =
                    self.reminders
                        .add_reminder(user_id, description, due_date.as_deref())?;

                TaskPayload::Added {
                    task: reminder.task,
                    due_date: reminder.due_date,
                }
            }

            TaskAction::List => TaskPayload::Listed {
                reminders: self.reminders.list_reminders(user_id)?,
            },

            TaskAction::Complete { keyword } => {
                let Some(keyword) = keyword.as_deref() else {
                    return Ok(TaskExecution::Direct(format!(
                        "I need to know which task to mark complete for {user}. Can you give me a keyword?"
                    )));
                };

                match self.reminders.find_reminder(user_id, keyword)? {
                    Some(reminder) => {
                        self.reminders.complete_reminder(reminder.id)?;
                        TaskPayload::Completed {
                            description: reminder.task,
                        }
                    }
                    None => TaskPayload::NotFound {
                        intent,
                        keyword: display_keyword(keyword),
                    },
                }
            }

            TaskAction::Reschedule { keyword, due_date } => {
                let (Some(keyword), Some(due_date)) = (keyword.as_deref(), due_date.as_deref())
                else {
                    return Ok(TaskExecution::Direct(format!(
                        "I need both a task keyword and a new date to reschedule for {user}. What should I change?"
                    )));
                };

                match self.reminders.find_reminder(user_id, keyword)? {
                    Some(reminder) => {
                        let new_date = self.reminders.update_due_date(reminder.id, due_date)?;
                        TaskPayload::Rescheduled {
                            description: reminder.task,
                            old_date: reminder.due_date,
                            new_date,
                        }
                    }
                    None => TaskPayload::NotFound {
                        intent,
                        keyword: display_keyword(keyword),
                    },
                }
            }
        };

        Ok(TaskExecution::Outcome(TaskOutcome {
            intent,
            user_id,
            user: user.to_string(),
            payload,
        }))
    }

    /// Pending reminders for a user, in list order
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn pending(&self, user_id: i64) -> Result<Vec<Reminder>> {
        self.reminders.list_reminders(user_id)
    }
}

/// Keyword pattern as it should be spoken
fn display_keyword(pattern: &str) -> String {
    pattern
        .split('%')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
