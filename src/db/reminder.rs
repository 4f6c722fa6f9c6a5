//! Reminder repository
//!
//! Every mutation commits immediately on its own pooled connection. Completed
//! reminders stay in the table but are invisible to listing and lookup.

use chrono::NaiveDate;
use rusqlite::{Row, params};
use serde::Serialize;

use super::dates::{local_today, normalize_due_date};
use super::{DbPool, UserRepo, connect};
use crate::Result;

/// A stored reminder
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reminder {
    pub id: i64,
    pub user_id: i64,
    pub task: String,
    /// ISO-8601 date, or an unresolved phrase, or `None` for no due date
    pub due_date: Option<String>,
    pub completed: bool,
}

impl Reminder {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            task: row.get(2)?,
            due_date: row.get(3)?,
            completed: row.get(4)?,
        })
    }
}

const COLUMNS: &str = "id, user_id, task, due_date, completed";

/// Reminder repository
#[derive(Clone)]
pub struct ReminderRepo {
    pool: DbPool,
    today: fn() -> NaiveDate,
}

impl ReminderRepo {
    /// Create a new reminder repository resolving dates against the local clock
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn new(pool: DbPool) -> Self {
        Self {
            pool,
            today: local_today,
        }
    }

    /// Use a different source for "today" when resolving date phrases
    #[must_use]
    pub const fn with_clock(mut self, today: fn() -> NaiveDate) -> Self {
        self.today = today;
        self
    }

    /// The date relative phrases are resolved against
    #[must_use]
    pub fn today(&self) -> NaiveDate {
        (self.today)()
    }

    /// Add a reminder, resolving the due-date phrase
    ///
    /// # Errors
    ///
    /// Returns error if the insert fails (unknown user, empty task, locked database)
    pub fn add_reminder(
        &self,
        user_id: i64,
        task: &str,
        due_date_phrase: Option<&str>,
    ) -> Result<Reminder> {
        let due_date = normalize_due_date(due_date_phrase, self.today());
        let task = task.trim();
        let conn = connect(&self.pool)?;

        conn.execute(
            "INSERT INTO reminders (user_id, task, due_date) VALUES (?1, ?2, ?3)",
            params![user_id, task, due_date],
        )?;

        let reminder = Reminder {
            id: conn.last_insert_rowid(),
            user_id,
            task: task.to_string(),
            due_date,
            completed: false,
        };

        tracing::info!(
            user_id,
            reminder_id = reminder.id,
            due = ?reminder.due_date,
            "reminder created"
        );
        Ok(reminder)
    }

    /// Pending reminders, dated ones first, soonest first, then by ID
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn list_reminders(&self, user_id: i64) -> Result<Vec<Reminder>> {
        let conn = connect(&self.pool)?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM reminders
             WHERE user_id = ?1 AND completed = 0
             ORDER BY due_date IS NULL ASC, due_date ASC, id ASC"
        ))?;

        let reminders = stmt
            .query_map([user_id], Reminder::from_row)?
            .filter_map(std::result::Result::ok)
            .collect();

        Ok(reminders)
    }

    /// First pending reminder whose task contains the keyword pattern
    ///
    /// `%` in the pattern separates terms that must appear in order; matching
    /// ignores case. Which reminder wins when several match follows store order.
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn find_reminder(&self, user_id: i64, keyword_pattern: &str) -> Result<Option<Reminder>> {
        let terms = keyword_terms(keyword_pattern);
        if terms.is_empty() {
            return Ok(None);
        }
        let conn = connect(&self.pool)?;

        // Case folding happens here: SQLite's LOWER only knows ASCII
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM reminders
             WHERE user_id = ?1 AND completed = 0
             ORDER BY id"
        ))?;

        for reminder in stmt.query_map([user_id], Reminder::from_row)? {
            let reminder = reminder?;
            if contains_in_order(&reminder.task, &terms) {
                return Ok(Some(reminder));
            }
        }

        Ok(None)
    }

    /// Fetch a reminder by ID regardless of completion
    #[cfg(test)]
    fn get(&self, reminder_id: i64) -> Result<Option<Reminder>> {
        use rusqlite::OptionalExtension;

        let conn = connect(&self.pool)?;

        let reminder = conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM reminders WHERE id = ?1"),
                [reminder_id],
                Reminder::from_row,
            )
            .optional()?;

        Ok(reminder)
    }

    /// Move a reminder to a new date, returning the stored value
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn update_due_date(&self, reminder_id: i64, new_date_phrase: &str) -> Result<Option<String>> {
        let due_date = normalize_due_date(Some(new_date_phrase), self.today());
        let conn = connect(&self.pool)?;

        conn.execute(
            "UPDATE reminders SET due_date = ?1 WHERE id = ?2",
            params![due_date, reminder_id],
        )?;

        tracing::info!(reminder_id, due = ?due_date, "reminder rescheduled");
        Ok(due_date)
    }

    /// Mark a reminder done; completing twice is harmless
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn complete_reminder(&self, reminder_id: i64) -> Result<()> {
        let conn = connect(&self.pool)?;

        conn.execute("UPDATE reminders SET completed = 1 WHERE id = ?1", [reminder_id])?;

        tracing::info!(reminder_id, "reminder completed");
        Ok(())
    }

    /// Number of reminders ever stored, completed or not
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn count(&self) -> Result<i64> {
        let conn = connect(&self.pool)?;
        let count = conn.query_row("SELECT COUNT(*) FROM reminders", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Insert the demonstration reminders when the table is empty
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn seed_samples(&self, users: &UserRepo) -> Result<usize> {
        if self.count()? > 0 {
            return Ok(0);
        }

        let mut inserted = 0;
        for (name, task, due) in SAMPLE_REMINDERS {
            let Some(user_id) = users.get_user_id(name)? else {
                continue;
            };
            self.add_reminder(user_id, task, Some(due))?;
            inserted += 1;
        }

        tracing::info!(inserted, "seeded sample reminders");
        Ok(inserted)
    }
}

/// Demonstration data for the default speakers
const SAMPLE_REMINDERS: &[(&str, &str, &str)] = &[
    ("Mohamed", "Develop a Speech Generation code for Mico", "2025-11-01"),
    ("Mohamed", "Meet with group to review the capstone project winter semester plans", "2025-11-14"),
    ("Mohamed", "Order the standard parts for the robot assembly", "2025-12-02"),
    ("Surya", "Update the team on the status of the Machine Vision code", "2025-11-09"),
    ("Surya", "Meet with supervisor to discuss final mechanical robot design", "2025-11-11"),
    ("Surya", "Test the camera integration with the robot head", "2026-01-14"),
    ("Patrick", "Write about the SolidWorks assembly on the engineering term report", "2025-11-24"),
    ("Patrick", "Print the robot neck for prototype testing", "2026-01-13"),
    ("Patrick", "Order the servo motors for proper neck rotation", "2026-02-09"),
];

/// Lower-cased, whitespace-normalized terms of a `%`-separated pattern
fn keyword_terms(keyword_pattern: &str) -> Vec<String> {
    keyword_pattern
        .split('%')
        .map(|t| t.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Whether every term occurs in `text`, in order, ignoring case
fn contains_in_order(text: &str, terms: &[String]) -> bool {
    let text = text.to_lowercase();
    let mut rest = text.as_str();

    for term in terms {
        let Some(idx) = rest.find(term.as_str()) else {
            return false;
        };
        rest = &rest[idx + term.len()..];
    }

    true
}
