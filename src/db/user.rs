//! User repository
//!
//! Users are seeded from configuration and never modified by a conversation.
//! Names compare case-insensitively (`COLLATE NOCASE`).

use rusqlite::OptionalExtension;

use super::{DbPool, connect};
use crate::Result;

/// A known speaker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub name: String,
}

/// User repository
#[derive(Clone)]
pub struct UserRepo {
    pool: DbPool,
}

impl UserRepo {
    /// Create a new user repository
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Look up a user by name
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn find_by_name(&self, name: &str) -> Result<Option<User>> {
        let conn = connect(&self.pool)?;

        let user = conn
            .query_row(
                "SELECT id, name FROM users WHERE name = ?1",
                [name.trim()],
                |row| {
                    Ok(User {
                        id: row.get(0)?,
                        name: row.get(1)?,
                    })
                },
            )
            .optional()?;

        Ok(user)
    }

    /// Look up a user ID by name
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn get_user_id(&self, name: &str) -> Result<Option<i64>> {
        Ok(self.find_by_name(name)?.map(|u| u.id))
    }

    /// Look up a user name by ID
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn get_user_name(&self, id: i64) -> Result<Option<String>> {
        let conn = connect(&self.pool)?;

        let name = conn
            .query_row("SELECT name FROM users WHERE id = ?1", [id], |row| row.get(0))
            .optional()?;

        Ok(name)
    }

    /// List all user names in creation order
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn list_names(&self) -> Result<Vec<String>> {
        let conn = connect(&self.pool)?;

        let mut stmt = conn.prepare("SELECT name FROM users ORDER BY id")?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .filter_map(std::result::Result::ok)
            .collect();

        Ok(names)
    }

    /// Insert a user if no user of that name exists, returning its ID
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn ensure(&self, name: &str) -> Result<i64> {
        let name = name.trim();
        let conn = connect(&self.pool)?;

        conn.execute("INSERT OR IGNORE INTO users (name) VALUES (?1)", [name])?;
        let id = conn.query_row("SELECT id FROM users WHERE name = ?1", [name], |row| {
            row.get(0)
        })?;

        Ok(id)
    }

    /// Make sure every configured user exists
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn seed<S: AsRef<str>>(&self, names: &[S]) -> Result<usize> {
        let mut created = 0;
        for name in names {
            let name = name.as_ref();
            if name.trim().is_empty() {
                continue;
            }
            if self.find_by_name(name)?.is_none() {
                self.ensure(name)?;
                created += 1;
            }
        }

        if created > 0 {
            tracing::info!(created, "seeded users");
        }
        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory;

    fn setup() -> UserRepo {
        let pool = init_memory().unwrap();
        UserRepo::new(pool)
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let repo = setup();
        let id = repo.ensure("Mohamed").unwrap();

        assert_eq!(repo.get_user_id("mohamed").unwrap(), Some(id));
        assert_eq!(repo.get_user_id("MOHAMED ").unwrap(), Some(id));
        assert_eq!(repo.get_user_name(id).unwrap().as_deref(), Some("Mohamed"));
    }

    #[test]
    fn test_unknown_user() {
        let repo = setup();
        assert_eq!(repo.get_user_id("Nobody").unwrap(), None);
        assert_eq!(repo.get_user_name(42).unwrap(), None);
    }

    #[test]
    fn test_seed_is_idempotent() {
        let repo = setup();

        assert_eq!(repo.seed(&["Patrick", "Surya", "Mohamed"]).unwrap(), 3);
        assert_eq!(repo.seed(&["patrick", "Surya", ""]).unwrap(), 0);
        assert_eq!(
            repo.list_names().unwrap(),
            vec!["Patrick".to_string(), "Surya".to_string(), "Mohamed".to_string()]
        );
    }
}
