//! `users` table: plaintext credentials, unique usernames.

use rusqlite::{ErrorCode, OptionalExtension, params};
use tracing::debug;

use super::{Database, StoreError};

/// Result of an insert-if-unique registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterOutcome {
    Created(i64),
    AlreadyExists,
}

impl Database {
    /// Insert a new user.  The `UNIQUE` constraint on `username` decides
    /// whether the name is taken; no pre-check query is made.
    pub fn register(&self, username: &str, password: &str) -> Result<RegisterOutcome, StoreError> {
        self.with_conn(|conn| {
            let res = conn.execute(
                "INSERT INTO users (username, password) VALUES (?1, ?2)",
                params![username, password],
            );
            match res {
                Ok(_) => {
                    let id = conn.last_insert_rowid();
                    debug!(user_id = id, %username, "user registered");
                    Ok(RegisterOutcome::Created(id))
                }
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.code == ErrorCode::ConstraintViolation =>
                {
                    debug!(%username, "username already taken");
                    Ok(RegisterOutcome::AlreadyExists)
                }
                Err(e) => Err(e.into()),
            }
        })
    }

    /// Exact-match credential lookup.  Returns the user id on success.
    pub fn login(&self, username: &str, password: &str) -> Result<Option<i64>, StoreError> {
        self.with_conn(|conn| {
            let id = conn
                .query_row(
                    "SELECT id FROM users WHERE username = ?1 AND password = ?2",
                    params![username, password],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(id)
        })
    }

    pub fn user_count(&self) -> Result<usize, StoreError> {
        self.with_conn(|conn| {
            let n: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
            Ok(n as usize)
        })
    }
}
