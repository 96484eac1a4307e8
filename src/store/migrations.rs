use rusqlite::Connection;
use tracing::debug;

use super::StoreError;

pub fn run(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            username    TEXT UNIQUE,
            password    TEXT
        );

        CREATE TABLE IF NOT EXISTS reminders (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id     INTEGER NOT NULL REFERENCES users(id),
            message     TEXT NOT NULL,
            remind_time TEXT NOT NULL,
            notified    INTEGER NOT NULL DEFAULT 0
        );

        CREATE INDEX IF NOT EXISTS idx_reminders_pending
            ON reminders(user_id, notified, remind_time);
        ",
    )?;

    debug!("database migrations complete");
    Ok(())
}
