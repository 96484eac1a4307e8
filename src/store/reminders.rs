//! `reminders` table: per-user one-shot reminders at minute granularity.
//!
//! `remind_time` is stored as a fixed-width `YYYY-MM-DD HH:MM` string, so
//! string comparison orders reminders chronologically.

use rusqlite::{Row, params};
use tracing::debug;

use super::{Database, StoreError};

/// `chrono` format of `remind_time` and of the poller's current-minute key.
pub const REMIND_TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reminder {
    pub id: i64,
    pub user_id: i64,
    pub message: String,
    pub remind_time: String,
    pub notified: bool,
}

impl Reminder {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            message: row.get(2)?,
            remind_time: row.get(3)?,
            notified: row.get(4)?,
        })
    }
}

const SELECT_COLUMNS: &str = "SELECT id, user_id, message, remind_time, notified FROM reminders";

impl Database {
    pub fn add_reminder(
        &self,
        user_id: i64,
        message: &str,
        remind_time: &str,
    ) -> Result<i64, StoreError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO reminders (user_id, message, remind_time) VALUES (?1, ?2, ?3)",
                params![user_id, message, remind_time],
            )?;
            let id = conn.last_insert_rowid();
            debug!(reminder_id = id, user_id, %remind_time, "reminder stored");
            Ok(id)
        })
    }

    #[cfg(test)]
    pub(crate) fn reminder(&self, id: i64) -> Result<Option<Reminder>, StoreError> {
        use rusqlite::OptionalExtension;
        self.with_conn(|conn| {
            let r = conn
                .query_row(
                    &format!("{SELECT_COLUMNS} WHERE id = ?1"),
                    params![id],
                    Reminder::from_row,
                )
                .optional()?;
            Ok(r)
        })
    }

    pub fn reminders_for(&self, user_id: i64) -> Result<Vec<Reminder>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare(&format!("{SELECT_COLUMNS} WHERE user_id = ?1 ORDER BY remind_time, id"))?;
            let rows = stmt
                .query_map(params![user_id], Reminder::from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Claim every pending reminder of `user_id` due at or before `now_minute`
    /// and mark it notified, in one transaction.
    ///
    /// Only rows this call actually flipped are returned, so a reminder is
    /// handed out at most once even if two pollers race.
    pub fn take_due_reminders(
        &self,
        user_id: i64,
        now_minute: &str,
    ) -> Result<Vec<Reminder>, StoreError> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let due = {
                let mut stmt = tx.prepare(&format!(
                    "{SELECT_COLUMNS} WHERE user_id = ?1 AND notified = 0 AND remind_time <= ?2 \
                     ORDER BY remind_time, id"
                ))?;
                let rows = stmt
                    .query_map(params![user_id, now_minute], Reminder::from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                rows
            };

            let mut claimed = Vec::with_capacity(due.len());
            for mut r in due {
                let changed = tx.execute(
                    "UPDATE reminders SET notified = 1 WHERE id = ?1 AND notified = 0",
                    params![r.id],
                )?;
                if changed == 1 {
                    r.notified = true;
                    claimed.push(r);
                }
            }
            tx.commit()?;
            Ok(claimed)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::RegisterOutcome;

    fn db_with_user() -> (Database, i64) {
        let db = Database::open_in_memory().unwrap();
        let RegisterOutcome::Created(id) = db.register("u", "p").unwrap() else {
            panic!("register failed");
        };
        (db, id)
    }

    #[test]
    fn new_reminder_is_pending() {
        let (db, uid) = db_with_user();
        let id = db.add_reminder(uid, "remind me to stretch", "2030-01-01 09:00").unwrap();
        let r = db.reminder(id).unwrap().unwrap();
        assert_eq!(r.user_id, uid);
        assert_eq!(r.remind_time, "2030-01-01 09:00");
        assert!(!r.notified);
    }

    #[test]
    fn exact_minute_fires_once() {
        let (db, uid) = db_with_user();
        let id = db.add_reminder(uid, "tea", "2030-01-01 09:00").unwrap();

        let first = db.take_due_reminders(uid, "2030-01-01 09:00").unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].id, id);
        assert!(first[0].notified);
        assert!(db.reminder(id).unwrap().unwrap().notified);

        let second = db.take_due_reminders(uid, "2030-01-01 09:00").unwrap();
        assert!(second.is_empty());
    }

    #[test]
    fn future_reminder_is_not_due() {
        let (db, uid) = db_with_user();
        db.add_reminder(uid, "later", "2030-01-01 09:01").unwrap();
        assert!(db.take_due_reminders(uid, "2030-01-01 09:00").unwrap().is_empty());
    }

    #[test]
    fn skipped_minute_still_delivers() {
        let (db, uid) = db_with_user();
        db.add_reminder(uid, "missed", "2030-01-01 08:58").unwrap();
        let due = db.take_due_reminders(uid, "2030-01-01 09:00").unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].message, "missed");
    }

    #[test]
    fn other_users_reminders_untouched() {
        let (db, uid) = db_with_user();
        let RegisterOutcome::Created(other) = db.register("v", "p").unwrap() else {
            panic!("register failed");
        };
        let theirs = db.add_reminder(other, "theirs", "2030-01-01 09:00").unwrap();
        assert!(db.take_due_reminders(uid, "2030-01-01 09:00").unwrap().is_empty());
        assert!(!db.reminder(theirs).unwrap().unwrap().notified);
    }

    #[test]
    fn reminders_for_orders_by_time() {
        let (db, uid) = db_with_user();
        db.add_reminder(uid, "b", "2030-01-01 10:00").unwrap();
        db.add_reminder(uid, "a", "2030-01-01 09:00").unwrap();
        let all = db.reminders_for(uid).unwrap();
        assert_eq!(all.iter().map(|r| r.message.as_str()).collect::<Vec<_>>(), ["a", "b"]);
    }
}
