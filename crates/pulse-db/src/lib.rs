pub mod feedbacks;
pub mod migrations;
pub mod models;
pub mod queries;

use anyhow::Result;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Connection;
use rusqlite::functions::FunctionFlags;
use std::path::Path;
use std::sync::Mutex;
use tracing::info;

pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        // WAL mode for concurrent reads
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        register_functions(&conn)?;
        migrations::run(&conn)?;

        info!("Database opened at {}", path.display());
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Fresh, private database. Used by tests and ephemeral demo servers.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        register_functions(&conn)?;
        migrations::run(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.conn.lock().map_err(|e| anyhow::anyhow!("DB lock poisoned: {}", e))?;
        f(&conn)
    }

    /// Like `with_conn`, but hands out `&mut` so callers can open transactions.
    pub fn with_conn_mut<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T>,
    {
        let mut conn = self.conn.lock().map_err(|e| anyhow::anyhow!("DB lock poisoned: {}", e))?;
        f(&mut conn)
    }
}

/// SQL helpers the queries rely on. `fold_case(text)` is the Unicode-aware
/// lowercase used for substring search; SQLite's own LIKE folds ASCII only.
fn register_functions(conn: &Connection) -> Result<()> {
    conn.create_scalar_function(
        "fold_case",
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let text: Option<String> = ctx.get(0)?;
            Ok(text.map(|t| pulse_types::query::fold_case(&t)))
        },
    )?;
    Ok(())
}

/// Canonical on-disk timestamp format. Fixed width and always UTC, so string
/// comparison in SQL orders the same way as the instants do.
pub fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a stored timestamp. Accepts our canonical RFC 3339 form as well as
/// SQLite's `datetime('now')` output for rows written by hand.
pub fn parse_ts(raw: &str) -> Result<DateTime<Utc>> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .map_err(|e| anyhow::anyhow!("Bad timestamp '{}': {}", raw, e))
}

/// True when `err` came from a UNIQUE/PRIMARY KEY constraint, i.e. a
/// concurrent insert won the race for the same key.
pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<rusqlite::Error>(),
        Some(rusqlite::Error::SqliteFailure(e, _))
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
    )
}

/// The column a unique violation fired on, read from SQLite's
/// `UNIQUE constraint failed: users.email` message. For a multi-column
/// key only the first column is returned.
pub fn unique_violation_column(err: &anyhow::Error) -> Option<String> {
    if !is_unique_violation(err) {
        return None;
    }
    let Some(rusqlite::Error::SqliteFailure(_, Some(message))) = err.downcast_ref::<rusqlite::Error>() else {
        return None;
    };
    let (_, columns) = message.split_once(':')?;
    let first = columns.split(',').next()?.trim();
    let column = first.rsplit('.').next()?;
    (!column.is_empty()).then(|| column.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_timestamp_format_sorts_lexicographically() {
        let a = Utc.with_ymd_and_hms(2024, 1, 9, 23, 59, 59).unwrap();
        let b = Utc.with_ymd_and_hms(2024, 1, 10, 0, 0, 0).unwrap();
        assert!(format_ts(a) < format_ts(b));
        assert_eq!(parse_ts(&format_ts(a)).unwrap(), a);
    }

    #[test]
    fn test_unique_violation_detected() {
        let db = Database::open_in_memory().unwrap();
        db.create_user("u1", "dana", "dana@example.com", "hash", Utc::now()).unwrap();
        let err = db
            .create_user("u2", "dana", "other@example.com", "hash", Utc::now())
            .unwrap_err();
        assert!(is_unique_violation(&err));
        assert!(!is_unique_violation(&anyhow::anyhow!("boom")));
        assert_eq!(unique_violation_column(&err).as_deref(), Some("username"));
    }

    #[test]
    fn test_unique_violation_names_email_column() {
        let db = Database::open_in_memory().unwrap();
        db.create_user("u1", "dana", "dana@example.com", "hash", Utc::now()).unwrap();
        let err = db
            .create_user("u2", "robin", "DANA@example.com", "hash", Utc::now())
            .unwrap_err();
        assert_eq!(unique_violation_column(&err).as_deref(), Some("email"));
        assert_eq!(unique_violation_column(&anyhow::anyhow!("boom")), None);
    }

    #[test]
    fn test_parse_sqlite_datetime() {
        let ts = parse_ts("2024-03-05 10:11:12").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2024, 3, 5, 10, 11, 12).unwrap());
        assert!(parse_ts("yesterday").is_err());
    }
}
