use crate::models::{IssueRow, UserRow};
use crate::{Database, format_ts};
use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, Row};

const USER_COLUMNS: &str = "id, username, email, password, created_at, updated_at";
const ISSUE_COLUMNS: &str = "id, username, issue_title, created_at";

impl Database {
    // -- Users --

    pub fn create_user(
        &self,
        id: &str,
        username: &str,
        email: &str,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let now = format_ts(now);
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, username, email, password, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                (id, username, email, password_hash, &now),
            )?;
            Ok(())
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email", email))
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "username", username))
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", id))
    }

    /// Case-insensitive, matching the column collation.
    pub fn username_taken(&self, username: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let n: i64 = conn.query_row(
                "SELECT COUNT(*) FROM users WHERE username = ?1",
                [username],
                |row| row.get(0),
            )?;
            Ok(n > 0)
        })
    }

    /// Team roster: every account, oldest first.
    pub fn list_users(&self) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY created_at ASC");
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], map_user)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Update username and/or email. The denormalised `feedbacks.username`
    /// is rewritten in the same transaction; issues follow via ON UPDATE CASCADE.
    pub fn update_profile(
        &self,
        id: &str,
        username: Option<&str>,
        email: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Option<UserRow>> {
        let now = format_ts(now);
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let updated = tx.execute(
                "UPDATE users
                 SET username = COALESCE(?2, username),
                     email = COALESCE(?3, email),
                     updated_at = ?4
                 WHERE id = ?1",
                (id, username, email, &now),
            )?;
            if updated == 0 {
                return Ok(None);
            }
            if let Some(username) = username {
                tx.execute(
                    "UPDATE feedbacks SET username = ?2 WHERE user_id = ?1",
                    (id, username),
                )?;
            }
            let row = query_user(&tx, "id", id)?;
            tx.commit()?;
            Ok(row)
        })
    }

    pub fn update_password(&self, id: &str, password_hash: &str, now: DateTime<Utc>) -> Result<bool> {
        let now = format_ts(now);
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE users SET password = ?2, updated_at = ?3 WHERE id = ?1",
                (id, password_hash, &now),
            )?;
            Ok(n > 0)
        })
    }

    // -- Password resets --

    pub fn create_password_reset(
        &self,
        token_hash: &str,
        user_id: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        let expires_at = format_ts(expires_at);
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO password_resets (token_hash, user_id, expires_at) VALUES (?1, ?2, ?3)",
                (token_hash, user_id, &expires_at),
            )?;
            Ok(())
        })
    }

    /// Burn a reset token. Returns the owning user id if the token existed,
    /// was unused and had not expired at `now`.
    pub fn consume_password_reset(&self, token_hash: &str, now: DateTime<Utc>) -> Result<Option<String>> {
        let now = format_ts(now);
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let user_id: Option<String> = tx
                .query_row(
                    "SELECT user_id FROM password_resets
                     WHERE token_hash = ?1 AND used_at IS NULL AND expires_at > ?2",
                    (token_hash, &now),
                    |row| row.get(0),
                )
                .optional()?;
            if user_id.is_some() {
                tx.execute(
                    "UPDATE password_resets SET used_at = ?2 WHERE token_hash = ?1",
                    (token_hash, &now),
                )?;
            }
            tx.commit()?;
            Ok(user_id)
        })
    }

    // -- Issues --

    pub fn insert_issue(&self, row: &IssueRow) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO current_issues (id, username, issue_title, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                (&row.id, &row.username, &row.issue_title, &row.created_at),
            )?;
            Ok(())
        })
    }

    /// Issues owned by `username`, newest first.
    pub fn list_issues(&self, username: &str, limit: u32) -> Result<Vec<IssueRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {ISSUE_COLUMNS} FROM current_issues
                 WHERE username = ?1
                 ORDER BY created_at DESC, rowid DESC
                 LIMIT ?2"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params![username, limit], map_issue)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn update_issue_title(&self, username: &str, id: &str, title: &str) -> Result<Option<IssueRow>> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE current_issues SET issue_title = ?3 WHERE id = ?1 AND username = ?2",
                (id, username, title),
            )?;
            if n == 0 {
                return Ok(None);
            }
            let sql = format!("SELECT {ISSUE_COLUMNS} FROM current_issues WHERE id = ?1");
            let row = conn.query_row(&sql, [id], map_issue).optional()?;
            Ok(row)
        })
    }

    pub fn delete_issue(&self, username: &str, id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "DELETE FROM current_issues WHERE id = ?1 AND username = ?2",
                (id, username),
            )?;
            Ok(n > 0)
        })
    }
}

fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>> {
    // `column` is always one of our literals above, never user input.
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = ?1");
    let mut stmt = conn.prepare(&sql)?;
    let row = stmt.query_row([value], map_user).optional()?;
    Ok(row)
}

fn map_user(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

fn map_issue(row: &Row<'_>) -> rusqlite::Result<IssueRow> {
    Ok(IssueRow {
        id: row.get(0)?,
        username: row.get(1)?,
        issue_title: row.get(2)?,
        created_at: row.get(3)?,
    })
}

/// Extension trait for optional query results
pub(crate) trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
