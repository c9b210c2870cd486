use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id          TEXT PRIMARY KEY,
            username    TEXT NOT NULL UNIQUE COLLATE NOCASE,
            email       TEXT NOT NULL UNIQUE COLLATE NOCASE,
            password    TEXT NOT NULL,
            created_at  TEXT NOT NULL,
            updated_at  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS feedbacks (
            id              TEXT PRIMARY KEY,
            user_id         TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            username        TEXT NOT NULL,
            sender_email    TEXT NOT NULL,
            sender_name     TEXT,
            subject         TEXT,
            raw_json        TEXT NOT NULL DEFAULT 'null',
            average_rating  REAL CHECK (average_rating IS NULL OR average_rating BETWEEN 0 AND 5),
            summary         TEXT,
            processed_at    TEXT,
            received_at     TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_feedbacks_owner
            ON feedbacks(user_id, received_at);

        CREATE TABLE IF NOT EXISTS current_issues (
            id          TEXT PRIMARY KEY,
            username    TEXT NOT NULL REFERENCES users(username)
                            ON UPDATE CASCADE ON DELETE CASCADE,
            issue_title TEXT NOT NULL,
            created_at  TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_issues_owner
            ON current_issues(username, created_at);

        CREATE TABLE IF NOT EXISTS password_resets (
            token_hash  TEXT PRIMARY KEY,
            user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            expires_at  TEXT NOT NULL,
            used_at     TEXT
        );
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
