//! Database row types. These map directly to SQLite rows; `into_*` converts
//! them to the shared pulse-types models, tolerating corrupt cells with a
//! warning rather than failing a whole page of results.
use chrono::{DateTime, Utc};
use pulse_types::models::{Feedback, Issue, User};
use tracing::warn;
use uuid::Uuid;

use crate::parse_ts;

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: String,
    pub username: String,
    pub email: String,
    pub password: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone)]
pub struct FeedbackRow {
    pub id: String,
    pub user_id: String,
    pub username: String,
    pub sender_email: String,
    pub sender_name: Option<String>,
    pub subject: Option<String>,
    pub raw_json: String,
    pub average_rating: Option<f64>,
    pub summary: Option<String>,
    pub processed_at: Option<String>,
    pub received_at: String,
}

#[derive(Debug, Clone)]
pub struct IssueRow {
    pub id: String,
    pub username: String,
    pub issue_title: String,
    pub created_at: String,
}

fn uuid_or_default(raw: &str, what: &str, row_id: &str) -> Uuid {
    raw.parse().unwrap_or_else(|e| {
        warn!("Corrupt {} '{}' on row '{}': {}", what, raw, row_id, e);
        Uuid::default()
    })
}

fn ts_or_default(raw: &str, what: &str, row_id: &str) -> DateTime<Utc> {
    parse_ts(raw).unwrap_or_else(|e| {
        warn!("Corrupt {} on row '{}': {}", what, row_id, e);
        DateTime::default()
    })
}

impl UserRow {
    /// Public view of the account. The password hash never leaves the DB layer.
    pub fn into_user(self) -> User {
        User {
            id: uuid_or_default(&self.id, "id", &self.id),
            created_at: ts_or_default(&self.created_at, "created_at", &self.id),
            updated_at: ts_or_default(&self.updated_at, "updated_at", &self.id),
            username: self.username,
            email: self.email,
        }
    }
}

impl FeedbackRow {
    pub fn into_feedback(self) -> Feedback {
        let raw_json = serde_json::from_str(&self.raw_json).unwrap_or_else(|e| {
            warn!("Corrupt raw_json on feedback '{}': {}", self.id, e);
            serde_json::Value::Null
        });
        let processed_at = self
            .processed_at
            .as_deref()
            .map(|raw| ts_or_default(raw, "processed_at", &self.id));

        Feedback {
            id: uuid_or_default(&self.id, "id", &self.id),
            user_id: uuid_or_default(&self.user_id, "user_id", &self.id),
            received_at: ts_or_default(&self.received_at, "received_at", &self.id),
            processed_at,
            raw_json,
            username: self.username,
            sender_email: self.sender_email,
            sender_name: self.sender_name,
            subject: self.subject,
            average_rating: self.average_rating,
            summary: self.summary,
        }
    }
}

impl IssueRow {
    pub fn into_issue(self) -> Issue {
        Issue {
            id: uuid_or_default(&self.id, "id", &self.id),
            created_at: ts_or_default(&self.created_at, "created_at", &self.id),
            username: self.username,
            issue_title: self.issue_title,
        }
    }
}
