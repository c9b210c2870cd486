use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A single piece of inbound feedback owned by one user.
///
/// `average_rating` is `None` when the sender gave no rating; a stored `0.0`
/// is a real (very low) rating. `processed_at` is `None` until the owner marks
/// the row processed, and never goes back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    pub id: Uuid,
    pub user_id: Uuid,
    pub username: String,
    pub sender_email: String,
    pub sender_name: Option<String>,
    pub subject: Option<String>,
    pub raw_json: serde_json::Value,
    pub average_rating: Option<f64>,
    pub summary: Option<String>,
    pub processed_at: Option<DateTime<Utc>>,
    pub received_at: DateTime<Utc>,
}

impl Feedback {
    pub fn is_processed(&self) -> bool {
        self.processed_at.is_some()
    }
}

/// A row of the `current_issues` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub id: Uuid,
    pub username: String,
    pub issue_title: String,
    pub created_at: DateTime<Utc>,
}
