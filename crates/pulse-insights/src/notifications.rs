use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{RwLock, mpsc};
use tracing::{debug, info};
use uuid::Uuid;

use pulse_types::events::GatewayEvent;

/// Only the most recent notifications are kept.
pub const MAX_NOTIFICATIONS: usize = 10;

/// Feedback rated below this is flagged high priority.
pub const LOW_RATING_ALERT: f64 = 3.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Feedback,
    Issue,
    Team,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub kind: NotificationKind,
    pub priority: Priority,
    pub title: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub read: bool,
}

impl Notification {
    fn new(kind: NotificationKind, priority: Priority, title: &str, message: String, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            priority,
            title: title.to_string(),
            message,
            created_at: now,
            read: false,
        }
    }

    /// Map a change-feed event to a notification. Events that are not row
    /// inserts (e.g. `Ready`) produce nothing.
    pub fn from_event(event: &GatewayEvent, now: DateTime<Utc>) -> Option<Self> {
        match event {
            GatewayEvent::FeedbackCreate { feedback, .. } => {
                let priority = match feedback.average_rating {
                    Some(rating) if rating < LOW_RATING_ALERT => Priority::High,
                    _ => Priority::Medium,
                };
                let from = feedback.sender_name.as_deref().unwrap_or(&feedback.sender_email);
                let message = match &feedback.subject {
                    Some(subject) => format!("{from}: {subject}"),
                    None => format!("New message from {from}"),
                };
                Some(Self::new(NotificationKind::Feedback, priority, "New feedback", message, now))
            }
            GatewayEvent::IssueCreate { issue, .. } => Some(Self::new(
                NotificationKind::Issue,
                Priority::High,
                "New issue",
                issue.issue_title.clone(),
                now,
            )),
            GatewayEvent::MemberJoin { user } => Some(Self::new(
                NotificationKind::Team,
                Priority::Low,
                "New team member",
                format!("{} joined the team", user.username),
                now,
            )),
            GatewayEvent::Ready { .. } => None,
        }
    }
}

/// Session-lifetime notification list, newest first. Nothing is persisted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationCenter {
    items: VecDeque<Notification>,
}

impl NotificationCenter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, notification: Notification) -> Uuid {
        let id = notification.id;
        self.items.push_front(notification);
        self.items.truncate(MAX_NOTIFICATIONS);
        id
    }

    pub fn push_system(&mut self, title: &str, message: impl Into<String>, priority: Priority, now: DateTime<Utc>) -> Uuid {
        self.push(Notification::new(NotificationKind::System, priority, title, message.into(), now))
    }

    pub fn apply_event(&mut self, event: &GatewayEvent, now: DateTime<Utc>) -> Option<Uuid> {
        Notification::from_event(event, now).map(|n| self.push(n))
    }

    /// unread → read. Returns true only on an actual transition.
    pub fn mark_read(&mut self, id: Uuid) -> bool {
        match self.items.iter_mut().find(|n| n.id == id) {
            Some(n) if !n.read => {
                n.read = true;
                true
            }
            _ => false,
        }
    }

    /// Returns how many notifications changed; a second call returns 0.
    pub fn mark_all_read(&mut self) -> usize {
        let mut changed = 0;
        for n in self.items.iter_mut().filter(|n| !n.read) {
            n.read = true;
            changed += 1;
        }
        changed
    }

    pub fn unread_count(&self) -> usize {
        self.items.iter().filter(|n| !n.read).count()
    }

    pub fn get(&self, id: Uuid) -> Option<&Notification> {
        self.items.iter().find(|n| n.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Notification> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Single consumer for the change feed. Runs until every sender is dropped.
pub async fn run_bridge(mut rx: mpsc::Receiver<GatewayEvent>, center: Arc<RwLock<NotificationCenter>>) {
    while let Some(event) = rx.recv().await {
        let id = center.write().await.apply_event(&event, Utc::now());
        if let Some(id) = id {
            debug!("Notification {} queued", id);
        }
    }
    info!("Notification bridge stopped: change feed closed");
}
