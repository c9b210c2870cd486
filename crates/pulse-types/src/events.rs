use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Feedback, Issue, User};

/// Events sent over the WebSocket gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayEvent {
    /// Server confirms successful authentication
    Ready { user_id: Uuid, username: String },

    /// A feedback row was inserted for `owner_id`
    FeedbackCreate { owner_id: Uuid, feedback: Feedback },

    /// An issue row was inserted for `owner_id`
    IssueCreate { owner_id: Uuid, issue: Issue },

    /// A new account joined the team
    MemberJoin { user: User },
}

impl GatewayEvent {
    /// Returns the owning user if this event is an owner-scoped row insert.
    /// Events that return `None` are global and go to every session.
    pub fn owner_id(&self) -> Option<Uuid> {
        match self {
            Self::FeedbackCreate { owner_id, .. } => Some(*owner_id),
            Self::IssueCreate { owner_id, .. } => Some(*owner_id),
            Self::Ready { user_id, .. } => Some(*user_id),
            Self::MemberJoin { .. } => None,
        }
    }
}

/// Commands sent FROM client TO server over WebSocket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayCommand {
    /// Authenticate the WebSocket connection
    Identify { token: String },
}
