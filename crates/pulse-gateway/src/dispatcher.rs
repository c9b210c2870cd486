use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::{RwLock, broadcast};
use tracing::trace;
use uuid::Uuid;

use pulse_types::events::GatewayEvent;

/// Manages connected sessions and fans out change events.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    /// Every session receives every event and filters by owner itself
    broadcast_tx: broadcast::Sender<GatewayEvent>,

    /// Open sessions: user_id -> conn_ids (one user may have several tabs)
    sessions: RwLock<HashMap<Uuid, HashSet<Uuid>>>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        let (broadcast_tx, _) = broadcast::channel(1024);
        Self {
            inner: Arc::new(DispatcherInner {
                broadcast_tx,
                sessions: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Subscribe to gateway events. Returns a broadcast receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<GatewayEvent> {
        self.inner.broadcast_tx.subscribe()
    }

    /// Publish an event. Having no listeners is not an error.
    pub fn broadcast(&self, event: GatewayEvent) {
        match self.inner.broadcast_tx.send(event) {
            Ok(n) => trace!("Gateway event delivered to {} receivers", n),
            Err(_) => trace!("Gateway event dropped: no receivers"),
        }
    }

    /// Register a session for `user_id`. Returns its conn_id.
    pub async fn open_session(&self, user_id: Uuid) -> Uuid {
        let conn_id = Uuid::new_v4();
        self.inner
            .sessions
            .write()
            .await
            .entry(user_id)
            .or_default()
            .insert(conn_id);
        conn_id
    }

    /// Remove one session. Other sessions of the same user are untouched.
    pub async fn close_session(&self, user_id: Uuid, conn_id: Uuid) {
        let mut sessions = self.inner.sessions.write().await;
        if let Some(conns) = sessions.get_mut(&user_id) {
            conns.remove(&conn_id);
            if conns.is_empty() {
                sessions.remove(&user_id);
            }
        }
    }

    pub async fn is_online(&self, user_id: Uuid) -> bool {
        self.inner.sessions.read().await.contains_key(&user_id)
    }

    pub async fn online_users(&self) -> Vec<Uuid> {
        self.inner.sessions.read().await.keys().copied().collect()
    }
}

/// Owner scoping for the feed: row inserts go only to their owner's
/// sessions, global events go to everyone.
pub fn should_forward(event: &GatewayEvent, user_id: Uuid) -> bool {
    event.owner_id().is_none_or(|owner| owner == user_id)
}
