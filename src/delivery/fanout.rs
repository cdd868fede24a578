use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use super::events::DeliveryEvent;
use super::gate::ConversationGate;

struct SessionEntry {
    user_id: Uuid,
    sender: mpsc::UnboundedSender<String>,
    conversations: HashSet<Uuid>,
}

#[derive(Default)]
struct Registry {
    sessions: DashMap<Uuid, SessionEntry>,
    by_conversation: DashMap<Uuid, HashSet<Uuid>>,
    by_user: DashMap<Uuid, HashSet<Uuid>>,
    delivered: AtomicU64,
    dropped: AtomicU64,
}

/// A connected session's end of the fan-out.
pub struct SessionHandle {
    pub session_id: Uuid,
    pub user_id: Uuid,
    pub receiver: mpsc::UnboundedReceiver<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanoutStats {
    pub sessions: usize,
    pub delivered: u64,
    pub dropped: u64,
}

/// Publish/subscribe registry for conversation channels and personal
/// (per-user) channels. Delivery is best effort and never blocks: each
/// session drains its own unbounded queue.
#[derive(Clone, Default)]
pub struct DeliveryFanout {
    registry: Arc<Registry>,
    gate: ConversationGate,
}

impl DeliveryFanout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gate(&self) -> &ConversationGate {
        &self.gate
    }

    /// Registers a session on its owner's personal channel.
    pub fn connect(&self, user_id: Uuid) -> SessionHandle {
        let (sender, receiver) = mpsc::unbounded_channel();
        let session_id = Uuid::new_v4();

        self.registry.sessions.insert(
            session_id,
            SessionEntry {
                user_id,
                sender,
                conversations: HashSet::new(),
            },
        );
        self.registry
            .by_user
            .entry(user_id)
            .or_default()
            .insert(session_id);

        debug!(session_id = %session_id, user_id = %user_id, "delivery session connected");
        SessionHandle {
            session_id,
            user_id,
            receiver,
        }
    }

    pub fn disconnect(&self, session_id: Uuid) {
        let Some((_, entry)) = self.registry.sessions.remove(&session_id) else {
            return;
        };

        for conversation_id in &entry.conversations {
            remove_member(&self.registry.by_conversation, *conversation_id, session_id);
        }
        remove_member(&self.registry.by_user, entry.user_id, session_id);

        debug!(session_id = %session_id, user_id = %entry.user_id, "delivery session disconnected");
    }

    /// Returns false when the session is unknown (already disconnected).
    pub fn subscribe(&self, session_id: Uuid, conversation_id: Uuid) -> bool {
        {
            let Some(mut entry) = self.registry.sessions.get_mut(&session_id) else {
                return false;
            };
            entry.conversations.insert(conversation_id);
        }
        self.index_subscription(session_id, conversation_id)
    }

    /// A disconnect that ran between the session update and this insert has
    /// already swept the index, so the membership is taken back out.
    fn index_subscription(&self, session_id: Uuid, conversation_id: Uuid) -> bool {
        self.registry
            .by_conversation
            .entry(conversation_id)
            .or_default()
            .insert(session_id);
        if self.registry.sessions.contains_key(&session_id) {
            return true;
        }
        remove_member(&self.registry.by_conversation, conversation_id, session_id);
        false
    }

    pub fn unsubscribe(&self, session_id: Uuid, conversation_id: Uuid) {
        if let Some(mut entry) = self.registry.sessions.get_mut(&session_id) {
            entry.conversations.remove(&conversation_id);
        }
        remove_member(&self.registry.by_conversation, conversation_id, session_id);
    }

    /// Drops every session of `user_id` from the conversation channel. The
    /// personal channel stays connected. Returns how many were removed.
    pub fn unsubscribe_user(&self, user_id: Uuid, conversation_id: Uuid) -> usize {
        let session_ids: Vec<Uuid> = self
            .registry
            .by_user
            .get(&user_id)
            .map(|sessions| sessions.iter().copied().collect())
            .unwrap_or_default();

        let mut removed = 0;
        for session_id in session_ids {
            if self.is_subscribed(session_id, conversation_id) {
                removed += 1;
            }
            self.unsubscribe(session_id, conversation_id);
        }
        if removed > 0 {
            debug!(user_id = %user_id, conversation_id = %conversation_id, removed, "user unsubscribed from conversation");
        }
        removed
    }

    pub fn publish_to_conversation(&self, conversation_id: Uuid, event: &DeliveryEvent) -> usize {
        let targets: Vec<Uuid> = self
            .registry
            .by_conversation
            .get(&conversation_id)
            .map(|sessions| sessions.iter().copied().collect())
            .unwrap_or_default();
        self.deliver(&targets, event)
    }

    pub fn publish_to_users(&self, user_ids: &[Uuid], event: &DeliveryEvent) -> usize {
        let targets: Vec<Uuid> = user_ids
            .iter()
            .filter_map(|user_id| self.registry.by_user.get(user_id))
            .flat_map(|sessions| sessions.iter().copied().collect::<Vec<_>>())
            .collect();
        self.deliver(&targets, event)
    }

    pub fn is_subscribed(&self, session_id: Uuid, conversation_id: Uuid) -> bool {
        self.registry
            .sessions
            .get(&session_id)
            .is_some_and(|entry| entry.conversations.contains(&conversation_id))
    }

    pub fn stats(&self) -> FanoutStats {
        FanoutStats {
            sessions: self.registry.sessions.len(),
            delivered: self.registry.delivered.load(Ordering::Relaxed),
            dropped: self.registry.dropped.load(Ordering::Relaxed),
        }
    }

    fn deliver(&self, session_ids: &[Uuid], event: &DeliveryEvent) -> usize {
        if session_ids.is_empty() {
            return 0;
        }

        let frame = match event.to_frame() {
            Ok(frame) => frame,
            Err(error) => {
                warn!(event = event.kind(), error = %error, "failed to encode delivery event");
                return 0;
            }
        };

        let mut delivered = 0;
        let mut closed = Vec::new();
        for session_id in session_ids {
            let sender = match self.registry.sessions.get(session_id) {
                Some(entry) => entry.sender.clone(),
                None => continue,
            };
            if sender.send(frame.clone()).is_ok() {
                delivered += 1;
            } else {
                closed.push(*session_id);
            }
        }

        self.registry
            .delivered
            .fetch_add(delivered as u64, Ordering::Relaxed);
        if !closed.is_empty() {
            self.registry
                .dropped
                .fetch_add(closed.len() as u64, Ordering::Relaxed);
            for session_id in closed {
                self.disconnect(session_id);
            }
        }
        delivered
    }
}

fn remove_member(index: &DashMap<Uuid, HashSet<Uuid>>, key: Uuid, session_id: Uuid) {
    if let Some(mut members) = index.get_mut(&key) {
        members.remove(&session_id);
    }
    index.remove_if(&key, |_, members| members.is_empty());
}
