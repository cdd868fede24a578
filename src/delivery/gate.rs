use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

/// Serializes "mutate store, then enqueue events" per conversation so that
/// subscribers see events in commit order.
#[derive(Clone, Default)]
pub struct ConversationGate {
    locks: Arc<DashMap<Uuid, Arc<Mutex<()>>>>,
}

pub struct ConversationPermit {
    conversation_id: Uuid,
    guard: Option<OwnedMutexGuard<()>>,
    locks: Arc<DashMap<Uuid, Arc<Mutex<()>>>>,
}

impl ConversationGate {
    pub async fn acquire(&self, conversation_id: Uuid) -> ConversationPermit {
        let lock = self
            .locks
            .entry(conversation_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = lock.lock_owned().await;

        ConversationPermit {
            conversation_id,
            guard: Some(guard),
            locks: self.locks.clone(),
        }
    }

    pub fn tracked_conversations(&self) -> usize {
        self.locks.len()
    }
}

impl ConversationPermit {
    pub fn conversation_id(&self) -> Uuid {
        self.conversation_id
    }
}

impl Drop for ConversationPermit {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Only the map holds the lock once nobody waits on it.
        self.locks
            .remove_if(&self.conversation_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}
