use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use super::store::StoreDeadline;
use crate::domain::{Conversation, LastMessageSnapshot, Message};
use crate::error::AppResult;
use crate::infrastructure::repositories::{ConversationRepository, MessageRepository};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadSync {
    pub cutoff: DateTime<Utc>,
    pub marked_read: u64,
    pub remaining_unread: i64,
}

/// Keeps per-message read flags and per-participant unread counters in step.
///
/// Counters only move through delta updates. A fetch subtracts what the
/// reader had observed when it started, so a send committing after the
/// mark-read step stays counted.
#[derive(Clone)]
pub struct ReadStateSynchronizer {
    conversation_repo: Arc<dyn ConversationRepository>,
    message_repo: Arc<dyn MessageRepository>,
    store: StoreDeadline,
}

impl ReadStateSynchronizer {
    pub fn new(
        conversation_repo: Arc<dyn ConversationRepository>,
        message_repo: Arc<dyn MessageRepository>,
        store: StoreDeadline,
    ) -> Self {
        Self {
            conversation_repo,
            message_repo,
            store,
        }
    }

    /// Stores `message` as the conversation's latest and counts it unread for
    /// every other active participant, in one store write. Returns the stored
    /// message and its recipients.
    pub async fn on_send(
        &self,
        conversation: &Conversation,
        message: &Message,
        snapshot: &LastMessageSnapshot,
    ) -> AppResult<(Message, Vec<Uuid>)> {
        let recipients = conversation.other_active_participant_ids(message.sender_id);
        let stored = self
            .store
            .run(
                "send message",
                self.message_repo
                    .insert_and_record(message, snapshot, &recipients),
            )
            .await?;
        Ok((stored, recipients))
    }

    /// `conversation` must be the state loaded at the start of the fetch, with
    /// the conversation gate held so no send commits in between.
    pub async fn on_fetch(
        &self,
        conversation: &Conversation,
        reader_id: Uuid,
        cutoff: DateTime<Utc>,
    ) -> AppResult<ReadSync> {
        let observed = conversation.unread_count_for(reader_id);

        let marked_read = self
            .store
            .run(
                "mark messages read",
                self.message_repo
                    .mark_read_except(conversation.id, reader_id, cutoff),
            )
            .await?;
        let remaining_unread = self
            .store
            .run(
                "reset unread",
                self.conversation_repo
                    .reset_unread(conversation.id, reader_id, observed),
            )
            .await?;

        debug!(
            conversation_id = %conversation.id,
            reader_id = %reader_id,
            observed,
            marked_read,
            remaining_unread,
            "read state synchronized"
        );
        Ok(ReadSync {
            cutoff,
            marked_read,
            remaining_unread,
        })
    }
}
