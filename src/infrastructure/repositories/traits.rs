use crate::domain::{
    Conversation, ConversationSettings, DirectKey, LastMessageSnapshot, Message, MessageCursor,
    NotificationRecord, Reaction, User,
};
use crate::error::AppResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>>;
    async fn find_by_ids(&self, ids: &[Uuid]) -> AppResult<Vec<User>> {
        let mut users = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(user) = self.find_by_id(*id).await? {
                users.push(user);
            }
        }
        Ok(users)
    }
}

#[async_trait]
pub trait ConversationRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Conversation>>;
    async fn find_active_direct(&self, key: &DirectKey) -> AppResult<Option<Conversation>>;
    /// Fails with `Conflict` when an active direct conversation already owns the key.
    async fn insert(&self, conversation: &Conversation) -> AppResult<Conversation>;
    async fn list_for_user(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<Conversation>>;

    /// Subtracts `observed` from the counter, floored at zero. Returns what is left.
    async fn reset_unread(&self, id: Uuid, user_id: Uuid, observed: i64) -> AppResult<i64>;

    async fn add_participants(
        &self,
        id: Uuid,
        user_ids: &[Uuid],
        joined_at: DateTime<Utc>,
    ) -> AppResult<()>;
    async fn deactivate_participant(&self, id: Uuid, user_id: Uuid) -> AppResult<bool>;
    async fn update_settings(&self, id: Uuid, settings: &ConversationSettings) -> AppResult<()>;
    async fn touch_last_seen(&self, id: Uuid, user_id: Uuid, at: DateTime<Utc>) -> AppResult<()>;
}

#[async_trait]
pub trait MessageRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Message>>;
    async fn find_by_ids(&self, ids: &[Uuid]) -> AppResult<Vec<Message>>;
    async fn insert(&self, message: &Message) -> AppResult<Message>;
    /// Inserts the message, makes it the conversation's last message
    /// (`message_count + 1`) and bumps each recipient's unread counter, all in
    /// one transaction.
    async fn insert_and_record(
        &self,
        message: &Message,
        snapshot: &LastMessageSnapshot,
        recipients: &[Uuid],
    ) -> AppResult<Message>;

    /// Newest first, strictly older than `cursor` when one is given.
    async fn list_page(
        &self,
        conversation_id: Uuid,
        cursor: Option<MessageCursor>,
        limit: i64,
    ) -> AppResult<Vec<Message>>;

    async fn update_content(
        &self,
        id: Uuid,
        content: &str,
        edited_at: DateTime<Utc>,
    ) -> AppResult<Option<Message>>;
    /// Deletes the message and decrements `message_count` in one transaction.
    /// If the snapshot pointed at it, the newest remaining message takes its
    /// place. Returns false when the message did not exist.
    async fn delete_and_record(&self, id: Uuid, preview_chars: usize) -> AppResult<bool>;

    /// Fails with `Conflict` if the user already reacted with this emoji.
    async fn add_reaction(&self, message_id: Uuid, reaction: &Reaction)
        -> AppResult<Vec<Reaction>>;
    async fn remove_reaction(
        &self,
        message_id: Uuid,
        user_id: Uuid,
        emoji: &str,
    ) -> AppResult<Vec<Reaction>>;

    /// Marks messages created at or before `cutoff` and not sent by the reader
    /// as read. Returns how many flipped.
    async fn mark_read_except(
        &self,
        conversation_id: Uuid,
        reader_id: Uuid,
        cutoff: DateTime<Utc>,
    ) -> AppResult<u64>;
}

#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn create(&self, record: &NotificationRecord) -> AppResult<NotificationRecord>;
}
