use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::api::dtos::MessageResponse;
use crate::domain::Reaction;

#[derive(Debug, Clone, Serialize)]
pub struct MessageEditedPayload {
    pub conversation_id: Uuid,
    pub message_id: Uuid,
    pub content: String,
    pub edited: bool,
    pub edited_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MessageDeletedPayload {
    pub conversation_id: Uuid,
    pub message_id: Uuid,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReactionChangedPayload {
    pub conversation_id: Uuid,
    pub message_id: Uuid,
    pub reactions: Vec<Reaction>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MessageNotificationPayload {
    pub conversation_id: Uuid,
    pub message_id: Uuid,
    pub sender_id: Uuid,
    pub preview: String,
    pub unread_delta: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TypingPayload {
    pub conversation_id: Uuid,
    pub user_id: Uuid,
    pub is_typing: bool,
}

/// Event pushed to live sessions as `{"type": ..., "payload": ...}`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum DeliveryEvent {
    MessageCreated(MessageResponse),
    MessageEdited(MessageEditedPayload),
    MessageDeleted(MessageDeletedPayload),
    ReactionChanged(ReactionChangedPayload),
    MessageNotification(MessageNotificationPayload),
    Typing(TypingPayload),
}

impl DeliveryEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            DeliveryEvent::MessageCreated(_) => "message_created",
            DeliveryEvent::MessageEdited(_) => "message_edited",
            DeliveryEvent::MessageDeleted(_) => "message_deleted",
            DeliveryEvent::ReactionChanged(_) => "reaction_changed",
            DeliveryEvent::MessageNotification(_) => "message_notification",
            DeliveryEvent::Typing(_) => "typing",
        }
    }

    pub fn to_frame(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
