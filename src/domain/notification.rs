use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

pub const CHAT_MESSAGE_NOTIFICATION: &str = "chat_message";

/// Durable notification handed to the notification collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct NotificationRecord {
    pub id: Uuid,
    pub recipient_id: Uuid,
    pub kind: String,
    pub title: String,
    pub message: String,
    pub conversation_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl NotificationRecord {
    pub fn chat_message(
        recipient_id: Uuid,
        conversation_id: Uuid,
        sender_name: &str,
        preview: &str,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            recipient_id,
            kind: CHAT_MESSAGE_NOTIFICATION.to_string(),
            title: format!("New message from {sender_name}"),
            message: preview.to_string(),
            conversation_id,
            created_at,
        }
    }
}
