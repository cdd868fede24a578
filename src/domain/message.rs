use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::errors::DomainError;

pub const MAX_EMOJI_BYTES: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "message_kind", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    Image,
    File,
}

impl MessageKind {
    pub fn carries_attachment(&self) -> bool {
        matches!(self, MessageKind::Image | MessageKind::File)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub file_url: String,
    pub file_name: Option<String>,
    pub file_size: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Reaction {
    pub user_id: Uuid,
    pub emoji: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub content: String,
    pub kind: MessageKind,
    pub attachment: Option<Attachment>,
    pub reply_to_id: Option<Uuid>,
    pub is_read: bool,
    pub read_at: Option<DateTime<Utc>>,
    pub edited: bool,
    pub edited_at: Option<DateTime<Utc>>,
    pub reactions: Vec<Reaction>,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn cursor(&self) -> MessageCursor {
        MessageCursor {
            created_at: self.created_at,
            id: Some(self.id),
        }
    }

    pub fn has_reaction(&self, user_id: Uuid, emoji: &str) -> bool {
        self.reactions
            .iter()
            .any(|reaction| reaction.user_id == user_id && reaction.emoji == emoji)
    }

    pub fn preview(&self, max_chars: usize) -> String {
        preview_text(&self.content, max_chars)
    }
}

/// Keyset position in a newest-first page. Messages strictly older than the
/// cursor (by `created_at`, then `id`) come next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageCursor {
    pub created_at: DateTime<Utc>,
    pub id: Option<Uuid>,
}

impl MessageCursor {
    pub fn admits(&self, created_at: DateTime<Utc>, id: Uuid) -> bool {
        match self.id {
            Some(cursor_id) => (created_at, id) < (self.created_at, cursor_id),
            None => created_at < self.created_at,
        }
    }
}

/// Trims and bounds message content. Returns the normalized text.
pub fn validate_content(content: &str, max_chars: usize) -> Result<String, DomainError> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(DomainError::ValidationError(
            "message content must not be empty".to_string(),
        ));
    }
    if trimmed.chars().count() > max_chars {
        return Err(DomainError::ValidationError(format!(
            "message content must be at most {max_chars} characters"
        )));
    }
    Ok(trimmed.to_string())
}

pub fn validate_emoji(emoji: &str) -> Result<String, DomainError> {
    let trimmed = emoji.trim();
    if trimmed.is_empty() || trimmed.len() > MAX_EMOJI_BYTES {
        return Err(DomainError::ValidationError("invalid emoji".to_string()));
    }
    Ok(trimmed.to_string())
}

pub fn preview_text(content: &str, max_chars: usize) -> String {
    let mut chars = content.chars();
    let preview: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{preview}…")
    } else {
        preview
    }
}
