use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::domain::{Attachment, MessageKind, Reaction};

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AttachmentRequest {
    #[validate(length(min = 1, max = 2048, message = "file_url must be 1-2048 characters"))]
    pub file_url: String,
    #[validate(length(max = 255, message = "file_name must be at most 255 characters"))]
    pub file_name: Option<String>,
    #[validate(range(min = 0, message = "file_size must not be negative"))]
    pub file_size: Option<i64>,
}

impl From<AttachmentRequest> for Attachment {
    fn from(request: AttachmentRequest) -> Self {
        Self {
            file_url: request.file_url,
            file_name: request.file_name,
            file_size: request.file_size,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SendMessageRequest {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub kind: Option<MessageKind>,
    #[serde(default)]
    pub reply_to_id: Option<Uuid>,
    #[serde(default)]
    #[validate(nested)]
    pub attachment: Option<AttachmentRequest>,
}

impl SendMessageRequest {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            kind: None,
            reply_to_id: None,
            attachment: None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct EditMessageRequest {
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct ReactionRequest {
    pub emoji: String,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct MessagePageQuery {
    #[validate(range(min = 1, max = 100, message = "limit must be between 1 and 100"))]
    pub limit: Option<i64>,
    pub before: Option<DateTime<Utc>>,
    pub before_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    pub file_name: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct SenderResponse {
    pub id: Uuid,
    pub display_name: String,
    pub username: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ReplyPreviewResponse {
    pub id: Uuid,
    pub sender: SenderResponse,
    pub preview: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MessageResponse {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender: SenderResponse,
    pub content: String,
    pub kind: MessageKind,
    pub attachment: Option<Attachment>,
    pub reply_to: Option<ReplyPreviewResponse>,
    pub is_read: bool,
    pub read_at: Option<DateTime<Utc>>,
    pub edited: bool,
    pub edited_at: Option<DateTime<Utc>>,
    pub reactions: Vec<Reaction>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct CursorResponse {
    pub before: DateTime<Utc>,
    pub before_id: Uuid,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessagePageResponse {
    pub messages: Vec<MessageResponse>,
    pub has_more: bool,
    pub next_cursor: Option<CursorResponse>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageEditedResponse {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub content: String,
    pub edited: bool,
    pub edited_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageDeletedResponse {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub deleted: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReactionsResponse {
    pub message_id: Uuid,
    pub reactions: Vec<Reaction>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AttachmentResponse {
    pub file_url: String,
    pub file_name: String,
    pub file_size: i64,
    pub kind: MessageKind,
}
