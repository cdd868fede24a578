use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::domain::{
    Conversation, ConversationKind, ConversationSettings, LastMessageSnapshot, Participant,
    ParticipantRole,
};

#[derive(Debug, Deserialize)]
pub struct DirectConversationRequest {
    pub user_id: Uuid,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateGroupRequest {
    #[validate(length(min = 1, max = 100, message = "name must be 1-100 characters"))]
    pub name: String,
    #[validate(length(min = 1, message = "at least one participant is required"))]
    pub participant_ids: Vec<Uuid>,
    #[serde(default)]
    pub settings: Option<SettingsRequest>,
}

/// Partial settings update. Absent fields keep their current value.
#[derive(Debug, Default, Deserialize)]
pub struct SettingsRequest {
    pub allow_reactions: Option<bool>,
    pub allow_replies: Option<bool>,
    pub allow_file_sharing: Option<bool>,
    pub only_admins_can_send: Option<bool>,
    pub allow_member_invites: Option<bool>,
}

impl SettingsRequest {
    pub fn apply_to(&self, mut settings: ConversationSettings) -> ConversationSettings {
        if let Some(value) = self.allow_reactions {
            settings.allow_reactions = value;
        }
        if let Some(value) = self.allow_replies {
            settings.allow_replies = value;
        }
        if let Some(value) = self.allow_file_sharing {
            settings.allow_file_sharing = value;
        }
        if let Some(value) = self.only_admins_can_send {
            settings.only_admins_can_send = value;
        }
        if let Some(value) = self.allow_member_invites {
            settings.allow_member_invites = value;
        }
        settings
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct InviteParticipantsRequest {
    #[validate(length(min = 1, message = "at least one user is required"))]
    pub user_ids: Vec<Uuid>,
}

#[derive(Debug, Serialize, Clone)]
pub struct ParticipantResponse {
    pub user_id: Uuid,
    pub role: ParticipantRole,
    pub is_active: bool,
    pub joined_at: DateTime<Utc>,
    pub last_seen_at: Option<DateTime<Utc>>,
}

impl From<&Participant> for ParticipantResponse {
    fn from(participant: &Participant) -> Self {
        Self {
            user_id: participant.user_id,
            role: participant.role,
            is_active: participant.is_active,
            joined_at: participant.joined_at,
            last_seen_at: participant.last_seen_at,
        }
    }
}

#[derive(Debug, Serialize, Clone)]
pub struct LastMessageResponse {
    pub message_id: Uuid,
    pub preview: String,
    pub sender_id: Uuid,
    pub sent_at: DateTime<Utc>,
}

impl From<&LastMessageSnapshot> for LastMessageResponse {
    fn from(snapshot: &LastMessageSnapshot) -> Self {
        Self {
            message_id: snapshot.message_id,
            preview: snapshot.preview.clone(),
            sender_id: snapshot.sender_id,
            sent_at: snapshot.sent_at,
        }
    }
}

#[derive(Debug, Serialize, Clone)]
pub struct ConversationResponse {
    pub id: Uuid,
    pub kind: ConversationKind,
    pub name: Option<String>,
    pub participants: Vec<ParticipantResponse>,
    pub last_message: Option<LastMessageResponse>,
    pub message_count: i64,
    pub unread_count: i64,
    pub settings: ConversationSettings,
    pub is_active: bool,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ConversationResponse {
    /// Renders the conversation as seen by `viewer_id` (their own unread count).
    pub fn for_viewer(conversation: &Conversation, viewer_id: Uuid) -> Self {
        Self {
            id: conversation.id,
            kind: conversation.kind,
            name: conversation.name.clone(),
            participants: conversation
                .participants
                .iter()
                .map(ParticipantResponse::from)
                .collect(),
            last_message: conversation
                .last_message
                .as_ref()
                .map(LastMessageResponse::from),
            message_count: conversation.message_count,
            unread_count: conversation.unread_count_for(viewer_id),
            settings: conversation.settings,
            is_active: conversation.is_active,
            created_by: conversation.created_by,
            created_at: conversation.created_at,
            updated_at: conversation.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DirectConversationResponse {
    #[serde(flatten)]
    pub conversation: ConversationResponse,
    pub created: bool,
}
