use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::DomainError;

pub const MAX_GROUP_NAME_LENGTH: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "conversation_kind", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ConversationKind {
    Direct,
    Group,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "participant_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ParticipantRole {
    Member,
    Admin,
}

/// Sorted pair of user ids identifying a direct conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DirectKey(Uuid, Uuid);

impl DirectKey {
    pub fn new(a: Uuid, b: Uuid) -> Result<Self, DomainError> {
        if a == b {
            return Err(DomainError::ValidationError(
                "a direct conversation needs two distinct users".to_string(),
            ));
        }
        Ok(if a < b { Self(a, b) } else { Self(b, a) })
    }

    pub fn first(&self) -> Uuid {
        self.0
    }

    pub fn second(&self) -> Uuid {
        self.1
    }

    pub fn contains(&self, user_id: Uuid) -> bool {
        self.0 == user_id || self.1 == user_id
    }

    pub fn parse(value: &str) -> Option<Self> {
        let (first, second) = value.split_once(':')?;
        let first = Uuid::parse_str(first).ok()?;
        let second = Uuid::parse_str(second).ok()?;
        Self::new(first, second).ok()
    }
}

impl fmt::Display for DirectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.0, self.1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationSettings {
    pub allow_reactions: bool,
    pub allow_replies: bool,
    pub allow_file_sharing: bool,
    pub only_admins_can_send: bool,
    pub allow_member_invites: bool,
}

impl Default for ConversationSettings {
    fn default() -> Self {
        Self {
            allow_reactions: true,
            allow_replies: true,
            allow_file_sharing: true,
            only_admins_can_send: false,
            allow_member_invites: true,
        }
    }
}

impl ConversationSettings {
    /// Group-only switches have no meaning on direct conversations.
    pub fn for_kind(mut self, kind: ConversationKind) -> Self {
        if kind == ConversationKind::Direct {
            self.only_admins_can_send = false;
            self.allow_member_invites = false;
        }
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub user_id: Uuid,
    pub role: ParticipantRole,
    pub is_active: bool,
    pub joined_at: DateTime<Utc>,
    pub last_seen_at: Option<DateTime<Utc>>,
}

impl Participant {
    pub fn joined(user_id: Uuid, role: ParticipantRole, joined_at: DateTime<Utc>) -> Self {
        Self {
            user_id,
            role,
            is_active: true,
            joined_at,
            last_seen_at: None,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == ParticipantRole::Admin
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastMessageSnapshot {
    pub message_id: Uuid,
    pub preview: String,
    pub sender_id: Uuid,
    pub sent_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: Uuid,
    pub kind: ConversationKind,
    pub name: Option<String>,
    pub direct_key: Option<DirectKey>,
    pub participants: Vec<Participant>,
    pub last_message: Option<LastMessageSnapshot>,
    pub message_count: i64,
    pub unread_counts: HashMap<Uuid, i64>,
    pub settings: ConversationSettings,
    pub is_active: bool,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    pub fn new_direct(key: DirectKey, created_by: Uuid, now: DateTime<Utc>) -> Self {
        let participants = vec![
            Participant::joined(key.first(), ParticipantRole::Member, now),
            Participant::joined(key.second(), ParticipantRole::Member, now),
        ];
        let unread_counts = participants.iter().map(|p| (p.user_id, 0)).collect();

        Self {
            id: Uuid::new_v4(),
            kind: ConversationKind::Direct,
            name: None,
            direct_key: Some(key),
            participants,
            last_message: None,
            message_count: 0,
            unread_counts,
            settings: ConversationSettings::default().for_kind(ConversationKind::Direct),
            is_active: true,
            created_by,
            created_at: now,
            updated_at: now,
        }
    }

    /// The creator becomes the first admin; duplicate member ids collapse.
    pub fn new_group(
        name: &str,
        creator_id: Uuid,
        member_ids: &[Uuid],
        settings: ConversationSettings,
        now: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DomainError::ValidationError(
                "group conversations require a name".to_string(),
            ));
        }
        if name.chars().count() > MAX_GROUP_NAME_LENGTH {
            return Err(DomainError::ValidationError(format!(
                "group name must be at most {MAX_GROUP_NAME_LENGTH} characters"
            )));
        }

        let mut participants = vec![Participant::joined(
            creator_id,
            ParticipantRole::Admin,
            now,
        )];
        for member_id in member_ids {
            if participants.iter().any(|p| p.user_id == *member_id) {
                continue;
            }
            participants.push(Participant::joined(
                *member_id,
                ParticipantRole::Member,
                now,
            ));
        }
        if participants.len() < 2 {
            return Err(DomainError::ValidationError(
                "a group needs at least one other participant".to_string(),
            ));
        }

        let unread_counts = participants.iter().map(|p| (p.user_id, 0)).collect();
        Ok(Self {
            id: Uuid::new_v4(),
            kind: ConversationKind::Group,
            name: Some(name.to_string()),
            direct_key: None,
            participants,
            last_message: None,
            message_count: 0,
            unread_counts,
            settings: settings.for_kind(ConversationKind::Group),
            is_active: true,
            created_by: creator_id,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn is_group(&self) -> bool {
        self.kind == ConversationKind::Group
    }

    pub fn participant(&self, user_id: Uuid) -> Option<&Participant> {
        self.participants.iter().find(|p| p.user_id == user_id)
    }

    pub fn active_participant(&self, user_id: Uuid) -> Option<&Participant> {
        self.participant(user_id).filter(|p| p.is_active)
    }

    pub fn active_participant_ids(&self) -> Vec<Uuid> {
        self.participants
            .iter()
            .filter(|p| p.is_active)
            .map(|p| p.user_id)
            .collect()
    }

    /// Active participants other than `user_id`, in join order.
    pub fn other_active_participant_ids(&self, user_id: Uuid) -> Vec<Uuid> {
        self.participants
            .iter()
            .filter(|p| p.is_active && p.user_id != user_id)
            .map(|p| p.user_id)
            .collect()
    }

    pub fn unread_count_for(&self, user_id: Uuid) -> i64 {
        self.unread_counts.get(&user_id).copied().unwrap_or(0)
    }
}
