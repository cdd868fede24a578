#![allow(dead_code)]

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Duration, Utc};
use marketplace_chat::domain::{Message, MessageKind, Role, User};
use uuid::Uuid;

static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

pub fn next_id() -> u64 {
    TEST_COUNTER.fetch_add(1, Ordering::SeqCst)
}

pub fn test_user() -> User {
    let id = next_id();
    User {
        id: Uuid::new_v4(),
        role: Role::User,
        username: Some(format!("chatter{id}")),
        full_name: Some(format!("Chat User {id}")),
        avatar_url: None,
        created_at: Utc::now() - Duration::days(1),
    }
}

pub fn text_message(
    conversation_id: Uuid,
    sender_id: Uuid,
    content: &str,
    created_at: DateTime<Utc>,
) -> Message {
    Message {
        id: Uuid::new_v4(),
        conversation_id,
        sender_id,
        content: content.to_string(),
        kind: MessageKind::Text,
        attachment: None,
        reply_to_id: None,
        is_read: false,
        read_at: None,
        edited: false,
        edited_at: None,
        reactions: Vec::new(),
        created_at,
    }
}
