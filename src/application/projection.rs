use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use uuid::Uuid;

use super::store::StoreDeadline;
use crate::api::dtos::{MessageResponse, ReplyPreviewResponse, SenderResponse};
use crate::domain::user::UNKNOWN_USER_NAME;
use crate::domain::{Message, User};
use crate::error::{AppError, AppResult};
use crate::infrastructure::repositories::{MessageRepository, UserRepository};

const REPLY_PREVIEW_LENGTH: usize = 100;

/// Resolves sender and reply-target display fields for a batch of messages
/// with one directory lookup and one reply lookup.
#[derive(Clone)]
pub struct MessageProjector {
    user_repo: Arc<dyn UserRepository>,
    message_repo: Arc<dyn MessageRepository>,
    store: StoreDeadline,
}

impl MessageProjector {
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        message_repo: Arc<dyn MessageRepository>,
        store: StoreDeadline,
    ) -> Self {
        Self {
            user_repo,
            message_repo,
            store,
        }
    }

    pub async fn project_one(&self, message: Message) -> AppResult<MessageResponse> {
        self.project(vec![message])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AppError::InternalError(anyhow::anyhow!("projection dropped a message")))
    }

    pub async fn project(&self, messages: Vec<Message>) -> AppResult<Vec<MessageResponse>> {
        if messages.is_empty() {
            return Ok(Vec::new());
        }

        let reply_ids: Vec<Uuid> = unique(messages.iter().filter_map(|m| m.reply_to_id));
        let replies: HashMap<Uuid, Message> = if reply_ids.is_empty() {
            HashMap::new()
        } else {
            self.store
                .run("load reply targets", self.message_repo.find_by_ids(&reply_ids))
                .await?
                .into_iter()
                .map(|message| (message.id, message))
                .collect()
        };

        let user_ids = unique(
            messages
                .iter()
                .map(|m| m.sender_id)
                .chain(replies.values().map(|m| m.sender_id)),
        );
        let users: HashMap<Uuid, User> = self
            .store
            .run("load senders", self.user_repo.find_by_ids(&user_ids))
            .await?
            .into_iter()
            .map(|user| (user.id, user))
            .collect();

        Ok(messages
            .into_iter()
            .map(|message| {
                let reply_to = message
                    .reply_to_id
                    .and_then(|id| replies.get(&id))
                    .filter(|reply| reply.conversation_id == message.conversation_id)
                    .map(|reply| ReplyPreviewResponse {
                        id: reply.id,
                        sender: sender_view(reply.sender_id, users.get(&reply.sender_id)),
                        preview: reply.preview(REPLY_PREVIEW_LENGTH),
                    });

                MessageResponse {
                    id: message.id,
                    conversation_id: message.conversation_id,
                    sender: sender_view(message.sender_id, users.get(&message.sender_id)),
                    content: message.content,
                    kind: message.kind,
                    attachment: message.attachment,
                    reply_to,
                    is_read: message.is_read,
                    read_at: message.read_at,
                    edited: message.edited,
                    edited_at: message.edited_at,
                    reactions: message.reactions,
                    created_at: message.created_at,
                }
            })
            .collect())
    }
}

pub fn sender_view(user_id: Uuid, user: Option<&User>) -> SenderResponse {
    match user {
        Some(user) => SenderResponse {
            id: user_id,
            display_name: user.display_name(),
            username: user.username.clone(),
            avatar_url: user.avatar_url.clone(),
        },
        None => SenderResponse {
            id: user_id,
            display_name: UNKNOWN_USER_NAME.to_string(),
            username: None,
            avatar_url: None,
        },
    }
}

fn unique(ids: impl Iterator<Item = Uuid>) -> Vec<Uuid> {
    let mut seen = HashSet::new();
    ids.filter(|id| seen.insert(*id)).collect()
}
