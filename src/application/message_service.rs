use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use super::access_policy::{authorize, ChatAction};
use super::projection::MessageProjector;
use super::read_state::ReadStateSynchronizer;
use super::store::StoreDeadline;
use super::ChatRepositories;
use crate::api::dtos::{
    AttachmentResponse, CursorResponse, EditMessageRequest, MessageDeletedResponse,
    MessageEditedResponse, MessagePageQuery, MessagePageResponse, MessageResponse,
    ReactionRequest, ReactionsResponse, SendMessageRequest,
};
use crate::config::ChatConfig;
use crate::delivery::{
    ConversationPermit, DeliveryEvent, DeliveryFanout, MessageDeletedPayload,
    MessageEditedPayload, MessageNotificationPayload, ReactionChangedPayload, TypingPayload,
};
use crate::domain::message::{validate_content, validate_emoji};
use crate::domain::{
    Attachment, Caller, Conversation, LastMessageSnapshot, Message, MessageCursor, MessageKind,
    NotificationRecord, Reaction,
};
use crate::error::{AppError, AppResult};
use crate::infrastructure::repositories::{
    ConversationRepository, MessageRepository, NotificationRepository,
};
use crate::infrastructure::uploads::{kind_for_file_name, AttachmentStorage};

const ATTACHMENT_FALLBACK_CONTENT: &str = "Attachment";

#[derive(Clone)]
pub struct MessageService {
    conversation_repo: Arc<dyn ConversationRepository>,
    message_repo: Arc<dyn MessageRepository>,
    notification_repo: Arc<dyn NotificationRepository>,
    attachments: Arc<dyn AttachmentStorage>,
    fanout: DeliveryFanout,
    read_state: ReadStateSynchronizer,
    projector: MessageProjector,
    store: StoreDeadline,
    config: ChatConfig,
}

impl MessageService {
    pub fn new(
        repos: &ChatRepositories,
        attachments: Arc<dyn AttachmentStorage>,
        fanout: DeliveryFanout,
        config: ChatConfig,
    ) -> Self {
        let store = StoreDeadline::new(config.store_timeout());
        Self {
            conversation_repo: repos.conversations.clone(),
            message_repo: repos.messages.clone(),
            notification_repo: repos.notifications.clone(),
            attachments,
            fanout,
            read_state: ReadStateSynchronizer::new(
                repos.conversations.clone(),
                repos.messages.clone(),
                store,
            ),
            projector: MessageProjector::new(repos.users.clone(), repos.messages.clone(), store),
            store,
            config,
        }
    }

    pub async fn send(
        &self,
        caller: Caller,
        conversation_id: Uuid,
        request: SendMessageRequest,
    ) -> AppResult<MessageResponse> {
        request.validate()?;
        let (content, kind, attachment) = self.message_body(&request)?;

        let permit = self.fanout.gate().acquire(conversation_id).await;
        let conversation = self.load_conversation(conversation_id).await?;
        authorize(&conversation, caller.user_id, ChatAction::Send)?;
        if attachment.is_some() {
            authorize(&conversation, caller.user_id, ChatAction::Upload)?;
        }
        if let Some(reply_to_id) = request.reply_to_id {
            self.ensure_reply_target(&conversation, reply_to_id).await?;
        }

        let message = Message {
            id: Uuid::now_v7(),
            conversation_id,
            sender_id: caller.user_id,
            content,
            kind,
            attachment,
            reply_to_id: request.reply_to_id,
            is_read: false,
            read_at: None,
            edited: false,
            edited_at: None,
            reactions: Vec::new(),
            created_at: Utc::now(),
        };

        let preview = message.preview(self.config.preview_length);
        let snapshot = LastMessageSnapshot {
            message_id: message.id,
            preview: preview.clone(),
            sender_id: message.sender_id,
            sent_at: message.created_at,
        };
        let (created, recipients) = self
            .read_state
            .on_send(&conversation, &message, &snapshot)
            .await?;

        let response = self.projector.project_one(created).await?;
        self.fanout.publish_to_conversation(
            conversation_id,
            &DeliveryEvent::MessageCreated(response.clone()),
        );
        self.fanout.publish_to_users(
            &recipients,
            &DeliveryEvent::MessageNotification(MessageNotificationPayload {
                conversation_id,
                message_id: response.id,
                sender_id: caller.user_id,
                preview: preview.clone(),
                unread_delta: 1,
            }),
        );
        drop(permit);

        self.spawn_notifications(
            recipients,
            conversation_id,
            response.sender.display_name.clone(),
            preview,
            response.created_at,
        );

        info!(
            actor_user_id = %caller.user_id,
            conversation_id = %conversation_id,
            message_id = %response.id,
            kind = ?response.kind,
            "message sent"
        );
        Ok(response)
    }

    /// Newest-first page. Opening any page marks the conversation read up to
    /// the fetch time and clears the caller's observed unread count.
    pub async fn list_page(
        &self,
        caller: Caller,
        conversation_id: Uuid,
        query: MessagePageQuery,
    ) -> AppResult<MessagePageResponse> {
        query.validate()?;
        let limit = query
            .limit
            .unwrap_or(self.config.default_page_size)
            .min(self.config.max_page_size);
        let cursor = match (query.before, query.before_id) {
            (Some(created_at), id) => Some(MessageCursor { created_at, id }),
            (None, Some(_)) => {
                return Err(AppError::validation_error(
                    "before_id requires before to be set",
                ))
            }
            (None, None) => None,
        };

        let permit = self.fanout.gate().acquire(conversation_id).await;
        let conversation = self.load_conversation(conversation_id).await?;
        authorize(&conversation, caller.user_id, ChatAction::Read)?;

        let cutoff = Utc::now();
        let mut messages = self
            .store
            .run(
                "list messages",
                self.message_repo.list_page(conversation_id, cursor, limit),
            )
            .await?;
        let sync = self
            .read_state
            .on_fetch(&conversation, caller.user_id, cutoff)
            .await?;
        drop(permit);
        for message in messages.iter_mut() {
            if message.sender_id != caller.user_id
                && !message.is_read
                && message.created_at <= sync.cutoff
            {
                message.is_read = true;
                message.read_at = Some(sync.cutoff);
            }
        }
        self.touch_last_seen(conversation_id, caller.user_id, cutoff)
            .await;

        let has_more = messages.len() as i64 == limit;
        let next_cursor = if has_more {
            messages.last().map(|message| CursorResponse {
                before: message.created_at,
                before_id: message.id,
            })
        } else {
            None
        };

        Ok(MessagePageResponse {
            messages: self.projector.project(messages).await?,
            has_more,
            next_cursor,
        })
    }

    pub async fn edit(
        &self,
        caller: Caller,
        message_id: Uuid,
        request: EditMessageRequest,
    ) -> AppResult<MessageEditedResponse> {
        let (_permit, message) = self.lock_message(message_id).await?;
        if message.sender_id != caller.user_id {
            return Err(AppError::Forbidden(
                "Only the sender can edit this message".to_string(),
            ));
        }
        let content = validate_content(&request.content, self.config.max_message_length)?;

        let conversation = self.load_conversation(message.conversation_id).await?;
        authorize(&conversation, caller.user_id, ChatAction::Read)?;

        let updated = self
            .store
            .run(
                "edit message",
                self.message_repo
                    .update_content(message_id, &content, Utc::now()),
            )
            .await?
            .ok_or_else(|| AppError::NotFound("message not found".to_string()))?;

        self.fanout.publish_to_conversation(
            updated.conversation_id,
            &DeliveryEvent::MessageEdited(MessageEditedPayload {
                conversation_id: updated.conversation_id,
                message_id: updated.id,
                content: updated.content.clone(),
                edited: updated.edited,
                edited_at: updated.edited_at,
            }),
        );

        info!(
            actor_user_id = %caller.user_id,
            conversation_id = %updated.conversation_id,
            message_id = %updated.id,
            "message edited"
        );
        Ok(MessageEditedResponse {
            id: updated.id,
            conversation_id: updated.conversation_id,
            content: updated.content,
            edited: updated.edited,
            edited_at: updated.edited_at,
        })
    }

    pub async fn delete(&self, caller: Caller, message_id: Uuid) -> AppResult<MessageDeletedResponse> {
        let (_permit, message) = self.lock_message(message_id).await?;
        if message.sender_id != caller.user_id {
            return Err(AppError::Forbidden(
                "Only the sender can delete this message".to_string(),
            ));
        }

        let conversation = self.load_conversation(message.conversation_id).await?;
        authorize(&conversation, caller.user_id, ChatAction::Read)?;

        let removed = self
            .store
            .run(
                "delete message",
                self.message_repo
                    .delete_and_record(message_id, self.config.preview_length),
            )
            .await?;
        if !removed {
            return Err(AppError::NotFound("message not found".to_string()));
        }

        self.fanout.publish_to_conversation(
            conversation.id,
            &DeliveryEvent::MessageDeleted(MessageDeletedPayload {
                conversation_id: conversation.id,
                message_id,
            }),
        );

        info!(
            actor_user_id = %caller.user_id,
            conversation_id = %conversation.id,
            message_id = %message_id,
            "message deleted"
        );
        Ok(MessageDeletedResponse {
            id: message_id,
            conversation_id: conversation.id,
            deleted: true,
        })
    }

    pub async fn add_reaction(
        &self,
        caller: Caller,
        message_id: Uuid,
        request: ReactionRequest,
    ) -> AppResult<ReactionsResponse> {
        let emoji = validate_emoji(&request.emoji)?;
        let (_permit, message) = self.lock_message(message_id).await?;

        let conversation = self.load_conversation(message.conversation_id).await?;
        authorize(&conversation, caller.user_id, ChatAction::React)?;

        let reaction = Reaction {
            user_id: caller.user_id,
            emoji,
            created_at: Utc::now(),
        };
        let reactions = self
            .store
            .run(
                "add reaction",
                self.message_repo.add_reaction(message_id, &reaction),
            )
            .await?;

        self.publish_reactions(conversation.id, message_id, &reactions);
        info!(
            actor_user_id = %caller.user_id,
            conversation_id = %conversation.id,
            message_id = %message_id,
            emoji = %reaction.emoji,
            "reaction added"
        );
        Ok(ReactionsResponse {
            message_id,
            reactions,
        })
    }

    /// Removing a reaction that is not there succeeds without changes.
    pub async fn remove_reaction(
        &self,
        caller: Caller,
        message_id: Uuid,
        emoji: &str,
    ) -> AppResult<ReactionsResponse> {
        let emoji = validate_emoji(emoji)?;
        let (_permit, message) = self.lock_message(message_id).await?;

        let conversation = self.load_conversation(message.conversation_id).await?;
        authorize(&conversation, caller.user_id, ChatAction::Read)?;

        if !message.has_reaction(caller.user_id, &emoji) {
            return Ok(ReactionsResponse {
                message_id,
                reactions: message.reactions,
            });
        }

        let reactions = self
            .store
            .run(
                "remove reaction",
                self.message_repo
                    .remove_reaction(message_id, caller.user_id, &emoji),
            )
            .await?;

        self.publish_reactions(conversation.id, message_id, &reactions);
        info!(
            actor_user_id = %caller.user_id,
            conversation_id = %conversation.id,
            message_id = %message_id,
            emoji = %emoji,
            "reaction removed"
        );
        Ok(ReactionsResponse {
            message_id,
            reactions,
        })
    }

    pub async fn upload(
        &self,
        caller: Caller,
        conversation_id: Uuid,
        file_name: &str,
        bytes: &[u8],
    ) -> AppResult<AttachmentResponse> {
        if bytes.is_empty() {
            return Err(AppError::validation_error("attachment must not be empty"));
        }
        if bytes.len() > self.config.max_upload_bytes {
            return Err(AppError::validation_error(format!(
                "attachment must be at most {} bytes",
                self.config.max_upload_bytes
            )));
        }

        let conversation = self.load_conversation(conversation_id).await?;
        authorize(&conversation, caller.user_id, ChatAction::Upload)?;

        let stored = self.attachments.store(file_name, bytes).await?;
        info!(
            actor_user_id = %caller.user_id,
            conversation_id = %conversation_id,
            file_size = stored.file_size,
            "attachment uploaded"
        );
        Ok(AttachmentResponse {
            kind: kind_for_file_name(&stored.file_name),
            file_url: stored.file_url,
            file_name: stored.file_name,
            file_size: stored.file_size,
        })
    }

    /// Ephemeral typing indicator. Nothing is stored.
    pub async fn typing(&self, caller: Caller, conversation_id: Uuid, is_typing: bool) -> AppResult<()> {
        let conversation = self.load_conversation(conversation_id).await?;
        authorize(&conversation, caller.user_id, ChatAction::Read)?;

        self.fanout.publish_to_conversation(
            conversation_id,
            &DeliveryEvent::Typing(TypingPayload {
                conversation_id,
                user_id: caller.user_id,
                is_typing,
            }),
        );
        Ok(())
    }

    fn message_body(
        &self,
        request: &SendMessageRequest,
    ) -> AppResult<(String, MessageKind, Option<Attachment>)> {
        let kind = request.kind.unwrap_or_else(|| match &request.attachment {
            Some(attachment) => kind_for_file_name(
                attachment
                    .file_name
                    .as_deref()
                    .unwrap_or(&attachment.file_url),
            ),
            None => MessageKind::Text,
        });
        let max_chars = self.config.max_message_length;
        let content = request.content.as_deref().unwrap_or_default();

        if !kind.carries_attachment() {
            if request.attachment.is_some() {
                return Err(AppError::validation_error(
                    "text messages cannot carry attachments",
                ));
            }
            return Ok((validate_content(content, max_chars)?, kind, None));
        }

        let attachment: Attachment = request
            .attachment
            .clone()
            .ok_or_else(|| {
                AppError::validation_error("image and file messages require an attachment")
            })?
            .into();
        let content = if content.trim().is_empty() {
            attachment
                .file_name
                .clone()
                .filter(|name| !name.trim().is_empty())
                .unwrap_or_else(|| ATTACHMENT_FALLBACK_CONTENT.to_string())
        } else {
            validate_content(content, max_chars)?
        };
        Ok((content, kind, Some(attachment)))
    }

    async fn ensure_reply_target(
        &self,
        conversation: &Conversation,
        reply_to_id: Uuid,
    ) -> AppResult<()> {
        if !conversation.settings.allow_replies {
            return Err(AppError::Forbidden(
                "Replies are disabled in this conversation".to_string(),
            ));
        }

        let target = self
            .store
            .run("load reply target", self.message_repo.find_by_id(reply_to_id))
            .await?;
        match target {
            Some(target) if target.conversation_id == conversation.id => Ok(()),
            _ => Err(AppError::NotFound("reply target not found".to_string())),
        }
    }

    /// Loads the message, takes its conversation's gate, and reloads it so the
    /// caller works on the state other mutations have committed.
    async fn lock_message(&self, message_id: Uuid) -> AppResult<(ConversationPermit, Message)> {
        let message = self.load_message(message_id).await?;
        let permit = self.fanout.gate().acquire(message.conversation_id).await;
        let message = self.load_message(message_id).await?;
        Ok((permit, message))
    }

    async fn load_message(&self, message_id: Uuid) -> AppResult<Message> {
        self.store
            .run("load message", self.message_repo.find_by_id(message_id))
            .await?
            .ok_or_else(|| AppError::NotFound("message not found".to_string()))
    }

    async fn load_conversation(&self, conversation_id: Uuid) -> AppResult<Conversation> {
        self.store
            .run(
                "load conversation",
                self.conversation_repo.find_by_id(conversation_id),
            )
            .await?
            .ok_or_else(|| AppError::NotFound("conversation not found".to_string()))
    }

    async fn touch_last_seen(&self, conversation_id: Uuid, user_id: Uuid, at: DateTime<Utc>) {
        if let Err(error) = self
            .store
            .run(
                "touch last seen",
                self.conversation_repo
                    .touch_last_seen(conversation_id, user_id, at),
            )
            .await
        {
            warn!(
                conversation_id = %conversation_id,
                user_id = %user_id,
                error = %error,
                "failed to update last seen"
            );
        }
    }

    fn publish_reactions(&self, conversation_id: Uuid, message_id: Uuid, reactions: &[Reaction]) {
        self.fanout.publish_to_conversation(
            conversation_id,
            &DeliveryEvent::ReactionChanged(ReactionChangedPayload {
                conversation_id,
                message_id,
                reactions: reactions.to_vec(),
            }),
        );
    }

    fn spawn_notifications(
        &self,
        recipients: Vec<Uuid>,
        conversation_id: Uuid,
        sender_name: String,
        preview: String,
        sent_at: DateTime<Utc>,
    ) {
        if recipients.is_empty() {
            return;
        }

        let repo = self.notification_repo.clone();
        let store = self.store;
        tokio::spawn(async move {
            for recipient_id in recipients {
                let record = NotificationRecord::chat_message(
                    recipient_id,
                    conversation_id,
                    &sender_name,
                    &preview,
                    sent_at,
                );
                if let Err(error) = store.run("record notification", repo.create(&record)).await {
                    warn!(
                        recipient_id = %recipient_id,
                        conversation_id = %conversation_id,
                        error = %error,
                        "failed to record chat notification"
                    );
                }
            }
        });
    }
}
