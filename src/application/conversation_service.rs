use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use super::access_policy::{
    authorize, authorize_invite, authorize_leave, authorize_settings_change, ChatAction,
};
use super::store::StoreDeadline;
use super::ChatRepositories;
use crate::api::dtos::{
    ConversationResponse, CreateGroupRequest, DirectConversationResponse,
    InviteParticipantsRequest, PaginationParams, SettingsRequest,
};
use crate::delivery::DeliveryFanout;
use crate::domain::{Caller, Conversation, ConversationSettings, DirectKey};
use crate::error::{AppError, AppResult};
use crate::infrastructure::repositories::{ConversationRepository, UserRepository};

#[derive(Clone)]
pub struct ConversationService {
    conversation_repo: Arc<dyn ConversationRepository>,
    user_repo: Arc<dyn UserRepository>,
    fanout: DeliveryFanout,
    store: StoreDeadline,
}

impl ConversationService {
    pub fn new(repos: &ChatRepositories, fanout: DeliveryFanout, store: StoreDeadline) -> Self {
        Self {
            conversation_repo: repos.conversations.clone(),
            user_repo: repos.users.clone(),
            fanout,
            store,
        }
    }

    pub async fn list(
        &self,
        caller: Caller,
        params: PaginationParams,
    ) -> AppResult<Vec<ConversationResponse>> {
        params.validate()?;

        let conversations = self
            .store
            .run(
                "list conversations",
                self.conversation_repo
                    .list_for_user(caller.user_id, params.limit, params.offset),
            )
            .await?;

        Ok(conversations
            .iter()
            .map(|conversation| ConversationResponse::for_viewer(conversation, caller.user_id))
            .collect())
    }

    /// Returns the single active direct conversation for the pair, creating it
    /// if needed. A concurrent creator that loses the race gets the winner's
    /// record.
    pub async fn find_or_create_direct(
        &self,
        caller: Caller,
        other_user_id: Uuid,
    ) -> AppResult<DirectConversationResponse> {
        let key = DirectKey::new(caller.user_id, other_user_id)?;

        self.store
            .run("load user", self.user_repo.find_by_id(other_user_id))
            .await?
            .ok_or_else(|| AppError::NotFound("user not found".to_string()))?;

        if let Some(existing) = self.find_active_direct(&key).await? {
            return Ok(DirectConversationResponse {
                conversation: ConversationResponse::for_viewer(&existing, caller.user_id),
                created: false,
            });
        }

        let conversation = Conversation::new_direct(key, caller.user_id, Utc::now());
        match self
            .store
            .run("create conversation", self.conversation_repo.insert(&conversation))
            .await
        {
            Ok(created) => {
                info!(
                    actor_user_id = %caller.user_id,
                    conversation_id = %created.id,
                    direct_key = %key,
                    "direct conversation created"
                );
                Ok(DirectConversationResponse {
                    conversation: ConversationResponse::for_viewer(&created, caller.user_id),
                    created: true,
                })
            }
            Err(AppError::Conflict(message)) => {
                let winner = self
                    .find_active_direct(&key)
                    .await?
                    .ok_or(AppError::Conflict(message))?;
                info!(
                    actor_user_id = %caller.user_id,
                    conversation_id = %winner.id,
                    direct_key = %key,
                    "direct conversation create lost race, using existing"
                );
                Ok(DirectConversationResponse {
                    conversation: ConversationResponse::for_viewer(&winner, caller.user_id),
                    created: false,
                })
            }
            Err(error) => Err(error),
        }
    }

    pub async fn create_group(
        &self,
        caller: Caller,
        request: CreateGroupRequest,
    ) -> AppResult<ConversationResponse> {
        request.validate()?;

        let member_ids: Vec<Uuid> = request
            .participant_ids
            .iter()
            .copied()
            .filter(|id| *id != caller.user_id)
            .collect();
        self.ensure_users_exist(&member_ids).await?;

        let settings = request
            .settings
            .as_ref()
            .map(|update| update.apply_to(ConversationSettings::default()))
            .unwrap_or_default();
        let conversation = Conversation::new_group(
            &request.name,
            caller.user_id,
            &member_ids,
            settings,
            Utc::now(),
        )?;

        let created = self
            .store
            .run("create conversation", self.conversation_repo.insert(&conversation))
            .await?;
        info!(
            actor_user_id = %caller.user_id,
            conversation_id = %created.id,
            participant_count = created.participants.len(),
            "group conversation created"
        );
        Ok(ConversationResponse::for_viewer(&created, caller.user_id))
    }

    pub async fn get(&self, caller: Caller, id: Uuid) -> AppResult<ConversationResponse> {
        let conversation = self.ensure_readable(caller.user_id, id).await?;
        Ok(ConversationResponse::for_viewer(&conversation, caller.user_id))
    }

    pub async fn ensure_readable(&self, user_id: Uuid, id: Uuid) -> AppResult<Conversation> {
        let conversation = self.load(id).await?;
        authorize(&conversation, user_id, ChatAction::Read)?;
        Ok(conversation)
    }

    pub async fn update_settings(
        &self,
        caller: Caller,
        id: Uuid,
        request: SettingsRequest,
    ) -> AppResult<ConversationResponse> {
        let conversation = self.load(id).await?;
        authorize_settings_change(&conversation, caller.user_id)?;

        let settings = request
            .apply_to(conversation.settings)
            .for_kind(conversation.kind);
        self.store
            .run(
                "update settings",
                self.conversation_repo.update_settings(id, &settings),
            )
            .await?;

        info!(actor_user_id = %caller.user_id, conversation_id = %id, "conversation settings updated");
        let updated = self.load(id).await?;
        Ok(ConversationResponse::for_viewer(&updated, caller.user_id))
    }

    pub async fn invite(
        &self,
        caller: Caller,
        id: Uuid,
        request: InviteParticipantsRequest,
    ) -> AppResult<ConversationResponse> {
        request.validate()?;

        let conversation = self.load(id).await?;
        authorize_invite(&conversation, caller.user_id)?;

        let mut seen = HashSet::new();
        let new_ids: Vec<Uuid> = request
            .user_ids
            .into_iter()
            .filter(|user_id| conversation.active_participant(*user_id).is_none())
            .filter(|user_id| seen.insert(*user_id))
            .collect();

        if !new_ids.is_empty() {
            self.ensure_users_exist(&new_ids).await?;
            self.store
                .run(
                    "add participants",
                    self.conversation_repo
                        .add_participants(id, &new_ids, Utc::now()),
                )
                .await?;
            info!(
                actor_user_id = %caller.user_id,
                conversation_id = %id,
                added = new_ids.len(),
                "participants added"
            );
        }

        let updated = self.load(id).await?;
        Ok(ConversationResponse::for_viewer(&updated, caller.user_id))
    }

    /// Deactivates the caller and drops their sessions from the conversation
    /// channel. Sends already holding the gate are delivered first.
    pub async fn leave(&self, caller: Caller, id: Uuid) -> AppResult<()> {
        let _permit = self.fanout.gate().acquire(id).await;
        let conversation = self.load(id).await?;
        authorize_leave(&conversation, caller.user_id)?;

        let left = self
            .store
            .run(
                "leave conversation",
                self.conversation_repo
                    .deactivate_participant(id, caller.user_id),
            )
            .await?;
        if !left {
            warn!(actor_user_id = %caller.user_id, conversation_id = %id, "participant was already inactive");
        }
        self.fanout.unsubscribe_user(caller.user_id, id);

        info!(actor_user_id = %caller.user_id, conversation_id = %id, "participant left conversation");
        Ok(())
    }

    async fn load(&self, id: Uuid) -> AppResult<Conversation> {
        self.store
            .run("load conversation", self.conversation_repo.find_by_id(id))
            .await?
            .ok_or_else(|| AppError::NotFound("conversation not found".to_string()))
    }

    async fn find_active_direct(&self, key: &DirectKey) -> AppResult<Option<Conversation>> {
        self.store
            .run(
                "find direct conversation",
                self.conversation_repo.find_active_direct(key),
            )
            .await
    }

    async fn ensure_users_exist(&self, user_ids: &[Uuid]) -> AppResult<()> {
        if user_ids.is_empty() {
            return Ok(());
        }

        let found: HashSet<Uuid> = self
            .store
            .run("load users", self.user_repo.find_by_ids(user_ids))
            .await?
            .into_iter()
            .map(|user| user.id)
            .collect();
        match user_ids.iter().find(|id| !found.contains(id)) {
            Some(missing) => Err(AppError::NotFound(format!("user {missing} not found"))),
            None => Ok(()),
        }
    }
}
