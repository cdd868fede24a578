//! Membership and settings rules for chat operations. Everything here is a
//! pure function of the conversation and the caller.

use uuid::Uuid;

use crate::domain::{Conversation, Participant};
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatAction {
    Read,
    Send,
    React,
    Upload,
}

impl ChatAction {
    fn mutates(&self) -> bool {
        !matches!(self, ChatAction::Read)
    }
}

fn forbidden(message: &str) -> AppError {
    AppError::Forbidden(message.to_string())
}

/// Returns the caller's participant record when `action` is allowed.
pub fn authorize(
    conversation: &Conversation,
    caller_id: Uuid,
    action: ChatAction,
) -> AppResult<&Participant> {
    let participant = conversation
        .active_participant(caller_id)
        .ok_or_else(|| forbidden("You are not a participant in this conversation"))?;

    if action.mutates() && !conversation.is_active {
        return Err(forbidden("This conversation is no longer active"));
    }

    match action {
        ChatAction::Read => {}
        ChatAction::Send => {
            if conversation.is_group()
                && conversation.settings.only_admins_can_send
                && !participant.is_admin()
            {
                return Err(forbidden("Only group admins can send messages"));
            }
        }
        ChatAction::React => {
            if !conversation.settings.allow_reactions {
                return Err(forbidden("Reactions are disabled in this conversation"));
            }
        }
        ChatAction::Upload => {
            if !conversation.settings.allow_file_sharing {
                return Err(forbidden("File sharing is disabled in this conversation"));
            }
        }
    }

    Ok(participant)
}

pub fn authorize_invite(conversation: &Conversation, caller_id: Uuid) -> AppResult<&Participant> {
    if !conversation.is_group() {
        return Err(forbidden("Participants cannot be added to a direct conversation"));
    }
    let participant = authorize(conversation, caller_id, ChatAction::Read)?;
    if !conversation.is_active {
        return Err(forbidden("This conversation is no longer active"));
    }
    if !participant.is_admin() && !conversation.settings.allow_member_invites {
        return Err(forbidden("Only group admins can invite participants"));
    }
    Ok(participant)
}

pub fn authorize_settings_change(
    conversation: &Conversation,
    caller_id: Uuid,
) -> AppResult<&Participant> {
    let participant = authorize(conversation, caller_id, ChatAction::Read)?;
    if conversation.is_group() && !participant.is_admin() {
        return Err(forbidden("Only group admins can change settings"));
    }
    Ok(participant)
}

pub fn authorize_leave(conversation: &Conversation, caller_id: Uuid) -> AppResult<&Participant> {
    if !conversation.is_group() {
        return Err(forbidden("Direct conversations cannot be left"));
    }
    authorize(conversation, caller_id, ChatAction::Read)
}
