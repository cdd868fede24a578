use std::time::Duration;

use actix_rt::test;
use marketplace_chat::api::dtos::{
    CreateGroupRequest, InviteParticipantsRequest, PaginationParams, SendMessageRequest,
    SettingsRequest,
};
use marketplace_chat::domain::{Caller, ConversationKind, DirectKey, ParticipantRole};
use marketplace_chat::error::AppError;
use uuid::Uuid;

use crate::common::ChatHarness;

fn group_request(name: &str, members: &[Caller]) -> CreateGroupRequest {
    CreateGroupRequest {
        name: name.to_string(),
        participant_ids: members.iter().map(|member| member.user_id).collect(),
        settings: None,
    }
}

#[test]
async fn direct_conversation_is_created_once_and_reused() {
    let chat = ChatHarness::new();
    let alice = chat.user();
    let bob = chat.user();

    let first = chat
        .conversation_service
        .find_or_create_direct(alice, bob.user_id)
        .await
        .expect("first open should create");
    let second = chat
        .conversation_service
        .find_or_create_direct(bob, alice.user_id)
        .await
        .expect("second open should reuse");

    assert!(first.created);
    assert!(!second.created);
    assert_eq!(first.conversation.id, second.conversation.id);
    assert_eq!(first.conversation.kind, ConversationKind::Direct);
    assert_eq!(first.conversation.participants.len(), 2);
}

#[test]
async fn concurrent_direct_creation_yields_one_conversation() {
    let chat = ChatHarness::new();
    let alice = chat.user();
    let bob = chat.user();
    chat.conversations.delay_inserts(Duration::from_millis(20));

    let (from_alice, from_bob) = tokio::join!(
        chat.conversation_service
            .find_or_create_direct(alice, bob.user_id),
        chat.conversation_service
            .find_or_create_direct(bob, alice.user_id),
    );
    let from_alice = from_alice.expect("alice should get a conversation");
    let from_bob = from_bob.expect("bob should get a conversation");

    assert_eq!(from_alice.conversation.id, from_bob.conversation.id);
    assert_eq!(
        [from_alice.created, from_bob.created]
            .iter()
            .filter(|created| **created)
            .count(),
        1
    );
    let key = DirectKey::new(alice.user_id, bob.user_id).unwrap();
    assert_eq!(chat.conversations.direct_count(&key), 1);
}

#[test]
async fn direct_conversation_rejects_self_and_unknown_users() {
    let chat = ChatHarness::new();
    let alice = chat.user();

    let with_self = chat
        .conversation_service
        .find_or_create_direct(alice, alice.user_id)
        .await;
    assert!(matches!(with_self, Err(AppError::ValidationError { .. })));

    let with_stranger = chat
        .conversation_service
        .find_or_create_direct(alice, Uuid::new_v4())
        .await;
    assert!(matches!(with_stranger, Err(AppError::NotFound(_))));
}

#[test]
async fn group_creator_becomes_admin() {
    let chat = ChatHarness::new();
    let owner = chat.user();
    let member = chat.user();

    let group = chat
        .conversation_service
        .create_group(owner, group_request("Bike swap", &[member]))
        .await
        .expect("group should be created");

    assert_eq!(group.kind, ConversationKind::Group);
    assert_eq!(group.name.as_deref(), Some("Bike swap"));
    let roles: Vec<(Uuid, ParticipantRole)> = group
        .participants
        .iter()
        .map(|participant| (participant.user_id, participant.role))
        .collect();
    assert!(roles.contains(&(owner.user_id, ParticipantRole::Admin)));
    assert!(roles.contains(&(member.user_id, ParticipantRole::Member)));
}

#[test]
async fn group_with_unknown_member_is_rejected() {
    let chat = ChatHarness::new();
    let owner = chat.user();

    let result = chat
        .conversation_service
        .create_group(
            owner,
            CreateGroupRequest {
                name: "Ghosts".to_string(),
                participant_ids: vec![Uuid::new_v4()],
                settings: None,
            },
        )
        .await;

    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[test]
async fn outsiders_cannot_read_a_conversation() {
    let chat = ChatHarness::new();
    let alice = chat.user();
    let bob = chat.user();
    let mallory = chat.user();

    let direct = chat
        .conversation_service
        .find_or_create_direct(alice, bob.user_id)
        .await
        .unwrap();

    let result = chat
        .conversation_service
        .get(mallory, direct.conversation.id)
        .await;
    assert!(matches!(result, Err(AppError::Forbidden(_))));

    let missing = chat.conversation_service.get(alice, Uuid::new_v4()).await;
    assert!(matches!(missing, Err(AppError::NotFound(_))));
}

#[test]
async fn only_group_admins_change_settings() {
    let chat = ChatHarness::new();
    let owner = chat.user();
    let member = chat.user();
    let group = chat
        .conversation_service
        .create_group(owner, group_request("Admins only", &[member]))
        .await
        .unwrap();
    let lock_down = || SettingsRequest {
        only_admins_can_send: Some(true),
        ..SettingsRequest::default()
    };

    let by_member = chat
        .conversation_service
        .update_settings(member, group.id, lock_down())
        .await;
    assert!(matches!(by_member, Err(AppError::Forbidden(_))));

    let by_owner = chat
        .conversation_service
        .update_settings(owner, group.id, lock_down())
        .await
        .expect("admin may change settings");
    assert!(by_owner.settings.only_admins_can_send);
    assert!(by_owner.settings.allow_reactions);
}

#[test]
async fn member_invites_follow_group_settings() {
    let chat = ChatHarness::new();
    let owner = chat.user();
    let member = chat.user();
    let newcomer = chat.user();
    let group = chat
        .conversation_service
        .create_group(
            owner,
            CreateGroupRequest {
                settings: Some(SettingsRequest {
                    allow_member_invites: Some(false),
                    ..SettingsRequest::default()
                }),
                ..group_request("Closed circle", &[member])
            },
        )
        .await
        .unwrap();
    let invite = || InviteParticipantsRequest {
        user_ids: vec![newcomer.user_id],
    };

    let by_member = chat.conversation_service.invite(member, group.id, invite()).await;
    assert!(matches!(by_member, Err(AppError::Forbidden(_))));

    let by_owner = chat
        .conversation_service
        .invite(owner, group.id, invite())
        .await
        .expect("admin may invite");
    assert_eq!(by_owner.participants.len(), 3);
    assert!(chat
        .conversation_service
        .get(newcomer, group.id)
        .await
        .is_ok());
}

#[test]
async fn direct_conversations_refuse_invites_and_leaving() {
    let chat = ChatHarness::new();
    let alice = chat.user();
    let bob = chat.user();
    let carol = chat.user();
    let direct = chat
        .conversation_service
        .find_or_create_direct(alice, bob.user_id)
        .await
        .unwrap();

    let invite = chat
        .conversation_service
        .invite(
            alice,
            direct.conversation.id,
            InviteParticipantsRequest {
                user_ids: vec![carol.user_id],
            },
        )
        .await;
    assert!(matches!(invite, Err(AppError::Forbidden(_))));

    let leave = chat
        .conversation_service
        .leave(alice, direct.conversation.id)
        .await;
    assert!(matches!(leave, Err(AppError::Forbidden(_))));
}

#[test]
async fn leaving_a_group_revokes_access_and_unread_growth() {
    let chat = ChatHarness::new();
    let owner = chat.user();
    let member = chat.user();
    let group = chat
        .conversation_service
        .create_group(owner, group_request("Temporary", &[member]))
        .await
        .unwrap();

    chat.conversation_service
        .leave(member, group.id)
        .await
        .expect("member may leave");
    chat.message_service
        .send(owner, group.id, SendMessageRequest::text("after you left"))
        .await
        .unwrap();

    let result = chat.conversation_service.get(member, group.id).await;
    assert!(matches!(result, Err(AppError::Forbidden(_))));
    assert_eq!(chat.conversations.unread(group.id, member.user_id), 0);
}

#[test]
async fn list_shows_each_viewer_their_own_unread_count() {
    let chat = ChatHarness::new();
    let alice = chat.user();
    let bob = chat.user();
    let direct = chat
        .conversation_service
        .find_or_create_direct(alice, bob.user_id)
        .await
        .unwrap();
    for content in ["one", "two"] {
        chat.message_service
            .send(alice, direct.conversation.id, SendMessageRequest::text(content))
            .await
            .unwrap();
    }

    let for_bob = chat
        .conversation_service
        .list(bob, PaginationParams::default())
        .await
        .unwrap();
    let for_alice = chat
        .conversation_service
        .list(alice, PaginationParams::default())
        .await
        .unwrap();

    assert_eq!(for_bob.len(), 1);
    assert_eq!(for_bob[0].unread_count, 2);
    assert_eq!(for_bob[0].message_count, 2);
    assert_eq!(
        for_bob[0]
            .last_message
            .as_ref()
            .map(|last| last.preview.as_str()),
        Some("two")
    );
    assert_eq!(for_alice[0].unread_count, 0);
}
