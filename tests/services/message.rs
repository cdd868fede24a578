use std::time::Duration;

use actix_rt::test;
use marketplace_chat::api::dtos::{
    AttachmentRequest, CreateGroupRequest, EditMessageRequest, MessagePageQuery,
    ReactionRequest, SendMessageRequest, SettingsRequest,
};
use marketplace_chat::config::ChatConfig;
use marketplace_chat::domain::{Caller, MessageKind};
use marketplace_chat::error::AppError;
use uuid::Uuid;

use crate::common::ChatHarness;

async fn direct(chat: &ChatHarness, a: Caller, b: Caller) -> Uuid {
    chat.conversation_service
        .find_or_create_direct(a, b.user_id)
        .await
        .expect("direct conversation")
        .conversation
        .id
}

async fn group(chat: &ChatHarness, owner: Caller, members: &[Caller], settings: SettingsRequest) -> Uuid {
    chat.conversation_service
        .create_group(
            owner,
            CreateGroupRequest {
                name: "Group".to_string(),
                participant_ids: members.iter().map(|member| member.user_id).collect(),
                settings: Some(settings),
            },
        )
        .await
        .expect("group conversation")
        .id
}

fn reaction(emoji: &str) -> ReactionRequest {
    ReactionRequest {
        emoji: emoji.to_string(),
    }
}

#[test]
async fn sent_message_comes_back_on_fetch() {
    let chat = ChatHarness::new();
    let alice = chat.named_user("Alice Seller");
    let bob = chat.user();
    let conversation_id = direct(&chat, alice, bob).await;

    let sent = chat
        .message_service
        .send(alice, conversation_id, SendMessageRequest::text("  is it still available?  "))
        .await
        .expect("send should succeed");
    let page = chat
        .message_service
        .list_page(bob, conversation_id, MessagePageQuery::default())
        .await
        .expect("fetch should succeed");

    assert_eq!(sent.content, "is it still available?");
    assert_eq!(sent.kind, MessageKind::Text);
    assert_eq!(sent.sender.display_name, "Alice Seller");
    assert_eq!(page.messages.len(), 1);
    assert_eq!(page.messages[0].id, sent.id);
    assert_eq!(page.messages[0].content, sent.content);
    assert!(!page.has_more);
}

#[test]
async fn send_validates_content() {
    let chat = ChatHarness::with_config(ChatConfig {
        max_message_length: 10,
        ..ChatConfig::default()
    });
    let alice = chat.user();
    let bob = chat.user();
    let conversation_id = direct(&chat, alice, bob).await;

    for content in ["   ", "this is far too long"] {
        let result = chat
            .message_service
            .send(alice, conversation_id, SendMessageRequest::text(content))
            .await;
        assert!(
            matches!(result, Err(AppError::ValidationError { .. })),
            "{content:?} should be rejected"
        );
    }
    assert_eq!(chat.messages.count_in(conversation_id), 0);
}

#[test]
async fn outsiders_cannot_send() {
    let chat = ChatHarness::new();
    let alice = chat.user();
    let bob = chat.user();
    let mallory = chat.user();
    let conversation_id = direct(&chat, alice, bob).await;

    let result = chat
        .message_service
        .send(mallory, conversation_id, SendMessageRequest::text("hi"))
        .await;

    assert!(matches!(result, Err(AppError::Forbidden(_))));
}

#[test]
async fn admin_only_groups_reject_member_messages() {
    let chat = ChatHarness::new();
    let owner = chat.user();
    let member = chat.user();
    let conversation_id = group(
        &chat,
        owner,
        &[member],
        SettingsRequest {
            only_admins_can_send: Some(true),
            ..SettingsRequest::default()
        },
    )
    .await;

    let from_member = chat
        .message_service
        .send(member, conversation_id, SendMessageRequest::text("can I talk?"))
        .await;
    let from_owner = chat
        .message_service
        .send(owner, conversation_id, SendMessageRequest::text("announcement"))
        .await;

    assert!(matches!(from_member, Err(AppError::Forbidden(_))));
    assert!(from_owner.is_ok());
}

#[test]
async fn attachments_infer_kind_and_respect_file_sharing() {
    let chat = ChatHarness::new();
    let owner = chat.user();
    let member = chat.user();
    let open = group(&chat, owner, &[member], SettingsRequest::default()).await;
    let closed = group(
        &chat,
        owner,
        &[member],
        SettingsRequest {
            allow_file_sharing: Some(false),
            ..SettingsRequest::default()
        },
    )
    .await;
    let photo = || SendMessageRequest {
        content: None,
        kind: None,
        reply_to_id: None,
        attachment: Some(AttachmentRequest {
            file_url: "/uploads/chat/bike.JPG".to_string(),
            file_name: Some("bike.JPG".to_string()),
            file_size: Some(2048),
        }),
    };

    let sent = chat
        .message_service
        .send(member, open, photo())
        .await
        .expect("attachment send should succeed");
    assert_eq!(sent.kind, MessageKind::Image);
    assert_eq!(sent.content, "bike.JPG");
    assert_eq!(
        sent.attachment.as_ref().map(|a| a.file_url.as_str()),
        Some("/uploads/chat/bike.JPG")
    );

    let blocked = chat.message_service.send(member, closed, photo()).await;
    assert!(matches!(blocked, Err(AppError::Forbidden(_))));
}

#[test]
async fn text_messages_cannot_carry_attachments() {
    let chat = ChatHarness::new();
    let alice = chat.user();
    let bob = chat.user();
    let conversation_id = direct(&chat, alice, bob).await;

    let result = chat
        .message_service
        .send(
            alice,
            conversation_id,
            SendMessageRequest {
                content: Some("see file".to_string()),
                kind: Some(MessageKind::Text),
                reply_to_id: None,
                attachment: Some(AttachmentRequest {
                    file_url: "/uploads/chat/a.pdf".to_string(),
                    file_name: None,
                    file_size: None,
                }),
            },
        )
        .await;

    assert!(matches!(result, Err(AppError::ValidationError { .. })));
}

#[test]
async fn replies_must_target_the_same_conversation() {
    let chat = ChatHarness::new();
    let alice = chat.user();
    let bob = chat.user();
    let carol = chat.user();
    let with_bob = direct(&chat, alice, bob).await;
    let with_carol = direct(&chat, alice, carol).await;
    let original = chat
        .message_service
        .send(alice, with_bob, SendMessageRequest::text("original"))
        .await
        .unwrap();

    let reply = chat
        .message_service
        .send(
            bob,
            with_bob,
            SendMessageRequest {
                reply_to_id: Some(original.id),
                ..SendMessageRequest::text("reply")
            },
        )
        .await
        .expect("reply should succeed");
    assert_eq!(reply.reply_to.as_ref().map(|r| r.id), Some(original.id));
    assert_eq!(
        reply.reply_to.as_ref().map(|r| r.preview.as_str()),
        Some("original")
    );

    let cross = chat
        .message_service
        .send(
            alice,
            with_carol,
            SendMessageRequest {
                reply_to_id: Some(original.id),
                ..SendMessageRequest::text("wrong thread")
            },
        )
        .await;
    assert!(matches!(cross, Err(AppError::NotFound(_))));
}

#[test]
async fn only_the_sender_edits() {
    let chat = ChatHarness::new();
    let alice = chat.user();
    let bob = chat.user();
    let conversation_id = direct(&chat, alice, bob).await;
    let sent = chat
        .message_service
        .send(alice, conversation_id, SendMessageRequest::text("price is 100"))
        .await
        .unwrap();
    let edit = |content: &str| EditMessageRequest {
        content: content.to_string(),
    };

    let by_bob = chat.message_service.edit(bob, sent.id, edit("free")).await;
    assert!(matches!(by_bob, Err(AppError::Forbidden(_))));

    let by_alice = chat
        .message_service
        .edit(alice, sent.id, edit("price is 90"))
        .await
        .expect("sender may edit");
    assert_eq!(by_alice.content, "price is 90");
    assert!(by_alice.edited);
    assert!(by_alice.edited_at.is_some());

    let blank = chat.message_service.edit(alice, sent.id, edit("  ")).await;
    assert!(matches!(blank, Err(AppError::ValidationError { .. })));
}

#[test]
async fn delete_is_owner_only_and_rolls_back_the_snapshot() {
    let chat = ChatHarness::new();
    let alice = chat.user();
    let bob = chat.user();
    let conversation_id = direct(&chat, alice, bob).await;
    let first = chat
        .message_service
        .send(alice, conversation_id, SendMessageRequest::text("first"))
        .await
        .unwrap();
    let second = chat
        .message_service
        .send(alice, conversation_id, SendMessageRequest::text("second"))
        .await
        .unwrap();

    let by_bob = chat.message_service.delete(bob, second.id).await;
    assert!(matches!(by_bob, Err(AppError::Forbidden(_))));

    let deleted = chat
        .message_service
        .delete(alice, second.id)
        .await
        .expect("sender may delete");
    assert!(deleted.deleted);

    let conversation = chat.conversations.get(conversation_id).unwrap();
    assert_eq!(conversation.message_count, 1);
    assert_eq!(
        conversation.last_message.map(|snapshot| snapshot.message_id),
        Some(first.id)
    );
    assert!(chat.messages.get(second.id).is_none());

    let again = chat.message_service.delete(alice, second.id).await;
    assert!(matches!(again, Err(AppError::NotFound(_))));
}

#[test]
async fn duplicate_reaction_conflicts_and_unreact_is_idempotent() {
    let chat = ChatHarness::new();
    let alice = chat.user();
    let bob = chat.user();
    let conversation_id = direct(&chat, alice, bob).await;
    let sent = chat
        .message_service
        .send(alice, conversation_id, SendMessageRequest::text("deal?"))
        .await
        .unwrap();

    let added = chat
        .message_service
        .add_reaction(bob, sent.id, reaction("👍"))
        .await
        .expect("first reaction");
    assert_eq!(added.reactions.len(), 1);

    let duplicate = chat
        .message_service
        .add_reaction(bob, sent.id, reaction("👍"))
        .await;
    assert!(matches!(duplicate, Err(AppError::Conflict(_))));

    let other_emoji = chat
        .message_service
        .add_reaction(bob, sent.id, reaction("🎉"))
        .await
        .expect("different emoji is a different reaction");
    assert_eq!(other_emoji.reactions.len(), 2);

    let removed = chat
        .message_service
        .remove_reaction(bob, sent.id, "👍")
        .await
        .unwrap();
    let removed_again = chat
        .message_service
        .remove_reaction(bob, sent.id, "👍")
        .await
        .expect("removing a missing reaction succeeds");
    assert_eq!(removed.reactions.len(), 1);
    assert_eq!(removed_again.reactions, removed.reactions);
}

#[test]
async fn reactions_respect_conversation_settings() {
    let chat = ChatHarness::new();
    let owner = chat.user();
    let member = chat.user();
    let conversation_id = group(
        &chat,
        owner,
        &[member],
        SettingsRequest {
            allow_reactions: Some(false),
            ..SettingsRequest::default()
        },
    )
    .await;
    let sent = chat
        .message_service
        .send(owner, conversation_id, SendMessageRequest::text("no emoji please"))
        .await
        .unwrap();

    let result = chat
        .message_service
        .add_reaction(member, sent.id, reaction("😀"))
        .await;

    assert!(matches!(result, Err(AppError::Forbidden(_))));
}

#[test]
async fn pages_walk_back_without_gaps_or_repeats() {
    let chat = ChatHarness::new();
    let alice = chat.user();
    let bob = chat.user();
    let conversation_id = direct(&chat, alice, bob).await;
    for n in 0..5 {
        chat.message_service
            .send(alice, conversation_id, SendMessageRequest::text(format!("msg {n}")))
            .await
            .unwrap();
    }

    let mut seen = Vec::new();
    let mut query = MessagePageQuery {
        limit: Some(2),
        ..MessagePageQuery::default()
    };
    let mut pages = 0;
    loop {
        let page = chat
            .message_service
            .list_page(bob, conversation_id, query.clone())
            .await
            .unwrap();
        pages += 1;
        seen.extend(page.messages.iter().map(|message| message.id));
        match page.next_cursor {
            Some(cursor) => {
                query.before = Some(cursor.before);
                query.before_id = Some(cursor.before_id);
            }
            None => break,
        }
    }

    let mut expected = chat.messages.ids_in(conversation_id);
    expected.sort();
    seen.sort();
    assert_eq!(seen, expected);
    assert_eq!(pages, 3);
}

#[test]
async fn before_id_requires_before() {
    let chat = ChatHarness::new();
    let alice = chat.user();
    let bob = chat.user();
    let conversation_id = direct(&chat, alice, bob).await;

    let result = chat
        .message_service
        .list_page(
            alice,
            conversation_id,
            MessagePageQuery {
                before_id: Some(Uuid::new_v4()),
                ..MessagePageQuery::default()
            },
        )
        .await;

    assert!(matches!(result, Err(AppError::ValidationError { .. })));
}

#[test]
async fn upload_stores_bytes_and_checks_limits() {
    let chat = ChatHarness::with_config(ChatConfig {
        max_upload_bytes: 8,
        ..ChatConfig::default()
    });
    let alice = chat.user();
    let bob = chat.user();
    let conversation_id = direct(&chat, alice, bob).await;

    let uploaded = chat
        .message_service
        .upload(alice, conversation_id, "../receipt.pdf", b"%PDF-1")
        .await
        .expect("upload should succeed");
    assert_eq!(uploaded.file_name, "receipt.pdf");
    assert_eq!(uploaded.file_size, 6);
    assert_eq!(uploaded.kind, MessageKind::File);
    assert_eq!(chat.attachments.stored().len(), 1);

    let empty = chat
        .message_service
        .upload(alice, conversation_id, "empty.txt", b"")
        .await;
    let oversized = chat
        .message_service
        .upload(alice, conversation_id, "big.bin", b"0123456789")
        .await;
    assert!(matches!(empty, Err(AppError::ValidationError { .. })));
    assert!(matches!(oversized, Err(AppError::ValidationError { .. })));
}

#[test]
async fn recipients_get_a_durable_notification() {
    let chat = ChatHarness::new();
    let alice = chat.named_user("Alice");
    let bob = chat.user();
    let conversation_id = direct(&chat, alice, bob).await;

    chat.message_service
        .send(alice, conversation_id, SendMessageRequest::text("ping"))
        .await
        .unwrap();

    for _ in 0..50 {
        if chat.notifications.len() > 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let records = chat.notifications.records_for(bob.user_id);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].title, "New message from Alice");
    assert_eq!(records[0].message, "ping");
    assert!(chat.notifications.records_for(alice.user_id).is_empty());
}

#[test]
async fn notification_failures_do_not_fail_the_send() {
    let chat = ChatHarness::new();
    let alice = chat.user();
    let bob = chat.user();
    let conversation_id = direct(&chat, alice, bob).await;
    chat.notifications.fail_writes();

    let result = chat
        .message_service
        .send(alice, conversation_id, SendMessageRequest::text("still sent"))
        .await;

    assert!(result.is_ok());
    assert_eq!(chat.messages.count_in(conversation_id), 1);
}
