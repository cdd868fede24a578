use std::time::Duration;

use actix_rt::test;
use marketplace_chat::api::dtos::{MessagePageQuery, SendMessageRequest};
use marketplace_chat::config::ChatConfig;
use marketplace_chat::error::AppError;

use crate::common::ChatHarness;

fn impatient() -> ChatHarness {
    ChatHarness::with_config(ChatConfig {
        store_timeout_ms: 50,
        ..ChatConfig::default()
    })
}

#[test]
async fn slow_store_surfaces_a_retryable_error() {
    let chat = impatient();
    let alice = chat.user();
    let bob = chat.user();
    let conversation_id = chat
        .conversation_service
        .find_or_create_direct(alice, bob.user_id)
        .await
        .unwrap()
        .conversation
        .id;
    chat.conversations.delay_reads(Duration::from_millis(500));

    let send = chat
        .message_service
        .send(alice, conversation_id, SendMessageRequest::text("hello?"))
        .await;
    let fetch = chat
        .message_service
        .list_page(bob, conversation_id, MessagePageQuery::default())
        .await;

    for result in [send.map(|_| ()), fetch.map(|_| ())] {
        match result {
            Err(error @ AppError::ServiceUnavailable { .. }) => assert!(error.is_retryable()),
            other => panic!("expected a store timeout, got {other:?}"),
        }
    }
    assert_eq!(chat.messages.count_in(conversation_id), 0);
}

#[test]
async fn timed_out_send_leaves_the_gate_usable() {
    let chat = impatient();
    let alice = chat.user();
    let bob = chat.user();
    let conversation_id = chat
        .conversation_service
        .find_or_create_direct(alice, bob.user_id)
        .await
        .unwrap()
        .conversation
        .id;

    chat.conversations.delay_reads(Duration::from_millis(200));
    let timed_out = chat
        .message_service
        .send(alice, conversation_id, SendMessageRequest::text("first try"))
        .await;
    assert!(matches!(timed_out, Err(AppError::ServiceUnavailable { .. })));

    chat.conversations.delay_reads(Duration::ZERO);
    let retried = chat
        .message_service
        .send(alice, conversation_id, SendMessageRequest::text("second try"))
        .await;
    assert!(retried.is_ok());
    assert_eq!(chat.fanout.gate().tracked_conversations(), 0);
}

#[test]
async fn timed_out_send_persists_nothing_and_retries_once() {
    let chat = impatient();
    let alice = chat.user();
    let bob = chat.user();
    let conversation_id = chat
        .conversation_service
        .find_or_create_direct(alice, bob.user_id)
        .await
        .unwrap()
        .conversation
        .id;

    chat.messages.delay_writes(Some(Duration::from_millis(300)));
    let timed_out = chat
        .message_service
        .send(alice, conversation_id, SendMessageRequest::text("only once"))
        .await;
    assert!(matches!(timed_out, Err(AppError::ServiceUnavailable { .. })));

    let conversation = chat.conversations.get(conversation_id).unwrap();
    assert_eq!(chat.messages.count_in(conversation_id), 0);
    assert_eq!(conversation.message_count, 0);
    assert!(conversation.last_message.is_none());
    assert_eq!(chat.conversations.unread(conversation_id, bob.user_id), 0);

    chat.messages.delay_writes(None);
    let sent = chat
        .message_service
        .send(alice, conversation_id, SendMessageRequest::text("only once"))
        .await
        .unwrap();

    let conversation = chat.conversations.get(conversation_id).unwrap();
    assert_eq!(chat.messages.ids_in(conversation_id), vec![sent.id]);
    assert_eq!(conversation.message_count, 1);
    assert_eq!(
        conversation.last_message.map(|snapshot| snapshot.message_id),
        Some(sent.id)
    );
    assert_eq!(chat.conversations.unread(conversation_id, bob.user_id), 1);
}

#[test]
async fn timed_out_delete_keeps_message_and_snapshot() {
    let chat = impatient();
    let alice = chat.user();
    let bob = chat.user();
    let conversation_id = chat
        .conversation_service
        .find_or_create_direct(alice, bob.user_id)
        .await
        .unwrap()
        .conversation
        .id;
    let sent = chat
        .message_service
        .send(alice, conversation_id, SendMessageRequest::text("keep me"))
        .await
        .unwrap();

    chat.messages.delay_writes(Some(Duration::from_millis(300)));
    let timed_out = chat.message_service.delete(alice, sent.id).await;
    assert!(matches!(timed_out, Err(AppError::ServiceUnavailable { .. })));

    let conversation = chat.conversations.get(conversation_id).unwrap();
    assert!(chat.messages.get(sent.id).is_some());
    assert_eq!(conversation.message_count, 1);
    assert_eq!(
        conversation.last_message.map(|snapshot| snapshot.message_id),
        Some(sent.id)
    );

    chat.messages.delay_writes(None);
    chat.message_service.delete(alice, sent.id).await.unwrap();
    let conversation = chat.conversations.get(conversation_id).unwrap();
    assert_eq!(conversation.message_count, 0);
    assert!(conversation.last_message.is_none());
}
