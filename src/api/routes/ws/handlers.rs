use std::sync::Arc;

use serde_json::json;
use uuid::Uuid;

use crate::application::{ConversationService, MessageService};
use crate::delivery::DeliveryFanout;
use crate::domain::Caller;
use crate::error::{AppError, AppResult};

use super::messages::{parse_conversation_payload, parse_typing_payload, parse_ws_envelope};

pub(super) struct WsContext {
    pub caller: Caller,
    pub session_id: Uuid,
    pub fanout: DeliveryFanout,
    pub conversation_service: Arc<ConversationService>,
    pub message_service: Arc<MessageService>,
}

/// Handles one client frame. Returns the direct reply for this session, if any.
pub(super) async fn handle_text_message(
    context: &WsContext,
    text: &str,
) -> AppResult<Option<String>> {
    let envelope = parse_ws_envelope(text)?;

    let reply = match envelope.message_type.as_str() {
        "ping" => json!({ "type": "pong" }),
        "subscribe" => {
            let parsed = parse_conversation_payload(envelope.payload)?;
            // Held across the check so a concurrent leave cannot land in between.
            let _permit = context.fanout.gate().acquire(parsed.conversation_id).await;
            context
                .conversation_service
                .ensure_readable(context.caller.user_id, parsed.conversation_id)
                .await?;
            if !context
                .fanout
                .subscribe(context.session_id, parsed.conversation_id)
            {
                return Err(AppError::InternalError(anyhow::anyhow!(
                    "websocket session is no longer registered"
                )));
            }
            json!({
                "type": "subscribed",
                "payload": { "conversation_id": parsed.conversation_id }
            })
        }
        "unsubscribe" => {
            let parsed = parse_conversation_payload(envelope.payload)?;
            context
                .fanout
                .unsubscribe(context.session_id, parsed.conversation_id);
            json!({
                "type": "unsubscribed",
                "payload": { "conversation_id": parsed.conversation_id }
            })
        }
        "typing" => {
            let parsed = parse_typing_payload(envelope.payload)?;
            context
                .message_service
                .typing(
                    context.caller,
                    parsed.conversation_id,
                    parsed.is_typing.unwrap_or(true),
                )
                .await?;
            return Ok(None);
        }
        _ => json!({ "type": "error", "payload": { "code": "UNSUPPORTED_TYPE" } }),
    };

    Ok(Some(reply.to_string()))
}

pub(super) fn error_frame(error: &AppError) -> String {
    let code = match error {
        AppError::BadRequest(_) => "BAD_MESSAGE",
        other => other.error_code(),
    };
    json!({
        "type": "error",
        "payload": {
            "code": code,
            "message": error.public_message(),
            "retryable": error.is_retryable(),
        }
    })
    .to_string()
}
