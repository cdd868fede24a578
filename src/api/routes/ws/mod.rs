use std::time::Duration;

use actix_web::{web, HttpRequest, HttpResponse};
use futures_util::StreamExt;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::api::routes::AppState;
use crate::domain::Caller;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::auth_config;
use crate::utils::jwt::{bearer_token, validate_token};

mod handlers;
mod messages;

use self::handlers::{error_frame, handle_text_message, WsContext};

pub use self::messages::{WsClientEnvelope, WsConversationPayload, WsTypingPayload};

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
const HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(90);

#[derive(Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/ws", web::get().to(ws_upgrade));
}

async fn ws_upgrade(
    request: HttpRequest,
    payload: web::Payload,
    state: web::Data<AppState>,
) -> AppResult<HttpResponse> {
    if state.app_environment == "production" && !is_secure_ws_request(&request) {
        return Err(AppError::BadRequest(
            "wss is required in production".to_string(),
        ));
    }

    let caller = match authenticate_ws_caller(&request) {
        Ok(caller) => caller,
        Err(error) => {
            state.metrics.record_auth_failure();
            return Err(error);
        }
    };

    let (response, session, stream) = actix_ws::handle(&request, payload)
        .map_err(|_| AppError::BadRequest("invalid websocket upgrade".to_string()))?;

    let handle = state.fanout.connect(caller.user_id);
    let context = WsContext {
        caller,
        session_id: handle.session_id,
        fanout: state.fanout.clone(),
        conversation_service: state.conversation_service.clone(),
        message_service: state.message_service.clone(),
    };
    let metrics = state.metrics.clone();
    metrics.ws_connected();
    info!(user_id = %caller.user_id, session_id = %handle.session_id, "websocket session opened");

    actix_web::rt::spawn(async move {
        let session_id = context.session_id;
        let fanout = context.fanout.clone();
        ws_loop(session, stream, handle.receiver, context).await;
        fanout.disconnect(session_id);
        metrics.ws_disconnected();
        info!(session_id = %session_id, "websocket session closed");
    });

    Ok(response)
}

fn authenticate_ws_caller(request: &HttpRequest) -> AppResult<Caller> {
    let token = extract_ws_token(request).ok_or(AppError::Unauthorized)?;
    let config = auth_config(request)?;
    let claims = validate_token(&token, config)?;
    Ok(claims.caller())
}

fn extract_ws_token(request: &HttpRequest) -> Option<String> {
    if let Ok(query) = web::Query::<TokenQuery>::from_query(request.query_string()) {
        if let Some(token) = query.into_inner().token.filter(|token| !token.is_empty()) {
            return Some(token);
        }
    }

    if let Some(token) = request
        .headers()
        .get("Authorization")
        .and_then(|value| value.to_str().ok())
        .and_then(bearer_token)
    {
        return Some(token.to_string());
    }

    // Browsers cannot set headers on upgrade, so "bearer, <token>" rides in the protocol list.
    let protocol = request
        .headers()
        .get("Sec-WebSocket-Protocol")
        .and_then(|value| value.to_str().ok())?;
    let mut parts = protocol.split(',');
    let first = parts.next()?.trim().to_ascii_lowercase();
    let second = parts.next()?.trim();
    if first == "bearer" && !second.is_empty() {
        return Some(second.to_string());
    }
    None
}

fn is_secure_ws_request(request: &HttpRequest) -> bool {
    if request.connection_info().scheme() == "https" {
        return true;
    }

    request
        .headers()
        .get("x-forwarded-proto")
        .and_then(|value| value.to_str().ok())
        .is_some_and(|proto| proto.eq_ignore_ascii_case("https"))
}

async fn ws_loop(
    mut session: actix_ws::Session,
    mut stream: actix_ws::MessageStream,
    mut outbound_rx: mpsc::UnboundedReceiver<String>,
    context: WsContext,
) {
    let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
    let mut last_seen = tokio::time::Instant::now();

    loop {
        tokio::select! {
            _ = heartbeat.tick() => {
                if last_seen.elapsed() > HEARTBEAT_TIMEOUT {
                    debug!(session_id = %context.session_id, "websocket heartbeat timed out");
                    let _ = session.close(None).await;
                    break;
                }
                if session.ping(b"ping").await.is_err() {
                    break;
                }
            }
            maybe_message = stream.next() => {
                let Some(Ok(message)) = maybe_message else {
                    break;
                };

                match message {
                    actix_ws::Message::Ping(bytes) => {
                        last_seen = tokio::time::Instant::now();
                        if session.pong(&bytes).await.is_err() {
                            break;
                        }
                    }
                    actix_ws::Message::Pong(_) => {
                        last_seen = tokio::time::Instant::now();
                    }
                    actix_ws::Message::Text(text) => {
                        last_seen = tokio::time::Instant::now();
                        let reply = match handle_text_message(&context, &text).await {
                            Ok(reply) => reply,
                            Err(error) => Some(error_frame(&error)),
                        };
                        if let Some(reply) = reply {
                            if session.text(reply).await.is_err() {
                                break;
                            }
                        }
                    }
                    actix_ws::Message::Close(reason) => {
                        let _ = session.close(reason).await;
                        break;
                    }
                    actix_ws::Message::Binary(_) => {
                        let payload = json!({ "type": "error", "payload": { "code": "UNSUPPORTED_BINARY" } });
                        if session.text(payload.to_string()).await.is_err() {
                            break;
                        }
                    }
                    _ => {}
                }
            }
            maybe_outbound = outbound_rx.recv() => {
                let Some(frame) = maybe_outbound else {
                    break;
                };
                if session.text(frame).await.is_err() {
                    break;
                }
            }
        }
    }
}
