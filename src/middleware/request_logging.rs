//! Request context helpers for the access log.

use actix_web::http::header;
use actix_web::{HttpMessage, HttpRequest};
use tracing::Span;

use crate::domain::Caller;

/// The authenticated caller, once the auth extractor has run for this request.
pub fn get_user_id_from_request(req: &HttpRequest) -> String {
    req.extensions()
        .get::<Caller>()
        .map(|caller| caller.user_id.to_string())
        .unwrap_or_else(|| "anonymous".to_string())
}

/// Client address as resolved by actix-web. Forwarded headers only count
/// when a trusted proxy setup makes `realip_remote_addr` honour them.
pub fn get_client_ip(req: &HttpRequest) -> String {
    req.connection_info()
        .realip_remote_addr()
        .map(|addr| addr.to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

pub fn get_user_agent(req: &HttpRequest) -> String {
    req.headers()
        .get(header::USER_AGENT)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("unknown")
        .to_string()
}

pub fn create_request_span(
    request_id: &str,
    method: &str,
    path: &str,
    client_ip: &str,
    user_agent: &str,
) -> Span {
    tracing::info_span!(
        "request",
        request_id = %request_id,
        method = %method,
        path = %path,
        client_ip = %client_ip,
        user_agent = %user_agent,
        user_id = tracing::field::Empty,
    )
}

pub fn get_status_class(status: u16) -> &'static str {
    match status {
        200..=299 => "2xx",
        300..=399 => "3xx",
        400..=499 => "4xx",
        500..=599 => "5xx",
        _ => "unknown",
    }
}
