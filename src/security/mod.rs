//! Browser-facing hardening: CORS allowlist and default response headers.

use actix_cors::Cors;
use actix_web::http::header;
use actix_web::middleware::DefaultHeaders;

use crate::config::SecurityConfig;

const PREFLIGHT_MAX_AGE_SECS: usize = 600;

pub fn cors_middleware(config: &SecurityConfig) -> Cors {
    let allowlist = config.cors_allowed_origins.clone();

    Cors::default()
        .supports_credentials()
        .allowed_headers(vec![header::AUTHORIZATION, header::CONTENT_TYPE])
        .allowed_methods(vec!["GET", "POST", "PATCH", "DELETE", "OPTIONS"])
        .expose_headers(vec![
            header::RETRY_AFTER,
            header::HeaderName::from_static("x-request-id"),
        ])
        .max_age(PREFLIGHT_MAX_AGE_SECS)
        .allowed_origin_fn(move |origin, _| {
            origin
                .to_str()
                .map(|value| origin_allowed(&allowlist, value))
                .unwrap_or(false)
        })
}

/// Exact match only; a trailing slash counts as the same origin.
pub fn origin_allowed(allowlist: &[String], origin: &str) -> bool {
    let origin = origin.trim_end_matches('/');
    allowlist
        .iter()
        .any(|allowed| allowed.trim_end_matches('/') == origin)
}

pub fn security_headers() -> DefaultHeaders {
    DefaultHeaders::new()
        .add((
            "Strict-Transport-Security",
            "max-age=31536000; includeSubDomains",
        ))
        .add(("X-Content-Type-Options", "nosniff"))
        .add(("X-Frame-Options", "DENY"))
        .add(("Referrer-Policy", "no-referrer"))
        // Chat payloads carry private content.
        .add(("Cache-Control", "no-store"))
        .add((
            "Content-Security-Policy",
            "default-src 'none'; frame-ancestors 'none'",
        ))
}
