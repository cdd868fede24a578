use std::sync::Arc;
use std::time::Instant;

use actix_web::dev::Service as _;
use actix_web::{middleware::Logger, web, App, HttpServer};
use marketplace_chat::api::routes::{self, AppState};
use marketplace_chat::application::{ChatRepositories, ConversationService, MessageService, StoreDeadline};
use marketplace_chat::config::AppConfig;
use marketplace_chat::delivery::DeliveryFanout;
use marketplace_chat::infrastructure::db::{create_pool, run_migrations};
use marketplace_chat::infrastructure::repositories::{
    ConversationRepositoryImpl, MessageRepositoryImpl, NotificationRepositoryImpl,
    UserRepositoryImpl,
};
use marketplace_chat::infrastructure::uploads::LocalAttachmentStorage;
use marketplace_chat::middleware::request_logging::{
    create_request_span, get_client_ip, get_status_class, get_user_agent,
    get_user_id_from_request,
};
use marketplace_chat::observability::error_tracking::capture_unexpected_5xx;
use marketplace_chat::observability::AppMetrics;
use marketplace_chat::security::{cors_middleware, security_headers};
use tracing::{info, Instrument};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};
use uuid::Uuid;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env().expect("failed to load application configuration");
    config
        .validate()
        .expect("application configuration is invalid");

    let json_layer = config.logging.json_format.then(|| {
        fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
    });
    let text_layer = (!config.logging.json_format).then(fmt::layer);
    tracing_subscriber::registry()
        .with(EnvFilter::new(config.logging.level.clone()))
        .with(json_layer)
        .with(text_layer)
        .init();

    let pool = create_pool(&config.database)
        .await
        .expect("failed to create database pool");

    run_migrations(&pool)
        .await
        .expect("database migrations failed");

    let repos = ChatRepositories {
        users: Arc::new(UserRepositoryImpl::new(pool.clone())),
        conversations: Arc::new(ConversationRepositoryImpl::new(pool.clone())),
        messages: Arc::new(MessageRepositoryImpl::new(pool.clone())),
        notifications: Arc::new(NotificationRepositoryImpl::new(pool.clone())),
    };
    let fanout = DeliveryFanout::new();
    let attachments = Arc::new(LocalAttachmentStorage::from_config(&config.chat));

    let state = AppState {
        conversation_service: Arc::new(ConversationService::new(
            &repos,
            fanout.clone(),
            StoreDeadline::new(config.chat.store_timeout()),
        )),
        message_service: Arc::new(MessageService::new(
            &repos,
            attachments,
            fanout.clone(),
            config.chat.clone(),
        )),
        fanout,
        security: config.security.clone(),
        app_environment: config.app.environment.clone(),
        metrics: Arc::new(AppMetrics::default()),
        db_pool: Some(pool.clone()),
    };

    let bind_host = config.app.host.clone();
    let bind_port = config.app.port;
    let security_config = config.security.clone();
    let auth_config = config.auth.clone();
    let max_upload_bytes = config.chat.max_upload_bytes;
    let metrics = state.metrics.clone();

    info!(host = %bind_host, port = bind_port, environment = %config.app.environment, "starting chat server");

    HttpServer::new(move || {
        let metrics = metrics.clone();
        App::new()
            .wrap(Logger::default())
            .wrap_fn(move |req, srv| {
                let request_id = Uuid::new_v4().to_string();
                let path = req.path().to_string();
                let method = req.method().to_string();
                let span = create_request_span(
                    &request_id,
                    &method,
                    &path,
                    &get_client_ip(req.request()),
                    &get_user_agent(req.request()),
                );
                let request_span = span.clone();
                let metrics = metrics.clone();
                let start = Instant::now();

                let fut = srv.call(req);
                async move {
                    match fut.await {
                        Ok(mut response) => {
                            response.headers_mut().insert(
                                actix_web::http::header::HeaderName::from_static("x-request-id"),
                                actix_web::http::header::HeaderValue::from_str(&request_id)
                                    .unwrap_or_else(|_| {
                                        actix_web::http::header::HeaderValue::from_static(
                                            "invalid-request-id",
                                        )
                                    }),
                            );

                            let status = response.status().as_u16();
                            let latency_ms = start.elapsed().as_millis() as u64;
                            metrics.record_request(status, latency_ms);
                            request_span.record(
                                "user_id",
                                get_user_id_from_request(response.request()).as_str(),
                            );

                            info!(
                                status = status,
                                status_class = get_status_class(status),
                                latency_ms = latency_ms,
                                "request completed"
                            );

                            if status >= 500 {
                                let _ = capture_unexpected_5xx(&path, &method, status, &request_id);
                            }
                            Ok(response)
                        }
                        Err(error) => Err(error),
                    }
                }
                .instrument(span)
            })
            .wrap(cors_middleware(&security_config))
            .wrap(security_headers())
            .app_data(web::Data::new(state.clone()))
            .app_data(web::Data::new(auth_config.clone()))
            .app_data(web::PayloadConfig::new(max_upload_bytes))
            .configure(routes::configure)
    })
    .bind((bind_host, bind_port))?
    .run()
    .await
}
