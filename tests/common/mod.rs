#![allow(dead_code)]

use std::env;
use std::sync::Arc;

use marketplace_chat::api::routes::AppState;
use marketplace_chat::application::{
    ChatRepositories, ConversationService, MessageService, StoreDeadline,
};
use marketplace_chat::config::{AuthConfig, ChatConfig, SecurityConfig};
use marketplace_chat::delivery::DeliveryFanout;
use marketplace_chat::domain::{Caller, Role, User};
use marketplace_chat::infrastructure::db::run_migrations;
use marketplace_chat::observability::AppMetrics;
use marketplace_chat::utils::jwt::create_access_token;
use once_cell::sync::Lazy;
use sqlx::postgres::{PgConnection, PgPool, PgPoolOptions};
use sqlx::Connection;
use tokio::sync::{Mutex, MutexGuard};

pub mod fixtures;
pub mod mocks;

use mocks::{
    MemoryAttachmentStorage, MockConversationRepo, MockMessageRepo, MockNotificationRepo,
    MockUserRepo,
};

static TEST_DB_MUTEX: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

pub struct TestDb {
    pool: PgPool,
    _db_lock_conn: PgConnection,
    _lock: MutexGuard<'static, ()>,
}

impl TestDb {
    /// Connects to TEST_DATABASE_URL (or DATABASE_URL), migrates and truncates.
    /// Returns `None` when neither is set so local runs skip. CI must set one.
    pub async fn new() -> Option<Self> {
        dotenvy::dotenv().ok();
        let url = env::var("TEST_DATABASE_URL")
            .ok()
            .or_else(|| env::var("DATABASE_URL").ok());

        let url = match url {
            Some(url) => url,
            None => {
                if env::var("CI").is_ok() {
                    panic!("DATABASE_URL or TEST_DATABASE_URL must be set in CI");
                }
                eprintln!("Skipping test: DATABASE_URL or TEST_DATABASE_URL not set");
                return None;
            }
        };

        let lock = Lazy::force(&TEST_DB_MUTEX).lock().await;

        // Serializes reset and migration across test binaries.
        let mut db_lock_conn = PgConnection::connect(&url).await.ok()?;
        sqlx::query("SELECT pg_advisory_lock($1)")
            .bind(4242_i64)
            .execute(&mut db_lock_conn)
            .await
            .ok()?;

        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await
            .ok()?;

        run_migrations(&pool).await.ok()?;
        reset_database(&pool).await.ok()?;

        Some(Self {
            pool,
            _db_lock_conn: db_lock_conn,
            _lock: lock,
        })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn insert_user(&self, user: &User) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO profiles (id, role, username, full_name, avatar_url, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(user.id)
        .bind(user.role)
        .bind(&user.username)
        .bind(&user.full_name)
        .bind(&user.avatar_url)
        .bind(user.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

async fn reset_database(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        TRUNCATE TABLE
            message_reactions,
            messages,
            notifications,
            conversation_participants,
            conversations,
            profiles
        CASCADE
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

pub fn test_auth_config() -> AuthConfig {
    AuthConfig {
        jwt_secret: "integration-secret".to_string(),
        jwt_kid: "v1".to_string(),
        previous_jwt_secrets: Vec::new(),
        previous_jwt_kids: Vec::new(),
        jwt_expiration_seconds: 900,
        issuer: "marketplace-chat-test".to_string(),
        audience: "marketplace-chat-client".to_string(),
    }
}

pub fn bearer_for(caller: Caller) -> String {
    let token = create_access_token(caller.user_id, caller.role, &test_auth_config())
        .expect("test token should be minted");
    format!("Bearer {token}")
}

/// Chat services wired to in-memory stores.
pub struct ChatHarness {
    pub users: Arc<MockUserRepo>,
    pub conversations: Arc<MockConversationRepo>,
    pub messages: Arc<MockMessageRepo>,
    pub notifications: Arc<MockNotificationRepo>,
    pub attachments: Arc<MemoryAttachmentStorage>,
    pub fanout: DeliveryFanout,
    pub config: ChatConfig,
    pub conversation_service: Arc<ConversationService>,
    pub message_service: Arc<MessageService>,
}

impl ChatHarness {
    pub fn new() -> Self {
        Self::with_config(ChatConfig::default())
    }

    pub fn with_config(config: ChatConfig) -> Self {
        let users = Arc::new(MockUserRepo::default());
        let conversations = Arc::new(MockConversationRepo::default());
        let messages = Arc::new(MockMessageRepo::new(conversations.clone()));
        let notifications = Arc::new(MockNotificationRepo::default());
        let attachments = Arc::new(MemoryAttachmentStorage::default());
        let fanout = DeliveryFanout::new();

        let repos = ChatRepositories {
            users: users.clone(),
            conversations: conversations.clone(),
            messages: messages.clone(),
            notifications: notifications.clone(),
        };
        let conversation_service = Arc::new(ConversationService::new(
            &repos,
            fanout.clone(),
            StoreDeadline::new(config.store_timeout()),
        ));
        let message_service = Arc::new(MessageService::new(
            &repos,
            attachments.clone(),
            fanout.clone(),
            config.clone(),
        ));

        Self {
            users,
            conversations,
            messages,
            notifications,
            attachments,
            fanout,
            config,
            conversation_service,
            message_service,
        }
    }

    pub fn repositories(&self) -> ChatRepositories {
        ChatRepositories {
            users: self.users.clone(),
            conversations: self.conversations.clone(),
            messages: self.messages.clone(),
            notifications: self.notifications.clone(),
        }
    }

    /// Registers a fresh user and returns them as a caller.
    pub fn user(&self) -> Caller {
        let user = fixtures::test_user();
        let caller = Caller::new(user.id, Role::User);
        self.users.push(user);
        caller
    }

    pub fn named_user(&self, full_name: &str) -> Caller {
        let mut user = fixtures::test_user();
        user.full_name = Some(full_name.to_string());
        let caller = Caller::new(user.id, Role::User);
        self.users.push(user);
        caller
    }

    pub fn app_state(&self) -> AppState {
        AppState {
            conversation_service: self.conversation_service.clone(),
            message_service: self.message_service.clone(),
            fanout: self.fanout.clone(),
            security: SecurityConfig::default(),
            app_environment: "test".to_string(),
            metrics: Arc::new(AppMetrics::default()),
            db_pool: None,
        }
    }
}
