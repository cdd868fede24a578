use super::traits::NotificationRepository;
use crate::domain::NotificationRecord;
use crate::error::AppResult;
use async_trait::async_trait;
use sqlx::PgPool;

pub struct NotificationRepositoryImpl {
    pool: PgPool,
}

impl NotificationRepositoryImpl {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationRepository for NotificationRepositoryImpl {
    async fn create(&self, record: &NotificationRecord) -> AppResult<NotificationRecord> {
        let created = sqlx::query_as::<_, NotificationRecord>(
            r#"
            INSERT INTO notifications (id, recipient_id, kind, title, message, conversation_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, recipient_id, kind, title, message, conversation_id, created_at
            "#,
        )
        .bind(record.id)
        .bind(record.recipient_id)
        .bind(&record.kind)
        .bind(&record.title)
        .bind(&record.message)
        .bind(record.conversation_id)
        .bind(record.created_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }
}
