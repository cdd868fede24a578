use super::conversation_repository::{
    increment_unread, record_last_message, record_message_removed,
};
use super::traits::MessageRepository;
use crate::domain::message::preview_text;
use crate::domain::{
    Attachment, LastMessageSnapshot, Message, MessageCursor, MessageKind, Reaction,
};
use crate::error::{AppError, AppResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgExecutor, PgPool};
use std::collections::HashMap;
use uuid::Uuid;

const MESSAGE_COLUMNS: &str = r#"
    id, conversation_id, sender_id, content, kind, file_url, file_name, file_size,
    reply_to_id, is_read, read_at, edited, edited_at, created_at
"#;

#[derive(Debug, FromRow)]
struct MessageRow {
    id: Uuid,
    conversation_id: Uuid,
    sender_id: Uuid,
    content: String,
    kind: MessageKind,
    file_url: Option<String>,
    file_name: Option<String>,
    file_size: Option<i64>,
    reply_to_id: Option<Uuid>,
    is_read: bool,
    read_at: Option<DateTime<Utc>>,
    edited: bool,
    edited_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct ReactionRow {
    message_id: Uuid,
    user_id: Uuid,
    emoji: String,
    created_at: DateTime<Utc>,
}

impl MessageRow {
    fn into_message(self, reactions: Vec<Reaction>) -> Message {
        let attachment = self.file_url.map(|file_url| Attachment {
            file_url,
            file_name: self.file_name,
            file_size: self.file_size,
        });

        Message {
            id: self.id,
            conversation_id: self.conversation_id,
            sender_id: self.sender_id,
            content: self.content,
            kind: self.kind,
            attachment,
            reply_to_id: self.reply_to_id,
            is_read: self.is_read,
            read_at: self.read_at,
            edited: self.edited,
            edited_at: self.edited_at,
            reactions,
            created_at: self.created_at,
        }
    }
}

async fn insert_row<'e, E>(executor: E, message: &Message) -> Result<MessageRow, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    let attachment = message.attachment.as_ref();
    sqlx::query_as::<_, MessageRow>(&format!(
        r#"
        INSERT INTO messages (
            id, conversation_id, sender_id, content, kind, file_url, file_name, file_size,
            reply_to_id, is_read, read_at, edited, edited_at, created_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, FALSE, NULL, FALSE, NULL, $10)
        RETURNING {MESSAGE_COLUMNS}
        "#
    ))
    .bind(message.id)
    .bind(message.conversation_id)
    .bind(message.sender_id)
    .bind(&message.content)
    .bind(message.kind)
    .bind(attachment.map(|a| a.file_url.clone()))
    .bind(attachment.and_then(|a| a.file_name.clone()))
    .bind(attachment.and_then(|a| a.file_size))
    .bind(message.reply_to_id)
    .bind(message.created_at)
    .fetch_one(executor)
    .await
}

pub struct MessageRepositoryImpl {
    pool: PgPool,
}

impl MessageRepositoryImpl {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn load_reactions(&self, message_ids: &[Uuid]) -> AppResult<HashMap<Uuid, Vec<Reaction>>> {
        if message_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = sqlx::query_as::<_, ReactionRow>(
            r#"
            SELECT message_id, user_id, emoji, created_at
            FROM message_reactions
            WHERE message_id = ANY($1)
            ORDER BY created_at ASC, user_id ASC
            "#,
        )
        .bind(message_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut grouped: HashMap<Uuid, Vec<Reaction>> = HashMap::new();
        for row in rows {
            grouped.entry(row.message_id).or_default().push(Reaction {
                user_id: row.user_id,
                emoji: row.emoji,
                created_at: row.created_at,
            });
        }
        Ok(grouped)
    }

    async fn with_reactions(&self, rows: Vec<MessageRow>) -> AppResult<Vec<Message>> {
        let ids: Vec<Uuid> = rows.iter().map(|row| row.id).collect();
        let mut reactions = self.load_reactions(&ids).await?;
        Ok(rows
            .into_iter()
            .map(|row| {
                let message_reactions = reactions.remove(&row.id).unwrap_or_default();
                row.into_message(message_reactions)
            })
            .collect())
    }

    async fn reactions_for(&self, message_id: Uuid) -> AppResult<Vec<Reaction>> {
        Ok(self
            .load_reactions(&[message_id])
            .await?
            .remove(&message_id)
            .unwrap_or_default())
    }
}

#[async_trait]
impl MessageRepository for MessageRepositoryImpl {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Message>> {
        let row = sqlx::query_as::<_, MessageRow>(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(self.with_reactions(vec![row]).await?.into_iter().next()),
            None => Ok(None),
        }
    }

    async fn find_by_ids(&self, ids: &[Uuid]) -> AppResult<Vec<Message>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query_as::<_, MessageRow>(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ANY($1)"
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        self.with_reactions(rows).await
    }

    async fn insert(&self, message: &Message) -> AppResult<Message> {
        let row = insert_row(&self.pool, message).await?;
        Ok(row.into_message(Vec::new()))
    }

    async fn insert_and_record(
        &self,
        message: &Message,
        snapshot: &LastMessageSnapshot,
        recipients: &[Uuid],
    ) -> AppResult<Message> {
        let mut tx = self.pool.begin().await?;

        let row = insert_row(&mut *tx, message).await?;
        record_last_message(&mut *tx, message.conversation_id, snapshot).await?;
        increment_unread(&mut *tx, message.conversation_id, recipients, 1).await?;

        tx.commit().await?;
        Ok(row.into_message(Vec::new()))
    }

    async fn list_page(
        &self,
        conversation_id: Uuid,
        cursor: Option<MessageCursor>,
        limit: i64,
    ) -> AppResult<Vec<Message>> {
        let rows = match cursor {
            Some(MessageCursor {
                created_at,
                id: Some(cursor_id),
            }) => {
                sqlx::query_as::<_, MessageRow>(&format!(
                    r#"
                    SELECT {MESSAGE_COLUMNS}
                    FROM messages
                    WHERE conversation_id = $1 AND (created_at, id) < ($2, $3)
                    ORDER BY created_at DESC, id DESC
                    LIMIT $4
                    "#
                ))
                .bind(conversation_id)
                .bind(created_at)
                .bind(cursor_id)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
            Some(MessageCursor {
                created_at,
                id: None,
            }) => {
                sqlx::query_as::<_, MessageRow>(&format!(
                    r#"
                    SELECT {MESSAGE_COLUMNS}
                    FROM messages
                    WHERE conversation_id = $1 AND created_at < $2
                    ORDER BY created_at DESC, id DESC
                    LIMIT $3
                    "#
                ))
                .bind(conversation_id)
                .bind(created_at)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, MessageRow>(&format!(
                    r#"
                    SELECT {MESSAGE_COLUMNS}
                    FROM messages
                    WHERE conversation_id = $1
                    ORDER BY created_at DESC, id DESC
                    LIMIT $2
                    "#
                ))
                .bind(conversation_id)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
        };

        self.with_reactions(rows).await
    }

    async fn update_content(
        &self,
        id: Uuid,
        content: &str,
        edited_at: DateTime<Utc>,
    ) -> AppResult<Option<Message>> {
        let row = sqlx::query_as::<_, MessageRow>(&format!(
            r#"
            UPDATE messages
            SET content = $2, edited = TRUE, edited_at = $3
            WHERE id = $1
            RETURNING {MESSAGE_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(content)
        .bind(edited_at)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(self.with_reactions(vec![row]).await?.into_iter().next()),
            None => Ok(None),
        }
    }

    async fn delete_and_record(&self, id: Uuid, preview_chars: usize) -> AppResult<bool> {
        let mut tx = self.pool.begin().await?;

        let conversation_id: Option<Uuid> =
            sqlx::query_scalar("DELETE FROM messages WHERE id = $1 RETURNING conversation_id")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        let Some(conversation_id) = conversation_id else {
            return Ok(false);
        };

        let replacement = sqlx::query_as::<_, MessageRow>(&format!(
            r#"
            SELECT {MESSAGE_COLUMNS}
            FROM messages
            WHERE conversation_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT 1
            "#
        ))
        .bind(conversation_id)
        .fetch_optional(&mut *tx)
        .await?
        .map(|row| LastMessageSnapshot {
            message_id: row.id,
            preview: preview_text(&row.content, preview_chars),
            sender_id: row.sender_id,
            sent_at: row.created_at,
        });

        record_message_removed(&mut *tx, conversation_id, id, replacement.as_ref()).await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn add_reaction(
        &self,
        message_id: Uuid,
        reaction: &Reaction,
    ) -> AppResult<Vec<Reaction>> {
        let inserted = sqlx::query(
            r#"
            INSERT INTO message_reactions (message_id, user_id, emoji, created_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (message_id, user_id, emoji) DO NOTHING
            "#,
        )
        .bind(message_id)
        .bind(reaction.user_id)
        .bind(&reaction.emoji)
        .bind(reaction.created_at)
        .execute(&self.pool)
        .await?;

        if inserted.rows_affected() == 0 {
            return Err(AppError::Conflict("reaction already exists".to_string()));
        }

        self.reactions_for(message_id).await
    }

    async fn remove_reaction(
        &self,
        message_id: Uuid,
        user_id: Uuid,
        emoji: &str,
    ) -> AppResult<Vec<Reaction>> {
        sqlx::query(
            "DELETE FROM message_reactions WHERE message_id = $1 AND user_id = $2 AND emoji = $3",
        )
        .bind(message_id)
        .bind(user_id)
        .bind(emoji)
        .execute(&self.pool)
        .await?;

        self.reactions_for(message_id).await
    }

    async fn mark_read_except(
        &self,
        conversation_id: Uuid,
        reader_id: Uuid,
        cutoff: DateTime<Utc>,
    ) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE messages
            SET is_read = TRUE, read_at = $3
            WHERE conversation_id = $1
              AND sender_id <> $2
              AND NOT is_read
              AND created_at <= $3
            "#,
        )
        .bind(conversation_id)
        .bind(reader_id)
        .bind(cutoff)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
