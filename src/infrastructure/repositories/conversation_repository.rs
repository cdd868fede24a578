use super::traits::ConversationRepository;
use crate::domain::{
    Conversation, ConversationKind, ConversationSettings, DirectKey, LastMessageSnapshot,
    Participant, ParticipantRole,
};
use crate::error::AppResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgExecutor, PgPool};
use std::collections::HashMap;
use uuid::Uuid;

const CONVERSATION_COLUMNS: &str = r#"
    c.id, c.kind, c.name, c.direct_key,
    c.last_message_id, c.last_message_preview, c.last_message_sender_id, c.last_message_at,
    c.message_count,
    c.allow_reactions, c.allow_replies, c.allow_file_sharing,
    c.only_admins_can_send, c.allow_member_invites,
    c.is_active, c.created_by, c.created_at, c.updated_at
"#;

#[derive(Debug, FromRow)]
struct ConversationRow {
    id: Uuid,
    kind: ConversationKind,
    name: Option<String>,
    direct_key: Option<String>,
    last_message_id: Option<Uuid>,
    last_message_preview: Option<String>,
    last_message_sender_id: Option<Uuid>,
    last_message_at: Option<DateTime<Utc>>,
    message_count: i64,
    allow_reactions: bool,
    allow_replies: bool,
    allow_file_sharing: bool,
    only_admins_can_send: bool,
    allow_member_invites: bool,
    is_active: bool,
    created_by: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct ParticipantRow {
    conversation_id: Uuid,
    user_id: Uuid,
    role: ParticipantRole,
    is_active: bool,
    unread_count: i64,
    joined_at: DateTime<Utc>,
    last_seen_at: Option<DateTime<Utc>>,
}

impl ConversationRow {
    fn into_conversation(self, participant_rows: Vec<ParticipantRow>) -> Conversation {
        let last_message = match (
            self.last_message_id,
            self.last_message_sender_id,
            self.last_message_at,
        ) {
            (Some(message_id), Some(sender_id), Some(sent_at)) => Some(LastMessageSnapshot {
                message_id,
                preview: self.last_message_preview.unwrap_or_default(),
                sender_id,
                sent_at,
            }),
            _ => None,
        };

        let unread_counts = participant_rows
            .iter()
            .map(|row| (row.user_id, row.unread_count))
            .collect();
        let participants = participant_rows
            .into_iter()
            .map(|row| Participant {
                user_id: row.user_id,
                role: row.role,
                is_active: row.is_active,
                joined_at: row.joined_at,
                last_seen_at: row.last_seen_at,
            })
            .collect();

        Conversation {
            id: self.id,
            kind: self.kind,
            name: self.name,
            direct_key: self.direct_key.as_deref().and_then(DirectKey::parse),
            participants,
            last_message,
            message_count: self.message_count,
            unread_counts,
            settings: ConversationSettings {
                allow_reactions: self.allow_reactions,
                allow_replies: self.allow_replies,
                allow_file_sharing: self.allow_file_sharing,
                only_admins_can_send: self.only_admins_can_send,
                allow_member_invites: self.allow_member_invites,
            },
            is_active: self.is_active,
            created_by: self.created_by,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Overwrites the snapshot and counts one more message. Run inside the
/// transaction that inserts the message.
pub(super) async fn record_last_message<'e, E>(
    executor: E,
    id: Uuid,
    snapshot: &LastMessageSnapshot,
) -> Result<(), sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query(
        r#"
        UPDATE conversations
        SET last_message_id = $2,
            last_message_preview = $3,
            last_message_sender_id = $4,
            last_message_at = $5,
            message_count = message_count + 1,
            updated_at = GREATEST(updated_at, $5)
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(snapshot.message_id)
    .bind(&snapshot.preview)
    .bind(snapshot.sender_id)
    .bind(snapshot.sent_at)
    .execute(executor)
    .await?;
    Ok(())
}

/// `unread = GREATEST(unread + delta, 0)` for each listed active participant.
pub(super) async fn increment_unread<'e, E>(
    executor: E,
    id: Uuid,
    user_ids: &[Uuid],
    delta: i64,
) -> Result<(), sqlx::Error>
where
    E: PgExecutor<'e>,
{
    if user_ids.is_empty() {
        return Ok(());
    }
    sqlx::query(
        r#"
        UPDATE conversation_participants
        SET unread_count = GREATEST(unread_count + $3, 0)
        WHERE conversation_id = $1 AND user_id = ANY($2) AND is_active
        "#,
    )
    .bind(id)
    .bind(user_ids)
    .bind(delta)
    .execute(executor)
    .await?;
    Ok(())
}

/// Decrements `message_count` (floored at 0). The snapshot moves to
/// `replacement` only while it still points at the removed message.
pub(super) async fn record_message_removed<'e, E>(
    executor: E,
    id: Uuid,
    removed_message_id: Uuid,
    replacement: Option<&LastMessageSnapshot>,
) -> Result<(), sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query(
        r#"
        UPDATE conversations
        SET message_count = GREATEST(message_count - 1, 0),
            last_message_id = CASE WHEN last_message_id = $2 THEN $3 ELSE last_message_id END,
            last_message_preview = CASE WHEN last_message_id = $2 THEN $4 ELSE last_message_preview END,
            last_message_sender_id = CASE WHEN last_message_id = $2 THEN $5 ELSE last_message_sender_id END,
            last_message_at = CASE WHEN last_message_id = $2 THEN $6 ELSE last_message_at END,
            updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(removed_message_id)
    .bind(replacement.map(|snapshot| snapshot.message_id))
    .bind(replacement.map(|snapshot| snapshot.preview.clone()))
    .bind(replacement.map(|snapshot| snapshot.sender_id))
    .bind(replacement.map(|snapshot| snapshot.sent_at))
    .execute(executor)
    .await?;
    Ok(())
}

pub struct ConversationRepositoryImpl {
    pool: PgPool,
}

impl ConversationRepositoryImpl {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn load_participants(
        &self,
        conversation_ids: &[Uuid],
    ) -> AppResult<HashMap<Uuid, Vec<ParticipantRow>>> {
        let rows = sqlx::query_as::<_, ParticipantRow>(
            r#"
            SELECT conversation_id, user_id, role, is_active, unread_count, joined_at, last_seen_at
            FROM conversation_participants
            WHERE conversation_id = ANY($1)
            ORDER BY joined_at ASC, user_id ASC
            "#,
        )
        .bind(conversation_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut grouped: HashMap<Uuid, Vec<ParticipantRow>> = HashMap::new();
        for row in rows {
            grouped.entry(row.conversation_id).or_default().push(row);
        }
        Ok(grouped)
    }

    async fn assemble(&self, rows: Vec<ConversationRow>) -> AppResult<Vec<Conversation>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = rows.iter().map(|row| row.id).collect();
        let mut participants = self.load_participants(&ids).await?;
        Ok(rows
            .into_iter()
            .map(|row| {
                let participant_rows = participants.remove(&row.id).unwrap_or_default();
                row.into_conversation(participant_rows)
            })
            .collect())
    }

    async fn find_one(&self, sql: &str, bind: String) -> AppResult<Option<Conversation>> {
        let row = sqlx::query_as::<_, ConversationRow>(sql)
            .bind(bind)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(self.assemble(vec![row]).await?.into_iter().next()),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl ConversationRepository for ConversationRepositoryImpl {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Conversation>> {
        let row = sqlx::query_as::<_, ConversationRow>(&format!(
            "SELECT {CONVERSATION_COLUMNS} FROM conversations c WHERE c.id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(self.assemble(vec![row]).await?.into_iter().next()),
            None => Ok(None),
        }
    }

    async fn find_active_direct(&self, key: &DirectKey) -> AppResult<Option<Conversation>> {
        let sql = format!(
            "SELECT {CONVERSATION_COLUMNS} FROM conversations c WHERE c.direct_key = $1 AND c.is_active"
        );
        self.find_one(&sql, key.to_string()).await
    }

    async fn insert(&self, conversation: &Conversation) -> AppResult<Conversation> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO conversations (
                id, kind, name, direct_key, message_count,
                allow_reactions, allow_replies, allow_file_sharing,
                only_admins_can_send, allow_member_invites,
                is_active, created_by, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, 0, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(conversation.id)
        .bind(conversation.kind)
        .bind(&conversation.name)
        .bind(conversation.direct_key.map(|key| key.to_string()))
        .bind(conversation.settings.allow_reactions)
        .bind(conversation.settings.allow_replies)
        .bind(conversation.settings.allow_file_sharing)
        .bind(conversation.settings.only_admins_can_send)
        .bind(conversation.settings.allow_member_invites)
        .bind(conversation.is_active)
        .bind(conversation.created_by)
        .bind(conversation.created_at)
        .bind(conversation.updated_at)
        .execute(&mut *tx)
        .await?;

        for participant in &conversation.participants {
            sqlx::query(
                r#"
                INSERT INTO conversation_participants
                    (conversation_id, user_id, role, is_active, unread_count, joined_at, last_seen_at)
                VALUES ($1, $2, $3, $4, 0, $5, $6)
                "#,
            )
            .bind(conversation.id)
            .bind(participant.user_id)
            .bind(participant.role)
            .bind(participant.is_active)
            .bind(participant.joined_at)
            .bind(participant.last_seen_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        let mut created = conversation.clone();
        created.message_count = 0;
        created.last_message = None;
        created.unread_counts = created.participants.iter().map(|p| (p.user_id, 0)).collect();
        Ok(created)
    }

    async fn list_for_user(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<Conversation>> {
        let rows = sqlx::query_as::<_, ConversationRow>(&format!(
            r#"
            SELECT {CONVERSATION_COLUMNS}
            FROM conversations c
            INNER JOIN conversation_participants cp ON cp.conversation_id = c.id
            WHERE cp.user_id = $1 AND cp.is_active AND c.is_active
            ORDER BY COALESCE(c.last_message_at, c.updated_at) DESC, c.id DESC
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        self.assemble(rows).await
    }

    async fn reset_unread(&self, id: Uuid, user_id: Uuid, observed: i64) -> AppResult<i64> {
        let remaining: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE conversation_participants
            SET unread_count = GREATEST(unread_count - $3, 0)
            WHERE conversation_id = $1 AND user_id = $2
            RETURNING unread_count
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(observed.max(0))
        .fetch_optional(&self.pool)
        .await?;
        Ok(remaining.unwrap_or(0))
    }

    async fn add_participants(
        &self,
        id: Uuid,
        user_ids: &[Uuid],
        joined_at: DateTime<Utc>,
    ) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        for user_id in user_ids {
            sqlx::query(
                r#"
                INSERT INTO conversation_participants
                    (conversation_id, user_id, role, is_active, unread_count, joined_at)
                VALUES ($1, $2, 'member', TRUE, 0, $3)
                ON CONFLICT (conversation_id, user_id) DO UPDATE
                SET is_active = TRUE, unread_count = 0, joined_at = EXCLUDED.joined_at
                WHERE NOT conversation_participants.is_active
                "#,
            )
            .bind(id)
            .bind(user_id)
            .bind(joined_at)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query("UPDATE conversations SET updated_at = $2 WHERE id = $1")
            .bind(id)
            .bind(joined_at)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn deactivate_participant(&self, id: Uuid, user_id: Uuid) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE conversation_participants
            SET is_active = FALSE, unread_count = 0
            WHERE conversation_id = $1 AND user_id = $2 AND is_active
            "#,
        )
        .bind(id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn update_settings(&self, id: Uuid, settings: &ConversationSettings) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE conversations
            SET allow_reactions = $2,
                allow_replies = $3,
                allow_file_sharing = $4,
                only_admins_can_send = $5,
                allow_member_invites = $6,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(settings.allow_reactions)
        .bind(settings.allow_replies)
        .bind(settings.allow_file_sharing)
        .bind(settings.only_admins_can_send)
        .bind(settings.allow_member_invites)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn touch_last_seen(&self, id: Uuid, user_id: Uuid, at: DateTime<Utc>) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE conversation_participants
            SET last_seen_at = GREATEST(COALESCE(last_seen_at, $3), $3)
            WHERE conversation_id = $1 AND user_id = $2
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
