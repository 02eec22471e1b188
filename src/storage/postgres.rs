use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{ChatRoom, Message, MessageStatus, RoomPresence};
use crate::storage::ChatStore;

/// Postgres-backed store. Status transitions are guarded by conditional
/// `UPDATE`s and mark-seen takes row locks, so the monotonicity invariants
/// hold under concurrent sessions.
pub struct PgStore {
    pool: Pool<Postgres>,
}

impl PgStore {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

fn decode_status(value: &str) -> Result<MessageStatus, AppError> {
    MessageStatus::parse(value).ok_or_else(|| {
        AppError::Database(sqlx::Error::Decode(
            format!("invalid message status: {value}").into(),
        ))
    })
}

fn message_from_row(row: &sqlx::postgres::PgRow) -> AppResult<Message> {
    let status: String = row.get("status");
    Ok(Message {
        id: row.get("id"),
        room_id: row.get("room_id"),
        sender_id: row.get("sender_id"),
        content: row.get("content"),
        status: decode_status(&status)?,
        created_at: row.get("created_at"),
        delivered_at: row.try_get::<Option<DateTime<Utc>>, _>("delivered_at")?,
        seen_at: row.try_get::<Option<DateTime<Utc>>, _>("seen_at")?,
        seen_by: row.try_get("seen_by").unwrap_or_default(),
    })
}

fn room_from_row(row: &sqlx::postgres::PgRow) -> ChatRoom {
    ChatRoom {
        id: row.get("id"),
        name: row.try_get("name").ok(),
        is_group: row.get("is_group"),
        participants: row.try_get("participants").unwrap_or_default(),
        created_at: row.get("created_at"),
    }
}

const ROOM_SELECT: &str = r#"
    SELECT r.id, r.name, r.is_group, r.created_at,
           (SELECT array_agg(p.user_id) FROM room_participants p WHERE p.room_id = r.id) AS participants
    FROM chat_rooms r
"#;

#[async_trait]
impl ChatStore for PgStore {
    async fn find_room(&self, room_id: Uuid) -> AppResult<Option<ChatRoom>> {
        let row = sqlx::query(&format!("{ROOM_SELECT} WHERE r.id = $1"))
            .bind(room_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| room_from_row(&r)))
    }

    async fn is_participant(&self, room_id: Uuid, user_id: Uuid) -> AppResult<bool> {
        let row = sqlx::query(
            "SELECT 1 FROM room_participants WHERE room_id = $1 AND user_id = $2 LIMIT 1",
        )
        .bind(room_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.is_some())
    }

    async fn find_or_create_direct_room(&self, a: Uuid, b: Uuid) -> AppResult<ChatRoom> {
        if a == b {
            return Err(AppError::BadRequest(
                "cannot open a direct room with yourself".into(),
            ));
        }

        let mut tx = self.pool.begin().await?;

        // Serialize concurrent find-or-create for the same unordered pair.
        let (lo, hi) = if a < b { (a, b) } else { (b, a) };
        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1::text || $2::text, 0))")
            .bind(lo)
            .bind(hi)
            .execute(&mut *tx)
            .await?;

        let existing: Option<Uuid> = sqlx::query_scalar(
            r#"
            SELECT r.id FROM chat_rooms r
            WHERE r.is_group = FALSE
              AND EXISTS (SELECT 1 FROM room_participants p WHERE p.room_id = r.id AND p.user_id = $1)
              AND EXISTS (SELECT 1 FROM room_participants p WHERE p.room_id = r.id AND p.user_id = $2)
            ORDER BY r.created_at ASC
            LIMIT 1
            "#,
        )
        .bind(a)
        .bind(b)
        .fetch_optional(&mut *tx)
        .await?;

        let room_id = match existing {
            Some(id) => id,
            None => {
                let id = Uuid::new_v4();
                sqlx::query("INSERT INTO chat_rooms (id, is_group) VALUES ($1, FALSE)")
                    .bind(id)
                    .execute(&mut *tx)
                    .await?;
                sqlx::query(
                    "INSERT INTO room_participants (room_id, user_id) VALUES ($1, $2), ($1, $3)",
                )
                .bind(id)
                .bind(a)
                .bind(b)
                .execute(&mut *tx)
                .await?;
                id
            }
        };

        tx.commit().await?;

        self.find_room(room_id)
            .await?
            .ok_or(AppError::RoomNotFound)
    }

    async fn rooms_for_user(&self, user_id: Uuid) -> AppResult<Vec<ChatRoom>> {
        let rows = sqlx::query(&format!(
            r#"{ROOM_SELECT}
            WHERE EXISTS (SELECT 1 FROM room_participants p WHERE p.room_id = r.id AND p.user_id = $1)
            ORDER BY (SELECT MAX(m.created_at) FROM messages m WHERE m.room_id = r.id) DESC NULLS LAST,
                     r.created_at DESC
            "#
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(room_from_row).collect())
    }

    async fn create_message(
        &self,
        room_id: Uuid,
        sender_id: Uuid,
        content: &str,
    ) -> AppResult<Message> {
        let id = Uuid::new_v4();
        let created_at: DateTime<Utc> = sqlx::query_scalar(
            r#"
            INSERT INTO messages (id, room_id, sender_id, content, status)
            VALUES ($1, $2, $3, $4, 'pending')
            RETURNING created_at
            "#,
        )
        .bind(id)
        .bind(room_id)
        .bind(sender_id)
        .bind(content)
        .fetch_one(&self.pool)
        .await?;

        Ok(Message {
            id,
            room_id,
            sender_id,
            content: content.to_string(),
            status: MessageStatus::Pending,
            created_at,
            delivered_at: None,
            seen_at: None,
            seen_by: Vec::new(),
        })
    }

    async fn transition_status(&self, message_id: Uuid, to: MessageStatus) -> AppResult<bool> {
        let result = match to {
            // Nothing transitions back to pending.
            MessageStatus::Pending => return Ok(false),
            MessageStatus::Delivered => {
                sqlx::query(
                    "UPDATE messages SET status = 'delivered', delivered_at = NOW()
                     WHERE id = $1 AND status = 'pending'",
                )
                .bind(message_id)
                .execute(&self.pool)
                .await?
            }
            MessageStatus::Seen => {
                sqlx::query(
                    "UPDATE messages SET status = 'seen', seen_at = COALESCE(seen_at, NOW())
                     WHERE id = $1 AND status IN ('pending', 'delivered')",
                )
                .bind(message_id)
                .execute(&self.pool)
                .await?
            }
        };
        Ok(result.rows_affected() > 0)
    }

    async fn mark_seen(&self, room_id: Uuid, user_id: Uuid) -> AppResult<Vec<Uuid>> {
        // Candidate selection and the transition happen in one statement with
        // row locks, so two concurrent mark-seen calls for the same room
        // never report the same message.
        let ids: Vec<Uuid> = sqlx::query_scalar(
            r#"
            WITH candidates AS (
                SELECT m.id FROM messages m
                WHERE m.room_id = $1
                  AND m.status = 'delivered'
                  AND m.sender_id <> $2
                  AND NOT EXISTS (
                      SELECT 1 FROM message_seen_by s
                      WHERE s.message_id = m.id AND s.user_id = $2
                  )
                ORDER BY m.created_at
                FOR UPDATE
            ),
            updated AS (
                UPDATE messages m
                SET status = 'seen', seen_at = COALESCE(m.seen_at, NOW())
                WHERE m.id IN (SELECT id FROM candidates)
                RETURNING m.id
            )
            INSERT INTO message_seen_by (message_id, user_id)
            SELECT id, $2 FROM updated
            ON CONFLICT DO NOTHING
            RETURNING message_id
            "#,
        )
        .bind(room_id)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    async fn room_messages(&self, room_id: Uuid) -> AppResult<Vec<Message>> {
        let rows = sqlx::query(
            r#"
            SELECT m.id, m.room_id, m.sender_id, m.content, m.status,
                   m.created_at, m.delivered_at, m.seen_at,
                   COALESCE(array_agg(s.user_id) FILTER (WHERE s.user_id IS NOT NULL), '{}') AS seen_by
            FROM messages m
            LEFT JOIN message_seen_by s ON s.message_id = m.id
            WHERE m.room_id = $1
            GROUP BY m.id
            ORDER BY m.created_at ASC
            "#,
        )
        .bind(room_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(message_from_row).collect()
    }

    async fn upsert_presence(&self, user_id: Uuid, room_id: Uuid, online: bool) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO room_presence (user_id, room_id, is_online, last_seen)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (user_id, room_id)
            DO UPDATE SET is_online = EXCLUDED.is_online, last_seen = NOW()
            "#,
        )
        .bind(user_id)
        .bind(room_id)
        .bind(online)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn room_presence(&self, room_id: Uuid) -> AppResult<Vec<RoomPresence>> {
        let rows = sqlx::query(
            "SELECT user_id, room_id, is_online, last_seen FROM room_presence WHERE room_id = $1",
        )
        .bind(room_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| RoomPresence {
                user_id: row.get("user_id"),
                room_id: row.get("room_id"),
                is_online: row.get("is_online"),
                last_seen: row.get("last_seen"),
            })
            .collect())
    }
}
