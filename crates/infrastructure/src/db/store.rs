use async_trait::async_trait;
use domain::{RoomName, Store, StoreError, StoredMessage, Username};
use sqlx::FromRow;
use time::OffsetDateTime;
use tracing::debug;

use super::{map_sqlx_err, DbPool};

/// 数据库消息模型
#[derive(Debug, Clone, FromRow)]
struct MessageRow {
    room_name: String,
    author: String,
    content: String,
    created_at: OffsetDateTime,
}

impl TryFrom<MessageRow> for StoredMessage {
    type Error = StoreError;

    fn try_from(row: MessageRow) -> Result<Self, StoreError> {
        let room = RoomName::parse(row.room_name)
            .map_err(|err| StoreError::storage(format!("invalid room name in row: {err}")))?;
        let author = Username::parse(row.author)
            .map_err(|err| StoreError::storage(format!("invalid author in row: {err}")))?;
        Ok(StoredMessage::new(room, author, row.content, row.created_at))
    }
}

/// 消息仓储的 Postgres 实现。
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn append_message(&self, message: StoredMessage) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO messages (room_name, author, content, created_at) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(message.room.as_str())
        .bind(message.author.as_str())
        .bind(&message.content)
        .bind(message.created_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        debug!(room = %message.room, "message appended");
        Ok(())
    }

    async fn recent_messages(
        &self,
        room: &RoomName,
        limit: u32,
    ) -> Result<Vec<StoredMessage>, StoreError> {
        let rows: Vec<MessageRow> = sqlx::query_as(
            "SELECT room_name, author, content, created_at FROM messages \
             WHERE room_name = $1 ORDER BY created_at DESC, id DESC LIMIT $2",
        )
        .bind(room.as_str())
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        rows.into_iter().map(StoredMessage::try_from).collect()
    }

    async fn delete_room_cascade(&self, room: &RoomName) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM messages WHERE room_name = $1")
            .bind(room.as_str())
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_err)?;

        debug!(room = %room, deleted = result.rows_affected(), "room messages deleted");
        Ok(())
    }
}
