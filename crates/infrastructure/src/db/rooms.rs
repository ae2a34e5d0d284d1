use async_trait::async_trait;
use domain::{Room, RoomName, RoomRepository, StoreError, UserDirectory, Username};
use sqlx::FromRow;
use time::OffsetDateTime;

use super::{map_sqlx_err, DbPool};

/// 数据库房间模型
#[derive(Debug, Clone, FromRow)]
struct RoomRow {
    name: String,
    description: Option<String>,
    is_restricted: bool,
    created_by: String,
    created_at: OffsetDateTime,
}

impl TryFrom<RoomRow> for Room {
    type Error = StoreError;

    fn try_from(row: RoomRow) -> Result<Self, StoreError> {
        let name = RoomName::parse(row.name)
            .map_err(|err| StoreError::storage(format!("invalid room name in row: {err}")))?;
        let created_by = Username::parse(row.created_by)
            .map_err(|err| StoreError::storage(format!("invalid creator in row: {err}")))?;
        Ok(Room::new(
            name,
            row.description,
            row.is_restricted,
            created_by,
            row.created_at,
        ))
    }
}

/// 房间元数据仓储的 Postgres 实现。
pub struct PgRoomRepository {
    pool: DbPool,
}

impl PgRoomRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RoomRepository for PgRoomRepository {
    async fn insert(&self, room: Room) -> Result<Room, StoreError> {
        let result = sqlx::query(
            "INSERT INTO rooms (name, description, is_restricted, created_by, created_at) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(room.name.as_str())
        .bind(&room.description)
        .bind(room.is_restricted)
        .bind(room.created_by.as_str())
        .bind(room.created_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(room),
            Err(err) => {
                let unique_violation = err
                    .as_database_error()
                    .map(|db| db.is_unique_violation())
                    .unwrap_or(false);
                if unique_violation {
                    Err(StoreError::conflict(room.name.to_string()))
                } else {
                    Err(map_sqlx_err(err))
                }
            }
        }
    }

    async fn find(&self, name: &RoomName) -> Result<Option<Room>, StoreError> {
        let row: Option<RoomRow> = sqlx::query_as(
            "SELECT name, description, is_restricted, created_by, created_at \
             FROM rooms WHERE name = $1",
        )
        .bind(name.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        row.map(Room::try_from).transpose()
    }

    async fn delete(&self, name: &RoomName) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM rooms WHERE name = $1")
            .bind(name.as_str())
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_err)?;

        Ok(result.rows_affected() > 0)
    }

    async fn list(&self) -> Result<Vec<Room>, StoreError> {
        let rows: Vec<RoomRow> = sqlx::query_as(
            "SELECT name, description, is_restricted, created_by, created_at \
             FROM rooms ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        rows.into_iter().map(Room::try_from).collect()
    }
}

/// 用户目录的 Postgres 实现。只确认主体存在；凭据管理在系统之外。
pub struct PgUserDirectory {
    pool: DbPool,
}

impl PgUserDirectory {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    async fn user_exists(&self, username: &Username) -> Result<bool, StoreError> {
        let found: Option<i32> = sqlx::query_scalar("SELECT 1 FROM users WHERE username = $1")
            .bind(username.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_err)?;

        Ok(found.is_some())
    }
}
