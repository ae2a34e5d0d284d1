//! Postgres 持久化实现。
//!
//! 行结构体走 `FromRow` + `query_as`，不依赖编译期数据库连接。

mod rooms;
mod store;

pub use rooms::{PgRoomRepository, PgUserDirectory};
pub use store::PgStore;

use sqlx::{Pool, Postgres};

pub type DbPool = Pool<Postgres>;

pub async fn create_pg_pool(database_url: &str, max_connections: u32) -> Result<DbPool, sqlx::Error> {
    sqlx::postgres::PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
}

pub(crate) fn map_sqlx_err(err: sqlx::Error) -> domain::StoreError {
    domain::StoreError::storage(err.to_string())
}
