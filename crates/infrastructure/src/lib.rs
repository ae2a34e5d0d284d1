//! 基础设施层：外部协作者能力的具体实现。
//!
//! - [`auth`]：基于 JWT 的令牌签发与验证
//! - [`db`]：Postgres 持久化（消息、房间元数据、用户目录）
//! - [`memory`]：内存实现，用于集成测试与本地开发

pub mod auth;
pub mod db;
pub mod memory;

pub use auth::JwtAuthService;
pub use db::{create_pg_pool, DbPool, PgRoomRepository, PgStore, PgUserDirectory};
pub use memory::{InMemoryRoomRepository, InMemoryStore, InMemoryUserDirectory};
