//! 外部协作者的能力抽象
//!
//! 核心只依赖这些 trait；具体实现（Postgres、JWT、内存版）在
//! infrastructure crate 中提供。

use async_trait::async_trait;

use crate::errors::{AuthError, StoreError};
use crate::identity::Identity;
use crate::message::StoredMessage;
use crate::room::Room;
use crate::value_objects::{RoomName, Username};

/// 令牌验证能力。返回连接生命周期内固定的身份与角色。
pub trait TokenVerifier: Send + Sync {
    fn verify(&self, token: &str) -> Result<Identity, AuthError>;
}

/// 用户目录。令牌校验通过后，还需确认其主体仍然存在。
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn user_exists(&self, username: &Username) -> Result<bool, StoreError>;
}

/// 消息持久化能力。
#[async_trait]
pub trait Store: Send + Sync {
    async fn append_message(&self, message: StoredMessage) -> Result<(), StoreError>;

    /// 返回房间最近的消息，按时间倒序（最新在前）。
    /// 回放给客户端时由调用方反转为时间正序。
    async fn recent_messages(
        &self,
        room: &RoomName,
        limit: u32,
    ) -> Result<Vec<StoredMessage>, StoreError>;

    /// 级联删除房间的全部历史消息。
    async fn delete_room_cascade(&self, room: &RoomName) -> Result<(), StoreError>;
}

/// 房间元数据持久化能力。
#[async_trait]
pub trait RoomRepository: Send + Sync {
    /// 名称已占用时返回 `StoreError::Conflict`。
    async fn insert(&self, room: Room) -> Result<Room, StoreError>;

    async fn find(&self, name: &RoomName) -> Result<Option<Room>, StoreError>;

    /// 返回是否确实删除了记录。
    async fn delete(&self, name: &RoomName) -> Result<bool, StoreError>;

    async fn list(&self) -> Result<Vec<Room>, StoreError>;
}
