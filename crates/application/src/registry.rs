//! 房间注册表：房间存在性与元数据的唯一裁定者。
//!
//! 在线连接集合为空或缺失都不代表房间不存在，那只是中枢的瞬时
//! 状态；房间的生死由这里的元数据仓储说了算。

use std::sync::Arc;

use domain::{
    DomainError, Identity, Room, RoomName, RoomRepository, Store, StoreError, StoredMessage,
};
use tracing::{info, warn};

use crate::broadcast::BroadcastEngine;
use crate::clock::Clock;
use crate::connection::CloseCode;
use crate::error::ApplicationError;
use crate::hub::ConnectionHub;

pub struct RoomRegistryDependencies {
    pub rooms: Arc<dyn RoomRepository>,
    pub store: Arc<dyn Store>,
    pub hub: Arc<ConnectionHub>,
    pub engine: Arc<BroadcastEngine>,
    pub clock: Arc<dyn Clock>,
}

pub struct RoomRegistry {
    deps: RoomRegistryDependencies,
}

impl RoomRegistry {
    pub fn new(deps: RoomRegistryDependencies) -> Self {
        Self { deps }
    }

    pub async fn exists(&self, name: &RoomName) -> Result<bool, ApplicationError> {
        Ok(self.deps.rooms.find(name).await?.is_some())
    }

    /// 房间不存在时返回 `DomainError::RoomNotFound`。
    pub async fn require(&self, name: &RoomName) -> Result<Room, ApplicationError> {
        self.deps
            .rooms
            .find(name)
            .await?
            .ok_or_else(|| DomainError::RoomNotFound.into())
    }

    pub async fn is_restricted(&self, name: &RoomName) -> Result<bool, ApplicationError> {
        Ok(self.require(name).await?.is_restricted)
    }

    pub async fn list(&self) -> Result<Vec<Room>, ApplicationError> {
        Ok(self.deps.rooms.list().await?)
    }

    /// 创建房间。仅管理员可调用；名称已占用时返回 `RoomAlreadyExists`。
    pub async fn create(
        &self,
        actor: &Identity,
        name: RoomName,
        description: Option<String>,
        is_restricted: bool,
    ) -> Result<Room, ApplicationError> {
        if !actor.role.is_admin() {
            return Err(DomainError::InsufficientPermissions.into());
        }

        let room = Room::new(
            name,
            description,
            is_restricted,
            actor.username.clone(),
            self.deps.clock.now(),
        );

        let created = match self.deps.rooms.insert(room).await {
            Ok(room) => room,
            Err(StoreError::Conflict(_)) => return Err(DomainError::RoomAlreadyExists.into()),
            Err(err) => return Err(err.into()),
        };

        info!(room = %created.name, created_by = %actor.username, "room created");
        Ok(created)
    }

    /// 删除房间：级联删除历史消息，并强制断开房间内的所有在线连接。
    ///
    /// 整个流程持有该房间的发布锁，与任何进行中的“持久化后广播”以及
    /// 加入流程互斥；元数据先删（新加入立即失败），随后驱逐在线连接。
    pub async fn delete(&self, actor: &Identity, name: &RoomName) -> Result<(), ApplicationError> {
        if !actor.role.is_admin() {
            return Err(DomainError::InsufficientPermissions.into());
        }

        let guard = self.deps.hub.publish_guard(name).await;

        if !self.deps.rooms.delete(name).await? {
            return Err(DomainError::RoomNotFound.into());
        }

        if let Err(err) = self.deps.store.delete_room_cascade(name).await {
            // 元数据已删；历史清理失败只记日志，不把孤儿房间留给调用方
            warn!(room = %name, error = %err, "message cascade failed");
        }

        let evicted = self.deps.hub.evict_room(name).await;
        for connection in &evicted {
            self.deps
                .engine
                .close_connection(connection, CloseCode::Normal, "room deleted")
                .await;
        }
        drop(guard);

        info!(room = %name, evicted = evicted.len(), deleted_by = %actor.username, "room deleted");
        Ok(())
    }

    /// 房间最近的历史消息，最新在前（管理/查询接口用）。
    pub async fn recent_messages(
        &self,
        name: &RoomName,
        limit: u32,
    ) -> Result<Vec<StoredMessage>, ApplicationError> {
        self.require(name).await?;
        Ok(self.deps.store.recent_messages(name, limit).await?)
    }
}
