//! 连接中枢：房间到在线连接集合的唯一持有者。
//!
//! 锁粒度刻意收敛到单个房间：同一房间的注册/注销/快照互斥，
//! 不同房间互不阻塞。外层映射只在查找/创建房间槽时短暂加锁。

use std::collections::HashMap;
use std::sync::Arc;

use domain::RoomName;
use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::{debug, info};

use crate::connection::{ConnectionHandle, ConnectionId};

/// 单个房间的共享状态。
///
/// `members` 保护成员集合本身；`publish` 串行化同一房间内
/// “持久化后广播”这一不可分步骤（见 [`ConnectionHub::publish_guard`]）。
/// 两把锁互不嵌套：publish 锁从不在 members 锁内部获取。
struct RoomSlot {
    members: Mutex<Vec<ConnectionHandle>>,
    publish: Arc<Mutex<()>>,
}

impl RoomSlot {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            members: Mutex::new(Vec::new()),
            publish: Arc::new(Mutex::new(())),
        })
    }
}

/// 连接中枢错误。
///
/// 重复注册属于编程错误而非用户可恢复错误：同一连接最多属于一个房间。
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HubError {
    #[error("connection {connection} already registered in room {room}")]
    AlreadyRegistered {
        connection: ConnectionId,
        room: RoomName,
    },
}

/// 房间 -> 在线连接集合的映射。
pub struct ConnectionHub {
    rooms: RwLock<HashMap<RoomName, Arc<RoomSlot>>>,
    /// 连接当前所属房间的索引，用于守住“一条连接最多在一个房间”不变量。
    /// 锁序固定为 placements -> members。
    placements: Mutex<HashMap<ConnectionId, RoomName>>,
}

impl ConnectionHub {
    pub fn new() -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            placements: Mutex::new(HashMap::new()),
        }
    }

    /// 查找或创建房间槽。读锁快路径，未命中时才升级为写锁。
    async fn slot(&self, room: &RoomName) -> Arc<RoomSlot> {
        {
            let rooms = self.rooms.read().await;
            if let Some(slot) = rooms.get(room) {
                return slot.clone();
            }
        }
        let mut rooms = self.rooms.write().await;
        rooms.entry(room.clone()).or_insert_with(RoomSlot::new).clone()
    }

    /// 将连接加入房间的成员集合。
    ///
    /// 连接已注册在任何房间时返回 [`HubError::AlreadyRegistered`]。
    pub async fn register(
        &self,
        room: &RoomName,
        connection: ConnectionHandle,
    ) -> Result<(), HubError> {
        let id = connection.id();
        {
            let mut placements = self.placements.lock().await;
            if let Some(existing) = placements.get(&id) {
                return Err(HubError::AlreadyRegistered {
                    connection: id,
                    room: existing.clone(),
                });
            }
            placements.insert(id, room.clone());
        }

        let slot = self.slot(room).await;
        slot.members.lock().await.push(connection);

        info!(room = %room, connection = %id, "connection registered");
        Ok(())
    }

    /// 将连接从房间的成员集合移除。幂等：连接不在集合中时为 no-op，
    /// 以容忍断连路径上的竞态（重复断开、删除房间时的驱逐）。
    pub async fn unregister(&self, room: &RoomName, connection: ConnectionId) {
        {
            let mut placements = self.placements.lock().await;
            if placements.get(&connection) == Some(room) {
                placements.remove(&connection);
            }
        }

        let slot = {
            let rooms = self.rooms.read().await;
            rooms.get(room).cloned()
        };
        let Some(slot) = slot else {
            return;
        };

        let mut members = slot.members.lock().await;
        let before = members.len();
        members.retain(|c| c.id() != connection);
        if members.len() < before {
            debug!(room = %room, connection = %connection, "connection unregistered");
        }
    }

    /// 返回调用时刻成员集合的稳定副本。
    ///
    /// 广播只面向快照，之后的并发注册/注销不会影响一次已经开始的投递。
    /// 不存在的房间等价于空集合：房间是否存在由 RoomRegistry 裁定。
    pub async fn snapshot(&self, room: &RoomName) -> Vec<ConnectionHandle> {
        let slot = {
            let rooms = self.rooms.read().await;
            rooms.get(room).cloned()
        };
        match slot {
            Some(slot) => slot.members.lock().await.clone(),
            None => Vec::new(),
        }
    }

    /// 获取房间的发布锁。
    ///
    /// 持有期间，同一房间内不会有第二条消息执行“持久化后广播”，
    /// 也不会有新的加入流程完成注册+历史回放，这保证了回放与实时
    /// 广播之间既不丢消息也不重复。
    pub async fn publish_guard(&self, room: &RoomName) -> OwnedMutexGuard<()> {
        let slot = self.slot(room).await;
        slot.publish.clone().lock_owned().await
    }

    /// 清空并移除整个房间槽，返回被驱逐的连接，由调用方负责关闭。
    /// 同名房间随后重建时从零成员开始。
    pub async fn evict_room(&self, room: &RoomName) -> Vec<ConnectionHandle> {
        let slot = {
            let mut rooms = self.rooms.write().await;
            rooms.remove(room)
        };
        let Some(slot) = slot else {
            return Vec::new();
        };

        let evicted: Vec<ConnectionHandle> = slot.members.lock().await.drain(..).collect();
        {
            let mut placements = self.placements.lock().await;
            for connection in &evicted {
                placements.remove(&connection.id());
            }
        }

        info!(room = %room, evicted = evicted.len(), "room evicted");
        evicted
    }
}

impl Default for ConnectionHub {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::OutboundFrame;
    use domain::{Identity, Role, Username};
    use tokio::sync::mpsc;

    fn test_handle(name: &str) -> (ConnectionHandle, mpsc::Receiver<OutboundFrame>) {
        let (tx, rx) = mpsc::channel(8);
        let identity = Identity::new(Username::parse(name).unwrap(), Role::User);
        (ConnectionHandle::new(identity, tx), rx)
    }

    fn room(name: &str) -> RoomName {
        RoomName::parse(name).unwrap()
    }

    #[tokio::test]
    async fn snapshot_tracks_register_and_unregister() {
        let hub = ConnectionHub::new();
        let general = room("general");
        let (a, _rx_a) = test_handle("alice");
        let (b, _rx_b) = test_handle("bob");

        hub.register(&general, a.clone()).await.unwrap();
        hub.register(&general, b.clone()).await.unwrap();

        let snapshot = hub.snapshot(&general).await;
        assert_eq!(snapshot.len(), 2);
        assert!(snapshot.iter().any(|c| c.id() == a.id()));
        assert!(snapshot.iter().any(|c| c.id() == b.id()));

        hub.unregister(&general, a.id()).await;
        let snapshot = hub.snapshot(&general).await;
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].id(), b.id());
    }

    #[tokio::test]
    async fn unregister_is_idempotent() {
        let hub = ConnectionHub::new();
        let general = room("general");
        let (a, _rx) = test_handle("alice");

        hub.register(&general, a.clone()).await.unwrap();
        hub.unregister(&general, a.id()).await;
        // 第二次移除以及从不存在的房间移除都必须是 no-op
        hub.unregister(&general, a.id()).await;
        hub.unregister(&room("nowhere"), a.id()).await;

        assert!(hub.snapshot(&general).await.is_empty());
    }

    #[tokio::test]
    async fn double_register_is_rejected() {
        let hub = ConnectionHub::new();
        let (a, _rx) = test_handle("alice");

        hub.register(&room("general"), a.clone()).await.unwrap();
        let err = hub.register(&room("other"), a.clone()).await.unwrap_err();
        assert!(matches!(err, HubError::AlreadyRegistered { .. }));

        // 失败的注册不能在目标房间留下痕迹
        assert!(hub.snapshot(&room("other")).await.is_empty());
    }

    #[tokio::test]
    async fn rooms_are_isolated() {
        let hub = ConnectionHub::new();
        let (a, _rx_a) = test_handle("alice");
        let (b, _rx_b) = test_handle("bob");

        hub.register(&room("general"), a.clone()).await.unwrap();
        hub.register(&room("admin_room"), b.clone()).await.unwrap();

        let general = hub.snapshot(&room("general")).await;
        assert_eq!(general.len(), 1);
        assert!(general.iter().all(|c| c.id() != b.id()));

        let admin = hub.snapshot(&room("admin_room")).await;
        assert_eq!(admin.len(), 1);
        assert!(admin.iter().all(|c| c.id() != a.id()));
    }

    #[tokio::test]
    async fn evict_room_drains_members_and_resets() {
        let hub = ConnectionHub::new();
        let general = room("general");
        let (a, _rx_a) = test_handle("alice");
        let (b, _rx_b) = test_handle("bob");

        hub.register(&general, a.clone()).await.unwrap();
        hub.register(&general, b.clone()).await.unwrap();

        let evicted = hub.evict_room(&general).await;
        assert_eq!(evicted.len(), 2);
        assert!(hub.snapshot(&general).await.is_empty());

        // 同名房间重建后从零开始，且被驱逐的连接可以重新注册
        hub.register(&general, a.clone()).await.unwrap();
        assert_eq!(hub.snapshot(&general).await.len(), 1);
    }

    #[tokio::test]
    async fn concurrent_registers_all_land() {
        let hub = Arc::new(ConnectionHub::new());
        let general = room("general");
        let mut receivers = Vec::new();
        let mut tasks = Vec::new();

        for i in 0..32 {
            let (handle, rx) = test_handle(&format!("user{i}"));
            receivers.push(rx);
            let hub = hub.clone();
            let general = general.clone();
            tasks.push(tokio::spawn(async move {
                hub.register(&general, handle).await.unwrap();
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(hub.snapshot(&general).await.len(), 32);
    }
}
