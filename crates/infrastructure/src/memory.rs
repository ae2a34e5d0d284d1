//! 内存实现，用于集成测试与本地开发。
//!
//! 行为与 Postgres 实现对齐：`recent_messages` 返回最新在前，
//! `insert` 在名称冲突时返回 `Conflict`。

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use domain::{
    Room, RoomName, RoomRepository, Store, StoreError, StoredMessage, UserDirectory, Username,
};
use tokio::sync::RwLock;

#[derive(Default)]
pub struct InMemoryStore {
    messages: RwLock<Vec<StoredMessage>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn append_message(&self, message: StoredMessage) -> Result<(), StoreError> {
        self.messages.write().await.push(message);
        Ok(())
    }

    async fn recent_messages(
        &self,
        room: &RoomName,
        limit: u32,
    ) -> Result<Vec<StoredMessage>, StoreError> {
        let messages = self.messages.read().await;
        let mut recent: Vec<StoredMessage> = messages
            .iter()
            .filter(|m| &m.room == room)
            .cloned()
            .collect();
        recent.reverse();
        recent.truncate(limit as usize);
        Ok(recent)
    }

    async fn delete_room_cascade(&self, room: &RoomName) -> Result<(), StoreError> {
        self.messages.write().await.retain(|m| &m.room != room);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryRoomRepository {
    rooms: RwLock<HashMap<RoomName, Room>>,
}

impl InMemoryRoomRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RoomRepository for InMemoryRoomRepository {
    async fn insert(&self, room: Room) -> Result<Room, StoreError> {
        let mut rooms = self.rooms.write().await;
        if rooms.contains_key(&room.name) {
            return Err(StoreError::conflict(room.name.to_string()));
        }
        rooms.insert(room.name.clone(), room.clone());
        Ok(room)
    }

    async fn find(&self, name: &RoomName) -> Result<Option<Room>, StoreError> {
        Ok(self.rooms.read().await.get(name).cloned())
    }

    async fn delete(&self, name: &RoomName) -> Result<bool, StoreError> {
        Ok(self.rooms.write().await.remove(name).is_some())
    }

    async fn list(&self) -> Result<Vec<Room>, StoreError> {
        let mut rooms: Vec<Room> = self.rooms.read().await.values().cloned().collect();
        rooms.sort_by(|a, b| a.name.as_str().cmp(b.name.as_str()));
        Ok(rooms)
    }
}

#[derive(Default)]
pub struct InMemoryUserDirectory {
    users: RwLock<HashSet<String>>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_users<I, S>(users: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            users: RwLock::new(users.into_iter().map(Into::into).collect()),
        }
    }

    pub async fn add_user(&self, username: &Username) {
        self.users.write().await.insert(username.to_string());
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn user_exists(&self, username: &Username) -> Result<bool, StoreError> {
        Ok(self.users.read().await.contains(username.as_str()))
    }
}
