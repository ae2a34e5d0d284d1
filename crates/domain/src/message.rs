use serde::{Deserialize, Serialize};

use crate::value_objects::{RoomName, Timestamp, Username};

/// 一条已持久化的聊天消息。只追加，不修改；随房间删除而级联删除。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredMessage {
    pub room: RoomName,
    pub author: Username,
    pub content: String,
    pub created_at: Timestamp,
}

impl StoredMessage {
    pub fn new(
        room: RoomName,
        author: Username,
        content: impl Into<String>,
        created_at: Timestamp,
    ) -> Self {
        Self {
            room,
            author,
            content: content.into(),
            created_at,
        }
    }

    /// 广播用的渲染形式：`author: content`
    pub fn render(&self) -> String {
        format!("{}: {}", self.author, self.content)
    }
}
