use serde::{Deserialize, Serialize};

use crate::value_objects::{RoomName, Timestamp, Username};

/// 聊天室元数据。
///
/// 房间由管理员创建；除描述外不可变更，删除时级联清理历史消息并
/// 驱逐所有在线连接。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub name: RoomName,
    pub description: Option<String>,
    /// 受限房间仅允许管理员加入
    pub is_restricted: bool,
    pub created_by: Username,
    pub created_at: Timestamp,
}

impl Room {
    pub fn new(
        name: RoomName,
        description: Option<String>,
        is_restricted: bool,
        created_by: Username,
        created_at: Timestamp,
    ) -> Self {
        Self {
            name,
            description,
            is_restricted,
            created_by,
            created_at,
        }
    }
}
