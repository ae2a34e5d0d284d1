//! 应用层：连接与房间广播管理核心。
//!
//! 这里是系统中唯一存在真实并发与共享状态的部分：
//! - [`hub::ConnectionHub`] 维护房间到在线连接的映射（按房间加锁）
//! - [`broadcast::BroadcastEngine`] 按成员快照同步扇出消息
//! - [`session::ChatSession`] 驱动单条连接的协议状态机
//! - [`registry::RoomRegistry`] 负责房间元数据与级联删除

pub mod broadcast;
pub mod clock;
pub mod connection;
pub mod error;
pub mod hub;
pub mod registry;
pub mod session;


pub use broadcast::{BroadcastEngine, DeliveryError, DeliveryReport};
pub use clock::{Clock, SystemClock};
pub use connection::{CloseCode, ConnectionHandle, ConnectionId, OutboundFrame};
pub use error::ApplicationError;
pub use hub::{ConnectionHub, HubError};
pub use registry::{RoomRegistry, RoomRegistryDependencies};
pub use session::{ChatSession, SessionClose, SessionDependencies, SessionState};
