//! 聊天服务核心领域模型
//!
//! 包含身份、房间、消息等核心实体，以及持久化与认证的能力抽象。

pub mod errors;
pub mod identity;
pub mod message;
pub mod repository;
pub mod room;
pub mod value_objects;

// 重新导出常用类型
pub use errors::*;
pub use identity::*;
pub use message::*;
pub use repository::*;
pub use room::*;
pub use value_objects::*;
