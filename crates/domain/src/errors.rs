//! 领域模型错误定义
//!
//! 定义了系统中所有可能的错误类型，提供清晰的错误上下文。

use thiserror::Error;

/// 领域模型错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// 房间不存在
    #[error("room not found")]
    RoomNotFound,

    /// 房间已存在
    #[error("room already exists")]
    RoomAlreadyExists,

    /// 用户不存在
    #[error("user not found")]
    UserNotFound,

    /// 权限不足
    #[error("insufficient permissions")]
    InsufficientPermissions,

    /// 参数验证错误
    #[error("invalid argument {field}: {reason}")]
    InvalidArgument { field: String, reason: String },
}

impl DomainError {
    /// 创建参数验证错误
    pub fn invalid_argument(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// 令牌验证错误。连接路径上任何一种都会以 policy-violation 关闭连接。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// 请求未携带令牌
    #[error("token required")]
    Missing,

    /// 令牌已过期
    #[error("token expired")]
    Expired,

    /// 令牌格式错误或声明缺失
    #[error("malformed token")]
    Malformed,

    /// 签名校验失败
    #[error("invalid token signature")]
    InvalidSignature,
}

/// 持久化层错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// 目标记录不存在
    #[error("record not found")]
    NotFound,

    /// 唯一约束冲突
    #[error("conflict: {0}")]
    Conflict(String),

    /// 底层存储故障
    #[error("storage error: {0}")]
    Storage(String),
}

impl StoreError {
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }
}

/// 领域模型结果类型
pub type DomainResult<T> = Result<T, DomainError>;
