//! 连接句柄与出站帧定义。
//!
//! 一条连接由传输层创建的有界 mpsc 通道代表：核心只持有发送端，
//! 传输层的发送任务消费接收端并写入真实 socket。

use std::fmt;

use domain::Identity;
use tokio::sync::mpsc;
use uuid::Uuid;

/// 连接唯一标识
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 连接关闭的机器可读原因。
///
/// 在 WebSocket 部署下对应标准关闭码，但核心契约只是 code + reason，
/// 不绑定具体传输。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseCode {
    /// 正常关闭（1000）
    Normal,
    /// 策略违规：令牌无效/过期/缺失、房间不存在、权限不足（1008）
    PolicyViolation,
    /// 服务内部错误（1011）
    InternalError,
}

impl CloseCode {
    pub fn ws_code(&self) -> u16 {
        match self {
            CloseCode::Normal => 1000,
            CloseCode::PolicyViolation => 1008,
            CloseCode::InternalError => 1011,
        }
    }
}

/// 推送给单条连接的出站帧。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundFrame {
    Text(String),
    Close { code: CloseCode, reason: String },
}

/// 对一条在线连接的发送能力句柄。
///
/// 句柄在注册进 [`crate::ConnectionHub`] 后归其独占管理；发送端只被
/// 广播引擎和所属会话调用。克隆句柄只是克隆通道发送端，代价很小。
#[derive(Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    identity: Identity,
    sender: mpsc::Sender<OutboundFrame>,
}

impl ConnectionHandle {
    pub fn new(identity: Identity, sender: mpsc::Sender<OutboundFrame>) -> Self {
        Self {
            id: ConnectionId::new(),
            identity,
            sender,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// 入队一帧；通道关闭（对端已断开）时返回错误。
    ///
    /// 通道有界，队列占满时会等待，调用方需自行套超时。
    pub async fn send(&self, frame: OutboundFrame) -> Result<(), ConnectionClosed> {
        self.sender.send(frame).await.map_err(|_| ConnectionClosed)
    }
}

impl fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("id", &self.id)
            .field("username", &self.identity.username.as_str())
            .finish()
    }
}

/// 对端已断开，出站通道关闭。
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("connection closed")]
pub struct ConnectionClosed;
