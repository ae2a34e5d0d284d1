//! 单条连接的协议状态机。
//!
//! 原始实现用异常驱动断连清理；这里改为显式状态迁移：
//! `Connecting → Authenticating → Joining → Active → Closing → Closed`，
//! 清理逻辑集中在 [`ChatSession::close`]，在每条退出路径上都会执行。
//! 任何会话内的故障只影响本连接，不会波及其他会话或房间。

use std::sync::Arc;

use domain::{
    AuthError, DomainError, Identity, RoomName, Store, StoredMessage, TokenVerifier, UserDirectory,
};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::broadcast::BroadcastEngine;
use crate::clock::Clock;
use crate::connection::{CloseCode, ConnectionHandle, OutboundFrame};
use crate::error::ApplicationError;
use crate::hub::ConnectionHub;
use crate::registry::RoomRegistry;

/// 会话生命周期状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Authenticating,
    Joining,
    Active,
    Closing,
    Closed,
}

/// 会话终止的原因，映射为传输层的关闭帧。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionClose {
    pub code: CloseCode,
    pub reason: String,
}

impl SessionClose {
    pub fn normal() -> Self {
        Self {
            code: CloseCode::Normal,
            reason: String::new(),
        }
    }

    pub fn policy(reason: impl Into<String>) -> Self {
        Self {
            code: CloseCode::PolicyViolation,
            reason: reason.into(),
        }
    }

    pub fn internal(reason: impl Into<String>) -> Self {
        Self {
            code: CloseCode::InternalError,
            reason: reason.into(),
        }
    }
}

/// 会话编排所需的全部协作者。
pub struct SessionDependencies {
    pub verifier: Arc<dyn TokenVerifier>,
    pub directory: Arc<dyn UserDirectory>,
    pub store: Arc<dyn Store>,
    pub registry: Arc<RoomRegistry>,
    pub hub: Arc<ConnectionHub>,
    pub engine: Arc<BroadcastEngine>,
    pub clock: Arc<dyn Clock>,
    /// 加入房间时回放的历史消息条数上限
    pub replay_limit: u32,
}

pub struct ChatSession {
    deps: Arc<SessionDependencies>,
    outbound: mpsc::Sender<OutboundFrame>,
    state: SessionState,
    identity: Option<Identity>,
    room: Option<RoomName>,
    handle: Option<ConnectionHandle>,
    reached_active: bool,
}

impl ChatSession {
    /// 传输层接受连接后创建会话；`outbound` 是该连接出站帧的入队端。
    pub fn new(deps: Arc<SessionDependencies>, outbound: mpsc::Sender<OutboundFrame>) -> Self {
        Self {
            deps,
            outbound,
            state: SessionState::Connecting,
            identity: None,
            room: None,
            handle: None,
            reached_active: false,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    /// 校验令牌并确认其主体仍然存在。
    ///
    /// 任何失败都以 policy-violation 终止，会话永远不会进入 Joining。
    pub async fn authenticate(&mut self, token: Option<&str>) -> Result<(), SessionClose> {
        self.state = SessionState::Authenticating;

        let token = match token {
            Some(token) if !token.is_empty() => token,
            _ => return Err(SessionClose::policy(AuthError::Missing.to_string())),
        };

        let identity = self
            .deps
            .verifier
            .verify(token)
            .map_err(|err| SessionClose::policy(err.to_string()))?;

        match self.deps.directory.user_exists(&identity.username).await {
            Ok(true) => {}
            Ok(false) => return Err(SessionClose::policy("user not found")),
            Err(err) => {
                error!(error = %err, "user directory lookup failed");
                return Err(SessionClose::internal("user lookup failed"));
            }
        }

        info!(username = %identity.username, role = ?identity.role, "session authenticated");
        self.identity = Some(identity);
        Ok(())
    }

    /// 校验目标房间并完成注册、历史回放与加入通告。
    ///
    /// 注册、回放和通告在房间的发布锁内作为一个整体执行：期间不会有
    /// 其他消息完成“持久化后广播”，因此回放与实时广播之间不重不漏。
    pub async fn join(&mut self, room: &str) -> Result<(), SessionClose> {
        let Some(identity) = self.identity.clone() else {
            return Err(SessionClose::internal("join before authentication"));
        };
        self.state = SessionState::Joining;

        let Ok(room) = RoomName::parse(room) else {
            return Err(SessionClose::policy("room not found"));
        };

        let restricted = match self.deps.registry.is_restricted(&room).await {
            Ok(restricted) => restricted,
            Err(ApplicationError::Domain(DomainError::RoomNotFound)) => {
                return Err(SessionClose::policy("room not found"));
            }
            Err(err) => {
                error!(room = %room, error = %err, "room lookup failed");
                return Err(SessionClose::internal("room lookup failed"));
            }
        };
        if restricted && !identity.role.is_admin() {
            return Err(SessionClose::policy("restricted room requires admin role"));
        }

        let handle = ConnectionHandle::new(identity.clone(), self.outbound.clone());

        let guard = self.deps.hub.publish_guard(&room).await;

        if let Err(err) = self.deps.hub.register(&room, handle.clone()).await {
            error!(error = %err, "hub registration failed");
            return Err(SessionClose::internal("registration failed"));
        }
        self.handle = Some(handle.clone());
        self.room = Some(room.clone());

        // 存储返回最新在前；回放要求最旧在前
        let mut history = self
            .deps
            .store
            .recent_messages(&room, self.deps.replay_limit)
            .await
            .map_err(|err| {
                error!(room = %room, error = %err, "history fetch failed");
                SessionClose::internal("history unavailable")
            })?;
        history.reverse();

        self.deps
            .engine
            .deliver_history(&handle, &history)
            .await
            .map_err(|err| {
                warn!(room = %room, error = %err, "history replay failed");
                SessionClose::internal("history replay failed")
            })?;

        let notice = format!("{} joined the room", identity.username);
        self.deps.engine.broadcast(&room, &notice).await;
        drop(guard);

        info!(room = %room, username = %identity.username, "session joined room");
        self.state = SessionState::Active;
        self.reached_active = true;
        Ok(())
    }

    /// 处理一条入站文本。
    ///
    /// 空白消息直接丢弃。持久化与广播在房间发布锁内按序执行；
    /// 持久化失败时跳过广播并记日志，会话保持 Active：宁可丢一次
    /// 投递也不广播一条没有历史记录的“幽灵消息”。
    pub async fn handle_text(&mut self, payload: &str) -> Result<(), SessionClose> {
        if self.state != SessionState::Active {
            return Err(SessionClose::internal("message outside active state"));
        }
        // Active 状态下二者必然已就位
        let (Some(room), Some(identity)) = (self.room.clone(), self.identity.clone()) else {
            return Err(SessionClose::internal("inconsistent session state"));
        };

        let content = payload.trim();
        if content.is_empty() {
            return Ok(());
        }

        let message = StoredMessage::new(
            room.clone(),
            identity.username.clone(),
            content,
            self.deps.clock.now(),
        );

        let guard = self.deps.hub.publish_guard(&room).await;

        if let Err(err) = self.deps.store.append_message(message.clone()).await {
            error!(room = %room, error = %err, "message append failed, broadcast skipped");
            return Ok(());
        }

        let report = self.deps.engine.broadcast(&room, &message.render()).await;
        drop(guard);

        if !report.is_clean() {
            warn!(
                room = %room,
                failed = report.failed.len(),
                "broadcast had failed recipients"
            );
        }
        Ok(())
    }

    /// 终止会话并释放所有资源。每条退出路径都必须经过这里。
    ///
    /// 注销是幂等的（注册可能从未完成，或已被房间删除驱逐）；
    /// “离开”通告只在会话到达过 Active 时发送一次。
    pub async fn close(&mut self, close: SessionClose) {
        if matches!(self.state, SessionState::Closed) {
            return;
        }
        self.state = SessionState::Closing;

        if let (Some(room), Some(handle)) = (self.room.as_ref(), self.handle.as_ref()) {
            self.deps.hub.unregister(room, handle.id()).await;
        }

        if self.reached_active {
            if let (Some(room), Some(identity)) = (self.room.as_ref(), self.identity.as_ref()) {
                let notice = format!("{} left the room", identity.username);
                self.deps.engine.broadcast(room, &notice).await;
            }
            self.reached_active = false;
        }

        let _ = self
            .outbound
            .send(OutboundFrame::Close {
                code: close.code,
                reason: close.reason,
            })
            .await;

        info!(code = ?close.code, "session closed");
        self.state = SessionState::Closed;
    }
}
