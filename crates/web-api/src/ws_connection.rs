//! WebSocket 与会话状态机之间的桥接。
//!
//! 每条连接一个出站通道：发送任务消费通道并写入 socket，收到关闭帧
//! 后写出对应的 WebSocket 关闭码并结束。接收循环把入站文本交给会话。
//! 无论哪条路径先结束，清理都经由 `session.close` 统一执行。

use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message as WsMessage, WebSocket};
use futures_util::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use tokio::sync::mpsc;
use tracing::debug;

use application::{ChatSession, OutboundFrame, SessionClose};

use crate::state::AppState;

pub(crate) async fn handle_socket(
    socket: WebSocket,
    state: AppState,
    room: String,
    token: Option<String>,
) {
    let (outbound_tx, outbound_rx) = mpsc::channel(state.chat.outbound_capacity);
    let (ws_sender, mut ws_receiver) = socket.split();

    let mut send_task = tokio::spawn(pump_outbound(outbound_rx, ws_sender));
    let mut session = ChatSession::new(state.session_deps.clone(), outbound_tx);

    let mut send_done = false;
    let close = tokio::select! {
        close = drive_session(&mut session, &mut ws_receiver, &room, token.as_deref()) => close,
        // 发送任务先结束意味着服务端已主动关闭（例如房间被删除）或 socket 已死
        _ = &mut send_task => {
            send_done = true;
            SessionClose::normal()
        }
    };

    session.close(close).await;

    // close() 已把关闭帧入队；给发送任务一点时间把它写出去
    if !send_done
        && tokio::time::timeout(Duration::from_secs(5), &mut send_task)
            .await
            .is_err()
    {
        send_task.abort();
    }
}

/// 运行认证 → 加入 → 消息循环，返回会话的终止原因。
async fn drive_session(
    session: &mut ChatSession,
    receiver: &mut SplitStream<WebSocket>,
    room: &str,
    token: Option<&str>,
) -> SessionClose {
    if let Err(close) = session.authenticate(token).await {
        return close;
    }
    if let Err(close) = session.join(room).await {
        return close;
    }

    loop {
        match receiver.next().await {
            Some(Ok(WsMessage::Text(text))) => {
                if let Err(close) = session.handle_text(text.as_str()).await {
                    return close;
                }
            }
            Some(Ok(WsMessage::Close(_))) | None => return SessionClose::normal(),
            // Ping 由 axum 自动回应；二进制帧不属于协议，忽略
            Some(Ok(_)) => continue,
            Some(Err(err)) => {
                debug!(error = %err, "websocket receive error, treating as disconnect");
                return SessionClose::normal();
            }
        }
    }
}

async fn pump_outbound(
    mut outbound: mpsc::Receiver<OutboundFrame>,
    mut sender: SplitSink<WebSocket, WsMessage>,
) {
    while let Some(frame) = outbound.recv().await {
        match frame {
            OutboundFrame::Text(text) => {
                if sender.send(WsMessage::Text(text.into())).await.is_err() {
                    break;
                }
            }
            OutboundFrame::Close { code, reason } => {
                let frame = CloseFrame {
                    code: code.ws_code(),
                    reason: reason.into(),
                };
                let _ = sender.send(WsMessage::Close(Some(frame))).await;
                break;
            }
        }
    }
}
