//! 广播引擎：把一条消息按成员快照同步扇出到房间内的每条连接。
//!
//! 单条连接投递失败（通道关闭、慢客户端超时）只记入报告，绝不中断
//! 对其余连接的投递，也绝不修改中枢的成员状态：成员变更始终由
//! 连接所属的会话单点执行。

use std::sync::Arc;
use std::time::Duration;

use domain::{RoomName, StoredMessage};
use thiserror::Error;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::connection::{CloseCode, ConnectionHandle, ConnectionId, OutboundFrame};
use crate::hub::ConnectionHub;

/// 单条连接的投递失败原因。
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryError {
    /// 对端出站队列长时间占满，放弃本次投递
    #[error("delivery timed out")]
    Timeout,
    /// 对端已断开
    #[error("connection closed")]
    Closed,
}

/// 一次广播的结果汇总。
#[derive(Debug, Clone, Default)]
pub struct DeliveryReport {
    /// 快照中的连接数
    pub attempted: usize,
    /// 投递失败的连接；由各自的会话在断连时自行注销
    pub failed: Vec<ConnectionId>,
}

impl DeliveryReport {
    pub fn delivered(&self) -> usize {
        self.attempted - self.failed.len()
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

pub struct BroadcastEngine {
    hub: Arc<ConnectionHub>,
    send_timeout: Duration,
}

impl BroadcastEngine {
    pub fn new(hub: Arc<ConnectionHub>, send_timeout: Duration) -> Self {
        Self { hub, send_timeout }
    }

    /// 向房间当前快照内的所有连接投递一行文本。
    ///
    /// 同步扇出：返回时每条连接要么已入队，要么已记入失败列表。
    /// 各接收方之间的先后顺序不作保证，但对同一接收方，多次广播
    /// 的到达顺序与调用顺序一致。
    pub async fn broadcast(&self, room: &RoomName, line: &str) -> DeliveryReport {
        let snapshot = self.hub.snapshot(room).await;
        let mut report = DeliveryReport {
            attempted: snapshot.len(),
            failed: Vec::new(),
        };

        for connection in &snapshot {
            if let Err(err) = self
                .push(connection, OutboundFrame::Text(line.to_owned()))
                .await
            {
                warn!(
                    room = %room,
                    connection = %connection.id(),
                    error = %err,
                    "delivery failed, skipping recipient"
                );
                report.failed.push(connection.id());
            }
        }

        debug!(
            room = %room,
            attempted = report.attempted,
            failed = report.failed.len(),
            "broadcast complete"
        );
        report
    }

    /// 把历史消息按时间正序回放给单条连接（单接收方的退化广播）。
    ///
    /// 调用方负责把存储返回的倒序结果先反转为最旧在前。
    pub async fn deliver_history(
        &self,
        connection: &ConnectionHandle,
        messages: &[StoredMessage],
    ) -> Result<(), DeliveryError> {
        for message in messages {
            self.push(connection, OutboundFrame::Text(message.render()))
                .await?;
        }
        Ok(())
    }

    /// 向单条连接发送关闭帧，用于服务端主动断开（例如房间被删除）。
    /// 失败只记日志：对端多半已经断开。
    pub async fn close_connection(
        &self,
        connection: &ConnectionHandle,
        code: CloseCode,
        reason: &str,
    ) {
        let frame = OutboundFrame::Close {
            code,
            reason: reason.to_owned(),
        };
        if let Err(err) = self.push(connection, frame).await {
            debug!(connection = %connection.id(), error = %err, "close frame not delivered");
        }
    }

    async fn push(
        &self,
        connection: &ConnectionHandle,
        frame: OutboundFrame,
    ) -> Result<(), DeliveryError> {
        match timeout(self.send_timeout, connection.send(frame)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(DeliveryError::Closed),
            Err(_) => Err(DeliveryError::Timeout),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::{Identity, Role, Timestamp, Username};
    use time::macros::datetime;
    use tokio::sync::mpsc;

    fn handle(name: &str, capacity: usize) -> (ConnectionHandle, mpsc::Receiver<OutboundFrame>) {
        let (tx, rx) = mpsc::channel(capacity);
        let identity = Identity::new(Username::parse(name).unwrap(), Role::User);
        (ConnectionHandle::new(identity, tx), rx)
    }

    fn room(name: &str) -> RoomName {
        RoomName::parse(name).unwrap()
    }

    fn ts() -> Timestamp {
        datetime!(2024-05-01 12:00 UTC)
    }

    async fn engine_with(hub: Arc<ConnectionHub>) -> BroadcastEngine {
        BroadcastEngine::new(hub, Duration::from_millis(100))
    }

    #[tokio::test]
    async fn broadcast_reaches_every_member() {
        let hub = Arc::new(ConnectionHub::new());
        let general = room("general");
        let (a, mut rx_a) = handle("alice", 8);
        let (b, mut rx_b) = handle("bob", 8);
        hub.register(&general, a).await.unwrap();
        hub.register(&general, b).await.unwrap();

        let engine = engine_with(hub).await;
        let report = engine.broadcast(&general, "alice: hi").await;

        assert_eq!(report.attempted, 2);
        assert!(report.is_clean());
        assert_eq!(
            rx_a.recv().await,
            Some(OutboundFrame::Text("alice: hi".into()))
        );
        assert_eq!(
            rx_b.recv().await,
            Some(OutboundFrame::Text("alice: hi".into()))
        );
    }

    #[tokio::test]
    async fn per_recipient_order_is_broadcast_order() {
        let hub = Arc::new(ConnectionHub::new());
        let general = room("general");
        let (a, mut rx_a) = handle("alice", 32);
        let (b, mut rx_b) = handle("bob", 32);
        hub.register(&general, a).await.unwrap();
        hub.register(&general, b).await.unwrap();

        let engine = engine_with(hub).await;
        for i in 0..10 {
            let report = engine.broadcast(&general, &format!("msg {i}")).await;
            assert!(report.is_clean());
        }

        for rx in [&mut rx_a, &mut rx_b] {
            for i in 0..10 {
                assert_eq!(
                    rx.recv().await,
                    Some(OutboundFrame::Text(format!("msg {i}")))
                );
            }
        }
    }

    #[tokio::test]
    async fn dead_recipient_does_not_abort_broadcast() {
        let hub = Arc::new(ConnectionHub::new());
        let general = room("general");
        let (dead, rx_dead) = handle("dead", 8);
        let (live, mut rx_live) = handle("live", 8);
        let dead_id = dead.id();
        hub.register(&general, dead).await.unwrap();
        hub.register(&general, live).await.unwrap();

        drop(rx_dead); // 模拟 socket 已断开

        let engine = engine_with(hub.clone()).await;
        let report = engine.broadcast(&general, "still going").await;

        assert_eq!(report.attempted, 2);
        assert_eq!(report.failed, vec![dead_id]);
        assert_eq!(
            rx_live.recv().await,
            Some(OutboundFrame::Text("still going".into()))
        );

        // 广播本身不修改成员状态
        assert_eq!(hub.snapshot(&general).await.len(), 2);
    }

    #[tokio::test]
    async fn stuck_recipient_times_out_without_stalling_room() {
        let hub = Arc::new(ConnectionHub::new());
        let general = room("general");
        // 容量 1 且无人消费：第二帧起即占满，触发超时路径
        let (stuck, _rx_stuck) = handle("stuck", 1);
        let (live, mut rx_live) = handle("live", 8);
        let stuck_id = stuck.id();
        hub.register(&general, stuck).await.unwrap();
        hub.register(&general, live).await.unwrap();

        let engine = engine_with(hub).await;
        let first = engine.broadcast(&general, "one").await;
        assert!(first.is_clean());

        let second = engine.broadcast(&general, "two").await;
        assert_eq!(second.failed, vec![stuck_id]);
        assert_eq!(rx_live.recv().await, Some(OutboundFrame::Text("one".into())));
        assert_eq!(rx_live.recv().await, Some(OutboundFrame::Text("two".into())));
    }

    #[tokio::test]
    async fn history_replay_preserves_chronological_order() {
        let (conn, mut rx) = handle("carol", 8);
        let hub = Arc::new(ConnectionHub::new());
        let engine = engine_with(hub).await;

        let general = room("general");
        let alice = Username::parse("alice").unwrap();
        let messages = vec![
            StoredMessage::new(general.clone(), alice.clone(), "first", ts()),
            StoredMessage::new(general.clone(), alice.clone(), "second", ts()),
        ];

        engine.deliver_history(&conn, &messages).await.unwrap();

        assert_eq!(
            rx.recv().await,
            Some(OutboundFrame::Text("alice: first".into()))
        );
        assert_eq!(
            rx.recv().await,
            Some(OutboundFrame::Text("alice: second".into()))
        );
    }
}
