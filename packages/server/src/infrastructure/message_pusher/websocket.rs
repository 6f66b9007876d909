//! WebSocket を使った MessagePusher 実装
//!
//! ## 責務
//!
//! - 接続ごとの `UnboundedSender` を管理
//! - チャンネル（ルーム・個人）ごとの購読者集合を管理
//! - ドメインイベントを JSON フレームにエンコードし、購読者へ配信
//!
//! ## 設計ノート
//!
//! WebSocket の生成は UI 層（`ui/handler/websocket.rs`）で行われます。
//! この実装は生成された `UnboundedSender` を受け取り、メッセージ送信に使用します。
//!
//! 1 回の publish は 1 度だけエンコードされ、ロックを保持したまま全購読者のキューに積まれます。
//! そのため、ある接続から見た配信順序は publish の順序と一致します。

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::{
    domain::{ChannelId, ConnectionId, MessagePushError, MessagePusher, PusherChannel, ServerEvent},
    infrastructure::dto::websocket::ServerMessage,
};

/// 接続ごとの送信チャンネルと購読中のチャンネル
struct ConnectionEntry {
    sender: PusherChannel,
    channels: HashSet<ChannelId>,
}

#[derive(Default)]
struct PusherState {
    /// connection_id → 接続エントリ
    connections: HashMap<ConnectionId, ConnectionEntry>,
    /// channel → 購読中の connection_id 集合（空になったらエントリごと削除）
    channels: HashMap<ChannelId, HashSet<ConnectionId>>,
}

impl PusherState {
    fn detach(&mut self, connection_id: &ConnectionId, channel: &ChannelId) {
        if let Some(subscribers) = self.channels.get_mut(channel) {
            subscribers.remove(connection_id);
            if subscribers.is_empty() {
                self.channels.remove(channel);
            }
        }
    }

    /// 1 接続への送信。失敗はその接続だけに閉じ込める
    fn deliver(&self, connection_id: &ConnectionId, frame: &str) -> bool {
        match self.connections.get(connection_id) {
            Some(entry) => match entry.sender.send(frame.to_string()) {
                Ok(()) => true,
                Err(e) => {
                    tracing::warn!(connection_id = %connection_id, "Failed to push frame: {}", e);
                    false
                }
            },
            None => {
                tracing::warn!(
                    connection_id = %connection_id,
                    "Connection not found during broadcast, skipping"
                );
                false
            }
        }
    }
}

/// WebSocket を使った MessagePusher 実装
///
/// ## 使用例
///
/// ```ignore
/// let pusher = WebSocketMessagePusher::new();
/// pusher.register_connection(connection_id, tx).await;
/// pusher.subscribe(&connection_id, ChannelId::room(&room_id)).await;
/// pusher.publish(&ChannelId::room(&room_id), &event, None).await;
/// ```
#[derive(Default)]
pub struct WebSocketMessagePusher {
    state: Mutex<PusherState>,
}

impl WebSocketMessagePusher {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登録中の接続数
    pub async fn connection_count(&self) -> usize {
        self.state.lock().await.connections.len()
    }

    /// チャンネルの購読者数
    pub async fn subscriber_count(&self, channel: &ChannelId) -> usize {
        self.state
            .lock()
            .await
            .channels
            .get(channel)
            .map_or(0, HashSet::len)
    }

    fn encode(event: &ServerEvent) -> Result<String, MessagePushError> {
        serde_json::to_string(&ServerMessage::from(event))
            .map_err(|e| MessagePushError::Encode(e.to_string()))
    }
}

#[async_trait]
impl MessagePusher for WebSocketMessagePusher {
    async fn register_connection(&self, connection_id: ConnectionId, sender: PusherChannel) {
        let mut state = self.state.lock().await;
        state.connections.insert(
            connection_id,
            ConnectionEntry {
                sender,
                channels: HashSet::new(),
            },
        );
        tracing::debug!(connection_id = %connection_id, "Connection registered to MessagePusher");
    }

    async fn unregister_connection(&self, connection_id: &ConnectionId) -> Vec<ChannelId> {
        let mut state = self.state.lock().await;
        let Some(entry) = state.connections.remove(connection_id) else {
            return Vec::new();
        };
        let channels: Vec<ChannelId> = entry.channels.into_iter().collect();
        for channel in &channels {
            state.detach(connection_id, channel);
        }
        tracing::debug!(
            connection_id = %connection_id,
            channels = channels.len(),
            "Connection unregistered from MessagePusher"
        );
        channels
    }

    async fn subscribe(&self, connection_id: &ConnectionId, channel: ChannelId) -> bool {
        let mut state = self.state.lock().await;
        let Some(entry) = state.connections.get_mut(connection_id) else {
            tracing::debug!(
                connection_id = %connection_id,
                channel = %channel,
                "Subscribe ignored: connection is gone"
            );
            return false;
        };
        entry.channels.insert(channel.clone());
        tracing::debug!(connection_id = %connection_id, channel = %channel, "Subscribed");
        state
            .channels
            .entry(channel)
            .or_default()
            .insert(*connection_id);
        true
    }

    async fn unsubscribe(&self, connection_id: &ConnectionId, channel: &ChannelId) -> bool {
        let mut state = self.state.lock().await;
        let removed = state
            .connections
            .get_mut(connection_id)
            .is_some_and(|entry| entry.channels.remove(channel));
        if removed {
            state.detach(connection_id, channel);
            tracing::debug!(connection_id = %connection_id, channel = %channel, "Unsubscribed");
        }
        removed
    }

    async fn is_subscribed(&self, connection_id: &ConnectionId, channel: &ChannelId) -> bool {
        let state = self.state.lock().await;
        state
            .connections
            .get(connection_id)
            .is_some_and(|entry| entry.channels.contains(channel))
    }

    async fn push_to(
        &self,
        connection_id: &ConnectionId,
        event: &ServerEvent,
    ) -> Result<(), MessagePushError> {
        let frame = Self::encode(event)?;
        let state = self.state.lock().await;

        let entry = state
            .connections
            .get(connection_id)
            .ok_or_else(|| MessagePushError::ConnectionNotFound(connection_id.to_string()))?;
        entry
            .sender
            .send(frame)
            .map_err(|e| MessagePushError::PushFailed(e.to_string()))?;
        tracing::debug!(connection_id = %connection_id, event = event.name(), "Pushed event");
        Ok(())
    }

    async fn broadcast(&self, targets: &[ConnectionId], event: &ServerEvent) -> usize {
        let frame = match Self::encode(event) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!(event = event.name(), "Failed to encode event: {}", e);
                return 0;
            }
        };
        let state = self.state.lock().await;

        // ブロードキャストでは一部の送信失敗を許容
        let delivered = targets
            .iter()
            .filter(|target| state.deliver(target, &frame))
            .count();
        tracing::debug!(
            event = event.name(),
            targets = targets.len(),
            delivered,
            "Broadcasted event"
        );
        delivered
    }

    async fn publish(
        &self,
        channel: &ChannelId,
        event: &ServerEvent,
        exclude: Option<&ConnectionId>,
    ) -> usize {
        let frame = match Self::encode(event) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!(event = event.name(), "Failed to encode event: {}", e);
                return 0;
            }
        };
        let state = self.state.lock().await;

        let Some(subscribers) = state.channels.get(channel) else {
            tracing::debug!(channel = %channel, event = event.name(), "No subscribers");
            return 0;
        };
        let delivered = subscribers
            .iter()
            .filter(|id| Some(*id) != exclude)
            .filter(|id| state.deliver(id, &frame))
            .count();
        tracing::debug!(
            channel = %channel,
            event = event.name(),
            delivered,
            "Published event"
        );
        delivered
    }

    async fn close_all(&self) -> usize {
        let mut state = self.state.lock().await;
        let closed = state.connections.len();
        // sender を drop すると各接続の送信ループが終了する
        state.connections.clear();
        state.channels.clear();
        closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{RoomId, UserId};
    use tokio::sync::mpsc;

    // ========================================
    // テスト作業記録
    // ========================================
    // 【何をテストするか】
    // - 接続の登録・解除とチャンネル購読表の整合性
    // - push_to: 特定の接続への送信
    // - publish: チャンネル購読者へのファンアウト（除外指定を含む）
    // - 一部の接続への送信失敗が他の接続への配信を妨げないこと
    //
    // 【なぜこのテストが必要か】
    // - MessagePusher は全てのイベント配信が通る通信層の中核
    // - 購読表が壊れると、退出したユーザーにメッセージが届くなどの不具合になる
    // ========================================

    fn room_channel(room: &str) -> ChannelId {
        ChannelId::room(&RoomId::new(room.to_string()).unwrap())
    }

    fn online_event(user: &str) -> ServerEvent {
        ServerEvent::UserOnline {
            user_id: UserId::new(user.to_string()).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_push_to_success() {
        // テスト項目: 特定の接続にイベントを送信できる
        // given (前提条件):
        let pusher = WebSocketMessagePusher::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let connection_id = ConnectionId::generate();
        pusher.register_connection(connection_id, tx).await;

        // when (操作):
        let result = pusher.push_to(&connection_id, &online_event("alice")).await;

        // then (期待する結果):
        assert!(result.is_ok());
        let frame = rx.recv().await.unwrap();
        let json: serde_json::Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(json["type"], "user_online");
        assert_eq!(json["userId"], "alice");
    }

    #[tokio::test]
    async fn test_push_to_connection_not_found() {
        // テスト項目: 未登録の接続への送信はエラーを返す
        // given (前提条件):
        let pusher = WebSocketMessagePusher::new();

        // when (操作):
        let result = pusher
            .push_to(&ConnectionId::generate(), &online_event("alice"))
            .await;

        // then (期待する結果):
        assert!(matches!(
            result,
            Err(MessagePushError::ConnectionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_publish_reaches_subscribers_except_excluded() {
        // テスト項目: publish は購読者全員に届き、除外指定した接続には届かない
        // given (前提条件):
        let pusher = WebSocketMessagePusher::new();
        let channel = room_channel("general");
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        let (tx3, mut rx3) = mpsc::unbounded_channel();
        let (c1, c2, c3) = (
            ConnectionId::generate(),
            ConnectionId::generate(),
            ConnectionId::generate(),
        );
        pusher.register_connection(c1, tx1).await;
        pusher.register_connection(c2, tx2).await;
        pusher.register_connection(c3, tx3).await;
        pusher.subscribe(&c1, channel.clone()).await;
        pusher.subscribe(&c2, channel.clone()).await;
        // c3 は購読しない

        // when (操作):
        let delivered = pusher
            .publish(&channel, &online_event("alice"), Some(&c1))
            .await;

        // then (期待する結果):
        assert_eq!(delivered, 1);
        assert!(rx1.try_recv().is_err());
        assert!(rx2.try_recv().is_ok());
        assert!(rx3.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_publish_isolates_transport_failure() {
        // テスト項目: 受信側が閉じた接続があっても、残りの購読者には配信される
        // given (前提条件):
        let pusher = WebSocketMessagePusher::new();
        let channel = room_channel("general");
        let (tx1, rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        let (c1, c2) = (ConnectionId::generate(), ConnectionId::generate());
        pusher.register_connection(c1, tx1).await;
        pusher.register_connection(c2, tx2).await;
        pusher.subscribe(&c1, channel.clone()).await;
        pusher.subscribe(&c2, channel.clone()).await;
        drop(rx1);

        // when (操作):
        let delivered = pusher.publish(&channel, &online_event("bob"), None).await;

        // then (期待する結果):
        assert_eq!(delivered, 1);
        assert!(rx2.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_subscribe_unknown_connection_is_ignored() {
        // テスト項目: 既に切断された接続の購読要求は無視される
        // given (前提条件):
        let pusher = WebSocketMessagePusher::new();
        let channel = room_channel("general");

        // when (操作):
        let subscribed = pusher.subscribe(&ConnectionId::generate(), channel.clone()).await;

        // then (期待する結果):
        assert!(!subscribed);
        assert_eq!(pusher.subscriber_count(&channel).await, 0);
    }

    #[tokio::test]
    async fn test_unregister_removes_all_subscriptions() {
        // テスト項目: 接続の登録解除で全てのチャンネル購読が外れる
        // given (前提条件):
        let pusher = WebSocketMessagePusher::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let connection_id = ConnectionId::generate();
        let general = room_channel("general");
        let random = room_channel("random");
        pusher.register_connection(connection_id, tx).await;
        pusher.subscribe(&connection_id, general.clone()).await;
        pusher.subscribe(&connection_id, random.clone()).await;

        // when (操作):
        let channels = pusher.unregister_connection(&connection_id).await;

        // then (期待する結果):
        assert_eq!(channels.len(), 2);
        assert_eq!(pusher.subscriber_count(&general).await, 0);
        assert_eq!(pusher.subscriber_count(&random).await, 0);
        assert_eq!(pusher.connection_count().await, 0);
        assert!(!pusher.is_subscribed(&connection_id, &general).await);
        assert!(!pusher.is_subscribed(&connection_id, &random).await);
    }

    #[tokio::test]
    async fn test_unsubscribe_is_idempotent() {
        // テスト項目: 購読していないチャンネルの購読解除は false を返すだけ
        // given (前提条件):
        let pusher = WebSocketMessagePusher::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let connection_id = ConnectionId::generate();
        let channel = room_channel("general");
        pusher.register_connection(connection_id, tx).await;
        pusher.subscribe(&connection_id, channel.clone()).await;

        // when (操作):
        let first = pusher.unsubscribe(&connection_id, &channel).await;
        let second = pusher.unsubscribe(&connection_id, &channel).await;

        // then (期待する結果):
        assert!(first);
        assert!(!second);
        assert!(!pusher.is_subscribed(&connection_id, &channel).await);
    }

    #[tokio::test]
    async fn test_close_all_drops_senders() {
        // テスト項目: close_all で全ての送信チャンネルが閉じられる
        // given (前提条件):
        let pusher = WebSocketMessagePusher::new();
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        pusher.register_connection(ConnectionId::generate(), tx).await;

        // when (操作):
        let closed = pusher.close_all().await;

        // then (期待する結果):
        assert_eq!(closed, 1);
        assert_eq!(rx.recv().await, None);
    }
}
