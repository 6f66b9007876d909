//! UseCase: Connection Registry と Presence Tracker
//!
//! ## 責務
//!
//! - 接続の登録・登録解除（メモリ上の操作のみで、失敗しない）
//! - ユーザーのオフライン → オンライン / オンライン → オフライン遷移の検出と通知
//! - 新規接続へのオンラインユーザー一覧（スナップショット）の送信
//!
//! ## 順序の保証
//!
//! 台帳の更新は `user_online` / `user_offline` の配信より先に完了する。
//! 台帳のロックを配信が終わるまで保持するため、同じユーザーの online / offline が入れ替わって届くことはない。
//! ロック順序は常に「台帳 → MessagePusher」。

use std::sync::Arc;

use tokio::sync::Mutex;
use yoriai_shared::time::Clock;

use crate::domain::{
    AuthenticatedUser, ChannelId, Connection, ConnectionId, MessagePusher, PresenceRegistry,
    PusherChannel, ServerEvent, Timestamp, Unregistration, UserId,
};

pub struct PresenceUseCase {
    registry: Mutex<PresenceRegistry>,
    message_pusher: Arc<dyn MessagePusher>,
    clock: Arc<dyn Clock>,
}

impl PresenceUseCase {
    pub fn new(message_pusher: Arc<dyn MessagePusher>, clock: Arc<dyn Clock>) -> Self {
        Self {
            registry: Mutex::new(PresenceRegistry::new()),
            message_pusher,
            clock,
        }
    }

    /// 接続を登録する
    ///
    /// 新しい接続 ID を払い出し、送信チャンネルを MessagePusher に登録した上で、
    /// 本人にはスナップショットを、ユーザーが初めてオンラインになった場合は他の全ユーザーに `user_online` を送る。
    pub async fn register(&self, user: AuthenticatedUser, sender: PusherChannel) -> Connection {
        let connection = Connection::new(
            ConnectionId::generate(),
            user,
            Timestamp::new(self.clock.now_millis()),
        );

        let mut registry = self.registry.lock().await;
        self.message_pusher
            .register_connection(connection.id, sender)
            .await;
        let came_online = registry.register(connection.clone());

        let snapshot = ServerEvent::OnlineUsers {
            user_ids: registry.online_user_ids(),
        };
        if let Err(e) = self.message_pusher.push_to(&connection.id, &snapshot).await {
            tracing::warn!(
                connection_id = %connection.id,
                "Failed to send online users snapshot: {}",
                e
            );
        }

        if came_online {
            let targets = registry.connection_ids_except_user(connection.user_id());
            let event = ServerEvent::UserOnline {
                user_id: connection.user_id().clone(),
            };
            self.message_pusher.broadcast(&targets, &event).await;
            tracing::info!(user_id = %connection.user_id(), "User came online");
        }

        tracing::debug!(
            connection_id = %connection.id,
            user_id = %connection.user_id(),
            connections = registry.connection_ids_of(connection.user_id()).len(),
            "Connection registered"
        );
        connection
    }

    /// 接続を登録解除する
    ///
    /// 最後の接続だった場合は残りの全ユーザーに `user_offline` を送る。未登録の接続に対しては `None`。
    pub async fn unregister(&self, connection_id: &ConnectionId) -> Option<Unregistration> {
        let mut registry = self.registry.lock().await;
        let unregistration = registry.unregister(connection_id)?;
        let channels = self
            .message_pusher
            .unregister_connection(connection_id)
            .await;

        if unregistration.went_offline {
            let targets = registry.all_connection_ids();
            let event = ServerEvent::UserOffline {
                user_id: unregistration.connection.user_id().clone(),
            };
            self.message_pusher.broadcast(&targets, &event).await;
            tracing::info!(
                user_id = %unregistration.connection.user_id(),
                "User went offline"
            );
        }

        tracing::debug!(
            connection_id = %connection_id,
            rooms = channels.iter().filter_map(ChannelId::room_id).count(),
            "Connection unregistered"
        );
        Some(unregistration)
    }

    pub async fn online_user_ids(&self) -> Vec<UserId> {
        self.registry.lock().await.online_user_ids()
    }

    pub async fn is_online(&self, user_id: &UserId) -> bool {
        self.registry.lock().await.is_online(user_id)
    }

    pub async fn connection_ids_of(&self, user_id: &UserId) -> Vec<ConnectionId> {
        self.registry.lock().await.connection_ids_of(user_id)
    }

    pub async fn connection_count(&self) -> usize {
        self.registry.lock().await.connection_count()
    }

    pub async fn online_user_count(&self) -> usize {
        self.registry.lock().await.online_user_count()
    }

    /// 全接続を破棄し、送信チャンネルを閉じる（通知はしない）
    pub async fn shutdown(&self) -> usize {
        let mut registry = self.registry.lock().await;
        let drained = registry.drain();
        self.message_pusher.close_all().await;
        drained.len()
    }
}
