//! MessagePusher trait 定義
//!
//! 接続への送信とチャンネル購読（ファンアウト）のインターフェース。
//! UseCase 層はこの trait に依存し、WebSocket などの具体的な送信手段には依存しない。

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{ChannelId, ConnectionId, MessagePushError, ServerEvent};

/// 接続ごとの送信チャンネル（エンコード済みのフレームを流す）
pub type PusherChannel = mpsc::UnboundedSender<String>;

#[async_trait]
pub trait MessagePusher: Send + Sync {
    /// 接続と送信チャンネルを登録
    async fn register_connection(&self, connection_id: ConnectionId, sender: PusherChannel);

    /// 接続を登録解除し、購読していた全チャンネルから外す
    ///
    /// 購読していたチャンネルの一覧を返す。未登録の接続に対しては空。
    async fn unregister_connection(&self, connection_id: &ConnectionId) -> Vec<ChannelId>;

    /// チャンネルを購読。接続が未登録の場合は何もせず `false`
    async fn subscribe(&self, connection_id: &ConnectionId, channel: ChannelId) -> bool;

    /// チャンネルの購読を解除。購読していた場合 `true`
    async fn unsubscribe(&self, connection_id: &ConnectionId, channel: &ChannelId) -> bool;

    /// 接続が購読中か
    async fn is_subscribed(&self, connection_id: &ConnectionId, channel: &ChannelId) -> bool;

    /// 特定の接続にイベントを送信
    async fn push_to(
        &self,
        connection_id: &ConnectionId,
        event: &ServerEvent,
    ) -> Result<(), MessagePushError>;

    /// 指定した接続群にイベントを送信
    ///
    /// 一部の接続への送信失敗は他の接続への配信を妨げない。配信できた接続数を返す。
    async fn broadcast(&self, targets: &[ConnectionId], event: &ServerEvent) -> usize;

    /// チャンネルの全購読者にイベントを配信
    ///
    /// `exclude` を指定した場合、その接続には送らない。配信できた接続数を返す。
    async fn publish(
        &self,
        channel: &ChannelId,
        event: &ServerEvent,
        exclude: Option<&ConnectionId>,
    ) -> usize;

    /// 全接続の送信チャンネルを閉じ、登録を全て破棄する
    async fn close_all(&self) -> usize;
}
