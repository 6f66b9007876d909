//! UseCase: 接続の確立
//!
//! 認証 → 接続の登録（オンライン通知） → チャンネル購読 の順に行う。
//! 認証に失敗した場合はコアの状態に一切触れない。

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use crate::domain::{AuthVerifier, AuthenticatedUser, Connection, MessagePusher, PusherChannel};

use super::{
    error::ConnectError, presence::PresenceUseCase, room_subscription::RoomSubscriptionUseCase,
};

pub struct ConnectUserUseCase {
    auth_verifier: Arc<dyn AuthVerifier>,
    presence: Arc<PresenceUseCase>,
    rooms: Arc<RoomSubscriptionUseCase>,
    message_pusher: Arc<dyn MessagePusher>,
    running: Arc<AtomicBool>,
}

impl ConnectUserUseCase {
    pub fn new(
        auth_verifier: Arc<dyn AuthVerifier>,
        presence: Arc<PresenceUseCase>,
        rooms: Arc<RoomSubscriptionUseCase>,
        message_pusher: Arc<dyn MessagePusher>,
        running: Arc<AtomicBool>,
    ) -> Self {
        Self {
            auth_verifier,
            presence,
            rooms,
            message_pusher,
            running,
        }
    }

    /// 資格情報を検証する
    ///
    /// トランスポートのアップグレード前に呼ばれ、失敗時は接続を拒否する。
    pub async fn authenticate(&self, token: Option<&str>) -> Result<AuthenticatedUser, ConnectError> {
        self.ensure_running()?;
        let token = token.unwrap_or_default();
        self.auth_verifier
            .verify_connection(token)
            .await
            .map_err(|e| {
                tracing::warn!("Connection rejected: {}", e);
                ConnectError::Auth(e)
            })
    }

    /// 認証済みユーザーの接続を登録し、チャンネルを購読する
    ///
    /// 所属ルームの取得に失敗しても接続は維持し、`error` イベントで知らせる。
    pub async fn establish(
        &self,
        user: AuthenticatedUser,
        sender: PusherChannel,
    ) -> Result<Connection, ConnectError> {
        // 認証の間に停止された場合
        self.ensure_running()?;

        let connection = self.presence.register(user, sender).await;
        match self.rooms.join_user_rooms(&connection).await {
            Ok(rooms) => {
                tracing::info!(
                    connection_id = %connection.id,
                    user_id = %connection.user_id(),
                    rooms = rooms.len(),
                    "Connection established"
                );
            }
            Err(e) => {
                tracing::warn!(
                    connection_id = %connection.id,
                    user_id = %connection.user_id(),
                    "Failed to subscribe member rooms: {}",
                    e
                );
                if let Err(push_error) = self
                    .message_pusher
                    .push_to(&connection.id, &e.to_event())
                    .await
                {
                    tracing::warn!("Failed to report subscription error: {}", push_error);
                }
            }
        }
        Ok(connection)
    }

    /// `authenticate` と `establish` をまとめて行う
    pub async fn execute(
        &self,
        token: Option<&str>,
        sender: PusherChannel,
    ) -> Result<Connection, ConnectError> {
        let user = self.authenticate(token).await?;
        self.establish(user, sender).await
    }

    fn ensure_running(&self) -> Result<(), ConnectError> {
        if self.running.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(ConnectError::ShuttingDown)
        }
    }
}
