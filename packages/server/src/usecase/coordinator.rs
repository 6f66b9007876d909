//! コーディネーター
//!
//! 全ての UseCase と共有状態（接続台帳・購読・入力中台帳）を所有する。
//! プロセスに 1 つだけ作り、UI 層からは `Arc<Coordinator>` として共有する。

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use yoriai_shared::time::Clock;

use crate::domain::{
    AuthVerifier, MembershipStore, MessagePusher, MessageStore, NotificationFanout,
};

use super::{
    connect_user::ConnectUserUseCase, disconnect_user::DisconnectUserUseCase,
    handle_command::HandleCommandUseCase, presence::PresenceUseCase,
    room_subscription::RoomSubscriptionUseCase, send_message::SendMessageUseCase,
    typing_indicator::{TypingIndicatorUseCase, DEFAULT_TYPING_EXPIRY},
};

/// コーディネーターの設定
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinatorConfig {
    /// 入力中エントリの有効期限
    pub typing_expiry: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            typing_expiry: DEFAULT_TYPING_EXPIRY,
        }
    }
}

/// 外部コラボレーター
pub struct Collaborators {
    pub auth_verifier: Arc<dyn AuthVerifier>,
    pub membership_store: Arc<dyn MembershipStore>,
    pub message_store: Arc<dyn MessageStore>,
    pub notification_fanout: Arc<dyn NotificationFanout>,
    pub message_pusher: Arc<dyn MessagePusher>,
    pub clock: Arc<dyn Clock>,
}

/// `stop` の結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopSummary {
    pub connections_closed: usize,
    pub typing_timers_cancelled: usize,
}

pub struct Coordinator {
    running: Arc<AtomicBool>,
    presence: Arc<PresenceUseCase>,
    rooms: Arc<RoomSubscriptionUseCase>,
    typing: Arc<TypingIndicatorUseCase>,
    connect_user: ConnectUserUseCase,
    disconnect_user: DisconnectUserUseCase,
    handle_command: HandleCommandUseCase,
}

impl Coordinator {
    /// コーディネーターを組み立てる（`start` するまで接続は受け付けない）
    pub fn new(collaborators: Collaborators, config: CoordinatorConfig) -> Self {
        let Collaborators {
            auth_verifier,
            membership_store,
            message_store,
            notification_fanout,
            message_pusher,
            clock,
        } = collaborators;

        let running = Arc::new(AtomicBool::new(false));
        let presence = Arc::new(PresenceUseCase::new(message_pusher.clone(), clock));
        let typing = Arc::new(TypingIndicatorUseCase::new(
            message_pusher.clone(),
            config.typing_expiry,
        ));
        let rooms = Arc::new(RoomSubscriptionUseCase::new(
            membership_store.clone(),
            message_pusher.clone(),
            presence.clone(),
            typing.clone(),
        ));
        let send_message = Arc::new(SendMessageUseCase::new(
            membership_store,
            message_store,
            message_pusher.clone(),
            notification_fanout,
            typing.clone(),
        ));
        let connect_user = ConnectUserUseCase::new(
            auth_verifier,
            presence.clone(),
            rooms.clone(),
            message_pusher.clone(),
            running.clone(),
        );
        let disconnect_user = DisconnectUserUseCase::new(presence.clone(), typing.clone());
        let handle_command =
            HandleCommandUseCase::new(rooms.clone(), typing.clone(), send_message, message_pusher);

        Self {
            running,
            presence,
            rooms,
            typing,
            connect_user,
            disconnect_user,
            handle_command,
        }
    }

    pub fn start(&self) {
        if !self.running.swap(true, Ordering::SeqCst) {
            tracing::info!("Coordinator started");
        }
    }

    /// 停止する
    ///
    /// 新規接続の受け付けを止め、入力中タイマーを全て取り消し、全接続を閉じる。
    /// 停止時にはオフライン通知などのイベントは配信しない。
    pub async fn stop(&self) -> StopSummary {
        self.running.store(false, Ordering::SeqCst);
        let typing_timers_cancelled = self.typing.shutdown().await;
        let connections_closed = self.presence.shutdown().await;
        tracing::info!(
            connections_closed,
            typing_timers_cancelled,
            "Coordinator stopped"
        );
        StopSummary {
            connections_closed,
            typing_timers_cancelled,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn presence(&self) -> &PresenceUseCase {
        &self.presence
    }

    pub fn rooms(&self) -> &RoomSubscriptionUseCase {
        &self.rooms
    }

    pub fn typing(&self) -> &TypingIndicatorUseCase {
        &self.typing
    }

    pub fn connect_user(&self) -> &ConnectUserUseCase {
        &self.connect_user
    }

    pub fn disconnect_user(&self) -> &DisconnectUserUseCase {
        &self.disconnect_user
    }

    pub fn handle_command(&self) -> &HandleCommandUseCase {
        &self.handle_command
    }
}
