//! UseCase: 接続の終了
//!
//! 接続の登録解除（必要ならオフライン通知） → 入力中状態の解除 の順に行う。
//! `Connection` を値で受け取るため、同じ接続を二度切断することはない。

use std::sync::Arc;

use crate::domain::Connection;

use super::{presence::PresenceUseCase, typing_indicator::TypingIndicatorUseCase};

/// 切断処理の結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Teardown {
    /// ユーザーの最後の接続だったか
    pub went_offline: bool,
    /// 解除した入力中エントリの数
    pub typing_cleared: usize,
}

pub struct DisconnectUserUseCase {
    presence: Arc<PresenceUseCase>,
    typing: Arc<TypingIndicatorUseCase>,
}

impl DisconnectUserUseCase {
    pub fn new(presence: Arc<PresenceUseCase>, typing: Arc<TypingIndicatorUseCase>) -> Self {
        Self { presence, typing }
    }

    pub async fn execute(&self, connection: Connection) -> Teardown {
        let went_offline = self
            .presence
            .unregister(&connection.id)
            .await
            .is_some_and(|unregistration| unregistration.went_offline);
        let typing_cleared = self.typing.clear_user(connection.user_id()).await;

        tracing::info!(
            connection_id = %connection.id,
            user_id = %connection.user_id(),
            went_offline,
            typing_cleared,
            "Connection closed"
        );
        Teardown {
            went_offline,
            typing_cleared,
        }
    }
}
