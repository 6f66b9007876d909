//! Shared application state.

use std::sync::Arc;

use yoriai_shared::time::Clock;

use crate::{config::HeartbeatConfig, domain::MembershipStore, usecase::Coordinator};

/// Shared application state
pub struct AppState {
    /// コーディネーター（接続・購読・入力中・メッセージ送信）
    pub coordinator: Arc<Coordinator>,
    /// メンバーシップの変更（REST）で書き込むストア
    pub membership_store: Arc<dyn MembershipStore>,
    pub heartbeat: HeartbeatConfig,
    pub clock: Arc<dyn Clock>,
}
