//! UseCase 層
//!
//! コーディネーターの振る舞い（接続・在席・購読・入力中・メッセージ送信）を実装します。
//! 外部システムへのアクセスは全て Domain 層の trait 経由で行います。

pub mod connect_user;
pub mod coordinator;
pub mod disconnect_user;
pub mod error;
pub mod handle_command;
pub mod presence;
pub mod room_subscription;
pub mod send_message;
pub mod typing_indicator;

#[cfg(test)]
pub(crate) mod test_support;

pub use connect_user::ConnectUserUseCase;
pub use coordinator::{Collaborators, Coordinator, CoordinatorConfig, StopSummary};
pub use disconnect_user::{DisconnectUserUseCase, Teardown};
pub use error::{CommandError, ConnectError};
pub use handle_command::HandleCommandUseCase;
pub use presence::PresenceUseCase;
pub use room_subscription::RoomSubscriptionUseCase;
pub use send_message::SendMessageUseCase;
pub use typing_indicator::{TypingIndicatorUseCase, TypingTransition, DEFAULT_TYPING_EXPIRY};
