//! UseCase: 接続からのコマンドの振り分け
//!
//! コマンドのエラーは要求元の接続にだけ `error` イベントとして返す。他の接続には影響しない。

use std::sync::Arc;

use crate::domain::{Command, Connection, ConnectionId, MessagePusher};

use super::{
    error::CommandError, room_subscription::RoomSubscriptionUseCase,
    send_message::SendMessageUseCase, typing_indicator::TypingIndicatorUseCase,
};

pub struct HandleCommandUseCase {
    rooms: Arc<RoomSubscriptionUseCase>,
    typing: Arc<TypingIndicatorUseCase>,
    send_message: Arc<SendMessageUseCase>,
    message_pusher: Arc<dyn MessagePusher>,
}

impl HandleCommandUseCase {
    pub fn new(
        rooms: Arc<RoomSubscriptionUseCase>,
        typing: Arc<TypingIndicatorUseCase>,
        send_message: Arc<SendMessageUseCase>,
        message_pusher: Arc<dyn MessagePusher>,
    ) -> Self {
        Self {
            rooms,
            typing,
            send_message,
            message_pusher,
        }
    }

    pub async fn execute(&self, connection: &Connection, command: Command) -> Result<(), CommandError> {
        let name = command.name();
        tracing::debug!(
            connection_id = %connection.id,
            room_id = %command.room_id(),
            "Handling '{}'",
            name
        );

        let result = match command {
            Command::JoinRoom { room_id } => self.rooms.join_room(connection, &room_id).await,
            Command::LeaveRoom { room_id } => {
                self.rooms.leave_room(connection, &room_id).await;
                Ok(())
            }
            Command::SendMessage {
                room_id,
                content,
                kind,
            } => self
                .send_message
                .execute(connection, &room_id, content, kind)
                .await
                .map(|_| ()),
            Command::TypingStart { room_id } => {
                self.typing.start(connection, &room_id).await.map(|_| ())
            }
            Command::TypingStop { room_id } => {
                self.typing.stop(connection, &room_id).await.map(|_| ())
            }
        };

        if let Err(e) = &result {
            tracing::warn!(
                connection_id = %connection.id,
                user_id = %connection.user_id(),
                "Command '{}' failed: {}",
                name,
                e
            );
            self.report_error(&connection.id, e).await;
        }
        result
    }

    /// エラーを `error` イベントとして接続に返す
    pub async fn report_error(&self, connection_id: &ConnectionId, error: &CommandError) {
        if let Err(e) = self
            .message_pusher
            .push_to(connection_id, &error.to_event())
            .await
        {
            tracing::warn!(connection_id = %connection_id, "Failed to report error: {}", e);
        }
    }
}
