//! クライアントから送られるコマンド
//!
//! 接続ごとの状態機械が網羅的に扱えるよう、有限の列挙型として定義する。

use super::value_object::{MessageContent, MessageKind, RoomId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    JoinRoom {
        room_id: RoomId,
    },
    LeaveRoom {
        room_id: RoomId,
    },
    SendMessage {
        room_id: RoomId,
        content: MessageContent,
        kind: MessageKind,
    },
    TypingStart {
        room_id: RoomId,
    },
    TypingStop {
        room_id: RoomId,
    },
}

impl Command {
    /// コマンドの対象ルーム
    pub fn room_id(&self) -> &RoomId {
        match self {
            Self::JoinRoom { room_id }
            | Self::LeaveRoom { room_id }
            | Self::SendMessage { room_id, .. }
            | Self::TypingStart { room_id }
            | Self::TypingStop { room_id } => room_id,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::JoinRoom { .. } => "join_room",
            Self::LeaveRoom { .. } => "leave_room",
            Self::SendMessage { .. } => "send_message",
            Self::TypingStart { .. } => "typing_start",
            Self::TypingStop { .. } => "typing_stop",
        }
    }
}
