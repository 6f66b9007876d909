//! サーバーからクライアントへ配信するイベント
//!
//! ドメイン層ではイベントの意味だけを表現し、ワイヤーフォーマットへの変換は
//! Infrastructure 層（DTO）が担当する。

use super::{
    entity::ChatMessage,
    value_object::{DisplayName, RoomId, UserId},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    /// 接続直後に送るオンラインユーザーのスナップショット
    OnlineUsers { user_ids: Vec<UserId> },
    UserOnline { user_id: UserId },
    UserOffline { user_id: UserId },
    JoinedRoom { room_id: RoomId },
    LeftRoom { room_id: RoomId },
    RemovedFromRoom { room_id: RoomId },
    NewMessage { message: ChatMessage },
    UserTyping {
        room_id: RoomId,
        user_id: UserId,
        display_name: DisplayName,
    },
    UserStoppedTyping { room_id: RoomId, user_id: UserId },
    /// 個人チャンネルに届くアプリ通知
    Notification { room_id: RoomId, message: ChatMessage },
    Error {
        kind: ErrorKind,
        message: String,
        room_id: Option<RoomId>,
    },
}

impl ServerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::OnlineUsers { .. } => "online_users",
            Self::UserOnline { .. } => "user_online",
            Self::UserOffline { .. } => "user_offline",
            Self::JoinedRoom { .. } => "joined_room",
            Self::LeftRoom { .. } => "left_room",
            Self::RemovedFromRoom { .. } => "removed_from_room",
            Self::NewMessage { .. } => "new_message",
            Self::UserTyping { .. } => "user_typing",
            Self::UserStoppedTyping { .. } => "user_stopped_typing",
            Self::Notification { .. } => "notification",
            Self::Error { .. } => "error",
        }
    }
}

/// クライアントに返すエラーの分類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    AuthFailure,
    MembershipDenied,
    PersistenceFailure,
    InvalidCommand,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuthFailure => "auth_failure",
            Self::MembershipDenied => "membership_denied",
            Self::PersistenceFailure => "persistence_failure",
            Self::InvalidCommand => "invalid_command",
        }
    }
}
