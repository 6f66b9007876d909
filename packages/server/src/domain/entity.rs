//! エンティティ定義

use super::value_object::{
    ConnectionId, DisplayName, MessageContent, MessageId, MessageKind, RoomId, Timestamp, UserId,
};

/// 認証済みユーザー
///
/// 認証コラボレーターが資格情報を検証した結果。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: UserId,
    pub display_name: DisplayName,
}

impl AuthenticatedUser {
    pub fn new(user_id: UserId, display_name: DisplayName) -> Self {
        Self {
            user_id,
            display_name,
        }
    }
}

/// 接続
///
/// 認証に成功したトランスポート接続 1 本を表す。
/// 切断処理は `Connection` を値で受け取って消費するため、切断後に再利用されることはない。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    pub id: ConnectionId,
    pub user: AuthenticatedUser,
    pub connected_at: Timestamp,
}

impl Connection {
    pub fn new(id: ConnectionId, user: AuthenticatedUser, connected_at: Timestamp) -> Self {
        Self {
            id,
            user,
            connected_at,
        }
    }

    pub fn user_id(&self) -> &UserId {
        &self.user.user_id
    }

    pub fn display_name(&self) -> &DisplayName {
        &self.user.display_name
    }
}

/// 永続化済みのチャットメッセージ
///
/// メッセージストアが返す行そのもの。送信者の表示名は解決済み。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub id: MessageId,
    pub room_id: RoomId,
    pub sender_id: UserId,
    pub sender_name: DisplayName,
    pub content: MessageContent,
    pub kind: MessageKind,
    pub created_at: Timestamp,
}
