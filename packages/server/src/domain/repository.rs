//! 外部コラボレーターの trait 定義
//!
//! コーディネーターが必要とする外部システム（認証・メンバーシップ・メッセージ永続化・通知）
//! へのインターフェースをドメイン層が定義します。
//! 具体的な実装は Infrastructure 層が提供します（依存性の逆転）。
//!
//! いずれのメソッドも非同期であり、呼び出し中に他の接続のハンドラが割り込む可能性がある
//! （サスペンションポイント）。呼び出し前に読んだメモリ上の状態は、呼び出し後には古くなり得る。

use async_trait::async_trait;

use super::{
    AuthError, AuthenticatedUser, ChatMessage, MessageContent, MessageKind, NotificationError,
    RoomId, StoreError, UserId,
};

/// 認証コラボレーター
///
/// 接続ごとに一度だけ、コアの状態に触れる前に呼ばれる。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuthVerifier: Send + Sync {
    async fn verify_connection(&self, token: &str) -> Result<AuthenticatedUser, AuthError>;
}

/// メンバーシップストア
///
/// コーディネーターはメンバーシップを所有せず、その「効果」をチャンネル購読としてキャッシュするだけ。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MembershipStore: Send + Sync {
    /// ユーザーが所属する全ルーム
    async fn list_rooms_for_user(&self, user_id: &UserId) -> Result<Vec<RoomId>, StoreError>;

    /// ユーザーがルームのメンバーか
    async fn is_member(&self, user_id: &UserId, room_id: &RoomId) -> Result<bool, StoreError>;

    /// ルームの全メンバー
    async fn list_members(&self, room_id: &RoomId) -> Result<Vec<UserId>, StoreError>;

    /// メンバーを追加。新たに追加された場合 `true`
    async fn add_member(&self, user_id: &UserId, room_id: &RoomId) -> Result<bool, StoreError>;

    /// メンバーを削除。実際に削除された場合 `true`
    async fn remove_member(&self, user_id: &UserId, room_id: &RoomId)
    -> Result<bool, StoreError>;
}

/// メッセージストア
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// メッセージを永続化し、送信者の表示名を解決した行を返す
    async fn persist_message(
        &self,
        room_id: &RoomId,
        sender_id: &UserId,
        content: MessageContent,
        kind: MessageKind,
    ) -> Result<ChatMessage, StoreError>;
}

/// 通知ファンアウト
///
/// メッセージのブロードキャスト後に fire-and-forget で呼ばれる。失敗してもメッセージ配信には影響しない。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationFanout: Send + Sync {
    async fn notify_room_members(
        &self,
        room_id: &RoomId,
        exclude_user_id: &UserId,
        message: &ChatMessage,
    ) -> Result<(), NotificationError>;
}
