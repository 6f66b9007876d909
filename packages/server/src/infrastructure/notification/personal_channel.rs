//! 個人チャンネルを使った NotificationFanout 実装
//!
//! ルームの他メンバー全員の個人チャンネル（`user:{user_id}`）に `notification` イベントを配信します。
//! オフラインのメンバーには何も届きません（取りこぼしの回収は REST 側の責務）。

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::{
    ChannelId, ChatMessage, MembershipStore, MessagePusher, NotificationError, NotificationFanout,
    RoomId, ServerEvent, UserId,
};

pub struct PersonalChannelNotifier {
    membership_store: Arc<dyn MembershipStore>,
    message_pusher: Arc<dyn MessagePusher>,
}

impl PersonalChannelNotifier {
    pub fn new(
        membership_store: Arc<dyn MembershipStore>,
        message_pusher: Arc<dyn MessagePusher>,
    ) -> Self {
        Self {
            membership_store,
            message_pusher,
        }
    }
}

#[async_trait]
impl NotificationFanout for PersonalChannelNotifier {
    async fn notify_room_members(
        &self,
        room_id: &RoomId,
        exclude_user_id: &UserId,
        message: &ChatMessage,
    ) -> Result<(), NotificationError> {
        let members = self
            .membership_store
            .list_members(room_id)
            .await
            .map_err(|e| NotificationError::Failed(e.to_string()))?;

        let event = ServerEvent::Notification {
            room_id: room_id.clone(),
            message: message.clone(),
        };
        let mut delivered = 0;
        for member in members.iter().filter(|member| *member != exclude_user_id) {
            delivered += self
                .message_pusher
                .publish(&ChannelId::personal(member), &event, None)
                .await;
        }
        tracing::debug!(room_id = %room_id, delivered, "Notified room members");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::{
            ConnectionId, DisplayName, MessageContent, MessageId, MessageKind,
            MockMembershipStore, StoreError, Timestamp,
        },
        infrastructure::message_pusher::WebSocketMessagePusher,
    };
    use tokio::sync::mpsc;

    fn user(id: &str) -> UserId {
        UserId::new(id.to_string()).unwrap()
    }

    fn create_test_message(room_id: &RoomId) -> ChatMessage {
        ChatMessage {
            id: MessageId::generate(),
            room_id: room_id.clone(),
            sender_id: user("alice"),
            sender_name: DisplayName::new("Alice".to_string()).unwrap(),
            content: MessageContent::new("Hello!".to_string()).unwrap(),
            kind: MessageKind::Text,
            created_at: Timestamp::new(1000),
        }
    }

    #[tokio::test]
    async fn test_notifies_every_member_except_sender() {
        // テスト項目: 送信者以外のメンバーの個人チャンネルに通知が届く
        // given (前提条件):
        let room_id = RoomId::new("general".to_string()).unwrap();
        let mut membership = MockMembershipStore::new();
        membership
            .expect_list_members()
            .returning(|_| Ok(vec![user("alice"), user("bob")]));
        let pusher = Arc::new(WebSocketMessagePusher::new());
        let (alice_tx, mut alice_rx) = mpsc::unbounded_channel();
        let (bob_tx, mut bob_rx) = mpsc::unbounded_channel();
        let (alice_conn, bob_conn) = (ConnectionId::generate(), ConnectionId::generate());
        pusher.register_connection(alice_conn, alice_tx).await;
        pusher.register_connection(bob_conn, bob_tx).await;
        pusher
            .subscribe(&alice_conn, ChannelId::personal(&user("alice")))
            .await;
        pusher
            .subscribe(&bob_conn, ChannelId::personal(&user("bob")))
            .await;
        let notifier = PersonalChannelNotifier::new(Arc::new(membership), pusher);

        // when (操作):
        let result = notifier
            .notify_room_members(&room_id, &user("alice"), &create_test_message(&room_id))
            .await;

        // then (期待する結果):
        assert!(result.is_ok());
        let frame: serde_json::Value =
            serde_json::from_str(&bob_rx.try_recv().unwrap()).unwrap();
        assert_eq!(frame["type"], "notification");
        assert_eq!(frame["roomId"], "general");
        assert!(alice_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_store_failure_is_reported() {
        // テスト項目: メンバー一覧の取得に失敗した場合はエラーを返す
        // given (前提条件):
        let room_id = RoomId::new("general".to_string()).unwrap();
        let mut membership = MockMembershipStore::new();
        membership
            .expect_list_members()
            .returning(|_| Err(StoreError::Unavailable("db down".to_string())));
        let notifier = PersonalChannelNotifier::new(
            Arc::new(membership),
            Arc::new(WebSocketMessagePusher::new()),
        );

        // when (操作):
        let result = notifier
            .notify_room_members(&room_id, &user("alice"), &create_test_message(&room_id))
            .await;

        // then (期待する結果):
        assert!(matches!(result, Err(NotificationError::Failed(_))));
    }
}
