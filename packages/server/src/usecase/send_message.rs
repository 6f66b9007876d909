//! UseCase: メッセージ送信
//!
//! ## 処理の流れ
//!
//! 1. メンバーシップの再確認（接続時の購読キャッシュは信用しない）
//! 2. メッセージストアへの永続化
//! 3. ルームチャンネルへの `new_message` 配信（永続化された行そのもの。送信者の接続にも届く）
//! 4. 送信者の入力中状態の解除
//! 5. 通知ファンアウトの起動（完了を待たない）
//!
//! 1〜3 はルームごとの順序ロックの中で行う。同じルームで永続化が先に完了したメッセージは、
//! 全ての購読者に先に届く。

use std::{collections::HashMap, sync::Arc};

use tokio::sync::Mutex;

use crate::domain::{
    ChannelId, ChatMessage, Connection, MembershipStore, MessageContent, MessageKind,
    MessagePusher, MessageStore, NotificationFanout, RoomId, ServerEvent,
};

use super::{error::CommandError, typing_indicator::TypingIndicatorUseCase};

pub struct SendMessageUseCase {
    membership_store: Arc<dyn MembershipStore>,
    message_store: Arc<dyn MessageStore>,
    message_pusher: Arc<dyn MessagePusher>,
    notification_fanout: Arc<dyn NotificationFanout>,
    typing: Arc<TypingIndicatorUseCase>,
    /// ルームごとの順序ロック（送信中のルームの分だけ保持する）
    room_sequencers: Mutex<HashMap<RoomId, Arc<Mutex<()>>>>,
}

impl SendMessageUseCase {
    pub fn new(
        membership_store: Arc<dyn MembershipStore>,
        message_store: Arc<dyn MessageStore>,
        message_pusher: Arc<dyn MessagePusher>,
        notification_fanout: Arc<dyn NotificationFanout>,
        typing: Arc<TypingIndicatorUseCase>,
    ) -> Self {
        Self {
            membership_store,
            message_store,
            message_pusher,
            notification_fanout,
            typing,
            room_sequencers: Mutex::new(HashMap::new()),
        }
    }

    /// メッセージ送信を実行
    ///
    /// # Returns
    ///
    /// * `Ok(ChatMessage)` - 永続化され、配信されたメッセージ
    /// * `Err(CommandError::MembershipDenied)` - メンバーではない（何も永続化・配信されない）
    /// * `Err(CommandError::Persistence)` - ストアのエラー（何も配信されない）
    pub async fn execute(
        &self,
        connection: &Connection,
        room_id: &RoomId,
        content: MessageContent,
        kind: MessageKind,
    ) -> Result<ChatMessage, CommandError> {
        let sender_id = connection.user_id();
        let sequencer = self.sequencer(room_id).await;
        let turn = {
            let _turn = sequencer.lock().await;
            self.persist_and_publish(connection, room_id, content, kind).await
        };
        self.release_sequencer(room_id, sequencer).await;
        let message = turn?;

        self.typing.clear(room_id, sender_id).await;
        self.spawn_notification(message.clone());
        Ok(message)
    }

    /// 順序ロックの中で行う部分（メンバーシップ再確認 → 永続化 → 配信）
    async fn persist_and_publish(
        &self,
        connection: &Connection,
        room_id: &RoomId,
        content: MessageContent,
        kind: MessageKind,
    ) -> Result<ChatMessage, CommandError> {
        let sender_id = connection.user_id();
        let is_member = self
            .membership_store
            .is_member(sender_id, room_id)
            .await
            .map_err(|source| CommandError::persistence(room_id, source))?;
        if !is_member {
            tracing::warn!(
                user_id = %sender_id,
                room_id = %room_id,
                "Message rejected: not a member"
            );
            return Err(CommandError::MembershipDenied {
                user_id: sender_id.clone(),
                room_id: room_id.clone(),
            });
        }

        let message = self
            .message_store
            .persist_message(room_id, sender_id, content, kind)
            .await
            .map_err(|source| {
                tracing::error!(room_id = %room_id, "Failed to persist message: {}", source);
                CommandError::persistence(room_id, source)
            })?;

        let delivered = self
            .message_pusher
            .publish(
                &ChannelId::room(room_id),
                &ServerEvent::NewMessage {
                    message: message.clone(),
                },
                None,
            )
            .await;
        tracing::info!(
            message_id = %message.id,
            room_id = %room_id,
            sender_id = %sender_id,
            delivered,
            "Message broadcast"
        );
        Ok(message)
    }

    async fn sequencer(&self, room_id: &RoomId) -> Arc<Mutex<()>> {
        let mut sequencers = self.room_sequencers.lock().await;
        sequencers.entry(room_id.clone()).or_default().clone()
    }

    /// 順番待ちが他にいなければ順序ロックを破棄する
    ///
    /// マップのロック中は新たな複製が作られないため、参照数がマップと自分の 2 つなら誰も待っていない。
    async fn release_sequencer(&self, room_id: &RoomId, sequencer: Arc<Mutex<()>>) {
        let mut sequencers = self.room_sequencers.lock().await;
        if Arc::strong_count(&sequencer) == 2 {
            sequencers.remove(room_id);
        }
    }

    /// 通知ファンアウトをバックグラウンドで起動する
    ///
    /// 失敗はログに残すだけで、送信者にもメッセージ配信にも影響しない。
    fn spawn_notification(&self, message: ChatMessage) {
        let notification_fanout = Arc::clone(&self.notification_fanout);
        tokio::spawn(async move {
            if let Err(e) = notification_fanout
                .notify_room_members(&message.room_id, &message.sender_id, &message)
                .await
            {
                tracing::warn!(
                    message_id = %message.id,
                    room_id = %message.room_id,
                    "Notification fan-out failed: {}",
                    e
                );
            }
        });
    }
}
