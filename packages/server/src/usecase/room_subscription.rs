//! UseCase: Room Subscription Manager
//!
//! ## 責務
//!
//! - 接続時に、個人チャンネルと所属する全ルームのチャンネルを購読する
//! - `join_room` / `leave_room` コマンドによる購読の変更
//! - メンバーシップ変更（追加・除名）を、そのユーザーの開いている全接続の購読に反映する
//!
//! メンバーシップの正はメンバーシップストアにあり、ここで扱うのはその「キャッシュ」としての購読のみ。
//! ストアへの問い合わせはサスペンションポイントのため、判定結果を使う直前に必ず問い合わせ直す。

use std::sync::Arc;

use crate::domain::{
    ChannelId, Connection, ConnectionId, MembershipStore, MessagePusher, RoomId, ServerEvent,
    UserId,
};

use super::{error::CommandError, presence::PresenceUseCase, typing_indicator::TypingIndicatorUseCase};

pub struct RoomSubscriptionUseCase {
    membership_store: Arc<dyn MembershipStore>,
    message_pusher: Arc<dyn MessagePusher>,
    presence: Arc<PresenceUseCase>,
    typing: Arc<TypingIndicatorUseCase>,
}

impl RoomSubscriptionUseCase {
    pub fn new(
        membership_store: Arc<dyn MembershipStore>,
        message_pusher: Arc<dyn MessagePusher>,
        presence: Arc<PresenceUseCase>,
        typing: Arc<TypingIndicatorUseCase>,
    ) -> Self {
        Self {
            membership_store,
            message_pusher,
            presence,
            typing,
        }
    }

    /// 接続確立時の購読
    ///
    /// 個人チャンネルは常に購読する。所属ルームの一覧取得に失敗した場合、個人チャンネルだけが残る。
    /// 購読したルームを返す。
    pub async fn join_user_rooms(&self, connection: &Connection) -> Result<Vec<RoomId>, CommandError> {
        self.message_pusher
            .subscribe(&connection.id, ChannelId::personal(connection.user_id()))
            .await;

        let rooms = self
            .membership_store
            .list_rooms_for_user(connection.user_id())
            .await
            .map_err(|source| CommandError::Persistence {
                room_id: None,
                source,
            })?;

        let mut joined = Vec::with_capacity(rooms.len());
        for room_id in rooms {
            if self
                .message_pusher
                .subscribe(&connection.id, ChannelId::room(&room_id))
                .await
            {
                joined.push(room_id);
            }
        }

        tracing::debug!(
            connection_id = %connection.id,
            user_id = %connection.user_id(),
            rooms = joined.len(),
            "Subscribed to member rooms"
        );
        Ok(joined)
    }

    /// `join_room` コマンド
    ///
    /// メンバーでなければ `MembershipDenied` を返し、購読は変わらない。
    pub async fn join_room(&self, connection: &Connection, room_id: &RoomId) -> Result<(), CommandError> {
        let is_member = self
            .membership_store
            .is_member(connection.user_id(), room_id)
            .await
            .map_err(|source| CommandError::persistence(room_id, source))?;

        if !is_member {
            tracing::warn!(
                user_id = %connection.user_id(),
                room_id = %room_id,
                "Join rejected: not a member"
            );
            return Err(CommandError::MembershipDenied {
                user_id: connection.user_id().clone(),
                room_id: room_id.clone(),
            });
        }

        // 問い合わせ中に接続が閉じられた場合は何もしない
        if !self
            .message_pusher
            .subscribe(&connection.id, ChannelId::room(room_id))
            .await
        {
            return Ok(());
        }
        self.reply(&connection.id, ServerEvent::JoinedRoom { room_id: room_id.clone() })
            .await;
        Ok(())
    }

    /// `leave_room` コマンド（メンバーシップの確認は不要）
    pub async fn leave_room(&self, connection: &Connection, room_id: &RoomId) -> bool {
        let was_subscribed = self
            .message_pusher
            .unsubscribe(&connection.id, &ChannelId::room(room_id))
            .await;
        self.reply(&connection.id, ServerEvent::LeftRoom { room_id: room_id.clone() })
            .await;
        was_subscribed
    }

    /// メンバー追加の反映
    ///
    /// 呼び出し元がストアへの追加を済ませた後に呼ぶ。ユーザーの開いている全接続がルームを購読する。
    /// 新たに購読した接続数を返す。
    pub async fn push_member_into_room(&self, user_id: &UserId, room_id: &RoomId) -> usize {
        let mut subscribed = 0;
        for connection_id in self.presence.connection_ids_of(user_id).await {
            let already = self
                .message_pusher
                .is_subscribed(&connection_id, &ChannelId::room(room_id))
                .await;
            if already {
                continue;
            }
            if self
                .message_pusher
                .subscribe(&connection_id, ChannelId::room(room_id))
                .await
            {
                self.reply(&connection_id, ServerEvent::JoinedRoom { room_id: room_id.clone() })
                    .await;
                subscribed += 1;
            }
        }

        tracing::info!(
            user_id = %user_id,
            room_id = %room_id,
            connections = subscribed,
            "Member pushed into room"
        );
        subscribed
    }

    /// メンバー除名の反映
    ///
    /// 呼び出し元がストアからの削除を済ませた後に呼ぶ。
    /// ユーザーの全接続の購読を外し、個人チャンネルに `removed_from_room` を送り、入力中状態を解除する。
    /// 購読を外した接続数を返す。
    pub async fn evict_member_from_room(&self, user_id: &UserId, room_id: &RoomId) -> usize {
        let mut unsubscribed = 0;
        for connection_id in self.presence.connection_ids_of(user_id).await {
            if self
                .message_pusher
                .unsubscribe(&connection_id, &ChannelId::room(room_id))
                .await
            {
                unsubscribed += 1;
            }
        }

        self.message_pusher
            .publish(
                &ChannelId::personal(user_id),
                &ServerEvent::RemovedFromRoom {
                    room_id: room_id.clone(),
                },
                None,
            )
            .await;
        self.typing.clear(room_id, user_id).await;

        tracing::info!(
            user_id = %user_id,
            room_id = %room_id,
            connections = unsubscribed,
            "Member evicted from room"
        );
        unsubscribed
    }

    async fn reply(&self, connection_id: &ConnectionId, event: ServerEvent) {
        if let Err(e) = self.message_pusher.push_to(connection_id, &event).await {
            tracing::warn!(
                connection_id = %connection_id,
                "Failed to send '{}' reply: {}",
                event.name(),
                e
            );
        }
    }
}
