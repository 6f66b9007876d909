//! UseCase: Typing Indicator
//!
//! ## 責務
//!
//! - (ルーム, ユーザー) ごとの「入力中」状態の管理
//! - 状態が変わったときだけ `user_typing` / `user_stopped_typing` をルームに配信（デバウンス）
//! - 一定時間更新がなければ自動的に停止扱いにする（自己回復）
//!
//! ## タイマー
//!
//! エントリごとに 1 本のタイマータスクを持つ。タイマーは世代番号を覚えており、
//! 発火時に台帳のエントリが同じ世代のときだけ削除と配信を行う。
//! 更新・停止時は古いタイマーを abort するため、1 つのエントリにつき「発火」か「取り消し」のどちらか一方だけが起きる。
//!
//! ロック順序は常に「台帳 → MessagePusher」。

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use tokio::{sync::Mutex, task::AbortHandle};

use crate::domain::{
    ChannelId, Connection, ConnectionId, DisplayName, MessagePusher, RoomId, ServerEvent, UserId,
};

use super::error::CommandError;

/// 入力中エントリの既定の有効期限
pub const DEFAULT_TYPING_EXPIRY: Duration = Duration::from_secs(5);

/// `start` の結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypingTransition {
    /// 新しく入力中になった（`user_typing` を配信済み）
    Started,
    /// 既に入力中だったため期限だけ延長した（配信なし）
    Refreshed,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct TypingKey {
    room_id: RoomId,
    user_id: UserId,
}

struct TypingEntry {
    display_name: DisplayName,
    generation: u64,
    timer: AbortHandle,
}

struct TypingState {
    entries: Mutex<HashMap<TypingKey, TypingEntry>>,
    message_pusher: Arc<dyn MessagePusher>,
    expiry: Duration,
    next_generation: AtomicU64,
}

impl TypingState {
    fn spawn_timer(self: &Arc<Self>, key: TypingKey, generation: u64) -> AbortHandle {
        let state = Arc::clone(self);
        let expiry = self.expiry;
        tokio::spawn(async move {
            tokio::time::sleep(expiry).await;
            state.expire(key, generation).await;
        })
        .abort_handle()
    }

    async fn expire(&self, key: TypingKey, generation: u64) {
        let mut entries = self.entries.lock().await;
        let current = entries.get(&key).map(|entry| entry.generation);
        if current != Some(generation) {
            return;
        }
        entries.remove(&key);
        tracing::debug!(
            room_id = %key.room_id,
            user_id = %key.user_id,
            "Typing entry expired"
        );
        self.publish_stopped(&key, None).await;
    }

    async fn publish_stopped(&self, key: &TypingKey, exclude: Option<&ConnectionId>) {
        let event = ServerEvent::UserStoppedTyping {
            room_id: key.room_id.clone(),
            user_id: key.user_id.clone(),
        };
        self.message_pusher
            .publish(&ChannelId::room(&key.room_id), &event, exclude)
            .await;
    }

    /// エントリを削除してタイマーを止め、`user_stopped_typing` を配信する
    async fn remove(&self, key: &TypingKey, exclude: Option<&ConnectionId>) -> bool {
        let mut entries = self.entries.lock().await;
        let Some(entry) = entries.remove(key) else {
            return false;
        };
        entry.timer.abort();
        self.publish_stopped(key, exclude).await;
        true
    }
}

pub struct TypingIndicatorUseCase {
    state: Arc<TypingState>,
}

impl TypingIndicatorUseCase {
    pub fn new(message_pusher: Arc<dyn MessagePusher>, expiry: Duration) -> Self {
        Self {
            state: Arc::new(TypingState {
                entries: Mutex::new(HashMap::new()),
                message_pusher,
                expiry,
                next_generation: AtomicU64::new(0),
            }),
        }
    }

    pub fn expiry(&self) -> Duration {
        self.state.expiry
    }

    /// 入力開始（`typing_start`）
    ///
    /// 接続がルームを購読していない場合は `MembershipDenied`。
    /// 既に入力中なら期限を延長するだけで、何も配信しない。
    pub async fn start(
        &self,
        connection: &Connection,
        room_id: &RoomId,
    ) -> Result<TypingTransition, CommandError> {
        self.ensure_subscribed(connection, room_id).await?;

        let key = TypingKey {
            room_id: room_id.clone(),
            user_id: connection.user_id().clone(),
        };
        let generation = self.state.next_generation.fetch_add(1, Ordering::Relaxed);

        let mut entries = self.state.entries.lock().await;
        let timer = self.state.spawn_timer(key.clone(), generation);
        let previous = entries.insert(
            key,
            TypingEntry {
                display_name: connection.display_name().clone(),
                generation,
                timer,
            },
        );

        if let Some(previous) = previous {
            previous.timer.abort();
            return Ok(TypingTransition::Refreshed);
        }

        let event = ServerEvent::UserTyping {
            room_id: room_id.clone(),
            user_id: connection.user_id().clone(),
            display_name: connection.display_name().clone(),
        };
        self.state
            .message_pusher
            .publish(&ChannelId::room(room_id), &event, Some(&connection.id))
            .await;
        tracing::debug!(
            room_id = %room_id,
            user_id = %connection.user_id(),
            "User started typing"
        );
        Ok(TypingTransition::Started)
    }

    /// 明示的な入力停止（`typing_stop`）
    ///
    /// 入力中でなかった場合は何もせず `Ok(false)`。停止通知は要求元の接続以外に届く。
    pub async fn stop(
        &self,
        connection: &Connection,
        room_id: &RoomId,
    ) -> Result<bool, CommandError> {
        self.ensure_subscribed(connection, room_id).await?;

        let key = TypingKey {
            room_id: room_id.clone(),
            user_id: connection.user_id().clone(),
        };
        Ok(self.state.remove(&key, Some(&connection.id)).await)
    }

    /// メッセージ送信・ルームからの除名に伴う入力停止
    ///
    /// 停止通知は本人の接続を含むルームの全購読者に届く。
    pub async fn clear(&self, room_id: &RoomId, user_id: &UserId) -> bool {
        let key = TypingKey {
            room_id: room_id.clone(),
            user_id: user_id.clone(),
        };
        self.state.remove(&key, None).await
    }

    /// ユーザーの全ルームの入力中状態を解除（切断時）
    pub async fn clear_user(&self, user_id: &UserId) -> usize {
        let mut entries = self.state.entries.lock().await;
        let keys: Vec<TypingKey> = entries
            .keys()
            .filter(|key| &key.user_id == user_id)
            .cloned()
            .collect();

        for key in &keys {
            if let Some(entry) = entries.remove(key) {
                entry.timer.abort();
                self.state.publish_stopped(key, None).await;
            }
        }
        keys.len()
    }

    pub async fn is_typing(&self, room_id: &RoomId, user_id: &UserId) -> bool {
        let key = TypingKey {
            room_id: room_id.clone(),
            user_id: user_id.clone(),
        };
        self.state.entries.lock().await.contains_key(&key)
    }

    /// ルームで入力中のユーザー（ユーザー ID 順）
    pub async fn typing_users(&self, room_id: &RoomId) -> Vec<(UserId, DisplayName)> {
        let entries = self.state.entries.lock().await;
        let mut users: Vec<(UserId, DisplayName)> = entries
            .iter()
            .filter(|(key, _)| &key.room_id == room_id)
            .map(|(key, entry)| (key.user_id.clone(), entry.display_name.clone()))
            .collect();
        users.sort_by(|a, b| a.0.cmp(&b.0));
        users
    }

    pub async fn entry_count(&self) -> usize {
        self.state.entries.lock().await.len()
    }

    /// 全タイマーを止めて台帳を空にする（配信はしない）
    pub async fn shutdown(&self) -> usize {
        let mut entries = self.state.entries.lock().await;
        let count = entries.len();
        for (_, entry) in entries.drain() {
            entry.timer.abort();
        }
        count
    }

    async fn ensure_subscribed(
        &self,
        connection: &Connection,
        room_id: &RoomId,
    ) -> Result<(), CommandError> {
        let subscribed = self
            .state
            .message_pusher
            .is_subscribed(&connection.id, &ChannelId::room(room_id))
            .await;
        if subscribed {
            Ok(())
        } else {
            Err(CommandError::MembershipDenied {
                user_id: connection.user_id().clone(),
                room_id: room_id.clone(),
            })
        }
    }
}
