//! InMemory Message Store 実装
//!
//! ドメイン層が定義する MessageStore trait の具体的な実装。
//! 保存件数に上限を持ち、上限を超えた書き込みは `StoreError::CapacityExceeded` になります。

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use tokio::sync::Mutex;
use yoriai_shared::time::Clock;

use crate::domain::{
    ChatMessage, DisplayName, MessageContent, MessageId, MessageKind, MessageStore, RoomId,
    StoreError, Timestamp, UserId,
};

/// デフォルトの最大保存件数
pub const DEFAULT_MESSAGE_CAPACITY: usize = 10_000;

/// インメモリ Message Store 実装
pub struct InMemoryMessageStore {
    messages: Mutex<Vec<ChatMessage>>,
    /// user_id → 表示名（送信者名の解決に使う）
    directory: HashMap<UserId, DisplayName>,
    capacity: usize,
    clock: Arc<dyn Clock>,
}

impl InMemoryMessageStore {
    pub fn new(
        directory: HashMap<UserId, DisplayName>,
        capacity: usize,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            messages: Mutex::new(Vec::new()),
            directory,
            capacity,
            clock,
        }
    }

    /// ルームのメッセージを永続化順に返す
    pub async fn messages_in_room(&self, room_id: &RoomId) -> Vec<ChatMessage> {
        let messages = self.messages.lock().await;
        messages
            .iter()
            .filter(|message| &message.room_id == room_id)
            .cloned()
            .collect()
    }

    pub async fn count(&self) -> usize {
        self.messages.lock().await.len()
    }

    fn resolve_sender_name(&self, sender_id: &UserId) -> Result<DisplayName, StoreError> {
        match self.directory.get(sender_id) {
            Some(name) => Ok(name.clone()),
            // ディレクトリに無いユーザーは ID をそのまま表示名にする
            None => DisplayName::new(sender_id.as_str().to_string())
                .map_err(|e| StoreError::Unavailable(e.to_string())),
        }
    }
}

#[async_trait]
impl MessageStore for InMemoryMessageStore {
    async fn persist_message(
        &self,
        room_id: &RoomId,
        sender_id: &UserId,
        content: MessageContent,
        kind: MessageKind,
    ) -> Result<ChatMessage, StoreError> {
        let sender_name = self.resolve_sender_name(sender_id)?;
        let mut messages = self.messages.lock().await;
        if messages.len() >= self.capacity {
            return Err(StoreError::CapacityExceeded(self.capacity));
        }

        let message = ChatMessage {
            id: MessageId::generate(),
            room_id: room_id.clone(),
            sender_id: sender_id.clone(),
            sender_name,
            content,
            kind,
            created_at: Timestamp::new(self.clock.now_millis()),
        };
        messages.push(message.clone());
        Ok(message)
    }
}
