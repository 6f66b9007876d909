//! InMemory Membership Store 実装
//!
//! ドメイン層が定義する MembershipStore trait の具体的な実装。
//! HashMap をインメモリ DB として使用します。

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{MembershipStore, RoomId, StoreError, UserId};

/// インメモリ Membership Store 実装
#[derive(Default)]
pub struct InMemoryMembershipStore {
    /// room_id → メンバーの user_id 集合
    rooms: Mutex<HashMap<RoomId, BTreeSet<UserId>>>,
}

impl InMemoryMembershipStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 初期データ（ルームとメンバー）から作成
    pub fn with_rooms(rooms: impl IntoIterator<Item = (RoomId, Vec<UserId>)>) -> Self {
        let rooms = rooms
            .into_iter()
            .map(|(room_id, members)| (room_id, members.into_iter().collect()))
            .collect();
        Self {
            rooms: Mutex::new(rooms),
        }
    }

    pub async fn room_count(&self) -> usize {
        self.rooms.lock().await.len()
    }
}

#[async_trait]
impl MembershipStore for InMemoryMembershipStore {
    async fn list_rooms_for_user(&self, user_id: &UserId) -> Result<Vec<RoomId>, StoreError> {
        let rooms = self.rooms.lock().await;
        let mut room_ids: Vec<RoomId> = rooms
            .iter()
            .filter(|(_, members)| members.contains(user_id))
            .map(|(room_id, _)| room_id.clone())
            .collect();
        room_ids.sort();
        Ok(room_ids)
    }

    async fn is_member(&self, user_id: &UserId, room_id: &RoomId) -> Result<bool, StoreError> {
        let rooms = self.rooms.lock().await;
        Ok(rooms
            .get(room_id)
            .is_some_and(|members| members.contains(user_id)))
    }

    async fn list_members(&self, room_id: &RoomId) -> Result<Vec<UserId>, StoreError> {
        let rooms = self.rooms.lock().await;
        Ok(rooms
            .get(room_id)
            .map(|members| members.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn add_member(&self, user_id: &UserId, room_id: &RoomId) -> Result<bool, StoreError> {
        let mut rooms = self.rooms.lock().await;
        Ok(rooms
            .entry(room_id.clone())
            .or_default()
            .insert(user_id.clone()))
    }

    async fn remove_member(
        &self,
        user_id: &UserId,
        room_id: &RoomId,
    ) -> Result<bool, StoreError> {
        let mut rooms = self.rooms.lock().await;
        Ok(rooms
            .get_mut(room_id)
            .is_some_and(|members| members.remove(user_id)))
    }
}
