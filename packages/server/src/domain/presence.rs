//! Connection Registry と Presence Tracker のドメインロジック
//!
//! 副作用を持たない純粋なデータ構造として実装し、テストしやすくしています。
//! ユーザーのオンライン状態は「開いている接続の集合が空でないこと」として導出され、
//! 真偽値フラグとしては保持しません（参照カウント方式）。

use std::collections::{HashMap, HashSet};

use super::{Connection, ConnectionId, UserId};

/// 接続の登録解除結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unregistration {
    pub connection: Connection,
    /// この登録解除でユーザーがオフラインになったか
    pub went_offline: bool,
}

/// 接続とユーザーのオンライン状態の台帳
#[derive(Debug, Default)]
pub struct PresenceRegistry {
    /// connection_id → 接続
    connections: HashMap<ConnectionId, Connection>,
    /// user_id → 開いている接続 ID の集合（空になったらエントリごと削除）
    by_user: HashMap<UserId, HashSet<ConnectionId>>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 接続を登録する
    ///
    /// # Returns
    ///
    /// このユーザーにとって最初の接続（Offline → Online）であれば `true`
    pub fn register(&mut self, connection: Connection) -> bool {
        let user_id = connection.user_id().clone();
        let connection_id = connection.id;
        self.connections.insert(connection_id, connection);

        let set = self.by_user.entry(user_id).or_default();
        let came_online = set.is_empty();
        set.insert(connection_id);
        came_online
    }

    /// 接続を登録解除する
    ///
    /// 未登録の接続 ID に対しては `None`（冪等）。
    pub fn unregister(&mut self, connection_id: &ConnectionId) -> Option<Unregistration> {
        let connection = self.connections.remove(connection_id)?;

        let mut went_offline = false;
        if let Some(set) = self.by_user.get_mut(connection.user_id()) {
            set.remove(connection_id);
            if set.is_empty() {
                self.by_user.remove(connection.user_id());
                went_offline = true;
            }
        }

        Some(Unregistration {
            connection,
            went_offline,
        })
    }

    /// オンラインのユーザー ID 一覧（ソート済み）
    pub fn online_user_ids(&self) -> Vec<UserId> {
        let mut user_ids: Vec<UserId> = self.by_user.keys().cloned().collect();
        user_ids.sort();
        user_ids
    }

    pub fn is_online(&self, user_id: &UserId) -> bool {
        self.by_user.contains_key(user_id)
    }

    pub fn connection(&self, connection_id: &ConnectionId) -> Option<&Connection> {
        self.connections.get(connection_id)
    }

    /// ユーザーが開いている接続 ID 一覧
    pub fn connection_ids_of(&self, user_id: &UserId) -> Vec<ConnectionId> {
        self.by_user
            .get(user_id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// 指定ユーザー以外が開いている接続 ID 一覧
    pub fn connection_ids_except_user(&self, user_id: &UserId) -> Vec<ConnectionId> {
        self.connections
            .values()
            .filter(|connection| connection.user_id() != user_id)
            .map(|connection| connection.id)
            .collect()
    }

    pub fn all_connection_ids(&self) -> Vec<ConnectionId> {
        self.connections.keys().copied().collect()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn online_user_count(&self) -> usize {
        self.by_user.len()
    }

    /// 全接続を取り除いて返す
    pub fn drain(&mut self) -> Vec<Connection> {
        self.by_user.clear();
        self.connections.drain().map(|(_, connection)| connection).collect()
    }
}
