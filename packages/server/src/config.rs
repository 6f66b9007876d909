//! サーバー設定と初期データ（シード）の読み込み

use std::{
    collections::{HashMap, HashSet},
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;
use thiserror::Error;

use crate::{
    domain::{AuthenticatedUser, DisplayName, RoomId, UserId, ValueObjectError},
    infrastructure::repository::inmemory::message::DEFAULT_MESSAGE_CAPACITY,
    usecase::CoordinatorConfig,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read seed file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse seed: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid seed: {0}")]
    Invalid(String),
}

impl From<ValueObjectError> for ConfigError {
    fn from(e: ValueObjectError) -> Self {
        Self::Invalid(e.to_string())
    }
}

/// WebSocket のハートビート設定
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartbeatConfig {
    /// Ping の送信間隔
    pub interval: Duration,
    /// 間隔を超えて何も受信しなくても待つ猶予
    pub timeout: Duration,
}

impl HeartbeatConfig {
    /// この時間何も受信しなければ接続を閉じる
    pub fn idle_limit(&self) -> Duration {
        self.interval + self.timeout
    }
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub message_capacity: usize,
    pub heartbeat: HeartbeatConfig,
    pub coordinator: CoordinatorConfig,
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            message_capacity: DEFAULT_MESSAGE_CAPACITY,
            heartbeat: HeartbeatConfig::default(),
            coordinator: CoordinatorConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedUser {
    pub token: String,
    pub user_id: String,
    pub display_name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedRoom {
    pub room_id: String,
    #[serde(default)]
    pub members: Vec<String>,
}

/// シードファイルの内容
///
/// ```json
/// {
///   "users": [{ "token": "...", "userId": "alice", "displayName": "Alice" }],
///   "rooms": [{ "roomId": "general", "members": ["alice"] }]
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct SeedData {
    #[serde(default)]
    pub users: Vec<SeedUser>,
    #[serde(default)]
    pub rooms: Vec<SeedRoom>,
}

/// 検証済みのシード
#[derive(Debug, Clone)]
pub struct Seed {
    /// トークン → ユーザー
    pub tokens: HashMap<String, AuthenticatedUser>,
    /// 表示名のディレクトリ
    pub directory: HashMap<UserId, DisplayName>,
    pub rooms: Vec<(RoomId, Vec<UserId>)>,
}

impl SeedData {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// `--seed` を指定しなかったときのデモ用データ
    pub fn demo() -> Self {
        let user = |token: &str, user_id: &str, display_name: &str| SeedUser {
            token: token.to_string(),
            user_id: user_id.to_string(),
            display_name: display_name.to_string(),
        };
        let room = |room_id: &str, members: &[&str]| SeedRoom {
            room_id: room_id.to_string(),
            members: members.iter().map(|m| m.to_string()).collect(),
        };
        Self {
            users: vec![
                user("alice-token", "alice", "Alice"),
                user("bob-token", "bob", "Bob"),
                user("carol-token", "carol", "Carol"),
            ],
            rooms: vec![
                room("general", &["alice", "bob", "carol"]),
                room("random", &["alice", "bob"]),
            ],
        }
    }

    /// 値の検証と、トークン・メンバーの整合性チェック
    pub fn validate(self) -> Result<Seed, ConfigError> {
        let mut tokens = HashMap::new();
        let mut directory = HashMap::new();
        for seed_user in self.users {
            if seed_user.token.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "user '{}' has an empty token",
                    seed_user.user_id
                )));
            }
            let user_id = UserId::new(seed_user.user_id)?;
            let display_name = DisplayName::new(seed_user.display_name)?;
            if directory.contains_key(&user_id) {
                return Err(ConfigError::Invalid(format!("duplicate user '{}'", user_id)));
            }
            if tokens.contains_key(&seed_user.token) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate token for user '{}'",
                    user_id
                )));
            }
            directory.insert(user_id.clone(), display_name.clone());
            tokens.insert(seed_user.token, AuthenticatedUser::new(user_id, display_name));
        }

        let mut room_ids = HashSet::new();
        let mut rooms = Vec::with_capacity(self.rooms.len());
        for seed_room in self.rooms {
            let room_id = RoomId::new(seed_room.room_id)?;
            if !room_ids.insert(room_id.clone()) {
                return Err(ConfigError::Invalid(format!("duplicate room '{}'", room_id)));
            }
            let mut members = Vec::with_capacity(seed_room.members.len());
            for member in seed_room.members {
                let user_id = UserId::new(member)?;
                if !directory.contains_key(&user_id) {
                    return Err(ConfigError::Invalid(format!(
                        "room '{}' lists unknown member '{}'",
                        room_id, user_id
                    )));
                }
                members.push(user_id);
            }
            rooms.push((room_id, members));
        }

        Ok(Seed {
            tokens,
            directory,
            rooms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demo_seed_is_valid() {
        // テスト項目: デモ用シードが検証を通る
        // given (前提条件):
        let seed = SeedData::demo();

        // when (操作):
        let seed = seed.validate().unwrap();

        // then (期待する結果):
        assert_eq!(seed.tokens.len(), 3);
        assert_eq!(seed.rooms.len(), 2);
        assert_eq!(
            seed.tokens["alice-token"].user_id,
            UserId::new("alice".to_string()).unwrap()
        );
    }

    #[test]
    fn test_seed_from_json() {
        // テスト項目: JSON のシードを読み込める（members は省略可能）
        // given (前提条件):
        let json = r#"{
            "users": [{"token": "t1", "userId": "alice", "displayName": "Alice"}],
            "rooms": [{"roomId": "general", "members": ["alice"]}, {"roomId": "empty"}]
        }"#;

        // when (操作):
        let seed = SeedData::from_json(json).unwrap().validate().unwrap();

        // then (期待する結果):
        assert_eq!(seed.rooms[0].1.len(), 1);
        assert!(seed.rooms[1].1.is_empty());
    }

    #[test]
    fn test_seed_rejects_unknown_member() {
        // テスト項目: 未登録ユーザーをメンバーに含むシードはエラー
        // given (前提条件):
        let json = r#"{"users": [], "rooms": [{"roomId": "general", "members": ["ghost"]}]}"#;

        // when (操作):
        let result = SeedData::from_json(json).unwrap().validate();

        // then (期待する結果):
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_seed_rejects_duplicate_token() {
        // テスト項目: 同じトークンを持つユーザーが複数いるとエラー
        // given (前提条件):
        let json = r#"{"users": [
            {"token": "same", "userId": "alice", "displayName": "Alice"},
            {"token": "same", "userId": "bob", "displayName": "Bob"}
        ]}"#;

        // when (操作):
        let result = SeedData::from_json(json).unwrap().validate();

        // then (期待する結果):
        assert!(
            matches!(result, Err(ConfigError::Invalid(message)) if message.contains("duplicate token"))
        );
    }

    #[test]
    fn test_seed_rejects_malformed_json() {
        // テスト項目: JSON として不正なシードはパースエラー
        // when (操作):
        let result = SeedData::from_json("{not json");

        // then (期待する結果):
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_heartbeat_idle_limit() {
        // テスト項目: 無通信の上限は間隔と猶予の合計
        // given (前提条件):
        let heartbeat = HeartbeatConfig::default();

        // when (操作) / then (期待する結果):
        assert_eq!(heartbeat.idle_limit(), Duration::from_secs(40));
        assert_eq!(ServerConfig::default().bind_addr(), "127.0.0.1:8080");
    }
}
