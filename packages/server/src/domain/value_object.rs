//! Value Object 定義
//!
//! 不変条件を持つ値をドメイン層で型として表現します。
//! 生成時にバリデーションを行い、生成後は常に正しい値であることを保証します。

use std::fmt;

use uuid::Uuid;

use super::error::ValueObjectError;

/// ID として許可する最大文字数
pub const MAX_ID_LENGTH: usize = 64;

/// 表示名として許可する最大文字数
pub const MAX_DISPLAY_NAME_LENGTH: usize = 100;

/// メッセージ本文として許可する最大文字数
pub const MAX_MESSAGE_CONTENT_LENGTH: usize = 4000;

fn validate_id(field: &'static str, value: &str) -> Result<(), ValueObjectError> {
    if value.is_empty() {
        return Err(ValueObjectError::Empty { field });
    }
    let length = value.chars().count();
    if length > MAX_ID_LENGTH {
        return Err(ValueObjectError::TooLong {
            field,
            max: MAX_ID_LENGTH,
            actual: length,
        });
    }
    if value.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(ValueObjectError::InvalidCharacter { field });
    }
    Ok(())
}

/// ユーザー ID
///
/// 認証コラボレーターが発行する不透明な識別子。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserId(String);

impl UserId {
    pub fn new(value: String) -> Result<Self, ValueObjectError> {
        validate_id("user_id", &value)?;
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl TryFrom<String> for UserId {
    type Error = ValueObjectError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// チャットルーム ID
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoomId(String);

impl RoomId {
    pub fn new(value: String) -> Result<Self, ValueObjectError> {
        validate_id("room_id", &value)?;
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl TryFrom<String> for RoomId {
    type Error = ValueObjectError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 接続 ID
///
/// トランスポートレベルの接続 1 本ごとに払い出される。同じユーザーでも接続ごとに異なる。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    /// 新しい接続 ID を生成
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 永続化されたメッセージの ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageId(Uuid);

impl MessageId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// ブロードキャストチャンネル ID
///
/// ルームごとのチャンネルと、ユーザーごとの個人チャンネルの 2 種類がある。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChannelId {
    /// `room:{room_id}`
    Room(RoomId),
    /// `user:{user_id}`
    Personal(UserId),
}

impl ChannelId {
    pub fn room(room_id: &RoomId) -> Self {
        Self::Room(room_id.clone())
    }

    pub fn personal(user_id: &UserId) -> Self {
        Self::Personal(user_id.clone())
    }

    /// ルームチャンネルであればルーム ID を返す
    pub fn room_id(&self) -> Option<&RoomId> {
        match self {
            Self::Room(room_id) => Some(room_id),
            Self::Personal(_) => None,
        }
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Room(room_id) => write!(f, "room:{}", room_id),
            Self::Personal(user_id) => write!(f, "user:{}", user_id),
        }
    }
}

/// ユーザーの表示名
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DisplayName(String);

impl DisplayName {
    pub fn new(value: String) -> Result<Self, ValueObjectError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(ValueObjectError::Empty {
                field: "display_name",
            });
        }
        let length = trimmed.chars().count();
        if length > MAX_DISPLAY_NAME_LENGTH {
            return Err(ValueObjectError::TooLong {
                field: "display_name",
                max: MAX_DISPLAY_NAME_LENGTH,
                actual: length,
            });
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl TryFrom<String> for DisplayName {
    type Error = ValueObjectError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// メッセージ本文
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageContent(String);

impl MessageContent {
    pub fn new(value: String) -> Result<Self, ValueObjectError> {
        if value.trim().is_empty() {
            return Err(ValueObjectError::Empty { field: "content" });
        }
        let length = value.chars().count();
        if length > MAX_MESSAGE_CONTENT_LENGTH {
            return Err(ValueObjectError::TooLong {
                field: "content",
                max: MAX_MESSAGE_CONTENT_LENGTH,
                actual: length,
            });
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl TryFrom<String> for MessageContent {
    type Error = ValueObjectError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// メッセージ種別
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MessageKind {
    #[default]
    Text,
    Image,
    File,
    Audio,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
            Self::File => "file",
            Self::Audio => "audio",
        }
    }
}

impl TryFrom<&str> for MessageKind {
    type Error = ValueObjectError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "text" => Ok(Self::Text),
            "image" => Ok(Self::Image),
            "file" => Ok(Self::File),
            "audio" => Ok(Self::Audio),
            other => Err(ValueObjectError::UnknownMessageKind(other.to_string())),
        }
    }
}

/// Unix タイムスタンプ（ミリ秒）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(i64);

impl Timestamp {
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> i64 {
        self.0
    }
}
