//! ドメイン層のエラー定義

use thiserror::Error;

/// Value Object の生成時のバリデーションエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueObjectError {
    #[error("{field} must not be empty")]
    Empty { field: &'static str },

    #[error("{field} must be at most {max} characters (got {actual})")]
    TooLong {
        field: &'static str,
        max: usize,
        actual: usize,
    },

    #[error("{field} contains whitespace or control characters")]
    InvalidCharacter { field: &'static str },

    #[error("unknown message type: {0}")]
    UnknownMessageKind(String),
}

/// 認証コラボレーターのエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("credential is missing")]
    MissingCredential,

    #[error("credential is invalid or expired")]
    InvalidCredential,
}

/// 永続ストア（メンバーシップ・メッセージ）のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("store is unavailable: {0}")]
    Unavailable(String),

    #[error("message capacity exceeded (max {0})")]
    CapacityExceeded(usize),
}

/// 通知ファンアウトのエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotificationError {
    #[error("notification fan-out failed: {0}")]
    Failed(String),
}

/// MessagePusher のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MessagePushError {
    #[error("connection '{0}' not found")]
    ConnectionNotFound(String),

    #[error("failed to push message: {0}")]
    PushFailed(String),

    #[error("failed to encode event: {0}")]
    Encode(String),
}
