//! UseCase 層のエラー定義

use thiserror::Error;

use crate::domain::{AuthError, ErrorKind, RoomId, ServerEvent, StoreError, UserId};

/// 接続確立時のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectError {
    /// 資格情報の検証に失敗（状態は何も作られない）
    #[error("authentication failed: {0}")]
    Auth(#[from] AuthError),

    /// コーディネーターが停止中
    #[error("coordinator is not accepting connections")]
    ShuttingDown,
}

/// 接続からのコマンド処理のエラー
///
/// いずれも要求元の接続だけに `error` イベントとして返され、コーディネーターは止まらない。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("user '{user_id}' is not a member of room '{room_id}'")]
    MembershipDenied { user_id: UserId, room_id: RoomId },

    #[error("storage failure: {source}")]
    Persistence {
        room_id: Option<RoomId>,
        #[source]
        source: StoreError,
    },

    #[error("invalid command: {0}")]
    InvalidCommand(String),
}

impl CommandError {
    pub fn persistence(room_id: &RoomId, source: StoreError) -> Self {
        Self::Persistence {
            room_id: Some(room_id.clone()),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MembershipDenied { .. } => ErrorKind::MembershipDenied,
            Self::Persistence { .. } => ErrorKind::PersistenceFailure,
            Self::InvalidCommand(_) => ErrorKind::InvalidCommand,
        }
    }

    pub fn room_id(&self) -> Option<&RoomId> {
        match self {
            Self::MembershipDenied { room_id, .. } => Some(room_id),
            Self::Persistence { room_id, .. } => room_id.as_ref(),
            Self::InvalidCommand(_) => None,
        }
    }

    /// クライアントに返す `error` イベントに変換
    pub fn to_event(&self) -> ServerEvent {
        ServerEvent::Error {
            kind: self.kind(),
            message: self.to_string(),
            room_id: self.room_id().cloned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_membership_denied_to_event() {
        // テスト項目: MembershipDenied がルーム ID 付きの error イベントになる
        // given (前提条件):
        let error = CommandError::MembershipDenied {
            user_id: UserId::new("mallory".to_string()).unwrap(),
            room_id: RoomId::new("general".to_string()).unwrap(),
        };

        // when (操作):
        let event = error.to_event();

        // then (期待する結果):
        assert_eq!(
            event,
            ServerEvent::Error {
                kind: ErrorKind::MembershipDenied,
                message: "user 'mallory' is not a member of room 'general'".to_string(),
                room_id: Some(RoomId::new("general".to_string()).unwrap()),
            }
        );
    }

    #[test]
    fn test_persistence_kind() {
        // テスト項目: ストアのエラーは persistence_failure に分類される
        // given (前提条件):
        let error = CommandError::persistence(
            &RoomId::new("general".to_string()).unwrap(),
            StoreError::CapacityExceeded(10),
        );

        // when (操作):
        let kind = error.kind();

        // then (期待する結果):
        assert_eq!(kind, ErrorKind::PersistenceFailure);
        assert_eq!(
            error.to_string(),
            "storage failure: message capacity exceeded (max 10)"
        );
    }
}
