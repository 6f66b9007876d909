//! 静的トークン表による AuthVerifier 実装
//!
//! シードファイルから読み込んだ `token → ユーザー` の対応表で資格情報を検証します。

use std::collections::HashMap;

use async_trait::async_trait;

use crate::domain::{AuthError, AuthVerifier, AuthenticatedUser};

#[derive(Debug, Default)]
pub struct StaticTokenVerifier {
    tokens: HashMap<String, AuthenticatedUser>,
}

impl StaticTokenVerifier {
    pub fn new(tokens: HashMap<String, AuthenticatedUser>) -> Self {
        Self { tokens }
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

#[async_trait]
impl AuthVerifier for StaticTokenVerifier {
    async fn verify_connection(&self, token: &str) -> Result<AuthenticatedUser, AuthError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(AuthError::MissingCredential);
        }
        self.tokens
            .get(token)
            .cloned()
            .ok_or(AuthError::InvalidCredential)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DisplayName, UserId};

    fn create_test_verifier() -> StaticTokenVerifier {
        StaticTokenVerifier::new(HashMap::from([(
            "alice-token".to_string(),
            AuthenticatedUser::new(
                UserId::new("alice".to_string()).unwrap(),
                DisplayName::new("Alice".to_string()).unwrap(),
            ),
        )]))
    }

    #[tokio::test]
    async fn test_verify_known_token() {
        // テスト項目: 登録済みのトークンはユーザーに解決される
        // given (前提条件):
        let verifier = create_test_verifier();

        // when (操作):
        let result = verifier.verify_connection("alice-token").await;

        // then (期待する結果):
        let user = result.unwrap();
        assert_eq!(user.user_id.as_str(), "alice");
        assert_eq!(user.display_name.as_str(), "Alice");
    }

    #[tokio::test]
    async fn test_verify_missing_and_unknown_token() {
        // テスト項目: 空のトークンは MissingCredential、未知のトークンは InvalidCredential
        // given (前提条件):
        let verifier = create_test_verifier();

        // when (操作):
        let missing = verifier.verify_connection("  ").await;
        let unknown = verifier.verify_connection("mallory-token").await;

        // then (期待する結果):
        assert_eq!(missing, Err(AuthError::MissingCredential));
        assert_eq!(unknown, Err(AuthError::InvalidCredential));
    }
}
