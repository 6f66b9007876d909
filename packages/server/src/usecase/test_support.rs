//! UseCase テスト用のヘルパー

use tokio::sync::mpsc;

use crate::domain::{AuthenticatedUser, DisplayName, RoomId, UserId};

pub fn user(id: &str) -> UserId {
    UserId::new(id.to_string()).unwrap()
}

pub fn room(id: &str) -> RoomId {
    RoomId::new(id.to_string()).unwrap()
}

/// 表示名はユーザー ID の先頭を大文字にしたもの（"alice" → "Alice"）
pub fn authenticated(id: &str) -> AuthenticatedUser {
    let mut chars = id.chars();
    let display = match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    };
    AuthenticatedUser::new(user(id), DisplayName::new(display).unwrap())
}

/// 受信済みのフレームを全て取り出して JSON として返す
pub fn drain_events(rx: &mut mpsc::UnboundedReceiver<String>) -> Vec<serde_json::Value> {
    let mut events = Vec::new();
    while let Ok(frame) = rx.try_recv() {
        events.push(serde_json::from_str(&frame).unwrap());
    }
    events
}

pub fn event_types(events: &[serde_json::Value]) -> Vec<String> {
    events
        .iter()
        .map(|event| event["type"].as_str().unwrap_or_default().to_string())
        .collect()
}

/// spawn されたタスクに実行機会を与える
pub async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}
