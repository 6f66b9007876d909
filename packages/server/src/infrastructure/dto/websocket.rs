//! WebSocket frame DTOs.
//!
//! Every frame is a JSON object tagged by `type`; payload fields are camelCase.

use serde::{Deserialize, Serialize};

/// Client → server command frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientCommand {
    #[serde(rename_all = "camelCase")]
    JoinRoom { room_id: String },
    #[serde(rename_all = "camelCase")]
    LeaveRoom { room_id: String },
    #[serde(rename_all = "camelCase")]
    SendMessage {
        room_id: String,
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message_type: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    TypingStart { room_id: String },
    #[serde(rename_all = "camelCase")]
    TypingStop { room_id: String },
}

/// Persisted message payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageDto {
    pub id: String,
    pub room_id: String,
    pub sender_id: String,
    pub sender_name: String,
    pub content: String,
    pub message_type: String,
    /// Unix timestamp (milliseconds)
    pub created_at: i64,
}

/// Server → client event frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    #[serde(rename_all = "camelCase")]
    OnlineUsers { user_ids: Vec<String> },
    #[serde(rename_all = "camelCase")]
    UserOnline { user_id: String },
    #[serde(rename_all = "camelCase")]
    UserOffline { user_id: String },
    #[serde(rename_all = "camelCase")]
    JoinedRoom { room_id: String },
    #[serde(rename_all = "camelCase")]
    LeftRoom { room_id: String },
    #[serde(rename_all = "camelCase")]
    RemovedFromRoom { room_id: String },
    NewMessage { message: MessageDto },
    #[serde(rename_all = "camelCase")]
    UserTyping {
        room_id: String,
        user_id: String,
        display_name: String,
    },
    #[serde(rename_all = "camelCase")]
    UserStoppedTyping { room_id: String, user_id: String },
    #[serde(rename_all = "camelCase")]
    Notification { room_id: String, message: MessageDto },
    #[serde(rename_all = "camelCase")]
    Error {
        kind: String,
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        room_id: Option<String>,
    },
}
