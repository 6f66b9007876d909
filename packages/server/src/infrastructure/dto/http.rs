//! HTTP API DTOs.

use serde::{Deserialize, Serialize};

/// `POST /api/rooms/{room_id}/members` request body
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddMemberRequest {
    pub user_id: String,
}

/// Result of a membership mutation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MembershipChangeDto {
    pub room_id: String,
    pub user_id: String,
    /// Number of open connections the change was applied to
    pub connections: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceDto {
    pub online_user_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugStateDto {
    pub running: bool,
    pub connections: usize,
    pub online_users: usize,
    pub typing_entries: usize,
    /// RFC 3339
    pub server_time: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
