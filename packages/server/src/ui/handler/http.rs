//! HTTP API endpoint handlers.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

use crate::{
    domain::{RoomId, UserId},
    infrastructure::dto::http::{
        AddMemberRequest, DebugStateDto, ErrorResponse, MembershipChangeDto, PresenceDto,
    },
    ui::state::AppState,
};
use yoriai_shared::time::timestamp_to_rfc3339;

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, error: impl ToString) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
        }),
    )
}

fn parse_ids(room_id: String, user_id: String) -> Result<(RoomId, UserId), ApiError> {
    let room_id = RoomId::new(room_id).map_err(|e| api_error(StatusCode::BAD_REQUEST, e))?;
    let user_id = UserId::new(user_id).map_err(|e| api_error(StatusCode::BAD_REQUEST, e))?;
    Ok((room_id, user_id))
}

/// Health check endpoint
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

/// Online users
pub async fn get_presence(State(state): State<Arc<AppState>>) -> Json<PresenceDto> {
    let online_user_ids = state
        .coordinator
        .presence()
        .online_user_ids()
        .await
        .into_iter()
        .map(UserId::into_string)
        .collect();
    Json(PresenceDto { online_user_ids })
}

/// `POST /api/rooms/{room_id}/members`
///
/// ストアに書き込んでから、ユーザーの開いている接続をルームに参加させる。
/// 新規追加なら 201、既にメンバーなら 200。
pub async fn add_member(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
    Json(request): Json<AddMemberRequest>,
) -> Result<(StatusCode, Json<MembershipChangeDto>), ApiError> {
    let (room_id, user_id) = parse_ids(room_id, request.user_id)?;

    let added = state
        .membership_store
        .add_member(&user_id, &room_id)
        .await
        .map_err(|e| {
            tracing::error!(room_id = %room_id, user_id = %user_id, "Failed to add member: {}", e);
            api_error(StatusCode::INTERNAL_SERVER_ERROR, e)
        })?;
    let connections = state
        .coordinator
        .rooms()
        .push_member_into_room(&user_id, &room_id)
        .await;

    let status = if added {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((
        status,
        Json(MembershipChangeDto {
            room_id: room_id.into_string(),
            user_id: user_id.into_string(),
            connections,
        }),
    ))
}

/// `DELETE /api/rooms/{room_id}/members/{user_id}`
///
/// ストアから削除してから、ユーザーの開いている接続をルームから外す。メンバーでなければ 404。
pub async fn remove_member(
    State(state): State<Arc<AppState>>,
    Path((room_id, user_id)): Path<(String, String)>,
) -> Result<Json<MembershipChangeDto>, ApiError> {
    let (room_id, user_id) = parse_ids(room_id, user_id)?;

    let removed = state
        .membership_store
        .remove_member(&user_id, &room_id)
        .await
        .map_err(|e| {
            tracing::error!(room_id = %room_id, user_id = %user_id, "Failed to remove member: {}", e);
            api_error(StatusCode::INTERNAL_SERVER_ERROR, e)
        })?;
    if !removed {
        return Err(api_error(
            StatusCode::NOT_FOUND,
            format!("user '{}' is not a member of room '{}'", user_id, room_id),
        ));
    }

    let connections = state
        .coordinator
        .rooms()
        .evict_member_from_room(&user_id, &room_id)
        .await;
    Ok(Json(MembershipChangeDto {
        room_id: room_id.into_string(),
        user_id: user_id.into_string(),
        connections,
    }))
}

/// Debug endpoint to get coordinator counters (for testing purposes)
pub async fn debug_state(State(state): State<Arc<AppState>>) -> Json<DebugStateDto> {
    let coordinator = &state.coordinator;
    Json(DebugStateDto {
        running: coordinator.is_running(),
        connections: coordinator.presence().connection_count().await,
        online_users: coordinator.presence().online_user_count().await,
        typing_entries: coordinator.typing().entry_count().await,
        server_time: timestamp_to_rfc3339(state.clock.now_millis()),
    })
}
