//! Conversion logic between DTOs and domain types.

use crate::domain::{
    ChatMessage, Command, MessageContent, MessageKind, RoomId, ServerEvent, ValueObjectError,
};
use crate::infrastructure::dto::websocket as dto;

// ========================================
// DTO → Domain
// ========================================

impl TryFrom<dto::ClientCommand> for Command {
    type Error = ValueObjectError;

    fn try_from(dto: dto::ClientCommand) -> Result<Self, Self::Error> {
        let command = match dto {
            dto::ClientCommand::JoinRoom { room_id } => Self::JoinRoom {
                room_id: RoomId::new(room_id)?,
            },
            dto::ClientCommand::LeaveRoom { room_id } => Self::LeaveRoom {
                room_id: RoomId::new(room_id)?,
            },
            dto::ClientCommand::SendMessage {
                room_id,
                content,
                message_type,
            } => Self::SendMessage {
                room_id: RoomId::new(room_id)?,
                content: MessageContent::new(content)?,
                kind: match message_type.as_deref() {
                    Some(raw) => MessageKind::try_from(raw)?,
                    None => MessageKind::default(),
                },
            },
            dto::ClientCommand::TypingStart { room_id } => Self::TypingStart {
                room_id: RoomId::new(room_id)?,
            },
            dto::ClientCommand::TypingStop { room_id } => Self::TypingStop {
                room_id: RoomId::new(room_id)?,
            },
        };
        Ok(command)
    }
}

// ========================================
// Domain → DTO
// ========================================

impl From<&ChatMessage> for dto::MessageDto {
    fn from(model: &ChatMessage) -> Self {
        Self {
            id: model.id.to_string(),
            room_id: model.room_id.as_str().to_string(),
            sender_id: model.sender_id.as_str().to_string(),
            sender_name: model.sender_name.as_str().to_string(),
            content: model.content.as_str().to_string(),
            message_type: model.kind.as_str().to_string(),
            created_at: model.created_at.value(),
        }
    }
}

impl From<&ServerEvent> for dto::ServerMessage {
    fn from(event: &ServerEvent) -> Self {
        match event {
            ServerEvent::OnlineUsers { user_ids } => Self::OnlineUsers {
                user_ids: user_ids.iter().map(|id| id.as_str().to_string()).collect(),
            },
            ServerEvent::UserOnline { user_id } => Self::UserOnline {
                user_id: user_id.as_str().to_string(),
            },
            ServerEvent::UserOffline { user_id } => Self::UserOffline {
                user_id: user_id.as_str().to_string(),
            },
            ServerEvent::JoinedRoom { room_id } => Self::JoinedRoom {
                room_id: room_id.as_str().to_string(),
            },
            ServerEvent::LeftRoom { room_id } => Self::LeftRoom {
                room_id: room_id.as_str().to_string(),
            },
            ServerEvent::RemovedFromRoom { room_id } => Self::RemovedFromRoom {
                room_id: room_id.as_str().to_string(),
            },
            ServerEvent::NewMessage { message } => Self::NewMessage {
                message: message.into(),
            },
            ServerEvent::UserTyping {
                room_id,
                user_id,
                display_name,
            } => Self::UserTyping {
                room_id: room_id.as_str().to_string(),
                user_id: user_id.as_str().to_string(),
                display_name: display_name.as_str().to_string(),
            },
            ServerEvent::UserStoppedTyping { room_id, user_id } => Self::UserStoppedTyping {
                room_id: room_id.as_str().to_string(),
                user_id: user_id.as_str().to_string(),
            },
            ServerEvent::Notification { room_id, message } => Self::Notification {
                room_id: room_id.as_str().to_string(),
                message: message.into(),
            },
            ServerEvent::Error {
                kind,
                message,
                room_id,
            } => Self::Error {
                kind: kind.as_str().to_string(),
                message: message.clone(),
                room_id: room_id.as_ref().map(|id| id.as_str().to_string()),
            },
        }
    }
}
