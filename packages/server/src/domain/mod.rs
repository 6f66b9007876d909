//! Domain 層
//!
//! Value Object、エンティティ、コマンド・イベントの語彙、純粋なドメインロジック、
//! そして外部コラボレーターへのインターフェース（trait）を定義します。

pub mod command;
pub mod entity;
pub mod error;
pub mod event;
pub mod message_pusher;
pub mod presence;
pub mod repository;
pub mod value_object;

pub use command::Command;
pub use entity::{AuthenticatedUser, ChatMessage, Connection};
pub use error::{AuthError, MessagePushError, NotificationError, StoreError, ValueObjectError};
pub use event::{ErrorKind, ServerEvent};
pub use message_pusher::{MessagePusher, PusherChannel};
pub use presence::{PresenceRegistry, Unregistration};
pub use repository::{AuthVerifier, MembershipStore, MessageStore, NotificationFanout};
pub use value_object::{
    ChannelId, ConnectionId, DisplayName, MessageContent, MessageId, MessageKind, RoomId,
    Timestamp, UserId,
};

#[cfg(test)]
pub use repository::{
    MockAuthVerifier, MockMembershipStore, MockMessageStore, MockNotificationFanout,
};
