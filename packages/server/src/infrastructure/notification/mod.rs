//! 通知ファンアウトの実装

pub mod personal_channel;

pub use personal_channel::PersonalChannelNotifier;
