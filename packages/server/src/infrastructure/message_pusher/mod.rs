//! メッセージ送信（ファンアウト）の実装
//!
//! ## 概要
//!
//! このモジュールは `MessagePusher` trait の具体的な実装を提供します。
//!
//! ## 実装
//!
//! - `websocket`: WebSocket 接続の送信チャンネルとチャンネル購読表を使った実装

pub mod websocket;

pub use websocket::WebSocketMessagePusher;
