//! Infrastructure 層
//!
//! ドメイン層が定義する trait の具体的な実装と、ワイヤーフォーマット（DTO）を提供します。

pub mod auth;
pub mod dto;
pub mod message_pusher;
pub mod notification;
pub mod repository;
