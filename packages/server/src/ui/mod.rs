//! UI 層
//!
//! axum のルーター、WebSocket のアップグレード処理、REST エンドポイント、グレースフルシャットダウン。

mod handler;
mod server;
mod signal;
pub mod state;

pub use server::Server;
