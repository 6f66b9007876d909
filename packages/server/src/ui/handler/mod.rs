//! Request handlers.

mod http;
mod websocket;

pub use http::{add_member, debug_state, get_presence, health_check, remove_member};
pub use websocket::websocket_handler;
