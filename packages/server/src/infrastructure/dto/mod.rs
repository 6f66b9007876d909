//! Data Transfer Objects (DTOs) for the coordinator.
//!
//! DTOs are organized by protocol:
//! - `websocket`: WebSocket frame DTOs (client commands and server events)
//! - `http`: HTTP API request/response DTOs

pub mod conversion;
pub mod http;
pub mod websocket;
