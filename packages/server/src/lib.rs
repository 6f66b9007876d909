//! Yoriai: real-time presence, room subscription and message broadcast coordinator.
//!
//! Layers follow the usual clean-architecture split:
//!
//! - `domain`: value objects, entities, command / event vocabulary and collaborator traits
//! - `usecase`: the coordinator and its operations
//! - `infrastructure`: WebSocket fan-out, in-memory collaborators, wire DTOs
//! - `ui`: axum router and handlers

pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod ui;
pub mod usecase;
