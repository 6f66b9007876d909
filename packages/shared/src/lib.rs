//! Utilities shared by the Yoriai crates: logging setup and time helpers.

pub mod logger;
pub mod time;
