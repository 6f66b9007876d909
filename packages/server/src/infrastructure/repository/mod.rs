//! 外部ストアの実装

pub mod inmemory;

pub use inmemory::{InMemoryMembershipStore, InMemoryMessageStore};
