//! インメモリ実装
//!
//! 永続ストアを持たない開発・テスト環境向けの実装。プロセス終了とともに内容は失われます。

pub mod membership;
pub mod message;

pub use membership::InMemoryMembershipStore;
pub use message::InMemoryMessageStore;
