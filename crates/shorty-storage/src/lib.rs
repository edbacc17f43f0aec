//! Store backends implementing the `shorty-core` repository contract.

pub mod memory;
pub mod redis;

pub use memory::InMemoryRepository;
pub use redis::RedisRepository;
pub use shorty_core::{ReadRepository, Repository, StorageError};
