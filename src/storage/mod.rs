//! Data storage and persistence
//!
//! The sled-backed chain store and the in-memory ordered mempool.

pub mod chain_store;
pub mod memory_pool;

pub use chain_store::{ChainMetadata, ChainStore};
pub use memory_pool::MemoryPool;
