// chain-store/src/lib.rs

//! Persistent storage engine for chain data
//!
//! This crate provides:
//! - Content-addressed storage for block bodies and state snapshots
//! - One-file-per-transaction storage with sharded directories
//! - Per-chain block indexes, state-reference history and nonce counters
//! - Staged (mempool) transaction id tracking
//! - On-disk and fully in-memory substrates behind one facade

pub mod blobs;
pub mod config;
pub mod documents;
pub mod fs;
pub mod store;
pub mod txstore;

pub use blobs::{BlobStore, Namespace};
pub use config::StoreConfig;
pub use documents::{Collection, DocumentDb};
pub use fs::{DirEntry, FileSystem, MemoryFileSystem, OsFileSystem};
pub use store::ChainStore;
pub use txstore::{TxIdIter, TxStore};

use chain_primitives::ChainId;

/// Result type for storage operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur during storage operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("highest_index {highest} must not be lower than lowest_index {lowest}")]
    InvalidRange { highest: u64, lowest: u64 },

    #[error("Chain not found: {0}")]
    ChainNotFound(ChainId),

    #[error("Store is opened read-only")]
    ReadOnly,
}

impl From<sled::Error> for StoreError {
    fn from(err: sled::Error) -> Self {
        StoreError::Database(err.to_string())
    }
}
