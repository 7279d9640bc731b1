// chain-primitives/src/lib.rs

//! Identifier types and record interfaces for the chain storage engine
//!
//! This crate provides:
//! - Block hash and transaction identifier types
//! - Account addresses
//! - Chain identifiers
//! - The record interfaces the storage engine consumes

pub mod address;
pub mod chain_id;
pub mod hash;
pub mod record;

pub use address::{Address, ADDRESS_SIZE};
pub use chain_id::{ChainId, CHAIN_ID_SIZE};
pub use hash::{BlockHash, TxId, HASH_SIZE, TX_ID_SIZE};
pub use record::{BlockRecord, TransactionRecord};

/// Result type for primitive conversions
pub type PrimitivesResult<T> = Result<T, PrimitivesError>;

/// Errors that can occur when constructing identifiers
#[derive(Debug, thiserror::Error)]
pub enum PrimitivesError {
    #[error("Invalid length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("Hex decode error: {0}")]
    HexDecode(String),
}
