// chain-primitives/src/hash.rs

use crate::{PrimitivesError, PrimitivesResult};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Block hash size in bytes
pub const HASH_SIZE: usize = 32;

/// Transaction identifier size in bytes
pub const TX_ID_SIZE: usize = 32;

/// A 32-byte block hash
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BlockHash([u8; HASH_SIZE]);

impl BlockHash {
    /// Create a block hash from bytes
    pub fn new(bytes: [u8; HASH_SIZE]) -> Self {
        Self(bytes)
    }

    /// Create a block hash from a slice (returns error if wrong length)
    pub fn from_slice(slice: &[u8]) -> PrimitivesResult<Self> {
        if slice.len() != HASH_SIZE {
            return Err(PrimitivesError::InvalidLength {
                expected: HASH_SIZE,
                actual: slice.len(),
            });
        }
        let mut bytes = [0u8; HASH_SIZE];
        bytes.copy_from_slice(slice);
        Ok(Self(bytes))
    }

    /// Hash arbitrary bytes into a block hash (SHA-256)
    pub fn digest(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        Self(hasher.finalize().into())
    }

    /// Get the hash as a byte slice
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Get the hash as a fixed-size array
    pub fn to_bytes(&self) -> [u8; HASH_SIZE] {
        self.0
    }

    /// Create a zero hash (useful for genesis)
    pub fn zero() -> Self {
        Self([0u8; HASH_SIZE])
    }

    /// Convert to lowercase hex string
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string
    pub fn from_hex(s: &str) -> PrimitivesResult<Self> {
        let bytes = hex::decode(s).map_err(|e| PrimitivesError::HexDecode(e.to_string()))?;
        Self::from_slice(&bytes)
    }
}

impl fmt::Debug for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "BlockHash({}...{})",
            hex::encode(&self.0[..4]),
            hex::encode(&self.0[28..])
        )
    }
}

impl fmt::Display for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Default for BlockHash {
    fn default() -> Self {
        Self::zero()
    }
}

/// A 32-byte transaction identifier
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TxId([u8; TX_ID_SIZE]);

impl TxId {
    /// Create a transaction id from bytes
    pub fn new(bytes: [u8; TX_ID_SIZE]) -> Self {
        Self(bytes)
    }

    /// Create a transaction id from a slice (returns error if wrong length)
    pub fn from_slice(slice: &[u8]) -> PrimitivesResult<Self> {
        if slice.len() != TX_ID_SIZE {
            return Err(PrimitivesError::InvalidLength {
                expected: TX_ID_SIZE,
                actual: slice.len(),
            });
        }
        let mut bytes = [0u8; TX_ID_SIZE];
        bytes.copy_from_slice(slice);
        Ok(Self(bytes))
    }

    /// Hash arbitrary bytes into a transaction id (SHA-256)
    pub fn digest(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        Self(hasher.finalize().into())
    }

    /// Get the id as a byte slice
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Get the id as a fixed-size array
    pub fn to_bytes(&self) -> [u8; TX_ID_SIZE] {
        self.0
    }

    /// Create a zero id
    pub fn zero() -> Self {
        Self([0u8; TX_ID_SIZE])
    }

    /// Convert to lowercase hex string
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string
    pub fn from_hex(s: &str) -> PrimitivesResult<Self> {
        let bytes = hex::decode(s).map_err(|e| PrimitivesError::HexDecode(e.to_string()))?;
        Self::from_slice(&bytes)
    }
}

impl fmt::Debug for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TxId({}...{})",
            hex::encode(&self.0[..4]),
            hex::encode(&self.0[28..])
        )
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Default for TxId {
    fn default() -> Self {
        Self::zero()
    }
}
