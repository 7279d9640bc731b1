// chain-primitives/src/chain_id.rs

use crate::{PrimitivesError, PrimitivesResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Chain identifier size in bytes
pub const CHAIN_ID_SIZE: usize = 16;

/// A 16-byte chain identifier
///
/// Multiple chains may coexist in one engine (a main chain and in-progress
/// forks); all per-chain collections are fully isolated by this identifier.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChainId([u8; CHAIN_ID_SIZE]);

impl ChainId {
    /// Create a chain id from bytes
    pub fn new(bytes: [u8; CHAIN_ID_SIZE]) -> Self {
        Self(bytes)
    }

    /// Create a chain id from a slice (returns error if wrong length)
    pub fn from_slice(slice: &[u8]) -> PrimitivesResult<Self> {
        if slice.len() != CHAIN_ID_SIZE {
            return Err(PrimitivesError::InvalidLength {
                expected: CHAIN_ID_SIZE,
                actual: slice.len(),
            });
        }
        let mut bytes = [0u8; CHAIN_ID_SIZE];
        bytes.copy_from_slice(slice);
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; CHAIN_ID_SIZE] {
        &self.0
    }

    /// Convert to lowercase hex string (used as collection-name suffix)
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string
    pub fn from_hex(s: &str) -> PrimitivesResult<Self> {
        let bytes = hex::decode(s).map_err(|e| PrimitivesError::HexDecode(e.to_string()))?;
        Self::from_slice(&bytes)
    }

    pub fn zero() -> Self {
        Self([0u8; CHAIN_ID_SIZE])
    }
}

impl fmt::Debug for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChainId({})", self.to_hex())
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Default for ChainId {
    fn default() -> Self {
        Self::zero()
    }
}
