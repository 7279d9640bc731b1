// chain-store/src/blobs.rs

use crate::documents::{Collection, DocumentDb};
use crate::StoreResult;
use chain_primitives::BlockHash;

/// Content-addressed blob namespaces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Namespace {
    /// Raw block bodies
    Block,
    /// Per-block state snapshots
    State,
}

impl Namespace {
    fn collection_name(self) -> &'static str {
        match self {
            Namespace::Block => "blob_block",
            Namespace::State => "blob_state",
        }
    }
}

/// Content-addressed store for variable-size binary values keyed by hash.
pub struct BlobStore {
    blocks: Collection,
    states: Collection,
}

impl BlobStore {
    pub fn new(db: &DocumentDb) -> StoreResult<Self> {
        Ok(Self {
            blocks: db.collection(Namespace::Block.collection_name())?,
            states: db.collection(Namespace::State.collection_name())?,
        })
    }

    fn collection(&self, namespace: Namespace) -> &Collection {
        match namespace {
            Namespace::Block => &self.blocks,
            Namespace::State => &self.states,
        }
    }

    /// First-writer-wins put; false when an entry already existed and
    /// nothing was written.
    pub fn put_new(&self, namespace: Namespace, hash: &BlockHash, bytes: &[u8]) -> StoreResult<bool> {
        self.collection(namespace).put_if_absent(hash.as_bytes(), bytes)
    }

    /// Replacing put.
    pub fn put(&self, namespace: Namespace, hash: &BlockHash, bytes: &[u8]) -> StoreResult<()> {
        self.collection(namespace).put(hash.as_bytes(), bytes)
    }

    pub fn get(&self, namespace: Namespace, hash: &BlockHash) -> StoreResult<Option<Vec<u8>>> {
        self.collection(namespace).get(hash.as_bytes())
    }

    pub fn contains(&self, namespace: Namespace, hash: &BlockHash) -> StoreResult<bool> {
        self.collection(namespace).contains(hash.as_bytes())
    }

    /// True when an entry was present before the call.
    pub fn delete(&self, namespace: Namespace, hash: &BlockHash) -> StoreResult<bool> {
        self.collection(namespace).remove(hash.as_bytes())
    }

    /// All hashes in the namespace, in key order; malformed keys skipped.
    pub fn list(&self, namespace: Namespace) -> StoreResult<Vec<BlockHash>> {
        let mut hashes = Vec::new();
        for key in self.collection(namespace).keys() {
            let key = key?;
            if let Ok(hash) = BlockHash::from_slice(&key) {
                hashes.push(hash);
            }
        }
        Ok(hashes)
    }

    pub fn count(&self, namespace: Namespace) -> u64 {
        self.collection(namespace).count()
    }
}
