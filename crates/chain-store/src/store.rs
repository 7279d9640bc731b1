// chain-store/src/store.rs

use crate::blobs::{BlobStore, Namespace};
use crate::config::StoreConfig;
use crate::documents::{Collection, DocumentDb};
use crate::fs::{FileSystem, MemoryFileSystem, OsFileSystem};
use crate::txstore::{TxIdIter, TxStore};
use crate::{StoreError, StoreResult};
use chain_primitives::{
    Address, BlockHash, BlockRecord, ChainId, TransactionRecord, TxId, ADDRESS_SIZE,
};
use parking_lot::{RwLock, RwLockUpgradableReadGuard};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Collection name prefixes; the suffix is the lowercase chain-id hex.
const INDEX_PREFIX: &str = "index_";
const STATEREF_PREFIX: &str = "stateref_";
const STATEREF_IDX_PREFIX: &str = "stateref_idx_";
const NONCE_PREFIX: &str = "nonce_";

/// Process-wide staged transaction ids
const STAGED_COLLECTION: &str = "staged_txids";
/// Singleton canonical chain pointer
const CANON_COLLECTION: &str = "canon";
const CANON_KEY: &[u8] = b"canon";

/// Document database location under the store root
const INDEX_DB_NAME: &str = "index.ldb";
/// Transaction file directory under the store root
const TX_DIR_NAME: &str = "tx";

/// Persistent storage engine for chain data.
///
/// One instance exclusively owns the document database, the
/// content-addressed blob namespaces and the transaction files of its
/// storage location; client code holds exactly one instance per location
/// for the lifetime of the node. All operations are callable from multiple
/// threads; the block blob surface is serialized by a single
/// readers-writer lock, everything else relies on per-collection
/// atomicity.
pub struct ChainStore {
    documents: DocumentDb,
    blobs: BlobStore,
    txs: TxStore,
    staged: Collection,
    canon: Collection,
    block_lock: RwLock<()>,
    read_only: bool,
}

impl ChainStore {
    /// Open or create an on-disk store rooted at `path`.
    ///
    /// The document database lives at `<path>/index.ldb`, transaction
    /// files under `<path>/tx/`.
    pub fn open<P: AsRef<Path>>(path: P, config: StoreConfig) -> StoreResult<Self> {
        let root = path.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;
        let documents = DocumentDb::open(config.db_config(&root.join(INDEX_DB_NAME)))?;
        let fs: Arc<dyn FileSystem> = Arc::new(OsFileSystem);
        let txs = TxStore::new(fs, root.join(TX_DIR_NAME))?;
        tracing::info!("Chain store opened at {}", root.display());
        Self::assemble(documents, txs, config.read_only)
    }

    /// Create a store backed entirely by memory.
    pub fn in_memory() -> StoreResult<Self> {
        let documents = DocumentDb::open(sled::Config::new().temporary(true))?;
        let txs = TxStore::new(Arc::new(MemoryFileSystem::new()), PathBuf::from(TX_DIR_NAME))?;
        tracing::info!("Chain store opened in memory");
        Self::assemble(documents, txs, false)
    }

    fn assemble(documents: DocumentDb, txs: TxStore, read_only: bool) -> StoreResult<Self> {
        let blobs = BlobStore::new(&documents)?;
        let staged = documents.collection(STAGED_COLLECTION)?;
        let canon = documents.collection(CANON_COLLECTION)?;
        Ok(Self {
            documents,
            blobs,
            txs,
            staged,
            canon,
            block_lock: RwLock::new(()),
            read_only,
        })
    }

    fn ensure_writable(&self) -> StoreResult<()> {
        if self.read_only {
            Err(StoreError::ReadOnly)
        } else {
            Ok(())
        }
    }

    fn index_collection(&self, chain: &ChainId) -> StoreResult<Collection> {
        self.documents
            .collection(&format!("{}{}", INDEX_PREFIX, chain.to_hex()))
    }

    fn existing_index_collection(&self, chain: &ChainId) -> StoreResult<Option<Collection>> {
        self.documents
            .existing_collection(&format!("{}{}", INDEX_PREFIX, chain.to_hex()))
    }

    fn stateref_collection(&self, chain: &ChainId) -> StoreResult<Collection> {
        self.documents
            .collection(&format!("{}{}", STATEREF_PREFIX, chain.to_hex()))
    }

    fn existing_stateref_collection(&self, chain: &ChainId) -> StoreResult<Option<Collection>> {
        self.documents
            .existing_collection(&format!("{}{}", STATEREF_PREFIX, chain.to_hex()))
    }

    fn stateref_idx_collection(&self, chain: &ChainId) -> StoreResult<Collection> {
        self.documents
            .collection(&format!("{}{}", STATEREF_IDX_PREFIX, chain.to_hex()))
    }

    fn existing_stateref_idx_collection(&self, chain: &ChainId) -> StoreResult<Option<Collection>> {
        self.documents
            .existing_collection(&format!("{}{}", STATEREF_IDX_PREFIX, chain.to_hex()))
    }

    fn nonce_collection(&self, chain: &ChainId) -> StoreResult<Collection> {
        self.documents
            .collection(&format!("{}{}", NONCE_PREFIX, chain.to_hex()))
    }

    fn existing_nonce_collection(&self, chain: &ChainId) -> StoreResult<Option<Collection>> {
        self.documents
            .existing_collection(&format!("{}{}", NONCE_PREFIX, chain.to_hex()))
    }

    // ==================== CHAIN OPERATIONS ====================

    /// Chain ids that have ever had a block index collection created.
    pub fn list_chain_ids(&self) -> Vec<ChainId> {
        let mut chains: Vec<ChainId> = self
            .documents
            .collection_names()
            .into_iter()
            .filter_map(|name| {
                name.strip_prefix(INDEX_PREFIX)
                    .and_then(|hex| ChainId::from_hex(hex).ok())
            })
            .collect();
        chains.sort();
        chains
    }

    /// Drop the index, state-reference and nonce collections of a chain.
    ///
    /// Blocks, transactions and state snapshots are shared
    /// content-addressed data and are left untouched.
    pub fn delete_chain_id(&self, chain: &ChainId) -> StoreResult<()> {
        self.ensure_writable()?;
        let hex = chain.to_hex();
        self.documents
            .drop_collection(&format!("{}{}", INDEX_PREFIX, hex))?;
        self.documents
            .drop_collection(&format!("{}{}", STATEREF_PREFIX, hex))?;
        self.documents
            .drop_collection(&format!("{}{}", STATEREF_IDX_PREFIX, hex))?;
        self.documents
            .drop_collection(&format!("{}{}", NONCE_PREFIX, hex))?;
        tracing::debug!("Deleted chain {}", chain);
        Ok(())
    }

    /// Currently designated canonical chain, if any.
    pub fn canonical_chain_id(&self) -> StoreResult<Option<ChainId>> {
        match self.canon.get(CANON_KEY)? {
            Some(bytes) => Ok(Some(decode_chain_id(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Designate the canonical chain, replacing any previous designation.
    pub fn set_canonical_chain_id(&self, chain: &ChainId) -> StoreResult<()> {
        self.ensure_writable()?;
        self.canon.put(CANON_KEY, chain.as_bytes())
    }

    // ==================== BLOCK INDEX OPERATIONS ====================

    /// Number of block hashes recorded for the chain.
    pub fn count_index(&self, chain: &ChainId) -> StoreResult<u64> {
        match self.existing_index_collection(chain)? {
            Some(indexes) => Ok(indexes.count()),
            None => Ok(0),
        }
    }

    /// Block hashes in chain order, skipping `offset` entries and yielding
    /// at most `limit`.
    pub fn iterate_indexes(
        &self,
        chain: &ChainId,
        offset: usize,
        limit: Option<usize>,
    ) -> StoreResult<Vec<BlockHash>> {
        let indexes = match self.existing_index_collection(chain)? {
            Some(indexes) => indexes,
            None => return Ok(Vec::new()),
        };
        let limit = limit.unwrap_or(usize::MAX);
        let mut hashes = Vec::new();
        for entry in indexes.iter().skip(offset) {
            if hashes.len() >= limit {
                break;
            }
            let (_, value) = entry?;
            hashes.push(decode_hash(&value)?);
        }
        Ok(hashes)
    }

    /// Block hash at height `index`; negative values count from the tip.
    pub fn index_block_hash(&self, chain: &ChainId, index: i64) -> StoreResult<Option<BlockHash>> {
        let indexes = match self.existing_index_collection(chain)? {
            Some(indexes) => indexes,
            None => return Ok(None),
        };
        let mut index = index;
        if index < 0 {
            index += indexes.count() as i64;
            if index < 0 {
                return Ok(None);
            }
        }
        // height h lives under record id h + 1
        let id = index as u64 + 1;
        match indexes.get(&id.to_be_bytes())? {
            Some(value) => Ok(Some(decode_hash(&value)?)),
            None => Ok(None),
        }
    }

    /// Record `hash` as the next block of the chain, returning the
    /// zero-based height it was placed at.
    pub fn append_index(&self, chain: &ChainId, hash: &BlockHash) -> StoreResult<u64> {
        self.ensure_writable()?;
        let id = self.index_collection(chain)?.insert_auto(hash.as_bytes())?;
        tracing::debug!("Appended {} to chain {} at height {}", hash, chain, id - 1);
        Ok(id - 1)
    }

    /// Delete every index record bearing `hash`; true when at least one
    /// record was deleted.
    pub fn delete_index(&self, chain: &ChainId, hash: &BlockHash) -> StoreResult<bool> {
        self.ensure_writable()?;
        let indexes = match self.existing_index_collection(chain)? {
            Some(indexes) => indexes,
            None => return Ok(false),
        };
        let mut keys = Vec::new();
        for entry in indexes.iter() {
            let (key, value) = entry?;
            if value == hash.as_bytes() {
                keys.push(key);
            }
        }
        let mut deleted = false;
        for key in keys {
            deleted |= indexes.remove(&key)?;
        }
        Ok(deleted)
    }

    /// Copy the prefix of `source` ending just before the first occurrence
    /// of `branch_point` into `destination`, then append `branch_point`.
    pub fn fork_block_indexes(
        &self,
        source: &ChainId,
        destination: &ChainId,
        branch_point: &BlockHash,
    ) -> StoreResult<()> {
        self.ensure_writable()?;
        let destination_indexes = self.index_collection(destination)?;
        if let Some(source_indexes) = self.existing_index_collection(source)? {
            for entry in source_indexes.iter() {
                let (_, value) = entry?;
                if value == branch_point.as_bytes() {
                    break;
                }
                destination_indexes.insert_auto(&value)?;
            }
        }
        destination_indexes.insert_auto(branch_point.as_bytes())?;
        Ok(())
    }

    // ==================== TRANSACTION OPERATIONS ====================

    /// Serialize and store a transaction; re-puts of an already stored
    /// transaction are no-ops.
    pub fn put_transaction<T: TransactionRecord>(&self, tx: &T) -> StoreResult<()> {
        self.ensure_writable()?;
        let bytes = bincode::serialize(tx).map_err(|e| StoreError::Serialization(e.to_string()))?;
        self.txs.put(&tx.id(), &bytes)?;
        tracing::debug!("Stored transaction {}", tx.id());
        Ok(())
    }

    /// Load a transaction by id; None when absent.
    pub fn get_transaction<T: TransactionRecord>(&self, id: &TxId) -> StoreResult<Option<T>> {
        match self.txs.get(id)? {
            Some(bytes) => {
                let tx = bincode::deserialize(&bytes)
                    .map_err(|e| StoreError::Serialization(e.to_string()))?;
                Ok(Some(tx))
            }
            None => Ok(None),
        }
    }

    /// Remove a transaction; true when one was stored.
    pub fn delete_transaction(&self, id: &TxId) -> StoreResult<bool> {
        self.ensure_writable()?;
        self.txs.delete(id)
    }

    /// Lazily iterate every stored transaction id.
    pub fn iterate_transaction_ids(&self) -> TxIdIter {
        self.txs.iter()
    }

    /// Count stored transactions by scanning the transaction files.
    pub fn count_transactions(&self) -> StoreResult<u64> {
        self.txs.count()
    }

    /// Add transaction ids to the staged (mempool) set.
    pub fn stage_transaction_ids(&self, ids: &BTreeSet<TxId>) -> StoreResult<()> {
        self.ensure_writable()?;
        for id in ids {
            self.staged.put(id.as_bytes(), &[])?;
        }
        Ok(())
    }

    /// Remove transaction ids from the staged set.
    pub fn unstage_transaction_ids(&self, ids: &BTreeSet<TxId>) -> StoreResult<()> {
        self.ensure_writable()?;
        for id in ids {
            self.staged.remove(id.as_bytes())?;
        }
        Ok(())
    }

    /// Staged transaction ids; each id appears at most once.
    pub fn iterate_staged_transaction_ids(&self) -> StoreResult<Vec<TxId>> {
        let mut ids = Vec::new();
        for key in self.staged.keys() {
            let key = key?;
            if let Ok(id) = TxId::from_slice(&key) {
                ids.push(id);
            }
        }
        Ok(ids)
    }

    // ==================== BLOCK OPERATIONS ====================

    /// Store a block and all of its contained transactions.
    ///
    /// The block body commits strictly after its transactions, so a reader
    /// that observes the block hash can always read each contained
    /// transaction. Re-puts of an already stored block write nothing and
    /// return before taking the block lock.
    pub fn put_block<B: BlockRecord>(&self, block: &B) -> StoreResult<()> {
        self.ensure_writable()?;
        let hash = block.hash();
        if self.blobs.contains(Namespace::Block, &hash)? {
            return Ok(());
        }
        let bytes =
            bincode::serialize(block).map_err(|e| StoreError::Serialization(e.to_string()))?;
        let _guard = self.block_lock.write();
        for tx in block.transactions() {
            self.put_transaction(tx)?;
        }
        self.blobs.put_new(Namespace::Block, &hash, &bytes)?;
        tracing::debug!("Stored block #{} ({})", block.index(), hash);
        Ok(())
    }

    /// Raw serialized bytes of a block; None when absent.
    pub fn get_raw_block(&self, hash: &BlockHash) -> StoreResult<Option<Vec<u8>>> {
        let guard = self.block_lock.upgradable_read();
        if !self.blobs.contains(Namespace::Block, hash)? {
            return Ok(None);
        }
        // the blob read itself requires exclusive access
        let _write = RwLockUpgradableReadGuard::upgrade(guard);
        self.blobs.get(Namespace::Block, hash)
    }

    /// Load and deserialize a block; None when absent.
    pub fn get_block<B: BlockRecord>(&self, hash: &BlockHash) -> StoreResult<Option<B>> {
        match self.get_raw_block(hash)? {
            Some(bytes) => {
                let block = bincode::deserialize(&bytes)
                    .map_err(|e| StoreError::Serialization(e.to_string()))?;
                Ok(Some(block))
            }
            None => Ok(None),
        }
    }

    /// Remove a block body; true when the block was present. Contained
    /// transactions are kept, they may belong to other blocks.
    pub fn delete_block(&self, hash: &BlockHash) -> StoreResult<bool> {
        self.ensure_writable()?;
        let _guard = self.block_lock.write();
        self.blobs.delete(Namespace::Block, hash)
    }

    /// True when a block body is stored for `hash`.
    pub fn contains_block(&self, hash: &BlockHash) -> StoreResult<bool> {
        let _guard = self.block_lock.read();
        self.blobs.contains(Namespace::Block, hash)
    }

    /// All stored block hashes.
    ///
    /// The key set is collected under the read lock, so concurrent
    /// mutations never produce a torn listing.
    pub fn iterate_block_hashes(&self) -> StoreResult<Vec<BlockHash>> {
        let _guard = self.block_lock.read();
        self.blobs.list(Namespace::Block)
    }

    /// Number of stored blocks.
    pub fn count_blocks(&self) -> StoreResult<u64> {
        let _guard = self.block_lock.read();
        Ok(self.blobs.count(Namespace::Block))
    }

    // ==================== STATE SNAPSHOT OPERATIONS ====================

    /// Address → state mapping recorded for a block; None when absent.
    pub fn get_block_states(
        &self,
        hash: &BlockHash,
    ) -> StoreResult<Option<BTreeMap<Address, Vec<u8>>>> {
        match self.blobs.get(Namespace::State, hash)? {
            Some(bytes) => {
                let states = bincode::deserialize(&bytes)
                    .map_err(|e| StoreError::Serialization(e.to_string()))?;
                Ok(Some(states))
            }
            None => Ok(None),
        }
    }

    /// Record the address → state mapping of a block, replacing any
    /// previously recorded snapshot.
    pub fn set_block_states(
        &self,
        hash: &BlockHash,
        states: &BTreeMap<Address, Vec<u8>>,
    ) -> StoreResult<()> {
        self.ensure_writable()?;
        let bytes =
            bincode::serialize(states).map_err(|e| StoreError::Serialization(e.to_string()))?;
        self.blobs.put(Namespace::State, hash, &bytes)?;
        tracing::debug!("Stored states for block {}", hash);
        Ok(())
    }

    // ==================== STATE REFERENCE OPERATIONS ====================

    /// State references of `address` on `chain` as (block hash, block
    /// index) pairs in descending block index order, filtered to
    /// `[lowest_index, highest_index]` and capped at `limit` entries.
    pub fn iterate_state_references(
        &self,
        chain: &ChainId,
        address: &Address,
        highest_index: Option<u64>,
        lowest_index: Option<u64>,
        limit: Option<usize>,
    ) -> StoreResult<Vec<(BlockHash, u64)>> {
        let highest = highest_index.unwrap_or(i64::MAX as u64);
        let lowest = lowest_index.unwrap_or(0);
        if highest < lowest {
            return Err(StoreError::InvalidRange { highest, lowest });
        }
        let refs_collection = match self.existing_stateref_collection(chain)? {
            Some(collection) => collection,
            None => return Ok(Vec::new()),
        };
        let mut refs = Vec::new();
        for entry in refs_collection.scan_prefix(address.as_bytes()) {
            let (key, value) = entry?;
            let block_index = decode_be64(&value)?;
            if block_index < lowest || block_index > highest {
                continue;
            }
            refs.push((decode_hash(&key[ADDRESS_SIZE..])?, block_index));
        }
        refs.sort_by(|a, b| b.1.cmp(&a.1));
        if let Some(limit) = limit {
            refs.truncate(limit);
        }
        Ok(refs)
    }

    /// Record that `addresses` were touched at block (`hash`, `index`).
    ///
    /// Addresses already carrying a reference for this block hash are left
    /// as they are. The blockIndex lookup rows are maintained alongside.
    pub fn store_state_reference(
        &self,
        chain: &ChainId,
        addresses: &BTreeSet<Address>,
        hash: &BlockHash,
        index: u64,
    ) -> StoreResult<()> {
        self.ensure_writable()?;
        let refs = self.stateref_collection(chain)?;
        let refs_by_index = self.stateref_idx_collection(chain)?;
        for address in addresses {
            let key = stateref_key(address, hash);
            if refs.put_if_absent(&key, &index.to_be_bytes())? {
                refs_by_index.put(&stateref_idx_key(index, &key), &[])?;
            }
        }
        Ok(())
    }

    /// Copy every state reference at or below the branch point's height
    /// from `source` into `destination`.
    pub fn fork_state_references<B: BlockRecord>(
        &self,
        source: &ChainId,
        destination: &ChainId,
        branch_point: &B,
    ) -> StoreResult<()> {
        self.ensure_writable()?;
        let branch_index = branch_point.index();
        let destination_refs = self.stateref_collection(destination)?;
        let destination_by_index = self.stateref_idx_collection(destination)?;
        if let Some(source_by_index) = self.existing_stateref_idx_collection(source)? {
            let source_refs = self.stateref_collection(source)?;
            let mut refs_batch = sled::Batch::default();
            let mut index_batch = sled::Batch::default();
            for entry in source_by_index.iter() {
                let (key, _) = entry?;
                if decode_be64(&key[..8])? > branch_index {
                    break;
                }
                let composite = &key[8..];
                if let Some(value) = source_refs.get(composite)? {
                    refs_batch.insert(composite, value);
                    index_batch.insert(key.as_slice(), Vec::new());
                }
            }
            destination_refs.apply_batch(refs_batch)?;
            destination_by_index.apply_batch(index_batch)?;
        }
        if destination_refs.is_empty() && self.count_index(source)? == 0 {
            return Err(StoreError::ChainNotFound(*source));
        }
        Ok(())
    }

    /// Distinct addresses appearing in any state reference of the chain,
    /// in ascending order.
    pub fn list_addresses(&self, chain: &ChainId) -> StoreResult<Vec<Address>> {
        let refs = match self.existing_stateref_collection(chain)? {
            Some(collection) => collection,
            None => return Ok(Vec::new()),
        };
        let mut addresses: Vec<Address> = Vec::new();
        for key in refs.keys() {
            let key = key?;
            let address = decode_address(&key[..ADDRESS_SIZE])?;
            if addresses.last() != Some(&address) {
                addresses.push(address);
            }
        }
        Ok(addresses)
    }

    // ==================== NONCE OPERATIONS ====================

    /// Transaction nonce of `address` on `chain`; 0 when no record exists.
    pub fn get_tx_nonce(&self, chain: &ChainId, address: &Address) -> StoreResult<i64> {
        let nonces = match self.existing_nonce_collection(chain)? {
            Some(collection) => collection,
            None => return Ok(0),
        };
        match nonces.get(address.as_bytes())? {
            Some(value) => decode_nonce(&value),
            None => Ok(0),
        }
    }

    /// Add `delta` to the nonce of `signer`.
    ///
    /// The read-modify-write is not atomic across concurrent callers for
    /// one signer; callers serialize increases per signer.
    pub fn increase_tx_nonce(&self, chain: &ChainId, signer: &Address, delta: i64) -> StoreResult<()> {
        self.ensure_writable()?;
        let current = self.get_tx_nonce(chain, signer)?;
        self.nonce_collection(chain)?
            .put(signer.as_bytes(), &(current + delta).to_be_bytes())
    }

    /// Every (address, nonce) pair with a strictly positive nonce.
    pub fn list_tx_nonces(&self, chain: &ChainId) -> StoreResult<Vec<(Address, i64)>> {
        let nonces = match self.existing_nonce_collection(chain)? {
            Some(collection) => collection,
            None => return Ok(Vec::new()),
        };
        let mut pairs = Vec::new();
        for entry in nonces.iter() {
            let (key, value) = entry?;
            let nonce = decode_nonce(&value)?;
            if nonce > 0 {
                pairs.push((decode_address(&key)?, nonce));
            }
        }
        Ok(pairs)
    }
}

fn stateref_key(address: &Address, hash: &BlockHash) -> Vec<u8> {
    let mut key = Vec::with_capacity(ADDRESS_SIZE + hash.as_bytes().len());
    key.extend_from_slice(address.as_bytes());
    key.extend_from_slice(hash.as_bytes());
    key
}

fn stateref_idx_key(index: u64, composite: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(8 + composite.len());
    key.extend_from_slice(&index.to_be_bytes());
    key.extend_from_slice(composite);
    key
}

fn decode_hash(bytes: &[u8]) -> StoreResult<BlockHash> {
    BlockHash::from_slice(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn decode_address(bytes: &[u8]) -> StoreResult<Address> {
    Address::from_slice(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn decode_chain_id(bytes: &[u8]) -> StoreResult<ChainId> {
    ChainId::from_slice(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn decode_be64(bytes: &[u8]) -> StoreResult<u64> {
    let bytes: [u8; 8] = bytes
        .try_into()
        .map_err(|_| StoreError::Serialization("malformed 64-bit record value".into()))?;
    Ok(u64::from_be_bytes(bytes))
}

fn decode_nonce(bytes: &[u8]) -> StoreResult<i64> {
    let bytes: [u8; 8] = bytes
        .try_into()
        .map_err(|_| StoreError::Serialization("malformed nonce record".into()))?;
    Ok(i64::from_be_bytes(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use tempfile::TempDir;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct TestTx {
        payload: Vec<u8>,
    }

    impl TransactionRecord for TestTx {
        fn id(&self) -> TxId {
            TxId::digest(&self.payload)
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct TestBlock {
        index: u64,
        transactions: Vec<TestTx>,
    }

    impl BlockRecord for TestBlock {
        type Transaction = TestTx;

        fn hash(&self) -> BlockHash {
            BlockHash::digest(&bincode::serialize(self).unwrap())
        }

        fn index(&self) -> u64 {
            self.index
        }

        fn transactions(&self) -> &[TestTx] {
            &self.transactions
        }
    }

    fn create_test_store() -> (ChainStore, TempDir) {
        let temp = TempDir::new().unwrap();
        let store = ChainStore::open(temp.path(), StoreConfig::default()).unwrap();
        (store, temp)
    }

    fn chain(byte: u8) -> ChainId {
        ChainId::new([byte; 16])
    }

    #[test]
    fn test_canonical_chain_roundtrip() {
        let (store, _temp) = create_test_store();
        assert!(store.canonical_chain_id().unwrap().is_none());

        store.set_canonical_chain_id(&chain(1)).unwrap();
        assert_eq!(store.canonical_chain_id().unwrap(), Some(chain(1)));

        store.set_canonical_chain_id(&chain(2)).unwrap();
        assert_eq!(store.canonical_chain_id().unwrap(), Some(chain(2)));
    }

    #[test]
    fn test_append_index_returns_heights() {
        let (store, _temp) = create_test_store();
        let c = chain(0);
        let first = BlockHash::digest(b"one");
        let second = BlockHash::digest(b"two");

        assert_eq!(store.append_index(&c, &first).unwrap(), 0);
        assert_eq!(store.append_index(&c, &second).unwrap(), 1);
        assert_eq!(store.count_index(&c).unwrap(), 2);
        assert_eq!(store.index_block_hash(&c, 0).unwrap(), Some(first));
        assert_eq!(store.index_block_hash(&c, 1).unwrap(), Some(second));
        assert_eq!(store.index_block_hash(&c, -1).unwrap(), Some(second));
        assert_eq!(store.index_block_hash(&c, -2).unwrap(), Some(first));
        assert_eq!(store.index_block_hash(&c, 2).unwrap(), None);
        assert_eq!(store.index_block_hash(&c, -3).unwrap(), None);
    }

    #[test]
    fn test_read_paths_do_not_create_chains() {
        let (store, _temp) = create_test_store();
        assert_eq!(store.count_index(&chain(9)).unwrap(), 0);
        assert!(store.index_block_hash(&chain(9), 0).unwrap().is_none());
        assert_eq!(store.get_tx_nonce(&chain(9), &Address::zero()).unwrap(), 0);
        assert!(store.list_chain_ids().is_empty());
    }

    #[test]
    fn test_delete_index_removes_all_occurrences() {
        let (store, _temp) = create_test_store();
        let c = chain(0);
        let repeated = BlockHash::digest(b"repeated");
        let other = BlockHash::digest(b"other");

        store.append_index(&c, &repeated).unwrap();
        store.append_index(&c, &other).unwrap();
        store.append_index(&c, &repeated).unwrap();

        assert!(store.delete_index(&c, &repeated).unwrap());
        assert!(!store.delete_index(&c, &repeated).unwrap());
        assert_eq!(store.iterate_indexes(&c, 0, None).unwrap(), vec![other]);
    }

    #[test]
    fn test_fork_block_indexes_copies_prefix() {
        let (store, _temp) = create_test_store();
        let src = chain(1);
        let dst = chain(2);
        let hashes: Vec<BlockHash> = (0u8..4).map(|i| BlockHash::digest(&[i])).collect();
        for hash in &hashes {
            store.append_index(&src, hash).unwrap();
        }

        store.fork_block_indexes(&src, &dst, &hashes[2]).unwrap();
        assert_eq!(
            store.iterate_indexes(&dst, 0, None).unwrap(),
            hashes[..3].to_vec()
        );
        // source stays intact
        assert_eq!(store.count_index(&src).unwrap(), 4);
    }

    #[test]
    fn test_put_block_stores_transactions_first() {
        let (store, _temp) = create_test_store();
        let block = TestBlock {
            index: 0,
            transactions: vec![
                TestTx { payload: b"a".to_vec() },
                TestTx { payload: b"b".to_vec() },
            ],
        };

        store.put_block(&block).unwrap();
        assert!(store.contains_block(&block.hash()).unwrap());
        for tx in &block.transactions {
            let loaded: TestTx = store.get_transaction(&tx.id()).unwrap().unwrap();
            assert_eq!(&loaded, tx);
        }

        let loaded: TestBlock = store.get_block(&block.hash()).unwrap().unwrap();
        assert_eq!(loaded, block);
    }

    #[test]
    fn test_delete_block_keeps_transactions() {
        let (store, _temp) = create_test_store();
        let block = TestBlock {
            index: 0,
            transactions: vec![TestTx { payload: b"kept".to_vec() }],
        };
        store.put_block(&block).unwrap();

        assert!(store.delete_block(&block.hash()).unwrap());
        assert!(!store.delete_block(&block.hash()).unwrap());
        assert!(store.get_raw_block(&block.hash()).unwrap().is_none());
        assert!(store
            .get_transaction::<TestTx>(&block.transactions[0].id())
            .unwrap()
            .is_some());
    }

    #[test]
    fn test_block_states_replace() {
        let (store, _temp) = create_test_store();
        let hash = BlockHash::digest(b"block");
        assert!(store.get_block_states(&hash).unwrap().is_none());

        let mut states = BTreeMap::new();
        states.insert(Address::new([1; 20]), b"v1".to_vec());
        store.set_block_states(&hash, &states).unwrap();
        assert_eq!(store.get_block_states(&hash).unwrap().unwrap(), states);

        let mut recomputed = BTreeMap::new();
        recomputed.insert(Address::new([1; 20]), b"v2".to_vec());
        store.set_block_states(&hash, &recomputed).unwrap();
        assert_eq!(store.get_block_states(&hash).unwrap().unwrap(), recomputed);
    }

    #[test]
    fn test_staged_transaction_ids_form_a_set() {
        let (store, _temp) = create_test_store();
        let first = TxId::digest(b"one");
        let second = TxId::digest(b"two");

        let batch: BTreeSet<TxId> = [first, second, first].into_iter().collect();
        store.stage_transaction_ids(&batch).unwrap();
        store
            .stage_transaction_ids(&[first].into_iter().collect())
            .unwrap();

        let mut staged = store.iterate_staged_transaction_ids().unwrap();
        staged.sort();
        let mut expected = vec![first, second];
        expected.sort();
        assert_eq!(staged, expected);

        store
            .unstage_transaction_ids(&[first].into_iter().collect())
            .unwrap();
        assert_eq!(store.iterate_staged_transaction_ids().unwrap(), vec![second]);
    }

    #[test]
    fn test_nonce_accumulates() {
        let (store, _temp) = create_test_store();
        let c = chain(0);
        let signer = Address::new([9; 20]);

        assert_eq!(store.get_tx_nonce(&c, &signer).unwrap(), 0);
        store.increase_tx_nonce(&c, &signer, 1).unwrap();
        store.increase_tx_nonce(&c, &signer, 1).unwrap();
        store.increase_tx_nonce(&c, &signer, 5).unwrap();
        assert_eq!(store.get_tx_nonce(&c, &signer).unwrap(), 7);

        let listed = store.list_tx_nonces(&c).unwrap();
        assert_eq!(listed, vec![(signer, 7)]);
    }

    #[test]
    fn test_list_tx_nonces_skips_non_positive() {
        let (store, _temp) = create_test_store();
        let c = chain(0);
        let up = Address::new([1; 20]);
        let down = Address::new([2; 20]);

        store.increase_tx_nonce(&c, &up, 2).unwrap();
        store.increase_tx_nonce(&c, &down, 1).unwrap();
        store.increase_tx_nonce(&c, &down, -1).unwrap();

        assert_eq!(store.list_tx_nonces(&c).unwrap(), vec![(up, 2)]);
    }

    #[test]
    fn test_state_references_filter_and_order() {
        let (store, _temp) = create_test_store();
        let c = chain(0);
        let address = Address::new([7; 20]);
        let addresses: BTreeSet<Address> = [address].into_iter().collect();

        for index in [1u64, 3, 5, 7] {
            let hash = BlockHash::digest(&index.to_be_bytes());
            store
                .store_state_reference(&c, &addresses, &hash, index)
                .unwrap();
        }

        let all = store
            .iterate_state_references(&c, &address, None, None, None)
            .unwrap();
        let indices: Vec<u64> = all.iter().map(|(_, index)| *index).collect();
        assert_eq!(indices, vec![7, 5, 3, 1]);

        let window = store
            .iterate_state_references(&c, &address, Some(5), Some(3), None)
            .unwrap();
        let indices: Vec<u64> = window.iter().map(|(_, index)| *index).collect();
        assert_eq!(indices, vec![5, 3]);

        let limited = store
            .iterate_state_references(&c, &address, None, None, Some(2))
            .unwrap();
        assert_eq!(limited.len(), 2);
        assert_eq!(limited[0].1, 7);
    }

    #[test]
    fn test_state_reference_range_is_validated() {
        let (store, _temp) = create_test_store();
        let err = store
            .iterate_state_references(&chain(0), &Address::zero(), Some(5), Some(10), None)
            .unwrap_err();
        assert!(err.to_string().contains("highest_index"));
    }

    #[test]
    fn test_store_state_reference_is_insert_only() {
        let (store, _temp) = create_test_store();
        let c = chain(0);
        let address = Address::new([7; 20]);
        let addresses: BTreeSet<Address> = [address].into_iter().collect();
        let hash = BlockHash::digest(b"block");

        store.store_state_reference(&c, &addresses, &hash, 4).unwrap();
        store.store_state_reference(&c, &addresses, &hash, 9).unwrap();

        let refs = store
            .iterate_state_references(&c, &address, None, None, None)
            .unwrap();
        assert_eq!(refs, vec![(hash, 4)]);
    }

    #[test]
    fn test_fork_state_references_empty_source_fails() {
        let (store, _temp) = create_test_store();
        let branch = TestBlock { index: 4, transactions: Vec::new() };
        let err = store
            .fork_state_references(&chain(1), &chain(2), &branch)
            .unwrap_err();
        assert!(matches!(err, StoreError::ChainNotFound(_)));
    }

    #[test]
    fn test_delete_chain_id_drops_only_chain_collections() {
        let (store, _temp) = create_test_store();
        let c = chain(1);
        let keep = chain(2);
        let hash = BlockHash::digest(b"block");
        let signer = Address::new([3; 20]);

        store.append_index(&c, &hash).unwrap();
        store.increase_tx_nonce(&c, &signer, 1).unwrap();
        store.append_index(&keep, &hash).unwrap();

        let block = TestBlock { index: 0, transactions: Vec::new() };
        store.put_block(&block).unwrap();

        store.delete_chain_id(&c).unwrap();
        assert_eq!(store.list_chain_ids(), vec![keep]);
        assert_eq!(store.count_index(&c).unwrap(), 0);
        assert_eq!(store.get_tx_nonce(&c, &signer).unwrap(), 0);
        // shared content-addressed data survives
        assert!(store.contains_block(&block.hash()).unwrap());
    }

    #[test]
    fn test_read_only_rejects_mutations() {
        let temp = TempDir::new().unwrap();
        {
            let store = ChainStore::open(temp.path(), StoreConfig::default()).unwrap();
            store.set_canonical_chain_id(&chain(1)).unwrap();
        }
        let config = StoreConfig {
            read_only: true,
            ..Default::default()
        };
        let store = ChainStore::open(temp.path(), config).unwrap();
        assert_eq!(store.canonical_chain_id().unwrap(), Some(chain(1)));
        assert!(matches!(
            store.set_canonical_chain_id(&chain(2)),
            Err(StoreError::ReadOnly)
        ));
        assert!(matches!(
            store.append_index(&chain(1), &BlockHash::zero()),
            Err(StoreError::ReadOnly)
        ));
    }

    #[test]
    fn test_in_memory_store() {
        let store = ChainStore::in_memory().unwrap();
        let c = chain(0);
        let hash = BlockHash::digest(b"block");

        store.append_index(&c, &hash).unwrap();
        assert_eq!(store.index_block_hash(&c, 0).unwrap(), Some(hash));

        let block = TestBlock {
            index: 0,
            transactions: vec![TestTx { payload: b"mem".to_vec() }],
        };
        store.put_block(&block).unwrap();
        let loaded: TestBlock = store.get_block(&block.hash()).unwrap().unwrap();
        assert_eq!(loaded, block);
        assert_eq!(store.count_transactions().unwrap(), 1);
    }
}
