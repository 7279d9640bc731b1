// chain-store/src/documents.rs

use crate::{StoreError, StoreResult};

/// Name of the database's own default tree, excluded from listings.
const DEFAULT_TREE: &str = "__sled__default";

/// Embedded document database exposing named collections.
#[derive(Clone)]
pub struct DocumentDb {
    db: sled::Db,
}

impl DocumentDb {
    /// Open the database with the given options.
    pub fn open(config: sled::Config) -> StoreResult<Self> {
        let db = config.open()?;
        Ok(Self { db })
    }

    /// Open a collection, creating it if absent.
    pub fn collection(&self, name: &str) -> StoreResult<Collection> {
        let tree = self.db.open_tree(name)?;
        Ok(Collection { tree })
    }

    /// Open a collection only if it already exists.
    ///
    /// Read paths use this so that queries against unknown chains do not
    /// materialize empty collections.
    pub fn existing_collection(&self, name: &str) -> StoreResult<Option<Collection>> {
        if self.collection_names().iter().any(|n| n == name) {
            Ok(Some(self.collection(name)?))
        } else {
            Ok(None)
        }
    }

    /// Names of all collections.
    pub fn collection_names(&self) -> Vec<String> {
        self.db
            .tree_names()
            .into_iter()
            .filter_map(|name| String::from_utf8(name.to_vec()).ok())
            .filter(|name| name != DEFAULT_TREE)
            .collect()
    }

    /// Drop a collection and all of its records; true when it existed.
    pub fn drop_collection(&self, name: &str) -> StoreResult<bool> {
        Ok(self.db.drop_tree(name)?)
    }
}

/// A named collection of records with ordered byte keys.
#[derive(Clone)]
pub struct Collection {
    tree: sled::Tree,
}

impl Collection {
    /// Insert a record under a dense auto-assigned key starting at 1.
    ///
    /// Keys are big-endian u64; assignment is totally ordered and monotonic
    /// within the collection, also under concurrent callers.
    pub fn insert_auto(&self, value: &[u8]) -> StoreResult<u64> {
        loop {
            let next = match self.tree.last()? {
                Some((key, _)) => decode_auto_key(&key)? + 1,
                None => 1,
            };
            let cas = self
                .tree
                .compare_and_swap(next.to_be_bytes(), None as Option<&[u8]>, Some(value))?;
            if cas.is_ok() {
                return Ok(next);
            }
        }
    }

    /// Insert or replace a record.
    pub fn put(&self, key: &[u8], value: &[u8]) -> StoreResult<()> {
        self.tree.insert(key, value)?;
        Ok(())
    }

    /// Insert only when no record exists for the key; true when written.
    pub fn put_if_absent(&self, key: &[u8], value: &[u8]) -> StoreResult<bool> {
        let cas = self
            .tree
            .compare_and_swap(key, None as Option<&[u8]>, Some(value))?;
        Ok(cas.is_ok())
    }

    pub fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.tree.get(key)?.map(|value| value.to_vec()))
    }

    pub fn contains(&self, key: &[u8]) -> StoreResult<bool> {
        Ok(self.tree.contains_key(key)?)
    }

    /// Remove a record; true when one existed.
    pub fn remove(&self, key: &[u8]) -> StoreResult<bool> {
        Ok(self.tree.remove(key)?.is_some())
    }

    pub fn count(&self) -> u64 {
        self.tree.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// All records in key order.
    pub fn iter(&self) -> impl Iterator<Item = StoreResult<(Vec<u8>, Vec<u8>)>> {
        self.tree.iter().map(|entry| {
            entry
                .map(|(key, value)| (key.to_vec(), value.to_vec()))
                .map_err(StoreError::from)
        })
    }

    /// All keys in key order.
    pub fn keys(&self) -> impl Iterator<Item = StoreResult<Vec<u8>>> {
        self.tree
            .iter()
            .keys()
            .map(|key| key.map(|k| k.to_vec()).map_err(StoreError::from))
    }

    /// Records whose key starts with `prefix`, in key order.
    pub fn scan_prefix(&self, prefix: &[u8]) -> impl Iterator<Item = StoreResult<(Vec<u8>, Vec<u8>)>> {
        self.tree.scan_prefix(prefix).map(|entry| {
            entry
                .map(|(key, value)| (key.to_vec(), value.to_vec()))
                .map_err(StoreError::from)
        })
    }

    /// Apply a batch of writes atomically.
    pub fn apply_batch(&self, batch: sled::Batch) -> StoreResult<()> {
        self.tree.apply_batch(batch)?;
        Ok(())
    }
}

fn decode_auto_key(key: &[u8]) -> StoreResult<u64> {
    let bytes: [u8; 8] = key
        .try_into()
        .map_err(|_| StoreError::Database("malformed auto-increment key".into()))?;
    Ok(u64::from_be_bytes(bytes))
}
