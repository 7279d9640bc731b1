// chain-store/src/txstore.rs

use crate::fs::{DirEntry, FileSystem};
use crate::{StoreError, StoreResult};
use chain_primitives::TxId;
use rand::Rng;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::vec::IntoIter;

/// Length of a shard directory name (leading hex chars of the tx id)
const SHARD_LEN: usize = 2;
/// Length of a transaction file name (remaining hex chars of the tx id)
const NAME_LEN: usize = 62;

/// Filesystem-backed transaction store.
///
/// Each transaction is one file at `<root>/<first-2-hex>/<remaining-hex>`;
/// the two-character shard bounds any single directory's fan-out.
pub struct TxStore {
    fs: Arc<dyn FileSystem>,
    root: PathBuf,
}

impl TxStore {
    pub fn new(fs: Arc<dyn FileSystem>, root: PathBuf) -> StoreResult<Self> {
        fs.create_dir_all(&root)?;
        Ok(Self { fs, root })
    }

    fn paths(&self, id: &TxId) -> (PathBuf, PathBuf) {
        let hex = id.to_hex();
        let shard = self.root.join(&hex[..SHARD_LEN]);
        let path = shard.join(&hex[SHARD_LEN..]);
        (shard, path)
    }

    /// Write serialized transaction bytes, atomically via
    /// temp-file-and-rename. Re-puts are no-ops: content for a given id is
    /// immutable.
    pub fn put(&self, id: &TxId, bytes: &[u8]) -> StoreResult<()> {
        let (shard, path) = self.paths(id);
        if self.fs.exists(&path) {
            return Ok(());
        }
        self.fs.create_dir_all(&shard)?;

        let tmp = shard.join(format!(".{:016x}.tmp", rand::thread_rng().gen::<u64>()));
        let result = match self.fs.write(&tmp, bytes) {
            Ok(()) => match self.fs.rename(&tmp, &path) {
                Ok(()) => Ok(()),
                Err(err) => {
                    // A concurrent writer may have committed the same
                    // content first; an identical size at the destination
                    // means done.
                    match self.fs.file_size(&path) {
                        Ok(size) if size == bytes.len() as u64 => Ok(()),
                        _ => Err(StoreError::Io(err)),
                    }
                }
            },
            Err(err) => Err(StoreError::Io(err)),
        };
        if self.fs.exists(&tmp) {
            let _ = self.fs.remove(&tmp);
        }
        result
    }

    /// Read serialized transaction bytes; None when absent.
    pub fn get(&self, id: &TxId) -> StoreResult<Option<Vec<u8>>> {
        let (_, path) = self.paths(id);
        match self.fs.read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Remove a transaction; true when a file existed.
    pub fn delete(&self, id: &TxId) -> StoreResult<bool> {
        let (_, path) = self.paths(id);
        Ok(self.fs.remove(&path)?)
    }

    /// Lazily walk the shard tree, yielding every stored transaction id.
    pub fn iter(&self) -> TxIdIter {
        TxIdIter {
            fs: self.fs.clone(),
            root: self.root.clone(),
            shards: None,
            current: None,
            failed: false,
        }
    }

    /// Count stored transactions by scanning the shard tree.
    pub fn count(&self) -> StoreResult<u64> {
        let mut count = 0;
        for id in self.iter() {
            id?;
            count += 1;
        }
        Ok(count)
    }
}

/// Lazy iterator over stored transaction ids.
///
/// Entries whose shard name is not exactly 2 hex chars, whose file name is
/// not exactly 62 hex chars, or whose concatenation does not parse as an
/// id are silently skipped.
pub struct TxIdIter {
    fs: Arc<dyn FileSystem>,
    root: PathBuf,
    shards: Option<IntoIter<DirEntry>>,
    current: Option<(String, IntoIter<DirEntry>)>,
    failed: bool,
}

fn is_hex_name(name: &str, len: usize) -> bool {
    name.len() == len && name.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

impl Iterator for TxIdIter {
    type Item = StoreResult<TxId>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        if self.shards.is_none() {
            match self.fs.list_dir(&self.root) {
                Ok(mut entries) => {
                    entries.retain(|entry| entry.is_dir && is_hex_name(&entry.name, SHARD_LEN));
                    self.shards = Some(entries.into_iter());
                }
                Err(err) => {
                    self.failed = true;
                    return Some(Err(err.into()));
                }
            }
        }
        loop {
            if let Some((shard, files)) = &mut self.current {
                while let Some(file) = files.next() {
                    if file.is_dir || !is_hex_name(&file.name, NAME_LEN) {
                        continue;
                    }
                    if let Ok(id) = TxId::from_hex(&format!("{}{}", shard, file.name)) {
                        return Some(Ok(id));
                    }
                }
            }
            self.current = None;
            let shard = self.shards.as_mut()?.next()?;
            match self.fs.list_dir(&self.root.join(&shard.name)) {
                Ok(files) => self.current = Some((shard.name, files.into_iter())),
                Err(err) => {
                    self.failed = true;
                    return Some(Err(err.into()));
                }
            }
        }
    }
}
