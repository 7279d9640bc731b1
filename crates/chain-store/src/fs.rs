// chain-store/src/fs.rs

use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::{Path, PathBuf};

/// A directory listing entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub is_dir: bool,
}

/// Capability set the transaction store needs from a filesystem.
///
/// Two variants share the store code: the OS filesystem for on-disk
/// engines and an in-memory tree for ephemeral engines.
pub trait FileSystem: Send + Sync {
    fn exists(&self, path: &Path) -> bool;

    /// Read a whole file; `NotFound` when it does not exist.
    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// Create or replace a file. The parent directory must exist.
    fn write(&self, path: &Path, bytes: &[u8]) -> io::Result<()>;

    /// Rename a file, replacing any file at the destination.
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;

    /// Remove a file; `Ok(false)` when it did not exist.
    fn remove(&self, path: &Path) -> io::Result<bool>;

    fn create_dir_all(&self, path: &Path) -> io::Result<()>;

    /// List a directory; empty when the directory does not exist.
    fn list_dir(&self, path: &Path) -> io::Result<Vec<DirEntry>>;

    fn file_size(&self, path: &Path) -> io::Result<u64>;
}

/// Pass-through to the operating system filesystem
pub struct OsFileSystem;

impl FileSystem for OsFileSystem {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        std::fs::read(path)
    }

    fn write(&self, path: &Path, bytes: &[u8]) -> io::Result<()> {
        std::fs::write(path, bytes)
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        std::fs::rename(from, to)
    }

    fn remove(&self, path: &Path) -> io::Result<bool> {
        match std::fs::remove_file(path) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err),
        }
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        std::fs::create_dir_all(path)
    }

    fn list_dir(&self, path: &Path) -> io::Result<Vec<DirEntry>> {
        if !path.is_dir() {
            return Ok(Vec::new());
        }
        let mut entries = Vec::new();
        for entry in std::fs::read_dir(path)? {
            let entry = entry?;
            let name = match entry.file_name().into_string() {
                Ok(name) => name,
                Err(_) => continue,
            };
            entries.push(DirEntry {
                name,
                is_dir: entry.file_type()?.is_dir(),
            });
        }
        Ok(entries)
    }

    fn file_size(&self, path: &Path) -> io::Result<u64> {
        Ok(std::fs::metadata(path)?.len())
    }
}

/// In-memory directory tree
#[derive(Default)]
pub struct MemoryFileSystem {
    inner: RwLock<MemoryTree>,
}

#[derive(Default)]
struct MemoryTree {
    files: BTreeMap<PathBuf, Vec<u8>>,
    dirs: BTreeSet<PathBuf>,
}

impl MemoryFileSystem {
    pub fn new() -> Self {
        Self::default()
    }
}

fn not_found(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotFound,
        format!("no such file or directory: {}", path.display()),
    )
}

fn parent_exists(tree: &MemoryTree, path: &Path) -> bool {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => tree.dirs.contains(parent),
        _ => true,
    }
}

impl FileSystem for MemoryFileSystem {
    fn exists(&self, path: &Path) -> bool {
        let tree = self.inner.read();
        tree.files.contains_key(path) || tree.dirs.contains(path)
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        self.inner
            .read()
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| not_found(path))
    }

    fn write(&self, path: &Path, bytes: &[u8]) -> io::Result<()> {
        let mut tree = self.inner.write();
        if !parent_exists(&tree, path) {
            return Err(not_found(path));
        }
        tree.files.insert(path.to_path_buf(), bytes.to_vec());
        Ok(())
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        let mut tree = self.inner.write();
        if !parent_exists(&tree, to) {
            return Err(not_found(to));
        }
        let bytes = tree.files.remove(from).ok_or_else(|| not_found(from))?;
        tree.files.insert(to.to_path_buf(), bytes);
        Ok(())
    }

    fn remove(&self, path: &Path) -> io::Result<bool> {
        Ok(self.inner.write().files.remove(path).is_some())
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        let mut tree = self.inner.write();
        for ancestor in path.ancestors() {
            if !ancestor.as_os_str().is_empty() {
                tree.dirs.insert(ancestor.to_path_buf());
            }
        }
        Ok(())
    }

    fn list_dir(&self, path: &Path) -> io::Result<Vec<DirEntry>> {
        let tree = self.inner.read();
        let mut entries = Vec::new();
        for dir in &tree.dirs {
            if dir.parent() == Some(path) {
                if let Some(name) = dir.file_name() {
                    entries.push(DirEntry {
                        name: name.to_string_lossy().into_owned(),
                        is_dir: true,
                    });
                }
            }
        }
        for file in tree.files.keys() {
            if file.parent() == Some(path) {
                if let Some(name) = file.file_name() {
                    entries.push(DirEntry {
                        name: name.to_string_lossy().into_owned(),
                        is_dir: false,
                    });
                }
            }
        }
        Ok(entries)
    }

    fn file_size(&self, path: &Path) -> io::Result<u64> {
        self.inner
            .read()
            .files
            .get(path)
            .map(|bytes| bytes.len() as u64)
            .ok_or_else(|| not_found(path))
    }
}
