// chain-store/src/config.rs

use std::path::Path;

/// Page size assumed when translating `cache_size` (pages) into the
/// database's byte-based cache capacity.
const PAGE_SIZE: usize = 4096;

/// Interval between background flushes when `flush` is enabled.
const FLUSH_INTERVAL_MS: u64 = 500;

/// Storage engine configuration
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Prefer durability of the write log over throughput
    pub journal: bool,
    /// Maximum number of cached pages
    pub cache_size: usize,
    /// Flush writes to disk eagerly instead of relying on the OS cache
    pub flush: bool,
    /// Reject all mutating operations
    pub read_only: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            journal: true,
            cache_size: 50_000,
            flush: true,
            read_only: false,
        }
    }
}

impl StoreConfig {
    /// Translate into database open options.
    ///
    /// sled's write-ahead log is unconditionally on; `journal` selects the
    /// space-conservative log mode, `flush` the periodic fsync.
    pub(crate) fn db_config(&self, path: &Path) -> sled::Config {
        sled::Config::new()
            .path(path)
            .cache_capacity((self.cache_size * PAGE_SIZE) as u64)
            .flush_every_ms(if self.flush { Some(FLUSH_INTERVAL_MS) } else { None })
            .mode(if self.journal {
                sled::Mode::LowSpace
            } else {
                sled::Mode::HighThroughput
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = StoreConfig::default();
        assert!(config.journal);
        assert_eq!(config.cache_size, 50_000);
        assert!(config.flush);
        assert!(!config.read_only);
    }
}
