//! Key-value client contract.
//!
//! The accessor never talks to a server directly. It drives a [`KvClient`],
//! which may be the in-process [`MemoryStore`], the Redis-backed
//! `RedisStore` (feature `redis`), or any host-provided implementation.

pub mod memory;
#[cfg(feature = "redis")]
pub mod redis;

pub use memory::MemoryStore;
#[cfg(feature = "redis")]
pub use self::redis::RedisStore;

use crate::error::StoreError;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

/// Result type returned by key-value clients.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Remaining lifetime of an existing key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ttl {
    /// The key expires after the given duration.
    Expires(Duration),
    /// The key has no expiry.
    Persistent,
}

impl Ttl {
    /// The remaining duration, `None` for persistent keys.
    pub fn remaining(&self) -> Option<Duration> {
        match self {
            Ttl::Expires(remaining) => Some(*remaining),
            Ttl::Persistent => None,
        }
    }
}

/// One page of a key enumeration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanPage {
    /// Cursor for the next call; 0 means the enumeration is complete.
    pub cursor: u64,
    /// Keys matched in this page. May repeat keys from earlier pages.
    pub keys: Vec<String>,
}

/// Operations a key-value store must offer to sit behind an accessor.
///
/// Implementations must be safe to call from several threads at once.
pub trait KvClient: Send + Sync {
    /// Number of the given keys that exist (0 or 1 for a single key).
    fn exists(&self, key: &str) -> StoreResult<u64>;

    /// Removes a key, returning how many keys were removed.
    fn delete(&self, key: &str) -> StoreResult<u64>;

    /// Raw value of a key, `None` if absent.
    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Stores a value, with an expiry when `ttl` is `Some`.
    fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> StoreResult<()>;

    /// Remaining lifetime of a key, `None` if the key does not exist.
    fn ttl(&self, key: &str) -> StoreResult<Option<Ttl>>;

    /// Sets an expiry. Returns false if the key does not exist.
    fn expire(&self, key: &str, ttl: Duration) -> StoreResult<bool>;

    /// Removes an expiry. Returns false if the key does not exist or had none.
    fn persist(&self, key: &str) -> StoreResult<bool>;

    /// One page of keys matching a glob `pattern`, starting at `cursor`.
    ///
    /// `page_size` is a hint. Start with cursor 0 and stop when the returned
    /// cursor is 0 again.
    fn scan(&self, cursor: u64, pattern: &str, page_size: usize) -> StoreResult<ScanPage>;

    /// Round-trip health check.
    fn ping(&self) -> StoreResult<()>;
}

impl<C: KvClient + ?Sized> KvClient for Arc<C> {
    fn exists(&self, key: &str) -> StoreResult<u64> {
        (**self).exists(key)
    }

    fn delete(&self, key: &str) -> StoreResult<u64> {
        (**self).delete(key)
    }

    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> StoreResult<()> {
        (**self).set(key, value, ttl)
    }

    fn ttl(&self, key: &str) -> StoreResult<Option<Ttl>> {
        (**self).ttl(key)
    }

    fn expire(&self, key: &str, ttl: Duration) -> StoreResult<bool> {
        (**self).expire(key, ttl)
    }

    fn persist(&self, key: &str) -> StoreResult<bool> {
        (**self).persist(key)
    }

    fn scan(&self, cursor: u64, pattern: &str, page_size: usize) -> StoreResult<ScanPage> {
        (**self).scan(cursor, pattern, page_size)
    }

    fn ping(&self) -> StoreResult<()> {
        (**self).ping()
    }
}

/// True if the key exists in the store.
pub fn key_exists<C: KvClient + ?Sized>(client: &C, key: &str) -> StoreResult<bool> {
    Ok(client.exists(key)? > 0)
}

/// Enumerates every key matching `pattern`, scanning until the cursor returns to 0.
///
/// Pages can overlap when the key space changes during the scan, so keys are
/// de-duplicated. The result keeps first-seen order.
pub fn scan_keys_matching<C: KvClient + ?Sized>(
    client: &C,
    pattern: &str,
    page_size: usize,
) -> StoreResult<Vec<String>> {
    let mut seen = HashSet::new();
    let mut keys = Vec::new();
    let mut cursor = 0u64;
    let mut pages = 0usize;

    loop {
        let page = client.scan(cursor, pattern, page_size)?;
        pages += 1;
        for key in page.keys {
            if seen.insert(key.clone()) {
                keys.push(key);
            }
        }
        if page.cursor == 0 {
            break;
        }
        cursor = page.cursor;
    }

    log::debug!("Scanned {} keys matching {:?} in {} pages", keys.len(), pattern, pages);
    Ok(keys)
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    /// Serves a fixed sequence of pages and records the cursors it was asked for.
    struct PagedStore {
        pages: Vec<ScanPage>,
        cursors: Mutex<Vec<u64>>,
    }

    impl PagedStore {
        fn new(pages: Vec<(u64, Vec<&str>)>) -> Self {
            let pages = pages
                .into_iter()
                .map(|(cursor, keys)| ScanPage {
                    cursor,
                    keys: keys.iter().map(|k| k.to_string()).collect(),
                })
                .collect();
            Self { pages, cursors: Mutex::new(Vec::new()) }
        }
    }

    impl KvClient for PagedStore {
        fn exists(&self, _key: &str) -> StoreResult<u64> {
            Ok(0)
        }
        fn delete(&self, _key: &str) -> StoreResult<u64> {
            Ok(0)
        }
        fn get(&self, _key: &str) -> StoreResult<Option<Vec<u8>>> {
            Ok(None)
        }
        fn set(&self, _key: &str, _value: &[u8], _ttl: Option<Duration>) -> StoreResult<()> {
            Ok(())
        }
        fn ttl(&self, _key: &str) -> StoreResult<Option<Ttl>> {
            Ok(None)
        }
        fn expire(&self, _key: &str, _ttl: Duration) -> StoreResult<bool> {
            Ok(false)
        }
        fn persist(&self, _key: &str) -> StoreResult<bool> {
            Ok(false)
        }
        fn scan(&self, cursor: u64, _pattern: &str, _page_size: usize) -> StoreResult<ScanPage> {
            let mut cursors = self.cursors.lock();
            let index = cursors.len();
            cursors.push(cursor);
            self.pages.get(index).cloned().ok_or_else(|| StoreError::msg("scan past last page"))
        }
        fn ping(&self) -> StoreResult<()> {
            Ok(())
        }
    }

    #[test]
    fn test_scan_deduplicates_overlapping_pages() {
        let store = PagedStore::new(vec![(7, vec!["a", "b", "c"]), (0, vec!["b", "c", "d"])]);

        let mut keys = scan_keys_matching(&store, "*", 10).unwrap();
        keys.sort();

        assert_eq!(keys, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_scan_follows_cursor() {
        let store = PagedStore::new(vec![(3, vec!["a"]), (9, vec![]), (0, vec!["b"])]);

        let keys = scan_keys_matching(&store, "*", 1).unwrap();

        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(*store.cursors.lock(), vec![0, 3, 9]);
    }

    #[test]
    fn test_scan_single_empty_page() {
        let store = PagedStore::new(vec![(0, vec![])]);
        assert!(scan_keys_matching(&store, "none:*", 10).unwrap().is_empty());
    }

    #[test]
    fn test_scan_propagates_errors() {
        let store = PagedStore::new(vec![(5, vec!["a"])]);
        assert!(scan_keys_matching(&store, "*", 10).is_err());
    }

    #[test]
    fn test_ttl_remaining() {
        assert_eq!(Ttl::Expires(Duration::from_secs(3)).remaining(), Some(Duration::from_secs(3)));
        assert_eq!(Ttl::Persistent.remaining(), None);
    }
}
