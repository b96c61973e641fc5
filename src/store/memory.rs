//! In-process key-value store.
//!
//! Keeps entries in a sorted map behind a mutex and expires them lazily: an
//! entry past its deadline is dropped the next time any call touches it.
//! Useful for tests and for hosts that want filter gating without a server.
//!
//! Scan cursors name the last key of the page they end, so a scan resumes
//! after that key even if earlier keys were deleted in the meantime.

use super::{KvClient, ScanPage, StoreResult, Ttl};
use crate::error::StoreError;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Default number of keys returned per scan page when the hint is 0.
const DEFAULT_PAGE_SIZE: usize = 10;

#[derive(Debug, Clone)]
struct Entry {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|deadline| deadline <= now)
    }
}

/// Thread-safe in-memory [`KvClient`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, Entry>>,
    /// Open scan cursors mapped to the last key they returned.
    cursors: Mutex<HashMap<u64, String>>,
    next_cursor: AtomicU64,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries.lock().values().filter(|entry| !entry.is_expired(now)).count()
    }

    /// True if the store holds no live keys.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Runs `f` on the live entry for `key`, dropping it first if expired.
    fn with_live<T>(&self, key: &str, f: impl FnOnce(Option<&mut Entry>) -> T) -> T {
        let mut entries = self.entries.lock();
        if entries.get(key).is_some_and(|entry| entry.is_expired(Instant::now())) {
            entries.remove(key);
        }
        f(entries.get_mut(key))
    }
}

impl KvClient for MemoryStore {
    fn exists(&self, key: &str) -> StoreResult<u64> {
        Ok(self.with_live(key, |entry| u64::from(entry.is_some())))
    }

    fn delete(&self, key: &str) -> StoreResult<u64> {
        let mut entries = self.entries.lock();
        let removed = entries.remove(key);
        Ok(u64::from(removed.is_some_and(|entry| !entry.is_expired(Instant::now()))))
    }

    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.with_live(key, |entry| entry.map(|entry| entry.value.clone())))
    }

    fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> StoreResult<()> {
        let entry = Entry {
            value: value.to_vec(),
            expires_at: ttl.filter(|ttl| !ttl.is_zero()).map(|ttl| Instant::now() + ttl),
        };
        self.entries.lock().insert(key.to_string(), entry);
        Ok(())
    }

    fn ttl(&self, key: &str) -> StoreResult<Option<Ttl>> {
        Ok(self.with_live(key, |entry| {
            entry.map(|entry| match entry.expires_at {
                Some(deadline) => Ttl::Expires(deadline.saturating_duration_since(Instant::now())),
                None => Ttl::Persistent,
            })
        }))
    }

    fn expire(&self, key: &str, ttl: Duration) -> StoreResult<bool> {
        Ok(self.with_live(key, |entry| match entry {
            Some(entry) => {
                entry.expires_at = Some(Instant::now() + ttl);
                true
            }
            None => false,
        }))
    }

    fn persist(&self, key: &str) -> StoreResult<bool> {
        Ok(self.with_live(key, |entry| match entry {
            Some(entry) => entry.expires_at.take().is_some(),
            None => false,
        }))
    }

    /// A non-zero cursor resumes after the last key of the page that issued
    /// it. Each cursor can be used once.
    fn scan(&self, cursor: u64, pattern: &str, page_size: usize) -> StoreResult<ScanPage> {
        let matcher = glob::Pattern::new(pattern)
            .map_err(|e| StoreError::msg(format!("invalid scan pattern {:?}: {}", pattern, e)))?;
        let page_size = if page_size == 0 {
            DEFAULT_PAGE_SIZE
        } else {
            page_size
        };

        let after = match cursor {
            0 => None,
            cursor => Some(
                self.cursors
                    .lock()
                    .remove(&cursor)
                    .ok_or_else(|| StoreError::msg(format!("unknown scan cursor {}", cursor)))?,
            ),
        };

        let now = Instant::now();
        let mut entries = self.entries.lock();
        entries.retain(|_, entry| !entry.is_expired(now));

        let lower = match &after {
            Some(last) => Bound::Excluded(last.as_str()),
            None => Bound::Unbounded,
        };
        let scanned: Vec<&String> = entries
            .range::<str, _>((lower, Bound::Unbounded))
            .take(page_size)
            .map(|(key, _)| key)
            .collect();

        let keys = scanned
            .iter()
            .filter(|key| matcher.matches(key))
            .map(|key| key.to_string())
            .collect();

        let cursor = match scanned.last() {
            Some(last)
                if entries
                    .range::<str, _>((Bound::Excluded(last.as_str()), Bound::Unbounded))
                    .next()
                    .is_some() =>
            {
                let id = self.next_cursor.fetch_add(1, Ordering::Relaxed) + 1;
                self.cursors.lock().insert(id, last.to_string());
                id
            }
            _ => 0,
        };

        Ok(ScanPage { cursor, keys })
    }

    fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}
