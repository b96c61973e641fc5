// Shared test doubles for the integration tests.

#![allow(dead_code)]

use bloomgate::store::StoreResult;
use bloomgate::{KvClient, MemoryStore, ScanPage, StoreError, Ttl};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Wraps a `MemoryStore`, counting every call per operation and optionally
/// failing writes.
#[derive(Default)]
pub struct RecordingStore {
    inner: MemoryStore,
    calls: Mutex<HashMap<&'static str, usize>>,
    keys: Mutex<Vec<(&'static str, String)>>,
    fail_writes: AtomicBool,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent `set` fail until turned off again.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Calls made for one operation.
    pub fn calls(&self, op: &str) -> usize {
        self.calls.lock().get(op).copied().unwrap_or(0)
    }

    /// Calls made across all operations.
    pub fn total_calls(&self) -> usize {
        self.calls.lock().values().sum()
    }

    /// Keys passed to one operation, in call order.
    pub fn keys_for(&self, op: &str) -> Vec<String> {
        self.keys
            .lock()
            .iter()
            .filter(|(name, _)| *name == op)
            .map(|(_, key)| key.clone())
            .collect()
    }

    pub fn reset_calls(&self) {
        self.calls.lock().clear();
        self.keys.lock().clear();
    }

    /// Direct access to the backing store, bypassing the counters.
    pub fn backing(&self) -> &MemoryStore {
        &self.inner
    }

    fn record(&self, op: &'static str, key: &str) {
        *self.calls.lock().entry(op).or_insert(0) += 1;
        self.keys.lock().push((op, key.to_string()));
    }
}

impl KvClient for RecordingStore {
    fn exists(&self, key: &str) -> StoreResult<u64> {
        self.record("exists", key);
        self.inner.exists(key)
    }

    fn delete(&self, key: &str) -> StoreResult<u64> {
        self.record("delete", key);
        self.inner.delete(key)
    }

    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        self.record("get", key);
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> StoreResult<()> {
        self.record("set", key);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::msg("injected write failure"));
        }
        self.inner.set(key, value, ttl)
    }

    fn ttl(&self, key: &str) -> StoreResult<Option<Ttl>> {
        self.record("ttl", key);
        self.inner.ttl(key)
    }

    fn expire(&self, key: &str, ttl: Duration) -> StoreResult<bool> {
        self.record("expire", key);
        self.inner.expire(key, ttl)
    }

    fn persist(&self, key: &str) -> StoreResult<bool> {
        self.record("persist", key);
        self.inner.persist(key)
    }

    fn scan(&self, cursor: u64, pattern: &str, page_size: usize) -> StoreResult<ScanPage> {
        self.record("scan", pattern);
        self.inner.scan(cursor, pattern, page_size)
    }

    fn ping(&self) -> StoreResult<()> {
        self.record("ping", "");
        self.inner.ping()
    }
}

/// Installs a test logger once per test binary.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
