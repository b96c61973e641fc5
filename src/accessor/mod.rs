//! Filter-gated access to a key-value client.
//!
//! Every operation works on a composite key, `prefix` immediately followed by
//! `key`. Read-path operations test the composite key against the bloom
//! filter first (when enabled) and fail with [`Error::FilteredMiss`] without
//! touching the store if the filter rules it out. [`GatedStore::set_value`]
//! adds the composite key to the filter only after the store accepted the
//! write, so the filter never claims absence for a stored key.
//!
//! Deletes do not remove keys from the filter; a deleted key stays "maybe
//! present" and is answered by the store.

mod stats;

pub use stats::GateStats;

use crate::config::AccessorSettings;
use crate::error::{Error, Result, StoreError};
use crate::filter::{BloomFilter, Filter, FilterStats};
use crate::store::{key_exists, scan_keys_matching, KvClient, Ttl};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use stats::GateCounters;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

#[cfg(feature = "redis")]
use crate::config::ResolvedClientConfig;
#[cfg(feature = "redis")]
use crate::store::RedisStore;

/// The seven filter-aware store operations.
///
/// [`Accessor`] is the production implementation; test doubles and hosts can
/// provide their own.
pub trait GatedStore {
    /// True if the key exists in the store.
    fn exists(&self, key: &str, prefix: &str) -> Result<bool>;

    /// Deletes the key, returning how many keys were removed. Never filtered.
    fn delete(&self, key: &str, prefix: &str) -> Result<u64>;

    /// Remaining lifetime of an existing key.
    fn time_to_live(&self, key: &str, prefix: &str) -> Result<Ttl>;

    /// Sets the expiry of an existing key.
    fn expire(&self, key: &str, prefix: &str, ttl: Duration) -> Result<bool>;

    /// Removes the expiry of a key.
    fn persist(&self, key: &str, prefix: &str) -> Result<bool>;

    /// Serializes and stores a value. A zero `ttl` stores without expiry.
    fn set_value<T>(&self, key: &str, prefix: &str, value: &T, ttl: Duration) -> Result<()>
    where
        T: Serialize + ?Sized;

    /// Loads and deserializes a value.
    fn get_value<T>(&self, key: &str, prefix: &str) -> Result<T>
    where
        T: DeserializeOwned;
}

/// Lifecycle of an accessor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessorState {
    /// Settings only; every operation fails with `ClientNotInitialized`.
    Unconfigured,
    /// Client installed and filter sized; operations are allowed.
    Initialized,
    /// A ping has succeeded since initialization.
    Ready,
}

/// Builds the composite key sent to both the filter and the store.
pub fn composite_key(prefix: &str, key: &str) -> String {
    let mut composite = String::with_capacity(prefix.len() + key.len());
    composite.push_str(prefix);
    composite.push_str(key);
    composite
}

struct Initialized<C> {
    client: C,
    filter: Option<RwLock<BloomFilter>>,
}

/// A named, optionally filter-gated handle to a key-value client.
///
/// # Thread Safety
///
/// `Accessor<C>` is `Send + Sync` whenever `C` is, and can be shared across
/// threads using `Arc<Accessor<C>>`. Filter tests take a read lock, filter
/// adds take the write lock.
///
/// # Example
///
/// ```
/// use bloomgate::{Accessor, AccessorSettings, GatedStore, MemoryStore};
/// use std::time::Duration;
///
/// # fn main() -> bloomgate::Result<()> {
/// let settings = AccessorSettings::new().name("users").use_filter(true);
/// let accessor = Accessor::with_client(settings, MemoryStore::new())?;
///
/// accessor.set_value("42", "user:", &"alice", Duration::from_secs(60))?;
/// let name: String = accessor.get_value("42", "user:")?;
/// assert_eq!(name, "alice");
///
/// // Never written: the filter answers without a store round trip.
/// assert!(accessor.exists("43", "user:").unwrap_err().is_filtered_miss());
/// # Ok(())
/// # }
/// ```
pub struct Accessor<C> {
    settings: AccessorSettings,
    inner: Option<Initialized<C>>,
    verified: AtomicBool,
    counters: GateCounters,
}

impl<C: KvClient> std::fmt::Debug for Accessor<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Accessor")
            .field("settings", &self.settings)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl<C: KvClient> Accessor<C> {
    /// Creates an unconfigured accessor.
    pub fn new(settings: AccessorSettings) -> Self {
        Self {
            settings,
            inner: None,
            verified: AtomicBool::new(false),
            counters: GateCounters::default(),
        }
    }

    /// Creates an accessor and initializes it with `client`.
    pub fn with_client(settings: AccessorSettings, client: C) -> Result<Self> {
        let mut accessor = Self::new(settings);
        accessor.initialize(client)?;
        Ok(accessor)
    }

    /// Installs the client and sizes a fresh filter if enabled.
    ///
    /// Calling this again replaces both the client and the filter.
    pub fn initialize(&mut self, client: C) -> Result<()> {
        self.settings.validate()?;

        let filter = if self.settings.use_filter {
            Some(RwLock::new(BloomFilter::with_params(self.settings.filter)?))
        } else {
            None
        };

        log::info!(
            "Initialized accessor {:?} (filter: {})",
            self.settings.name,
            if filter.is_some() { "enabled" } else { "disabled" }
        );

        self.inner = Some(Initialized { client, filter });
        self.verified.store(false, Ordering::Release);
        self.counters.reset();
        Ok(())
    }

    /// Round-trips to the store; on success the accessor is [`AccessorState::Ready`].
    pub fn ping(&self) -> Result<()> {
        let inner = self.initialized()?;
        inner.client.ping().map_err(|source| self.store_error(source))?;
        self.verified.store(true, Ordering::Release);
        log::debug!("Accessor {:?} is ready", self.settings.name);
        Ok(())
    }

    /// Current lifecycle state.
    pub fn state(&self) -> AccessorState {
        match (&self.inner, self.verified.load(Ordering::Acquire)) {
            (None, _) => AccessorState::Unconfigured,
            (Some(_), false) => AccessorState::Initialized,
            (Some(_), true) => AccessorState::Ready,
        }
    }

    /// The accessor name.
    pub fn name(&self) -> &str {
        &self.settings.name
    }

    /// The settings this accessor was built with.
    pub fn settings(&self) -> &AccessorSettings {
        &self.settings
    }

    /// True if read-path operations consult a filter.
    pub fn filter_enabled(&self) -> bool {
        self.settings.use_filter
    }

    /// The underlying client.
    pub fn client(&self) -> Result<&C> {
        Ok(&self.initialized()?.client)
    }

    /// Sizing and fill of the filter, `None` when disabled or uninitialized.
    pub fn filter_stats(&self) -> Option<FilterStats> {
        let filter = self.inner.as_ref()?.filter.as_ref()?;
        Some(filter.read().stats())
    }

    /// Gate counters since initialization.
    pub fn gate_stats(&self) -> GateStats {
        self.counters.snapshot()
    }

    /// Every store key matching a glob `pattern`, de-duplicated.
    ///
    /// Bypasses the filter; patterns are matched against full composite keys.
    pub fn scan_keys(&self, pattern: &str, page_size: usize) -> Result<Vec<String>> {
        let inner = self.initialized()?;
        scan_keys_matching(&inner.client, pattern, page_size)
            .map_err(|source| self.store_error(source))
    }

    fn initialized(&self) -> Result<&Initialized<C>> {
        self.inner
            .as_ref()
            .ok_or_else(|| Error::ClientNotInitialized {
                accessor: self.settings.name.clone(),
            })
    }

    /// Rejects empty keys and uninitialized accessors, then builds the composite key.
    fn prepare(&self, key: &str, prefix: &str) -> Result<(&Initialized<C>, String)> {
        if key.is_empty() {
            return Err(Error::KeyEmpty {
                accessor: self.settings.name.clone(),
            });
        }
        let inner = self.initialized()?;
        Ok((inner, composite_key(prefix, key)))
    }

    /// Fails with `FilteredMiss` when the filter rules the key out.
    fn check_filter(&self, inner: &Initialized<C>, composite: &str) -> Result<()> {
        let Some(filter) = &inner.filter else {
            return Ok(());
        };

        let passed = filter.read().may_contain(composite.as_bytes());
        self.counters.record_check(passed);
        if passed {
            Ok(())
        } else {
            Err(Error::FilteredMiss {
                accessor: self.settings.name.clone(),
                key: composite.to_string(),
            })
        }
    }

    /// Existence check that turns a zero count into `KeyNotFound`.
    fn require_exists(&self, inner: &Initialized<C>, composite: &str) -> Result<()> {
        let exists =
            key_exists(&inner.client, composite).map_err(|source| self.store_error(source))?;
        if exists {
            Ok(())
        } else {
            Err(self.not_found(composite))
        }
    }

    fn store_error(&self, source: StoreError) -> Error {
        Error::Store {
            accessor: self.settings.name.clone(),
            source,
        }
    }

    fn serialization_error(&self, source: serde_json::Error) -> Error {
        Error::Serialization {
            accessor: self.settings.name.clone(),
            source,
        }
    }

    fn not_found(&self, composite: &str) -> Error {
        Error::KeyNotFound {
            accessor: self.settings.name.clone(),
            key: composite.to_string(),
        }
    }

    fn value_empty(&self) -> Error {
        Error::ValueEmpty {
            accessor: self.settings.name.clone(),
        }
    }
}

#[cfg(feature = "redis")]
impl Accessor<RedisStore> {
    /// Builds a Redis client from resolved settings and initializes an accessor with it.
    ///
    /// The connection is dialed on first use; call [`Accessor::ping`] to verify it.
    pub fn connect(settings: AccessorSettings, config: &ResolvedClientConfig) -> Result<Self> {
        let client = RedisStore::connect(config)
            .map_err(|source| Error::Store {
                accessor: settings.name.clone(),
                source,
            })?;
        Self::with_client(settings, client)
    }
}

impl<C: KvClient> GatedStore for Accessor<C> {
    fn exists(&self, key: &str, prefix: &str) -> Result<bool> {
        let (inner, composite) = self.prepare(key, prefix)?;
        self.check_filter(inner, &composite)?;
        key_exists(&inner.client, &composite).map_err(|source| self.store_error(source))
    }

    fn delete(&self, key: &str, prefix: &str) -> Result<u64> {
        let (inner, composite) = self.prepare(key, prefix)?;
        inner.client.delete(&composite).map_err(|source| self.store_error(source))
    }

    fn time_to_live(&self, key: &str, prefix: &str) -> Result<Ttl> {
        let (inner, composite) = self.prepare(key, prefix)?;
        self.check_filter(inner, &composite)?;
        self.require_exists(inner, &composite)?;

        // The key can vanish between the two calls.
        inner
            .client
            .ttl(&composite)
            .map_err(|source| self.store_error(source))?
            .ok_or_else(|| self.not_found(&composite))
    }

    fn expire(&self, key: &str, prefix: &str, ttl: Duration) -> Result<bool> {
        let (inner, composite) = self.prepare(key, prefix)?;
        self.check_filter(inner, &composite)?;
        self.require_exists(inner, &composite)?;
        inner.client.expire(&composite, ttl).map_err(|source| self.store_error(source))
    }

    fn persist(&self, key: &str, prefix: &str) -> Result<bool> {
        let (inner, composite) = self.prepare(key, prefix)?;
        self.check_filter(inner, &composite)?;
        inner.client.persist(&composite).map_err(|source| self.store_error(source))
    }

    fn set_value<T>(&self, key: &str, prefix: &str, value: &T, ttl: Duration) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        if key.is_empty() {
            return Err(Error::KeyEmpty {
                accessor: self.settings.name.clone(),
            });
        }
        let encoded = serde_json::to_vec(value).map_err(|source| self.serialization_error(source))?;
        if encoded == b"null" {
            return Err(self.value_empty());
        }
        let (inner, composite) = self.prepare(key, prefix)?;

        let expiry = (!ttl.is_zero()).then_some(ttl);
        inner.client.set(&composite, &encoded, expiry).map_err(|source| self.store_error(source))?;

        // Only after the store accepted the write.
        if let Some(filter) = &inner.filter {
            filter.write().add(composite.as_bytes());
            self.counters.record_add();
        }
        Ok(())
    }

    fn get_value<T>(&self, key: &str, prefix: &str) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let (inner, composite) = self.prepare(key, prefix)?;
        self.check_filter(inner, &composite)?;

        let raw = inner.client.get(&composite).map_err(|source| self.store_error(source))?;
        match raw {
            Some(bytes) if !bytes.is_empty() => {
                serde_json::from_slice(&bytes).map_err(|source| self.serialization_error(source))
            }
            _ => Err(self.value_empty()),
        }
    }
}
