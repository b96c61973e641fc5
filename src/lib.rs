//! # bloomgate - Bloom-filter gated key-value access
//!
//! bloomgate sits in front of a key-value store and answers "definitely not
//! there" locally, without a network round trip, for keys it has never seen
//! written.
//!
//! ## Architecture
//!
//! - **Filter**: fixed-size bloom filter sized by `(k, n, m)`; no false negatives
//! - **Accessor**: named handle that gates read-path store calls on the filter
//!   and feeds successful writes into it
//! - **Store**: the [`KvClient`] contract, an in-memory implementation and a
//!   Redis implementation (feature `redis`)
//! - **Config**: accessor settings plus named client configs loaded from TOML
//!   with `CACHE_REDIS_<NAME>_<FIELD>` environment overrides
//!
//! ## Example Usage
//!
//! ```rust
//! use bloomgate::{Accessor, AccessorSettings, GatedStore, MemoryStore};
//! use std::time::Duration;
//!
//! # fn main() -> Result<(), bloomgate::Error> {
//! let settings = AccessorSettings::new().name("sessions").use_filter(true);
//! let sessions = Accessor::with_client(settings, MemoryStore::new())?;
//!
//! // Writes go to the store first, then into the filter
//! sessions.set_value("abc", "session:", &vec![1, 2, 3], Duration::from_secs(300))?;
//!
//! // Reads consult the filter before the store
//! let ids: Vec<u32> = sessions.get_value("abc", "session:")?;
//! assert_eq!(ids, vec![1, 2, 3]);
//!
//! // A key never written is rejected locally
//! let err = sessions.exists("zzz", "session:").unwrap_err();
//! assert!(err.is_filtered_miss());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

// Module declarations
pub mod accessor;
pub mod config;
pub mod error;
pub mod filter;
pub mod store;

// Re-exports
pub use accessor::{composite_key, Accessor, AccessorState, GateStats, GatedStore};
pub use config::{
    AccessorSettings, ClientConfig, ClientConfigList, FilterParams, ResolvedClientConfig,
};
pub use error::{Error, Result, StoreError};
pub use store::{scan_keys_matching, KvClient, MemoryStore, ScanPage, Ttl};

#[cfg(feature = "redis")]
pub use store::RedisStore;
