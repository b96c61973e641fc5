//! Membership filters for short-circuiting store lookups.
//!
//! A filter answers "could this key be present?" locally. A `false` answer is
//! definite and lets the accessor skip the store round trip entirely.

pub mod bloom;

pub use bloom::{BloomFilter, FilterStats};

use crate::config::FilterParams;

/// Filter trait for key membership checking
pub trait Filter {
    /// Check if a key may exist (can have false positives, never false negatives)
    fn may_contain(&self, key: &[u8]) -> bool;

    /// Add a key to the filter
    fn add(&mut self, key: &[u8]);

    /// Create an empty filter sized by the given parameters
    fn with_params(params: FilterParams) -> crate::Result<Self>
    where
        Self: Sized;
}
