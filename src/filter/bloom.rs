//! Bloom Filter implementation.
//!
//! A space-efficient probabilistic data structure used to test whether an element
//! is a member of a set. False positive matches are possible, but false negatives are not.
//!
//! Sizing follows the (k, n, m) convention used by [`FilterParams`]: `k` hash
//! functions, `n` expected elements and a multiplier `m`, giving an array of
//! `k * n * m` bits. Every expected element therefore owns `k * m` bits, and
//! raising either knob lowers the false positive rate.

use crate::config::FilterParams;
use crate::error::{Error, Result};
use crate::filter::Filter;
use std::hash::Hasher;

/// Upper bound on the number of hash functions
pub const MAX_HASHES: usize = 64;

/// Upper bound on the bit array size (2 GiB of bits)
pub const MAX_BITS: usize = 1 << 34;

/// BloomFilter provides probabilistic set membership testing.
///
/// # Example
/// ```
/// use bloomgate::config::FilterParams;
/// use bloomgate::filter::{BloomFilter, Filter};
///
/// let mut filter = BloomFilter::with_params(FilterParams::new(7, 1000, 2)).unwrap();
/// filter.add(b"user:1");
/// filter.add(b"user:2");
///
/// assert!(filter.may_contain(b"user:1"));
/// assert!(filter.may_contain(b"user:2"));
/// // user:3 might return true (false positive) or false
/// ```
#[derive(Debug, Clone)]
pub struct BloomFilter {
    /// Bit array for the bloom filter
    bits: Vec<u8>,
    /// Number of hash functions to use
    num_hashes: u32,
    /// Number of bits in the filter
    num_bits: usize,
    /// Expected number of elements the filter was sized for
    expected_elements: usize,
    /// Number of add calls so far
    insertions: u64,
}

/// Point-in-time view of a filter's sizing and fill.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterStats {
    /// Number of bits in the array.
    pub num_bits: usize,
    /// Number of hash functions.
    pub num_hashes: u32,
    /// Array size in bytes.
    pub size_bytes: usize,
    /// Expected element count the filter was sized for.
    pub expected_elements: usize,
    /// Number of add calls so far, duplicates included.
    pub insertions: u64,
    /// Fraction of bits currently set.
    pub fill_ratio: f64,
    /// Theoretical false positive rate at the current insertion count.
    pub estimated_false_positive_rate: f64,
}

impl BloomFilter {
    /// Create a BloomFilter with specific bits and hash count.
    fn with_bits_and_hashes(num_bits: usize, num_hashes: u32, expected_elements: usize) -> Self {
        let num_bytes = num_bits.div_ceil(8);

        Self {
            bits: vec![0u8; num_bytes],
            num_hashes,
            num_bits,
            expected_elements,
            insertions: 0,
        }
    }

    /// Validate (k, n, m) and compute the bit array size.
    pub(crate) fn num_bits_for(params: &FilterParams) -> Result<usize> {
        let FilterParams { k, n, m } = *params;
        if k == 0 || n == 0 || m == 0 {
            return Err(Error::invalid_argument(format!(
                "bloom filter parameters must be > 0 (k={}, n={}, m={})",
                k, n, m
            )));
        }
        if k > MAX_HASHES {
            return Err(Error::invalid_argument(format!(
                "bloom filter hash count {} exceeds {}",
                k, MAX_HASHES
            )));
        }

        match k.checked_mul(n).and_then(|bits| bits.checked_mul(m)) {
            Some(bits) if bits <= MAX_BITS => Ok(bits),
            _ => Err(Error::invalid_argument(format!(
                "bloom filter of k*n*m bits (k={}, n={}, m={}) exceeds {} bits",
                k, n, m, MAX_BITS
            ))),
        }
    }

    /// Generate the bit positions for a key using double hashing.
    ///
    /// hash_i = hash1 + i * hash2 (mod num_bits)
    fn hash_values(&self, key: &[u8]) -> impl Iterator<Item = usize> {
        let hash1 = hash_with_seed(key, 0xbc9f1d34);
        let hash2 = hash_with_seed(key, 0xd0e89c7b);
        let num_bits = self.num_bits as u64;

        (0..self.num_hashes as u64)
            .map(move |i| (hash1.wrapping_add(i.wrapping_mul(hash2)) % num_bits) as usize)
    }

    fn set_bit(&mut self, pos: usize) {
        self.bits[pos / 8] |= 1 << (pos % 8);
    }

    fn is_bit_set(&self, pos: usize) -> bool {
        (self.bits[pos / 8] & (1 << (pos % 8))) != 0
    }

    /// Get the size of the filter in bytes.
    pub fn size(&self) -> usize {
        self.bits.len()
    }

    /// Get the number of hash functions used.
    pub fn num_hashes(&self) -> u32 {
        self.num_hashes
    }

    /// Get the number of bits in the filter.
    pub fn num_bits(&self) -> usize {
        self.num_bits
    }

    /// Number of add calls so far, duplicates included.
    pub fn insertions(&self) -> u64 {
        self.insertions
    }

    /// Fraction of bits currently set, in `[0, 1]`.
    ///
    /// Monotonically non-decreasing over the filter's lifetime.
    pub fn fill_ratio(&self) -> f64 {
        let set: u64 = self.bits.iter().map(|b| u64::from(b.count_ones())).sum();
        set as f64 / self.num_bits as f64
    }

    /// Calculate the approximate false positive rate after `num_keys` distinct inserts.
    ///
    /// p = (1 - e^(-kn/m))^k
    /// where k = num_hashes, n = num_keys, m = num_bits
    pub fn estimated_false_positive_rate(&self, num_keys: usize) -> f64 {
        if num_keys == 0 {
            return 0.0;
        }

        let k = self.num_hashes as f64;
        let n = num_keys as f64;
        let m = self.num_bits as f64;

        let exp = (-k * n / m).exp();
        (1.0 - exp).powf(k)
    }

    /// Snapshot of sizing and fill.
    pub fn stats(&self) -> FilterStats {
        FilterStats {
            num_bits: self.num_bits,
            num_hashes: self.num_hashes,
            size_bytes: self.size(),
            expected_elements: self.expected_elements,
            insertions: self.insertions,
            fill_ratio: self.fill_ratio(),
            estimated_false_positive_rate: self
                .estimated_false_positive_rate(self.insertions.min(usize::MAX as u64) as usize),
        }
    }
}

impl Filter for BloomFilter {
    /// Returns `true` if the key might exist (with possible false positives).
    /// Returns `false` if the key definitely does not exist (no false negatives).
    fn may_contain(&self, key: &[u8]) -> bool {
        self.hash_values(key).all(|pos| self.is_bit_set(pos))
    }

    fn add(&mut self, key: &[u8]) {
        for pos in self.hash_values(key) {
            self.set_bit(pos);
        }
        self.insertions += 1;
    }

    fn with_params(params: FilterParams) -> Result<Self> {
        let num_bits = Self::num_bits_for(&params)?;
        let filter = Self::with_bits_and_hashes(num_bits, params.k as u32, params.n);

        log::debug!(
            "Sized bloom filter: {} bits ({} bytes), {} hashes, {} expected keys",
            filter.num_bits,
            filter.size(),
            filter.num_hashes,
            params.n
        );

        Ok(filter)
    }
}

/// Hash with a specific seed using FNV-1a.
fn hash_with_seed(key: &[u8], seed: u32) -> u64 {
    let mut hasher = FnvHasher::new_with_seed(seed);
    hasher.write(key);
    hasher.finish()
}

/// Simple FNV-1a hasher for Bloom Filter
struct FnvHasher {
    state: u64,
}

impl FnvHasher {
    const FNV_OFFSET_BASIS: u64 = 0xcbf29ce484222325;
    const FNV_PRIME: u64 = 0x100000001b3;

    fn new_with_seed(seed: u32) -> Self {
        Self {
            state: Self::FNV_OFFSET_BASIS ^ (seed as u64),
        }
    }
}

impl Hasher for FnvHasher {
    fn finish(&self) -> u64 {
        self.state
    }

    fn write(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.state ^= byte as u64;
            self.state = self.state.wrapping_mul(Self::FNV_PRIME);
        }
    }
}
