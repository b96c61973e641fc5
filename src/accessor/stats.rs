//! Counters for measuring how much work the filter saves.

use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time copy of an accessor's gate counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GateStats {
    /// Read-path operations that consulted the filter
    pub filter_checks: u64,
    /// Checks answered "definitely absent" without a store call
    pub filtered_misses: u64,
    /// Keys added to the filter after successful writes
    pub filter_adds: u64,
}

impl GateStats {
    /// Fraction of filter checks that avoided a store call (0.0 to 1.0)
    pub fn short_circuit_rate(&self) -> f64 {
        if self.filter_checks == 0 {
            0.0
        } else {
            self.filtered_misses as f64 / self.filter_checks as f64
        }
    }
}

/// Lock-free counters shared by all callers of one accessor.
#[derive(Debug, Default)]
pub(crate) struct GateCounters {
    filter_checks: AtomicU64,
    filtered_misses: AtomicU64,
    filter_adds: AtomicU64,
}

impl GateCounters {
    pub(crate) fn record_check(&self, passed: bool) {
        self.filter_checks.fetch_add(1, Ordering::Relaxed);
        if !passed {
            self.filtered_misses.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_add(&self) {
        self.filter_adds.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> GateStats {
        GateStats {
            filter_checks: self.filter_checks.load(Ordering::Relaxed),
            filtered_misses: self.filtered_misses.load(Ordering::Relaxed),
            filter_adds: self.filter_adds.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn reset(&self) {
        self.filter_checks.store(0, Ordering::Relaxed);
        self.filtered_misses.store(0, Ordering::Relaxed);
        self.filter_adds.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_circuit_rate() {
        let counters = GateCounters::default();
        assert_eq!(counters.snapshot().short_circuit_rate(), 0.0);

        counters.record_check(true);
        counters.record_check(false);
        counters.record_check(false);
        counters.record_check(true);

        let stats = counters.snapshot();
        assert_eq!(stats.filter_checks, 4);
        assert_eq!(stats.filtered_misses, 2);
        assert_eq!(stats.short_circuit_rate(), 0.5);

        counters.reset();
        assert_eq!(counters.snapshot(), GateStats::default());
    }
}
