// Property tests: filter soundness and scan de-duplication over arbitrary inputs.

use bloomgate::config::FilterParams;
use bloomgate::filter::{BloomFilter, Filter};
use bloomgate::store::StoreResult;
use bloomgate::{
    scan_keys_matching, Accessor, AccessorSettings, GatedStore, KvClient, MemoryStore, ScanPage,
    Ttl,
};
use proptest::prelude::*;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Serves pre-built pages in order, ending with cursor 0.
struct PagedKeys {
    pages: Vec<Vec<String>>,
    next: AtomicUsize,
}

impl KvClient for PagedKeys {
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
    fn scan(&self, _cursor: u64, _pattern: &str, _page_size: usize) -> StoreResult<ScanPage> {
        let index = self.next.fetch_add(1, Ordering::SeqCst);
        let keys = self.pages.get(index).cloned().unwrap_or_default();
        let cursor = if index + 1 >= self.pages.len() { 0 } else { index as u64 + 1 };
        Ok(ScanPage { cursor, keys })
    }
    fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_filter_has_no_false_negatives(
        keys in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..32), 1..300),
        k in 1usize..12,
        m in 1usize..4,
    ) {
        let mut filter = BloomFilter::with_params(FilterParams::new(k, 64, m)).unwrap();
        for key in &keys {
            filter.add(key);
        }
        for key in &keys {
            prop_assert!(filter.may_contain(key));
        }
    }

    #[test]
    fn prop_written_keys_always_exist(
        keys in prop::collection::btree_set("[a-z0-9]{1,12}", 1..100),
        prefix in "[a-z]{0,4}:?",
    ) {
        let settings = AccessorSettings::new()
            .use_filter(true)
            .filter_params(FilterParams::new(4, 16, 1));
        let accessor = Accessor::with_client(settings, MemoryStore::new()).unwrap();

        for key in &keys {
            accessor.set_value(key, &prefix, key, Duration::ZERO).unwrap();
        }
        for key in &keys {
            prop_assert!(accessor.exists(key, &prefix).unwrap());
            let value: String = accessor.get_value(key, &prefix).unwrap();
            prop_assert_eq!(&value, key);
        }
    }

    #[test]
    fn prop_scan_returns_union_without_duplicates(
        pages in prop::collection::vec(prop::collection::vec("[a-f]{1,2}", 0..8), 1..6),
    ) {
        let expected: BTreeSet<String> = pages.iter().flatten().cloned().collect();
        let store = PagedKeys { pages, next: AtomicUsize::new(0) };

        let keys = scan_keys_matching(&store, "*", 4).unwrap();
        let unique: BTreeSet<String> = keys.iter().cloned().collect();

        prop_assert_eq!(keys.len(), unique.len());
        prop_assert_eq!(unique, expected);
    }
}
