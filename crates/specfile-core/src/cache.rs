//! Parsed scan cache

use crate::scan::ScanRecord;
use std::collections::HashMap;
use std::sync::Arc;

/// Memoised scan records keyed by scan number
///
/// Records stay until evicted, replaced, or the whole cache is reset.
#[derive(Debug, Default)]
pub struct ScanCache {
    records: HashMap<u32, Arc<ScanRecord>>,
}

impl ScanCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, n: u32) -> Option<Arc<ScanRecord>> {
        self.records.get(&n).cloned()
    }

    /// Insert a record, replacing any earlier one for the same scan
    pub fn store(&mut self, n: u32, record: ScanRecord) -> Arc<ScanRecord> {
        let record = Arc::new(record);
        self.records.insert(n, Arc::clone(&record));
        record
    }

    pub fn evict(&mut self, n: u32) -> Option<Arc<ScanRecord>> {
        self.records.remove(&n)
    }

    pub fn reset(&mut self) {
        self.records.clear();
    }

    #[inline]
    pub fn contains(&self, n: u32) -> bool {
        self.records.contains_key(&n)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Cached scan numbers in ascending order
    pub fn scan_numbers(&self) -> Vec<u32> {
        let mut numbers: Vec<u32> = self.records.keys().copied().collect();
        numbers.sort_unstable();
        numbers
    }
}
