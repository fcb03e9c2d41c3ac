//! Scan number to byte offset index

use crate::lines::{LineCursor, MappedFile};
use crate::types::{Result, SpecError, SCAN_START_TAG};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, instrument, warn};

/// Maps scan numbers to the offset of their `#S` line
#[derive(Debug, Clone, Default)]
pub struct FileIndex {
    offsets: HashMap<u32, u64>,
}

impl FileIndex {
    /// Index a file with one linear pass
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn build<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mapped = MappedFile::open(path.as_ref())?;
        let index = Self::from_bytes(mapped.bytes());
        debug!(scans = index.len(), bytes = mapped.len(), "Index built");
        Ok(index)
    }

    /// Index an in-memory copy of a file
    pub fn from_bytes(data: &[u8]) -> Self {
        let mut offsets = HashMap::new();

        for line in LineCursor::new(data).filter(|l| l.starts_with(SCAN_START_TAG)) {
            let text = line.text();
            let number = text.split_whitespace().nth(1).and_then(|t| t.parse::<u32>().ok());

            match number {
                Some(n) => {
                    if let Some(previous) = offsets.insert(n, line.offset) {
                        warn!(
                            scan = n,
                            previous,
                            offset = line.offset,
                            "Repeated scan number, later scan replaces earlier one"
                        );
                    }
                }
                None => warn!(line = line.number, "Scan-start line without a scan number"),
            }
        }

        Self { offsets }
    }

    /// Offset of scan `n`
    pub fn lookup(&self, n: u32) -> Result<u64> {
        self.offsets
            .get(&n)
            .copied()
            .ok_or(SpecError::ScanNotFound(n))
    }

    #[inline]
    pub fn contains(&self, n: u32) -> bool {
        self.offsets.contains_key(&n)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    pub fn first_scan(&self) -> Option<u32> {
        self.offsets.keys().min().copied()
    }

    pub fn last_scan(&self) -> Option<u32> {
        self.offsets.keys().max().copied()
    }

    /// All indexed scan numbers in ascending order
    pub fn scan_numbers(&self) -> Vec<u32> {
        let mut numbers: Vec<u32> = self.offsets.keys().copied().collect();
        numbers.sort_unstable();
        numbers
    }
}
