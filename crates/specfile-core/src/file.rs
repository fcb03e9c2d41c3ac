//! Spec data file: the entry point tying index, registry, parser and cache

use crate::cache::ScanCache;
use crate::index::FileIndex;
use crate::parser;
use crate::registry::MotorRegistry;
use crate::scan::ScanRecord;
use crate::types::{ReaderConfig, Result, SpecError};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Emit a progress event at `info` when verbose, `debug` otherwise
macro_rules! progress {
    ($config:expr, $($arg:tt)+) => {
        if $config.verbose {
            info!($($arg)+);
        } else {
            debug!($($arg)+);
        }
    };
}

/// Scan counts of a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileSummary {
    pub scans: usize,
    pub first: Option<u32>,
    pub last: Option<u32>,
}

impl fmt::Display for FileSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Spec file contains {} scans.", self.scans)?;
        match (self.first, self.last) {
            (Some(first), Some(last)) => {
                writeln!(f, "Start scan = {}", first)?;
                writeln!(f, "End scan = {}", last)
            }
            _ => Ok(()),
        }
    }
}

/// A spec data file with random access to its scans
///
/// The file is opened only for the duration of each build or parse.
/// Not safe for concurrent use; mutating calls take `&mut self`.
#[derive(Debug)]
pub struct SpecDataFile {
    path: PathBuf,
    config: ReaderConfig,
    index: FileIndex,
    registry: Arc<MotorRegistry>,
    cache: ScanCache,
    index_builds: usize,
}

impl SpecDataFile {
    /// Open a file with default options
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::with_config(path, ReaderConfig::default())
    }

    /// Open a file, indexing its scans and reading its header
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn with_config<P: AsRef<Path>>(path: P, config: ReaderConfig) -> Result<Self> {
        let mut file = Self {
            path: path.as_ref().to_path_buf(),
            config,
            index: FileIndex::default(),
            registry: Arc::new(MotorRegistry::default()),
            cache: ScanCache::new(),
            index_builds: 0,
        };
        progress!(file.config, "Opening spec data file");
        file.load()?;
        Ok(file)
    }

    /// Index and registry are replaced together or not at all
    fn load(&mut self) -> Result<()> {
        let index = FileIndex::build(&self.path)?;
        let registry = MotorRegistry::build(&self.path)?;
        self.registry = Arc::new(registry);
        self.install_index(index);
        Ok(())
    }

    fn rebuild_index(&mut self) -> Result<()> {
        let index = FileIndex::build(&self.path)?;
        self.install_index(index);
        Ok(())
    }

    fn install_index(&mut self, index: FileIndex) {
        self.index = index;
        self.index_builds += 1;
        progress!(
            self.config,
            scans = self.index.len(),
            builds = self.index_builds,
            "Scan index built"
        );
    }

    /// Offset of scan `n`, re-indexing once if the file may have grown
    fn locate(&mut self, n: u32) -> Result<u64> {
        match self.index.lookup(n) {
            Ok(offset) => Ok(offset),
            Err(SpecError::ScanNotFound(_)) => {
                progress!(self.config, scan = n, "Scan not indexed, re-indexing");
                self.rebuild_index()?;
                self.index.lookup(n)
            }
            Err(e) => Err(e),
        }
    }

    /// Scan `n`, from the cache when already parsed
    pub fn get(&mut self, n: u32) -> Result<Arc<ScanRecord>> {
        self.get_with(n, false)
    }

    /// Scan `n`; with `force_reparse` the cached record is replaced
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn get_with(&mut self, n: u32, force_reparse: bool) -> Result<Arc<ScanRecord>> {
        if !force_reparse {
            if let Some(record) = self.cache.get(n) {
                debug!(scan = n, "Cache hit");
                return Ok(record);
            }
        }

        let offset = self.locate(n)?;
        progress!(self.config, scan = n, offset, "Reading scan");

        let record = parser::parse_scan(&self.path, offset, Arc::clone(&self.registry))?;
        progress!(
            self.config,
            scan = n,
            rows = record.data.rows(),
            cols = record.data.columns(),
            warnings = record.warnings.len(),
            "Scan parsed"
        );

        Ok(self.cache.store(n, record))
    }

    /// Drop every cached scan; the index is kept
    pub fn reset(&mut self) {
        let dropped = self.cache.len();
        self.cache.reset();
        progress!(self.config, dropped, "Scan cache reset");
    }

    /// Remove one scan from the cache
    pub fn evict(&mut self, n: u32) -> bool {
        self.cache.evict(n).is_some()
    }

    /// Re-index the file and re-read its header
    ///
    /// Cached scans are kept as they are and may now be stale; use
    /// [`SpecDataFile::get_with`] with `force_reparse` to refresh them.
    #[instrument(skip_all, fields(path = %self.path.display()))]
    pub fn reread(&mut self) -> Result<()> {
        progress!(self.config, "Reloading spec data file");
        self.load()
    }

    pub fn filename(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> ReaderConfig {
        self.config
    }

    pub fn registry(&self) -> &MotorRegistry {
        &self.registry
    }

    /// Full motor names declared in the file header
    pub fn motors(&self) -> &[String] {
        self.registry.motors()
    }

    pub fn index(&self) -> &FileIndex {
        &self.index
    }

    pub fn scan_numbers(&self) -> Vec<u32> {
        self.index.scan_numbers()
    }

    pub fn cached_scans(&self) -> Vec<u32> {
        self.cache.scan_numbers()
    }

    pub fn is_cached(&self, n: u32) -> bool {
        self.cache.contains(n)
    }

    /// Number of times the scan index has been built
    pub fn index_builds(&self) -> usize {
        self.index_builds
    }

    pub fn summary(&self) -> FileSummary {
        FileSummary {
            scans: self.index.len(),
            first: self.index.first_scan(),
            last: self.index.last_scan(),
        }
    }
}

impl fmt::Display for SpecDataFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.summary())
    }
}
