//! # Spec File Reader - Core Library
//!
//! Random access to the scans of ASCII spec instrument-log files.
//!
//! A spec file is an append-only sequence of scans. Each scan has a block of
//! control lines (`#S`, `#D`, `#P`, `#C`, `#L`, ...) followed by whitespace
//! separated numeric rows. This crate indexes the scans by byte offset, reads
//! the motor declarations from the file preamble, and parses scans on demand
//! into typed records with label-keyed column access.
//!
//! ## Features
//!
//! - One-pass scan index over a memory-mapped file
//! - Lazy, cached scan parsing with explicit invalidation
//! - Motor positions bound to the names declared in the file header
//! - Axis resolution for one- and two-axis (mesh) scans
//! - Structured logging via `tracing` for diagnostics
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use specfile_core::SpecDataFile;
//!
//! let mut file = SpecDataFile::open("LNSCO").unwrap();
//! print!("{}", file);
//!
//! let scan = file.get(298).unwrap();
//! println!("Command: {}", scan.header.scan_cmd);
//!
//! // Access by label
//! if let Some(counts) = scan.column("ChT_REIXS") {
//!     println!("{} points", counts.len());
//! }
//!
//! // Independent axes resolved through the motor mnemonics
//! let axes = scan.independent_axes().unwrap();
//! println!("x = {}", scan.labels()[axes.x]);
//! ```
//!
//! ## Cache Control
//!
//! ```rust,no_run
//! use specfile_core::SpecDataFile;
//!
//! let mut file = SpecDataFile::open("LNSCO").unwrap();
//! let first = file.get(11).unwrap();
//!
//! // Pick up changes to the file: re-index, then re-parse the scan
//! file.reread().unwrap();
//! let fresh = file.get_with(11, true).unwrap();
//!
//! // Forget every parsed scan
//! file.reset();
//! ```
//!
//! ## Enabling Logging
//!
//! This library uses `tracing` for structured logging. To see log output,
//! initialize a tracing subscriber in your application:
//!
//! ```rust,ignore
//! tracing_subscriber::fmt::init();
//!
//! let config = specfile_core::ReaderConfig::new().verbose(true);
//! let file = specfile_core::SpecDataFile::with_config("LNSCO", config).unwrap();
//! ```

mod cache;
mod file;
mod index;
mod lines;
mod parser;
mod registry;
mod scan;
mod types;

// Re-export public types
pub use types::{
    // Configuration
    ReaderConfig,
    // Error types
    ParseWarning,
    Result,
    SpecError,
    // Constants
    DATE_FORMAT,
    MESH_KEYWORD,
};

pub use cache::ScanCache;
pub use file::{FileSummary, SpecDataFile};
pub use index::FileIndex;
pub use registry::MotorRegistry;
pub use scan::{AxisSelector, ColumnData, DataMatrix, ScanAxes, ScanHeader, ScanRecord};

// ============================================================================
// Public API Functions
// ============================================================================

/// Open a spec data file.
///
/// # Arguments
/// * `filename` - Path to the spec data file
///
/// # Returns
/// * `Ok(SpecDataFile)` - File with its scans indexed and header read
/// * `Err(SpecError)` - If the file cannot be read
pub fn open<P: AsRef<std::path::Path>>(filename: P) -> Result<SpecDataFile> {
    SpecDataFile::open(filename)
}

/// Parse the scan starting at `offset` of `path` without caching it.
///
/// Useful with offsets from a [`FileIndex`] built separately.
pub fn read_scan<P: AsRef<std::path::Path>>(
    path: P,
    offset: u64,
    registry: &MotorRegistry,
) -> Result<ScanRecord> {
    parser::parse_scan(path, offset, std::sync::Arc::new(registry.clone()))
}
