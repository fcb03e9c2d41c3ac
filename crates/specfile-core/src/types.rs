//! Common types, errors, and constants for spec file operations

use thiserror::Error;

// ============================================================================
// Constants
// ============================================================================

/// Scan-start marker. The trailing space keeps `#SCAN`-style lines out.
pub const SCAN_START_TAG: &[u8] = b"#S ";
/// Prefix that ends the file preamble and the header of the previous scan
pub const SCAN_TAG: &[u8] = b"#S";
pub const DATE_TAG: &[u8] = b"#D";
pub const MNEMONIC_TAG: &[u8] = b"#o";
pub const MOTOR_NAME_TAG: &[u8] = b"#O";
pub const POSITION_TAG: &[u8] = b"#P";
pub const COMMENT_TAG: &[u8] = b"#C";
pub const LABEL_TAG: &[u8] = b"#L";
/// Leading character of every control line
pub const CONTROL_CHAR: u8 = b'#';

/// Scan type keyword for two-axis scans
pub const MESH_KEYWORD: &str = "mesh";

/// Token positions of the driven motors inside a mesh command
/// (`mesh m1 start end intervals m2 start end intervals time`)
pub const MESH_FIRST_MOTOR_TOKEN: usize = 1;
pub const MESH_SECOND_MOTOR_TOKEN: usize = 5;
/// Token position of the driven motor for one-axis scans
pub const SCAN_MOTOR_TOKEN: usize = 1;

/// Layout of `#D` lines, e.g. `Sat Jan 14 12:34:56 2017`
pub const DATE_FORMAT: &str = "%a %b %d %H:%M:%S %Y";

// ============================================================================
// Configuration
// ============================================================================

/// Reader options passed at construction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReaderConfig {
    /// Emit per-scan progress events at `info` rather than `debug`
    pub verbose: bool,
}

impl ReaderConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// Error type for spec file operations
#[derive(Debug, Error)]
pub enum SpecError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Scan {0} is not in the file")]
    ScanNotFound(u32),

    #[error("Scan {scan}: {labels} labels but {columns} data columns")]
    ColumnMismatch {
        scan: u32,
        labels: usize,
        columns: usize,
    },

    #[error("Scan {scan}: non-numeric token '{token}' on line {line}")]
    MalformedDataLine { scan: u32, line: usize, token: String },

    #[error("Scan {scan}: motor mnemonic '{mnemonic}' is not registered in the file header")]
    MissingRegistryEntry { scan: u32, mnemonic: String },

    #[error("Scan {scan}: command '{command}' has no token at position {position}")]
    TruncatedScanCommand {
        scan: u32,
        command: String,
        position: usize,
    },

    #[error("Invalid scan header at offset {offset}: {reason}")]
    MalformedScanHeader { offset: u64, reason: String },

    #[error("Scan {scan}: no column labelled '{label}'")]
    UnknownLabel { scan: u32, label: String },

    #[error("Scan {scan}: column {index} out of range ({columns} columns)")]
    ColumnOutOfRange {
        scan: u32,
        index: usize,
        columns: usize,
    },
}

pub type Result<T> = std::result::Result<T, SpecError>;

// ============================================================================
// Warnings
// ============================================================================

/// Non-fatal conditions found while parsing a scan
#[derive(Debug, Clone, PartialEq)]
pub enum ParseWarning {
    /// A `#P` token had no registered motor name and was dropped unparsed
    MotorOverflow { index: usize, value: String },
    /// The `#D` line could not be parsed as a timestamp
    InvalidDate(String),
}

impl std::fmt::Display for ParseWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseWarning::MotorOverflow { index, value } => write!(
                f,
                "motor position {} ('{}') has no registered motor name",
                index, value
            ),
            ParseWarning::InvalidDate(s) => write!(f, "unparseable date '{}'", s),
        }
    }
}
