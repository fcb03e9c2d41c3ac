//! Parsed scan records and label-keyed access to their data

use crate::registry::MotorRegistry;
use crate::types::{
    ParseWarning, Result, SpecError, MESH_FIRST_MOTOR_TOKEN, MESH_KEYWORD,
    MESH_SECOND_MOTOR_TOKEN, SCAN_MOTOR_TOKEN,
};
use chrono::NaiveDateTime;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

// ============================================================================
// Header
// ============================================================================

/// Information from the control lines of one scan
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanHeader {
    pub scan_no: u32,
    /// Scan type token, e.g. `ascan` or `mesh`
    pub scan_type: String,
    /// Scan command from the type token onwards
    pub scan_cmd: String,
    /// Column labels in file order
    pub labels: Vec<String>,
    /// Text of the `#D` line
    pub date: String,
    pub timestamp: Option<NaiveDateTime>,
    /// Comment text without the `#C` tag, trimmed, one line per `#C` line
    pub comments: String,
    /// Header lines exactly as they appear in the file
    pub text: String,
}

// ============================================================================
// Data matrix
// ============================================================================

/// Numeric body of a scan, stored column by column
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataMatrix {
    rows: usize,
    columns: Vec<Vec<f64>>,
}

impl DataMatrix {
    /// Build from rows that are already known to share one width
    pub(crate) fn from_rows(rows: Vec<Vec<f64>>) -> Self {
        let width = rows.first().map(Vec::len).unwrap_or(0);
        let mut columns = vec![Vec::with_capacity(rows.len()); width];
        for row in &rows {
            for (column, &value) in columns.iter_mut().zip(row) {
                column.push(value);
            }
        }
        Self {
            rows: rows.len(),
            columns,
        }
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn columns(&self) -> usize {
        self.columns.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    pub fn column(&self, index: usize) -> Option<&[f64]> {
        self.columns.get(index).map(Vec::as_slice)
    }

    pub fn row(&self, index: usize) -> Option<Vec<f64>> {
        if index >= self.rows {
            return None;
        }
        Some(self.columns.iter().map(|c| c[index]).collect())
    }

    /// Values in row-major order, `rows * columns` long
    pub fn to_row_major(&self) -> Vec<f64> {
        let mut values = Vec::with_capacity(self.rows * self.columns.len());
        for i in 0..self.rows {
            values.extend(self.columns.iter().map(|c| c[i]));
        }
        values
    }
}

// ============================================================================
// Column access
// ============================================================================

/// Data bound to a label
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ColumnData<'a> {
    /// A measured column, one value per data row
    Vector(&'a [f64]),
    /// A motor position recorded once in the header
    Scalar(f64),
}

impl<'a> ColumnData<'a> {
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Vector(v) => v.len(),
            ColumnData::Scalar(_) => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_vector(&self) -> Option<&'a [f64]> {
        match self {
            ColumnData::Vector(v) => Some(*v),
            ColumnData::Scalar(_) => None,
        }
    }

    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            ColumnData::Scalar(v) => Some(*v),
            ColumnData::Vector(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Binding {
    Column(usize),
    Scalar(f64),
}

/// How a caller picks the independent axis columns
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AxisSelector {
    ByIndex(usize),
    ByLabel(String),
    ByPair(usize, usize),
}

/// Independent axis columns of a scan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanAxes {
    pub x: usize,
    /// Second axis, present for two-axis scans
    pub x2: Option<usize>,
}

// ============================================================================
// Scan record
// ============================================================================

/// One fully parsed scan
#[derive(Debug, Clone)]
pub struct ScanRecord {
    pub header: ScanHeader,
    pub data: DataMatrix,
    /// Motor name to header position
    pub(crate) motors: Vec<(String, f64)>,
    pub(crate) bindings: HashMap<String, Binding>,
    pub warnings: Vec<ParseWarning>,
    pub(crate) registry: Arc<MotorRegistry>,
}

impl ScanRecord {
    #[inline]
    pub fn scan_no(&self) -> u32 {
        self.header.scan_no
    }

    #[inline]
    pub fn labels(&self) -> &[String] {
        &self.header.labels
    }

    /// Registry snapshot this scan was parsed against
    pub fn registry(&self) -> &MotorRegistry {
        &self.registry
    }

    pub fn motormap(&self) -> &HashMap<String, String> {
        self.registry.mnemonics()
    }

    /// Data bound to `label`, either a data column or a motor position
    pub fn get(&self, label: &str) -> Option<ColumnData<'_>> {
        match self.bindings.get(label)? {
            Binding::Column(i) => self.data.column(*i).map(ColumnData::Vector),
            Binding::Scalar(v) => Some(ColumnData::Scalar(*v)),
        }
    }

    pub fn column(&self, label: &str) -> Option<&[f64]> {
        self.get(label).and_then(|c| c.as_vector())
    }

    /// Header position of motor `name`
    pub fn scalar(&self, name: &str) -> Option<f64> {
        self.motors
            .iter()
            .find(|(motor, _)| motor == name)
            .map(|(_, v)| *v)
    }

    pub fn label_index(&self, label: &str) -> Option<usize> {
        self.header.labels.iter().position(|l| l == label)
    }

    /// Motors recorded once in the header, in registry order
    pub fn scalar_names(&self) -> Vec<&str> {
        self.motors
            .iter()
            .map(|(name, _)| name.as_str())
            .filter(|name| matches!(self.bindings.get(*name), Some(Binding::Scalar(_))))
            .collect()
    }

    /// Labels bound to data columns, in column order
    pub fn vector_names(&self) -> Vec<&str> {
        self.header
            .labels
            .iter()
            .map(String::as_str)
            .filter(|l| matches!(self.bindings.get(*l), Some(Binding::Column(_))))
            .collect()
    }

    pub fn is_mesh(&self) -> bool {
        self.header.scan_type.trim() == MESH_KEYWORD
    }

    /// Columns driven by the scan command
    ///
    /// Mesh scans name two motors, every other scan one. Mnemonics resolve
    /// through the registry to full names, which must be column labels.
    pub fn independent_axes(&self) -> Result<ScanAxes> {
        let tokens: Vec<&str> = self.header.scan_cmd.split_whitespace().collect();

        if self.is_mesh() {
            let x = self.axis_for_token(&tokens, MESH_FIRST_MOTOR_TOKEN)?;
            let x2 = self.axis_for_token(&tokens, MESH_SECOND_MOTOR_TOKEN)?;
            Ok(ScanAxes { x, x2: Some(x2) })
        } else {
            let x = self.axis_for_token(&tokens, SCAN_MOTOR_TOKEN)?;
            Ok(ScanAxes { x, x2: None })
        }
    }

    fn axis_for_token(&self, tokens: &[&str], position: usize) -> Result<usize> {
        let scan = self.scan_no();
        let mnemonic = tokens.get(position).ok_or_else(|| SpecError::TruncatedScanCommand {
            scan,
            command: self.header.scan_cmd.clone(),
            position,
        })?;
        let name = self.registry.resolve(scan, mnemonic)?;
        self.label_index(name).ok_or_else(|| SpecError::UnknownLabel {
            scan,
            label: name.to_string(),
        })
    }

    /// Resolve a caller's axis choice to column indices
    pub fn resolve_axes(&self, selector: &AxisSelector) -> Result<ScanAxes> {
        match selector {
            AxisSelector::ByIndex(x) => Ok(ScanAxes {
                x: self.check_column(*x)?,
                x2: None,
            }),
            AxisSelector::ByLabel(label) => {
                let x = self.label_index(label).ok_or_else(|| SpecError::UnknownLabel {
                    scan: self.scan_no(),
                    label: label.clone(),
                })?;
                Ok(ScanAxes { x, x2: None })
            }
            AxisSelector::ByPair(x, x2) => Ok(ScanAxes {
                x: self.check_column(*x)?,
                x2: Some(self.check_column(*x2)?),
            }),
        }
    }

    fn check_column(&self, index: usize) -> Result<usize> {
        let columns = self.header.labels.len();
        if index < columns {
            Ok(index)
        } else {
            Err(SpecError::ColumnOutOfRange {
                scan: self.scan_no(),
                index,
                columns,
            })
        }
    }
}

impl fmt::Display for ScanRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const PER_LINE: usize = 4;

        writeln!(f, "Scan {}: {}", self.header.scan_no, self.header.scan_cmd)?;
        writeln!(f, "Data: {} rows x {} cols", self.data.rows(), self.data.columns())?;
        for (title, names) in [
            ("Motors", self.scalar_names()),
            ("Scan Variables", self.vector_names()),
        ] {
            writeln!(f, "{}:", title)?;
            for chunk in names.chunks(PER_LINE) {
                write!(f, "    ")?;
                for name in chunk {
                    write!(f, "{:19}", name)?;
                }
                writeln!(f)?;
            }
        }
        Ok(())
    }
}
