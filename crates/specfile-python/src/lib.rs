//! Python bindings for the spec file reader
//!
//! This crate provides PyO3 bindings to expose specfile-core to Python
//! plotting code.

use numpy::ndarray::{Array1, Array2};
use numpy::IntoPyArray;
use pyo3::exceptions::{PyIOError, PyKeyError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::PyFloat;
use specfile_core::{ColumnData, ReaderConfig, ScanRecord, SpecDataFile, SpecError};
use std::collections::HashMap;
use std::sync::{Arc, Once};

/// Token positions of the interval counts in `mesh m1 s e n1 m2 s e n2 t`
const MESH_FIRST_INTERVALS_TOKEN: usize = 4;
const MESH_SECOND_INTERVALS_TOKEN: usize = 8;

// ============================================================================
// Error Conversion
// ============================================================================

fn to_py_err(e: SpecError) -> PyErr {
    match e {
        SpecError::Io(io) => PyIOError::new_err(io.to_string()),
        SpecError::ScanNotFound(_) => PyKeyError::new_err(e.to_string()),
        other => PyValueError::new_err(other.to_string()),
    }
}

// ============================================================================
// Python Classes
// ============================================================================

/// Python wrapper for a parsed scan
#[pyclass(name = "SpecScan", frozen)]
pub struct PySpecScan {
    record: Arc<ScanRecord>,
    filename: String,
}

#[pymethods]
impl PySpecScan {
    #[getter]
    fn scan_no(&self) -> u32 {
        self.record.header.scan_no
    }

    #[getter]
    fn scan_type(&self) -> String {
        self.record.header.scan_type.clone()
    }

    #[getter]
    fn scan_cmd(&self) -> String {
        self.record.header.scan_cmd.clone()
    }

    #[getter]
    fn labels(&self) -> Vec<String> {
        self.record.header.labels.clone()
    }

    #[getter]
    fn date(&self) -> String {
        self.record.header.date.clone()
    }

    #[getter]
    fn comments(&self) -> String {
        self.record.header.comments.clone()
    }

    /// Header text as it appears in the file
    #[getter]
    fn text(&self) -> String {
        self.record.header.text.clone()
    }

    #[getter]
    fn filename(&self) -> String {
        self.filename.clone()
    }

    #[getter]
    fn motormap(&self) -> HashMap<String, String> {
        self.record.motormap().clone()
    }

    #[getter]
    fn warnings(&self) -> Vec<String> {
        self.record.warnings.iter().map(|w| w.to_string()).collect()
    }

    /// Raw data as a 2-D array (rows x columns)
    #[getter]
    fn raw(&self, py: Python) -> PyResult<Py<PyAny>> {
        let data = &self.record.data;
        let array = Array2::from_shape_vec((data.rows(), data.columns()), data.to_row_major())
            .map_err(|e| PyValueError::new_err(e.to_string()))?;
        Ok(array.into_pyarray(py).into_any().unbind())
    }

    /// Get a column (array) or motor position (float) by label
    fn get(&self, py: Python, label: &str) -> PyResult<Option<Py<PyAny>>> {
        let value = match self.record.get(label) {
            Some(ColumnData::Vector(v)) => Some(
                Array1::from_vec(v.to_vec())
                    .into_pyarray(py)
                    .into_any()
                    .unbind(),
            ),
            Some(ColumnData::Scalar(v)) => Some(PyFloat::new(py, v).into_any().unbind()),
            None => None,
        };
        Ok(value)
    }

    fn is_mesh(&self) -> bool {
        self.record.is_mesh()
    }

    /// Column indices of the independent axes as (x, x2 or None)
    fn axes(&self) -> PyResult<(usize, Option<usize>)> {
        let axes = self.record.independent_axes().map_err(to_py_err)?;
        Ok((axes.x, axes.x2))
    }

    /// Grid interval counts of a mesh scan
    fn mesh_dims(&self) -> PyResult<(usize, usize)> {
        if !self.record.is_mesh() {
            return Err(PyValueError::new_err(format!(
                "Scan {} is not a mesh scan",
                self.record.scan_no()
            )));
        }
        let tokens: Vec<&str> = self.record.header.scan_cmd.split_whitespace().collect();
        let interval = |position: usize| -> PyResult<usize> {
            tokens
                .get(position)
                .and_then(|t| t.parse().ok())
                .ok_or_else(|| {
                    PyValueError::new_err(format!(
                        "Mesh command has no interval count at token {}",
                        position
                    ))
                })
        };
        Ok((
            interval(MESH_FIRST_INTERVALS_TOKEN)?,
            interval(MESH_SECOND_INTERVALS_TOKEN)?,
        ))
    }

    fn __len__(&self) -> usize {
        self.record.data.rows()
    }

    fn __str__(&self) -> String {
        format!("Datafile: {}\n{}", self.filename, self.record)
    }

    fn __repr__(&self) -> String {
        format!(
            "SpecScan(scan_no={}, cmd='{}', rows={}, cols={})",
            self.record.scan_no(),
            self.record.header.scan_cmd,
            self.record.data.rows(),
            self.record.data.columns()
        )
    }
}

/// Python wrapper for SpecDataFile
#[pyclass(name = "SpecDataFile", unsendable)]
pub struct PySpecDataFile {
    inner: SpecDataFile,
}

#[pymethods]
impl PySpecDataFile {
    #[new]
    #[pyo3(signature = (filename, verbose=false))]
    fn new(filename: &str, verbose: bool) -> PyResult<Self> {
        let config = ReaderConfig::new().verbose(verbose);
        let inner = SpecDataFile::with_config(filename, config).map_err(to_py_err)?;
        Ok(Self { inner })
    }

    /// Get a scan; `reread=True` parses it again even when cached
    #[pyo3(signature = (scan_no, reread=false))]
    fn get(&mut self, scan_no: u32, reread: bool) -> PyResult<PySpecScan> {
        let record = self.inner.get_with(scan_no, reread).map_err(to_py_err)?;
        Ok(PySpecScan {
            record,
            filename: self.inner.filename().display().to_string(),
        })
    }

    fn __getitem__(&mut self, scan_no: u32) -> PyResult<PySpecScan> {
        self.get(scan_no, false)
    }

    /// Forget every parsed scan
    fn reset(&mut self) {
        self.inner.reset();
    }

    /// Re-index the file; cached scans are not refreshed
    fn reread(&mut self) -> PyResult<()> {
        self.inner.reread().map_err(to_py_err)
    }

    fn scan_numbers(&self) -> Vec<u32> {
        self.inner.scan_numbers()
    }

    #[getter]
    fn filename(&self) -> String {
        self.inner.filename().display().to_string()
    }

    #[getter]
    fn motors(&self) -> Vec<String> {
        self.inner.motors().to_vec()
    }

    #[getter]
    fn motormap(&self) -> HashMap<String, String> {
        self.inner.registry().mnemonics().clone()
    }

    fn __len__(&self) -> usize {
        self.inner.summary().scans
    }

    fn __contains__(&self, scan_no: u32) -> bool {
        self.inner.index().contains(scan_no)
    }

    fn __str__(&self) -> String {
        self.inner.to_string()
    }

    fn __repr__(&self) -> String {
        format!(
            "SpecDataFile(filename='{}', scans={})",
            self.inner.filename().display(),
            self.inner.summary().scans
        )
    }
}

// ============================================================================
// Python Functions
// ============================================================================

static LOGGING: Once = Once::new();

/// Route library logs to stderr
///
/// Only the first call installs a subscriber; later calls keep its filter.
///
/// Args:
///     level: Filter directive, e.g. "info" or "specfile_core=debug"
#[pyfunction]
#[pyo3(signature = (level="info"))]
pub fn init_logging(level: &str) -> PyResult<()> {
    let filter = tracing_subscriber::EnvFilter::try_new(level)
        .map_err(|e| PyValueError::new_err(e.to_string()))?;
    let mut installed = false;
    LOGGING.call_once(|| {
        installed = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init()
            .is_ok();
    });
    if installed {
        tracing::debug!(level, "Logging initialised");
    } else {
        tracing::debug!(level, "Subscriber already installed, filter unchanged");
    }
    Ok(())
}

/// Open a spec data file
#[pyfunction]
#[pyo3(signature = (filename, verbose=false))]
pub fn open(filename: &str, verbose: bool) -> PyResult<PySpecDataFile> {
    PySpecDataFile::new(filename, verbose)
}

// ============================================================================
// Module Definition
// ============================================================================

#[pymodule]
pub fn specfile(m: &Bound<'_, PyModule>) -> PyResult<()> {
    // Functions
    m.add_function(wrap_pyfunction!(open, m)?)?;
    m.add_function(wrap_pyfunction!(init_logging, m)?)?;

    // Classes
    m.add_class::<PySpecDataFile>()?;
    m.add_class::<PySpecScan>()?;

    Ok(())
}
