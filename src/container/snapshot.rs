//! JSON snapshot containers.
//!
//! A snapshot is a whole container serialized as JSON:
//!
//! ```json
//! {
//!   "datasets": {
//!     "integers": { "shape": [3], "data": { "encoding": "int64", "values": [1, 2, 3] } },
//!     "strings":  { "shape": [2], "data": { "encoding": "fixed_string", "width": 3, "values": ["ab", "cde"] } }
//!   }
//! }
//! ```
//!
//! A dataset without a `shape` models an engine whose extent query fails.
//! Raw reads hand out the stored values as native-endian bytes, exactly
//! what a native engine would place in a memory buffer.

use std::collections::{BTreeMap, HashMap};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use super::{Backend, Container, Dataset, ElementEncoding, RawBuffer, Region, Shape};
use crate::error::LoadError;

// ---------------------------------------------------------------------------
// Serialized model
// ---------------------------------------------------------------------------

/// A whole container: flat dataset names under the root.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub datasets: BTreeMap<String, StoredDataset>,
}

/// One stored dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredDataset {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shape: Option<Vec<usize>>,
    pub data: StoredData,
}

/// Stored element values, tagged by on-disk encoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "encoding", rename_all = "snake_case")]
pub enum StoredData {
    Int64 { values: Vec<i64> },
    Float64 { values: Vec<f64> },
    FixedString { width: usize, values: Vec<String> },
    Other { width: usize, bytes: Vec<u8> },
}

impl StoredData {
    pub fn encoding(&self) -> ElementEncoding {
        match self {
            StoredData::Int64 { .. } => ElementEncoding::Int64,
            StoredData::Float64 { .. } => ElementEncoding::Float64,
            StoredData::FixedString { width, .. } => ElementEncoding::FixedString { width: *width },
            StoredData::Other { width, .. } => ElementEncoding::Other { width: *width },
        }
    }

    /// All stored elements as native-endian bytes.
    ///
    /// String slots are NUL-padded up to `width`. A value longer than its
    /// slot is emitted whole, so the reader's size check catches it.
    fn to_bytes(&self) -> Vec<u8> {
        match self {
            StoredData::Int64 { values } => bytemuck::cast_slice(values).to_vec(),
            StoredData::Float64 { values } => bytemuck::cast_slice(values).to_vec(),
            StoredData::FixedString { width, values } => {
                let mut bytes = Vec::with_capacity(width * values.len());
                for value in values {
                    bytes.extend_from_slice(value.as_bytes());
                    if value.len() < *width {
                        bytes.resize(bytes.len() + (width - value.len()), 0);
                    }
                }
                bytes
            }
            StoredData::Other { bytes, .. } => bytes.clone(),
        }
    }
}

impl Snapshot {
    pub fn from_json(text: &str) -> Result<Self, LoadError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json(&self) -> Result<String, LoadError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the snapshot to `path` as pretty-printed JSON.
    pub fn write(&self, path: impl AsRef<Path>) -> Result<(), LoadError> {
        std::fs::write(path.as_ref(), self.to_json()?)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// SnapshotBuilder
// ---------------------------------------------------------------------------

/// Convenience builder for snapshot containers.
///
/// ```rust,ignore
/// let snapshot = SnapshotBuilder::new()
///     .int64("integers", &[1, 2, 3])
///     .strings("strings", &["string1", "string2"])
///     .build();
/// ```
#[derive(Debug, Default)]
pub struct SnapshotBuilder {
    datasets: BTreeMap<String, StoredDataset>,
}

impl SnapshotBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn int64(self, name: &str, values: &[i64]) -> Self {
        let shape = vec![values.len()];
        self.dataset(
            name,
            Some(shape),
            StoredData::Int64 {
                values: values.to_vec(),
            },
        )
    }

    pub fn float64(self, name: &str, values: &[f64]) -> Self {
        let shape = vec![values.len()];
        self.dataset(
            name,
            Some(shape),
            StoredData::Float64 {
                values: values.to_vec(),
            },
        )
    }

    /// Fixed-width strings; the slot width is the longest value, as numpy's
    /// `dtype="S"` picks it.
    pub fn strings(self, name: &str, values: &[&str]) -> Self {
        let width = values.iter().map(|v| v.len()).max().unwrap_or(1);
        self.strings_with_width(name, width, values)
    }

    pub fn strings_with_width(self, name: &str, width: usize, values: &[&str]) -> Self {
        let shape = vec![values.len()];
        self.dataset(
            name,
            Some(shape),
            StoredData::FixedString {
                width,
                values: values.iter().map(|v| v.to_string()).collect(),
            },
        )
    }

    pub fn int64_2d(self, name: &str, values: &Array2<i64>) -> Self {
        let shape = values.shape().to_vec();
        self.dataset(
            name,
            Some(shape),
            StoredData::Int64 {
                values: values.iter().copied().collect(),
            },
        )
    }

    pub fn float64_2d(self, name: &str, values: &Array2<f64>) -> Self {
        let shape = values.shape().to_vec();
        self.dataset(
            name,
            Some(shape),
            StoredData::Float64 {
                values: values.iter().copied().collect(),
            },
        )
    }

    /// Insert a dataset verbatim, including inconsistent shapes.
    pub fn dataset(mut self, name: &str, shape: Option<Vec<usize>>, data: StoredData) -> Self {
        self.datasets
            .insert(name.to_string(), StoredDataset { shape, data });
        self
    }

    pub fn build(self) -> Snapshot {
        Snapshot {
            datasets: self.datasets,
        }
    }
}

// ---------------------------------------------------------------------------
// HandleLedger
// ---------------------------------------------------------------------------

/// Counts live container and dataset handles handed out by a backend.
#[derive(Debug, Default)]
pub struct HandleLedger {
    files: AtomicUsize,
    datasets: AtomicUsize,
    files_opened: AtomicUsize,
}

impl HandleLedger {
    /// Container handles currently open.
    pub fn open_files(&self) -> usize {
        self.files.load(Ordering::SeqCst)
    }

    /// Dataset handles currently open.
    pub fn open_datasets(&self) -> usize {
        self.datasets.load(Ordering::SeqCst)
    }

    /// Container handles ever opened.
    pub fn files_opened(&self) -> usize {
        self.files_opened.load(Ordering::SeqCst)
    }

    fn acquire_file(&self) {
        self.files.fetch_add(1, Ordering::SeqCst);
        self.files_opened.fetch_add(1, Ordering::SeqCst);
    }

    fn release_file(&self) {
        self.files.fetch_sub(1, Ordering::SeqCst);
    }

    fn acquire_dataset(&self) {
        self.datasets.fetch_add(1, Ordering::SeqCst);
    }

    fn release_dataset(&self) {
        self.datasets.fetch_sub(1, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// Backends
// ---------------------------------------------------------------------------

/// Reads snapshot containers from `.json` files. Every open re-reads the file.
#[derive(Debug, Default)]
pub struct SnapshotBackend {
    ledger: Arc<HandleLedger>,
}

impl SnapshotBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ledger(&self) -> &Arc<HandleLedger> {
        &self.ledger
    }
}

impl Backend for SnapshotBackend {
    fn id(&self) -> &'static str {
        "snapshot"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["json"]
    }

    fn can_open(&self, path: &Path) -> bool {
        let mut head = [0u8; 256];
        let n = match std::fs::File::open(path).and_then(|mut f| f.read(&mut head)) {
            Ok(n) => n,
            Err(_) => return false,
        };
        let text = String::from_utf8_lossy(&head[..n]);
        text.trim_start().starts_with('{') && text.contains("\"datasets\"")
    }

    fn open_file(&self, path: &Path) -> Result<Box<dyn Container>, LoadError> {
        let text = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => LoadError::FileNotFound {
                path: path.to_path_buf(),
            },
            _ => LoadError::Io(e),
        })?;
        let snapshot = Snapshot::from_json(&text)?;
        Ok(Box::new(SnapshotFile::open(
            path,
            Arc::new(snapshot),
            &self.ledger,
        )))
    }
}

/// Holds snapshot containers in memory, keyed by path.
///
/// Useful for tests and for hosts that build datasets on the fly.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    files: HashMap<PathBuf, Arc<Snapshot>>,
    ledger: Arc<HandleLedger>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `snapshot` under `path`, replacing any previous one.
    pub fn insert(&mut self, path: impl Into<PathBuf>, snapshot: Snapshot) {
        self.files.insert(path.into(), Arc::new(snapshot));
    }

    pub fn with_file(mut self, path: impl Into<PathBuf>, snapshot: Snapshot) -> Self {
        self.insert(path, snapshot);
        self
    }

    pub fn ledger(&self) -> &Arc<HandleLedger> {
        &self.ledger
    }
}

impl Backend for MemoryBackend {
    fn id(&self) -> &'static str {
        "memory"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &[]
    }

    fn can_open(&self, path: &Path) -> bool {
        self.files.contains_key(path)
    }

    fn exists(&self, path: &Path) -> bool {
        self.files.contains_key(path)
    }

    fn open_file(&self, path: &Path) -> Result<Box<dyn Container>, LoadError> {
        let snapshot = self
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| LoadError::FileNotFound {
                path: path.to_path_buf(),
            })?;
        Ok(Box::new(SnapshotFile::open(path, snapshot, &self.ledger)))
    }
}

// ---------------------------------------------------------------------------
// Handles
// ---------------------------------------------------------------------------

struct SnapshotFile {
    path: PathBuf,
    snapshot: Arc<Snapshot>,
    ledger: Arc<HandleLedger>,
}

impl SnapshotFile {
    fn open(path: &Path, snapshot: Arc<Snapshot>, ledger: &Arc<HandleLedger>) -> Self {
        ledger.acquire_file();
        log::debug!("opened container {}", path.display());
        SnapshotFile {
            path: path.to_path_buf(),
            snapshot,
            ledger: Arc::clone(ledger),
        }
    }
}

impl Drop for SnapshotFile {
    fn drop(&mut self) {
        self.ledger.release_file();
        log::debug!("closed container {}", self.path.display());
    }
}

impl Container for SnapshotFile {
    fn path(&self) -> &Path {
        &self.path
    }

    fn open_dataset(&self, name: &str) -> Result<Box<dyn Dataset + '_>, LoadError> {
        let stored = self
            .snapshot
            .datasets
            .get(name)
            .ok_or_else(|| LoadError::DatasetNotFound {
                path: self.path.clone(),
                name: name.to_string(),
            })?;
        self.ledger.acquire_dataset();
        log::debug!("opened dataset '{name}'");
        Ok(Box::new(SnapshotDataset {
            name: name.to_string(),
            stored,
            ledger: &self.ledger,
        }))
    }

    fn dataset_names(&self) -> Result<Vec<String>, LoadError> {
        Ok(self.snapshot.datasets.keys().cloned().collect())
    }
}

struct SnapshotDataset<'a> {
    name: String,
    stored: &'a StoredDataset,
    ledger: &'a HandleLedger,
}

impl SnapshotDataset<'_> {
    fn check_encoding(&self, requested: ElementEncoding) -> Result<(), LoadError> {
        let stored = self.stored.data.encoding();
        if stored != requested {
            return Err(LoadError::UnsupportedEncoding {
                name: self.name.clone(),
                detail: format!("no conversion from {stored} to {requested}"),
            });
        }
        Ok(())
    }
}

impl Drop for SnapshotDataset<'_> {
    fn drop(&mut self) {
        self.ledger.release_dataset();
        log::debug!("closed dataset '{}'", self.name);
    }
}

impl Dataset for SnapshotDataset<'_> {
    fn name(&self) -> &str {
        &self.name
    }

    fn shape(&self) -> Result<Shape, LoadError> {
        self.stored
            .shape
            .clone()
            .map(Shape::new)
            .ok_or_else(|| LoadError::ShapeQueryFailed {
                name: self.name.clone(),
            })
    }

    fn encoding(&self) -> Result<ElementEncoding, LoadError> {
        Ok(self.stored.data.encoding())
    }

    fn read_all(&self, encoding: ElementEncoding, shape: &Shape) -> Result<RawBuffer, LoadError> {
        self.check_encoding(encoding)?;
        log::trace!("reading '{}' {shape} as {encoding}", self.name);
        Ok(RawBuffer::new(self.stored.data.to_bytes(), encoding.width()))
    }

    fn read_region(
        &self,
        encoding: ElementEncoding,
        region: &Region,
    ) -> Result<RawBuffer, LoadError> {
        self.check_encoding(encoding)?;
        let shape = self.shape()?;
        if !region.fits(&shape) {
            return Err(region.invalid(&self.name, &shape));
        }

        let width = encoding.width();
        let full = self.stored.data.to_bytes();
        let expected = shape.byte_len(width).ok_or_else(|| LoadError::ShapeOverflow {
            name: self.name.clone(),
            dims: shape.dims().to_vec(),
            width,
        })?;
        if full.len() != expected {
            return Err(LoadError::SizeMismatch {
                name: self.name.clone(),
                expected,
                actual: full.len(),
            });
        }

        log::trace!(
            "reading '{}' region origin {:?} extent {:?}",
            self.name,
            region.origin,
            region.extent
        );
        let cols = shape.dims()[1];
        let row_bytes = region.extent[1] * width;
        let mut bytes = Vec::with_capacity(region.extent[0] * row_bytes);
        for row in region.origin[0]..region.origin[0] + region.extent[0] {
            let start = (row * cols + region.origin[1]) * width;
            bytes.extend_from_slice(&full[start..start + row_bytes]);
        }
        Ok(RawBuffer::new(bytes, width))
    }
}
