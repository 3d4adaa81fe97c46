//! Container access: the seam between the typed reader and whatever engine
//! actually understands the file.
//!
//! ```text
//!   Backend ──open_file──▶ Container ──open_dataset──▶ Dataset
//!                              ▲                          │
//!                              └──── borrowed by ─────────┘
//! ```
//!
//! A `Dataset` borrows its `Container`, so a dataset handle can never
//! outlive the file it was opened from. Both handles release their
//! resources when closed or dropped, whichever comes first.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::LoadError;

#[cfg(feature = "hdf5")]
pub mod native;
pub mod registry;
pub mod snapshot;

pub use registry::BackendRegistry;
pub use snapshot::{HandleLedger, MemoryBackend, SnapshotBackend, SnapshotBuilder};

// ---------------------------------------------------------------------------
// Shape
// ---------------------------------------------------------------------------

/// Per-dimension extent of a stored dataset.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Shape(Vec<usize>);

impl Shape {
    pub fn new(dims: Vec<usize>) -> Self {
        Shape(dims)
    }

    /// Rank-0 shape, used when a shape query is treated as "no data".
    pub fn empty() -> Self {
        Shape(Vec::new())
    }

    pub fn rank(&self) -> usize {
        self.0.len()
    }

    pub fn dims(&self) -> &[usize] {
        &self.0
    }

    /// Product of all dimensions, `None` on overflow. Rank 0 holds no
    /// elements.
    pub fn element_count(&self) -> Option<usize> {
        if self.0.is_empty() {
            return Some(0);
        }
        self.0.iter().try_fold(1usize, |acc, &d| acc.checked_mul(d))
    }

    /// Byte length of the whole extent at `width` bytes per element.
    pub fn byte_len(&self, width: usize) -> Option<usize> {
        self.element_count()?.checked_mul(width)
    }

    /// Element count of a dataset, failing with `ShapeOverflow` when the
    /// element or byte count does not fit in `usize`.
    pub(crate) fn sized_count(&self, name: &str, width: usize) -> Result<usize, LoadError> {
        match (self.element_count(), self.byte_len(width)) {
            (Some(count), Some(_)) => Ok(count),
            _ => Err(LoadError::ShapeOverflow {
                name: name.to_string(),
                dims: self.0.clone(),
                width,
            }),
        }
    }
}

impl From<Vec<usize>> for Shape {
    fn from(dims: Vec<usize>) -> Self {
        Shape(dims)
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dims: Vec<String> = self.0.iter().map(|d| d.to_string()).collect();
        write!(f, "({})", dims.join(", "))
    }
}

// ---------------------------------------------------------------------------
// ElementEncoding
// ---------------------------------------------------------------------------

/// On-disk layout of a single element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ElementEncoding {
    /// 8-byte signed integer (`i8` in numpy terms).
    Int64,
    /// 8-byte IEEE float.
    Float64,
    /// Fixed-width ASCII slot, `width` bytes per element.
    FixedString { width: usize },
    /// Any other fixed-size numeric type. Only reachable through the raw loaders.
    Other { width: usize },
}

impl ElementEncoding {
    /// Byte stride of one element in a raw buffer.
    pub fn width(&self) -> usize {
        match self {
            ElementEncoding::Int64 | ElementEncoding::Float64 => 8,
            ElementEncoding::FixedString { width } | ElementEncoding::Other { width } => *width,
        }
    }
}

impl fmt::Display for ElementEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementEncoding::Int64 => write!(f, "int64"),
            ElementEncoding::Float64 => write!(f, "float64"),
            ElementEncoding::FixedString { width } => write!(f, "fixed ascii[{width}]"),
            ElementEncoding::Other { width } => write!(f, "opaque {width}-byte"),
        }
    }
}

// ---------------------------------------------------------------------------
// Region / RawBuffer
// ---------------------------------------------------------------------------

/// Rectangular rank-2 selection. The same value describes both the file-side
/// and the memory-side selection, so their element counts always agree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub origin: [usize; 2],
    pub extent: [usize; 2],
}

impl Region {
    /// Whole extent of a rank-2 shape, starting at `{0, 0}`.
    pub fn full(shape: &Shape) -> Option<Self> {
        match shape.dims() {
            &[rows, cols] => Some(Region {
                origin: [0, 0],
                extent: [rows, cols],
            }),
            _ => None,
        }
    }

    /// Whether the selection lies inside `shape`.
    pub fn fits(&self, shape: &Shape) -> bool {
        match shape.dims() {
            &[rows, cols] => {
                self.origin[0]
                    .checked_add(self.extent[0])
                    .is_some_and(|end| end <= rows)
                    && self.origin[1]
                        .checked_add(self.extent[1])
                        .is_some_and(|end| end <= cols)
            }
            _ => false,
        }
    }

    pub(crate) fn invalid(&self, name: &str, shape: &Shape) -> LoadError {
        LoadError::InvalidRegion {
            name: name.to_string(),
            origin: self.origin,
            extent: self.extent,
            shape: shape.dims().to_vec(),
        }
    }
}

/// Bytes of one read, laid out in native byte order with a fixed stride.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawBuffer {
    bytes: Vec<u8>,
    width: usize,
}

impl RawBuffer {
    pub fn new(bytes: Vec<u8>, width: usize) -> Self {
        RawBuffer { bytes, width }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Fails with `SizeMismatch` unless the buffer holds exactly
    /// `element_count` elements of its stride.
    pub fn check_len(&self, name: &str, element_count: usize) -> Result<(), LoadError> {
        let expected = element_count.checked_mul(self.width).ok_or_else(|| {
            LoadError::ShapeOverflow {
                name: name.to_string(),
                dims: vec![element_count],
                width: self.width,
            }
        })?;
        if self.bytes.len() != expected {
            return Err(LoadError::SizeMismatch {
                name: name.to_string(),
                expected,
                actual: self.bytes.len(),
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Handle traits
// ---------------------------------------------------------------------------

/// An engine able to open container files.
///
/// Backends are stateless from the reader's point of view: every
/// `open_file` returns a fresh handle.
pub trait Backend: Send + Sync {
    /// Unique identifier (e.g. "snapshot", "hdf5").
    fn id(&self) -> &'static str;

    /// File extensions this backend handles (lowercase, without dots).
    fn extensions(&self) -> &'static [&'static str];

    /// Content-based detection, used when the extension is unknown.
    fn can_open(&self, path: &Path) -> bool;

    /// Whether `path` names an existing container for this backend.
    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    /// Open a container read-only.
    fn open_file(&self, path: &Path) -> Result<Box<dyn Container>, LoadError>;
}

/// An open container file.
pub trait Container {
    /// Path the container was opened from.
    fn path(&self) -> &Path;

    /// Open a dataset by its flat name under the root.
    fn open_dataset(&self, name: &str) -> Result<Box<dyn Dataset + '_>, LoadError>;

    /// Names of all datasets directly under the root, sorted.
    fn dataset_names(&self) -> Result<Vec<String>, LoadError>;

    /// Release the handle now. Dropping the handle has the same effect.
    fn close(self: Box<Self>) {}
}

/// An open dataset inside a container.
pub trait Dataset {
    fn name(&self) -> &str;

    /// Fails with `ShapeQueryFailed` when the engine cannot report an extent.
    fn shape(&self) -> Result<Shape, LoadError>;

    fn encoding(&self) -> Result<ElementEncoding, LoadError>;

    /// Read the whole extent.
    fn read_all(&self, encoding: ElementEncoding, shape: &Shape) -> Result<RawBuffer, LoadError>;

    /// Read a rank-2 sub-region.
    fn read_region(&self, encoding: ElementEncoding, region: &Region)
        -> Result<RawBuffer, LoadError>;

    /// Release the handle now. Dropping the handle has the same effect.
    fn close(self: Box<Self>) {}
}
