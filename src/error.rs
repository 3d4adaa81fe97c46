use std::io;
use std::path::PathBuf;

use crate::container::ElementEncoding;

/// Errors that can occur when loading a dataset.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("file not found: {}", path.display())]
    FileNotFound { path: PathBuf },

    #[error("dataset '{name}' could not be opened in {}", path.display())]
    DatasetNotFound { path: PathBuf, name: String },

    #[error("shape query failed for dataset '{name}'")]
    ShapeQueryFailed { name: String },

    #[error("dataset '{name}': read {actual} bytes but shape and encoding imply {expected}")]
    SizeMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },

    #[error("dataset '{name}': shape {dims:?} of {width}-byte elements overflows the address space")]
    ShapeOverflow {
        name: String,
        dims: Vec<usize>,
        width: usize,
    },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("dataset '{name}' has rank {found}, expected {expected}")]
    RankMismatch {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("dataset '{name}' is stored as {found}, which cannot be read as {expected}")]
    EncodingMismatch {
        name: String,
        expected: &'static str,
        found: ElementEncoding,
    },

    #[error("dataset '{name}' stores {stored}-byte elements but the requested type is {requested} bytes wide")]
    WidthMismatch {
        name: String,
        stored: usize,
        requested: usize,
    },

    #[error("dataset '{name}' has an unsupported element type: {detail}")]
    UnsupportedEncoding { name: String, detail: String },

    #[error("dataset '{name}': region origin {origin:?} extent {extent:?} does not fit shape {shape:?}")]
    InvalidRegion {
        name: String,
        origin: [usize; 2],
        extent: [usize; 2],
        shape: Vec<usize>,
    },

    #[error("dataset '{name}' holds a non-ASCII byte 0x{byte:02x} at offset {offset}")]
    InvalidAscii {
        name: String,
        offset: usize,
        byte: u8,
    },

    #[error("no container backend can open {}", path.display())]
    UnsupportedFormat { path: PathBuf },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("snapshot error: {0}")]
    Snapshot(#[from] serde_json::Error),

    #[cfg(feature = "hdf5")]
    #[error("HDF5 error: {0}")]
    Hdf5(#[from] hdf5::Error),
}

impl LoadError {
    /// True for the "file missing" failure, whichever layer reported it.
    pub fn is_file_not_found(&self) -> bool {
        match self {
            LoadError::FileNotFound { .. } => true,
            LoadError::Io(e) => e.kind() == io::ErrorKind::NotFound,
            _ => false,
        }
    }
}
