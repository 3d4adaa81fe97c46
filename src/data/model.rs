use std::fmt;

use serde::{Deserialize, Serialize};

use crate::container::{ElementEncoding, Shape};

// ---------------------------------------------------------------------------
// LoadOptions – reader policy knobs
// ---------------------------------------------------------------------------

/// What to do when the engine cannot report a dataset's extent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapePolicy {
    /// Treat the dataset as rank 0 ("no data") and log a warning.
    #[default]
    Lenient,
    /// Fail with `ShapeQueryFailed`.
    Strict,
}

/// Options shared by every load operation of a [`Loader`](super::Loader).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadOptions {
    pub shape_policy: ShapePolicy,
}

impl LoadOptions {
    pub fn strict() -> Self {
        LoadOptions {
            shape_policy: ShapePolicy::Strict,
        }
    }
}

// ---------------------------------------------------------------------------
// ElementType – public element types of the typed loaders
// ---------------------------------------------------------------------------

/// Element type a typed loader produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementType {
    Int32,
    Float32,
    String,
}

impl ElementType {
    pub fn label(self) -> &'static str {
        match self {
            ElementType::Int32 => "int32",
            ElementType::Float32 => "float32",
            ElementType::String => "string",
        }
    }

    /// Whether a dataset stored as `encoding` can be loaded as this type.
    pub fn accepts(self, encoding: ElementEncoding) -> bool {
        match self {
            ElementType::Int32 | ElementType::Float32 => {
                matches!(encoding, ElementEncoding::Int64 | ElementEncoding::Float64)
            }
            ElementType::String => matches!(encoding, ElementEncoding::FixedString { .. }),
        }
    }

    /// Natural output type for `encoding`, if any typed loader accepts it.
    pub fn natural(encoding: ElementEncoding) -> Option<Self> {
        match encoding {
            ElementEncoding::Int64 => Some(ElementType::Int32),
            ElementEncoding::Float64 => Some(ElementType::Float32),
            ElementEncoding::FixedString { .. } => Some(ElementType::String),
            ElementEncoding::Other { .. } => None,
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// DatasetInfo – what a dataset looks like on disk
// ---------------------------------------------------------------------------

/// Shape and encoding of one dataset, as seen by the reader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatasetInfo {
    pub name: String,
    pub shape: Shape,
    pub encoding: ElementEncoding,
}

impl DatasetInfo {
    /// `None` when the stored shape overflows `usize`.
    pub fn element_count(&self) -> Option<usize> {
        self.shape.element_count()
    }

    pub fn rank(&self) -> usize {
        self.shape.rank()
    }
}

impl fmt::Display for DatasetInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.name, self.shape, self.encoding)
    }
}
