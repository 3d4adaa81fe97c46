//! Data layer: typed loading on top of the container seam.
//!
//! Architecture:
//! ```text
//!  (path, dataset name)
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  loader   │  open → shape + encoding → raw read → release
//!   └──────────┘
//!        │  RawBuffer
//!        ▼
//!   ┌──────────┐
//!   │  convert  │  narrow i64/f64, decode + split fixed ASCII
//!   └──────────┘
//!        │
//!        ▼
//!   Vec<i32> / Vec<f32> / Vec<String> / Array2<_> / Vec<T>
//! ```

pub mod convert;
pub mod loader;
pub mod model;

pub use loader::Loader;
pub use model::{DatasetInfo, ElementType, LoadOptions, ShapePolicy};
