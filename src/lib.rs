//! Typed dataset reader for HDF5-style container files.
//!
//! Loads 1-D and 2-D numeric datasets (stored as 8-byte integers or floats)
//! and fixed-width ASCII string datasets into plain Rust values:
//!
//! ```rust,ignore
//! let ints: Vec<i32> = rusty_h5::load_int_dataset("testfile.json", "integers")?;
//! let grid = rusty_h5::load_2d_float_dataset("testfile.json", "twoD")?;
//! ```
//!
//! The free functions use [`Loader::new`], which opens JSON snapshot
//! containers and, with the `hdf5` feature, native HDF5 files. Build a
//! [`Loader`] directly to choose backends or [`LoadOptions`].

pub mod container;
pub mod data;
pub mod error;

use std::path::Path;

use bytemuck::Pod;
use ndarray::Array2;

pub use container::{Backend, BackendRegistry, ElementEncoding, Shape};
pub use data::{DatasetInfo, ElementType, LoadOptions, Loader, ShapePolicy};
pub use error::LoadError;

/// Load a rank-1 8-byte integer dataset, narrowed to `i32`.
pub fn load_int_dataset(path: impl AsRef<Path>, name: &str) -> Result<Vec<i32>, LoadError> {
    Loader::new().load_int(path, name)
}

/// Load a rank-1 8-byte float dataset, narrowed to `f32`.
pub fn load_float_dataset(path: impl AsRef<Path>, name: &str) -> Result<Vec<f32>, LoadError> {
    Loader::new().load_float(path, name)
}

/// Load a rank-1 fixed-width ASCII dataset. Padding is kept.
pub fn load_string_dataset(path: impl AsRef<Path>, name: &str) -> Result<Vec<String>, LoadError> {
    Loader::new().load_strings(path, name)
}

/// Load a rank-2 8-byte integer dataset, narrowed to `i32`.
pub fn load_2d_int_dataset(path: impl AsRef<Path>, name: &str) -> Result<Array2<i32>, LoadError> {
    Loader::new().load_2d_int(path, name)
}

/// Load a rank-2 8-byte float dataset, narrowed to `f32`.
pub fn load_2d_float_dataset(
    path: impl AsRef<Path>,
    name: &str,
) -> Result<Array2<f32>, LoadError> {
    Loader::new().load_2d_float(path, name)
}

/// Advanced: load a dataset in its on-disk representation.
///
/// `T` must be exactly as wide as one stored element. See
/// [`Loader::load_raw_unchecked`] for the variant that skips this check.
pub fn load_raw_dataset<T: Pod>(path: impl AsRef<Path>, name: &str) -> Result<Vec<T>, LoadError> {
    Loader::new().load_raw(path, name)
}

/// Advanced: like [`load_raw_dataset`] without the element width check.
pub fn load_raw_dataset_unchecked<T: Pod>(
    path: impl AsRef<Path>,
    name: &str,
) -> Result<Vec<T>, LoadError> {
    Loader::new().load_raw_unchecked(path, name)
}

/// Shape and encoding of a dataset, without reading its values.
pub fn inspect_dataset(path: impl AsRef<Path>, name: &str) -> Result<DatasetInfo, LoadError> {
    Loader::new().inspect(path, name)
}

/// Names of the datasets under the container root, sorted.
pub fn list_datasets(path: impl AsRef<Path>) -> Result<Vec<String>, LoadError> {
    Loader::new().list(path)
}
