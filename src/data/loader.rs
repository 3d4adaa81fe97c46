use std::path::Path;

use bytemuck::Pod;
use ndarray::Array2;

use super::convert::{self, expect_encoding};
use super::model::{DatasetInfo, ElementType, LoadOptions, ShapePolicy};
use crate::container::{BackendRegistry, Dataset, ElementEncoding, RawBuffer, Region, Shape};
use crate::error::LoadError;

// ---------------------------------------------------------------------------
// Loader
// ---------------------------------------------------------------------------

/// Typed dataset reader.
///
/// Every load opens the container, opens the dataset, queries shape and
/// encoding, reads, releases the dataset and then the container, and only
/// then returns. Nothing is cached between calls.
pub struct Loader {
    registry: BackendRegistry,
    options: LoadOptions,
}

impl Loader {
    /// Loader over every built-in backend with default options.
    pub fn new() -> Self {
        Self::with_registry(BackendRegistry::new())
    }

    pub fn with_registry(registry: BackendRegistry) -> Self {
        Loader {
            registry,
            options: LoadOptions::default(),
        }
    }

    pub fn with_options(mut self, options: LoadOptions) -> Self {
        self.options = options;
        self
    }

    // -- 1-D loaders --

    /// Load a rank-1 numeric dataset as `i32`.
    ///
    /// `Int64` values are truncated to their low 32 bits; `Float64` values
    /// are cast with saturation.
    pub fn load_int(&self, path: impl AsRef<Path>, name: &str) -> Result<Vec<i32>, LoadError> {
        self.with_dataset(path.as_ref(), name, |dataset| {
            let (encoding, _, raw) = self.read_vector(dataset, ElementType::Int32)?;
            convert::to_i32(name, encoding, raw.as_bytes())
        })
    }

    /// Load a rank-1 numeric dataset as `f32`, rounding to nearest.
    pub fn load_float(&self, path: impl AsRef<Path>, name: &str) -> Result<Vec<f32>, LoadError> {
        self.with_dataset(path.as_ref(), name, |dataset| {
            let (encoding, _, raw) = self.read_vector(dataset, ElementType::Float32)?;
            convert::to_f32(name, encoding, raw.as_bytes())
        })
    }

    /// Load a rank-1 fixed-width ASCII dataset.
    ///
    /// Each string is exactly one slot wide. NUL padding is kept, so callers
    /// wanting bare values should trim `'\0'` themselves.
    ///
    /// The native HDF5 backend reads slots up to 1024 bytes wide; wider
    /// string datasets fail with `UnsupportedEncoding`.
    pub fn load_strings(
        &self,
        path: impl AsRef<Path>,
        name: &str,
    ) -> Result<Vec<String>, LoadError> {
        self.with_dataset(path.as_ref(), name, |dataset| {
            let (_, count, raw) = self.read_vector(dataset, ElementType::String)?;
            if count == 0 {
                return Ok(Vec::new());
            }
            let text = convert::decode_ascii(name, raw.as_bytes())?;
            convert::split_in_parts(&text, raw.width())
        })
    }

    // -- 2-D loaders --

    /// Load a rank-2 numeric dataset as `i32` through a full-extent region read.
    pub fn load_2d_int(
        &self,
        path: impl AsRef<Path>,
        name: &str,
    ) -> Result<Array2<i32>, LoadError> {
        self.with_dataset(path.as_ref(), name, |dataset| {
            let (encoding, dims, raw) = self.read_matrix(dataset, ElementType::Int32)?;
            let values = convert::to_i32(name, encoding, raw.as_bytes())?;
            into_matrix(name, dims, values, encoding)
        })
    }

    /// Load a rank-2 numeric dataset as `f32` through a full-extent region read.
    pub fn load_2d_float(
        &self,
        path: impl AsRef<Path>,
        name: &str,
    ) -> Result<Array2<f32>, LoadError> {
        self.with_dataset(path.as_ref(), name, |dataset| {
            let (encoding, dims, raw) = self.read_matrix(dataset, ElementType::Float32)?;
            let values = convert::to_f32(name, encoding, raw.as_bytes())?;
            into_matrix(name, dims, values, encoding)
        })
    }

    // -- Raw loaders --

    /// Load any dataset in its on-disk representation, flattened.
    ///
    /// Fails fast with `FileNotFound` before opening anything, and with
    /// `WidthMismatch` when `T` is not exactly one stored element wide.
    pub fn load_raw<T: Pod>(
        &self,
        path: impl AsRef<Path>,
        name: &str,
    ) -> Result<Vec<T>, LoadError> {
        self.load_raw_inner(path.as_ref(), name, true)
    }

    /// Like [`Self::load_raw`] without the width check.
    ///
    /// The stored bytes are reinterpreted in `size_of::<T>()` chunks whatever
    /// the stored element width is. Picking the wrong `T` yields garbage
    /// values rather than an error.
    pub fn load_raw_unchecked<T: Pod>(
        &self,
        path: impl AsRef<Path>,
        name: &str,
    ) -> Result<Vec<T>, LoadError> {
        self.load_raw_inner(path.as_ref(), name, false)
    }

    fn load_raw_inner<T: Pod>(
        &self,
        path: &Path,
        name: &str,
        check_width: bool,
    ) -> Result<Vec<T>, LoadError> {
        if !self.registry.exists(path) {
            return Err(LoadError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        self.with_dataset(path, name, |dataset| {
            let (shape, encoding) = self.describe(dataset)?;
            let requested = std::mem::size_of::<T>();
            if check_width && requested != encoding.width() {
                return Err(LoadError::WidthMismatch {
                    name: name.to_string(),
                    stored: encoding.width(),
                    requested,
                });
            }
            let count = shape.sized_count(name, encoding.width())?;
            if count == 0 {
                return Ok(Vec::new());
            }
            let raw = dataset.read_all(encoding, &shape)?;
            raw.check_len(name, count)?;
            convert::reinterpret(raw.as_bytes())
        })
    }

    // -- Introspection --

    /// Shape and encoding of a dataset, without reading its values.
    pub fn inspect(&self, path: impl AsRef<Path>, name: &str) -> Result<DatasetInfo, LoadError> {
        self.with_dataset(path.as_ref(), name, |dataset| {
            let (shape, encoding) = self.describe(dataset)?;
            Ok(DatasetInfo {
                name: name.to_string(),
                shape,
                encoding,
            })
        })
    }

    /// Names of the datasets under the container root, sorted.
    pub fn list(&self, path: impl AsRef<Path>) -> Result<Vec<String>, LoadError> {
        let container = self.registry.open_file(path.as_ref())?;
        let names = container.dataset_names();
        container.close();
        names
    }

    // -----------------------------------------------------------------------
    // Internal helpers
    // -----------------------------------------------------------------------

    /// Run `f` against an open dataset. The dataset handle is released before
    /// the container handle, on success and on every error path.
    fn with_dataset<R>(
        &self,
        path: &Path,
        name: &str,
        f: impl FnOnce(&dyn Dataset) -> Result<R, LoadError>,
    ) -> Result<R, LoadError> {
        let container = self.registry.open_file(path)?;
        log::debug!("loading '{name}' from {}", container.path().display());
        let result = match container.open_dataset(name) {
            Ok(dataset) => {
                let result = f(&*dataset);
                dataset.close();
                result
            }
            Err(e) => Err(e),
        };
        container.close();
        result
    }

    /// Fresh shape and encoding query, with the shape policy applied.
    fn describe(&self, dataset: &dyn Dataset) -> Result<(Shape, ElementEncoding), LoadError> {
        let shape = match dataset.shape() {
            Ok(shape) => shape,
            Err(LoadError::ShapeQueryFailed { name })
                if self.options.shape_policy == ShapePolicy::Lenient =>
            {
                log::warn!("shape query failed for '{name}', treating it as empty");
                Shape::empty()
            }
            Err(e) => return Err(e),
        };
        let encoding = dataset.encoding()?;
        log::debug!("dataset '{}': shape {shape}, {encoding}", dataset.name());
        Ok((shape, encoding))
    }

    fn read_vector(
        &self,
        dataset: &dyn Dataset,
        target: ElementType,
    ) -> Result<(ElementEncoding, usize, RawBuffer), LoadError> {
        let name = dataset.name();
        let (shape, encoding) = self.describe(dataset)?;
        expect_encoding(name, encoding, target)?;
        if shape.rank() != 0 {
            expect_rank(name, &shape, 1)?;
        }

        let count = shape.sized_count(name, encoding.width())?;
        if count == 0 {
            return Ok((encoding, 0, RawBuffer::new(Vec::new(), encoding.width())));
        }
        let raw = dataset.read_all(encoding, &shape)?;
        raw.check_len(name, count)?;
        Ok((encoding, count, raw))
    }

    fn read_matrix(
        &self,
        dataset: &dyn Dataset,
        target: ElementType,
    ) -> Result<(ElementEncoding, [usize; 2], RawBuffer), LoadError> {
        let name = dataset.name();
        let (shape, encoding) = self.describe(dataset)?;
        expect_encoding(name, encoding, target)?;
        if shape.rank() == 0 {
            return Ok((encoding, [0, 0], RawBuffer::new(Vec::new(), encoding.width())));
        }
        expect_rank(name, &shape, 2)?;
        let region = Region::full(&shape).ok_or_else(|| rank_mismatch(name, &shape, 2))?;

        let count = shape.sized_count(name, encoding.width())?;
        if count == 0 {
            return Ok((
                encoding,
                region.extent,
                RawBuffer::new(Vec::new(), encoding.width()),
            ));
        }
        let raw = dataset.read_region(encoding, &region)?;
        raw.check_len(name, count)?;
        Ok((encoding, region.extent, raw))
    }
}

impl Default for Loader {
    fn default() -> Self {
        Self::new()
    }
}

fn expect_rank(name: &str, shape: &Shape, expected: usize) -> Result<(), LoadError> {
    if shape.rank() == expected {
        Ok(())
    } else {
        Err(rank_mismatch(name, shape, expected))
    }
}

fn rank_mismatch(name: &str, shape: &Shape, expected: usize) -> LoadError {
    LoadError::RankMismatch {
        name: name.to_string(),
        expected,
        found: shape.rank(),
    }
}

fn into_matrix<T>(
    name: &str,
    dims: [usize; 2],
    values: Vec<T>,
    encoding: ElementEncoding,
) -> Result<Array2<T>, LoadError> {
    let width = encoding.width();
    let actual = values.len().saturating_mul(width);
    Array2::from_shape_vec((dims[0], dims[1]), values).map_err(|_| LoadError::SizeMismatch {
        name: name.to_string(),
        expected: dims[0].saturating_mul(dims[1]).saturating_mul(width),
        actual,
    })
}
