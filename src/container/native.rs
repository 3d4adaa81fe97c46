//! Native HDF5 backend, built on the `hdf5` crate.
//!
//! Enabled with the `hdf5` cargo feature. The engine hands out typed reads,
//! so each read is requested in the dataset's own element type and then
//! exposed as native-endian bytes.

use std::io::Read;
use std::path::{Path, PathBuf};

use hdf5::types::{FixedAscii, FloatSize, IntSize, TypeDescriptor};

use super::{Backend, Container, Dataset, ElementEncoding, RawBuffer, Region, Shape};
use crate::error::LoadError;

/// `\x89HDF\r\n\x1a\n`
const MAGIC: &[u8; 8] = b"\x89HDF\r\n\x1a\n";

/// Widest fixed string slot the backend will read. Wider slots are reported
/// as `UnsupportedEncoding`.
pub const MAX_SLOT: usize = 1024;

/// Backend for `.h5` / `.hdf5` files.
#[derive(Debug, Default)]
pub struct Hdf5Backend;

impl Backend for Hdf5Backend {
    fn id(&self) -> &'static str {
        "hdf5"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["h5", "hdf5", "he5"]
    }

    fn can_open(&self, path: &Path) -> bool {
        let mut head = [0u8; 8];
        std::fs::File::open(path)
            .and_then(|mut f| f.read_exact(&mut head))
            .map(|_| &head == MAGIC)
            .unwrap_or(false)
    }

    fn open_file(&self, path: &Path) -> Result<Box<dyn Container>, LoadError> {
        let file = hdf5::File::open(path).map_err(|e| {
            if path.exists() {
                LoadError::Hdf5(e)
            } else {
                LoadError::FileNotFound {
                    path: path.to_path_buf(),
                }
            }
        })?;
        log::debug!("opened container {}", path.display());
        Ok(Box::new(Hdf5File {
            path: path.to_path_buf(),
            file,
        }))
    }
}

struct Hdf5File {
    path: PathBuf,
    file: hdf5::File,
}

impl Drop for Hdf5File {
    fn drop(&mut self) {
        log::debug!("closed container {}", self.path.display());
    }
}

impl Container for Hdf5File {
    fn path(&self) -> &Path {
        &self.path
    }

    fn open_dataset(&self, name: &str) -> Result<Box<dyn Dataset + '_>, LoadError> {
        let dataset = self
            .file
            .dataset(name)
            .map_err(|_| LoadError::DatasetNotFound {
                path: self.path.clone(),
                name: name.to_string(),
            })?;
        log::debug!("opened dataset '{name}'");
        Ok(Box::new(Hdf5Dataset {
            name: name.to_string(),
            dataset,
        }))
    }

    fn dataset_names(&self) -> Result<Vec<String>, LoadError> {
        let mut names: Vec<String> = self
            .file
            .datasets()?
            .iter()
            .map(|d| d.name().trim_start_matches('/').to_string())
            .collect();
        names.sort();
        Ok(names)
    }
}

struct Hdf5Dataset {
    name: String,
    dataset: hdf5::Dataset,
}

impl Hdf5Dataset {
    fn descriptor(&self) -> Result<TypeDescriptor, LoadError> {
        Ok(self.dataset.dtype()?.to_descriptor()?)
    }

    fn check_encoding(&self, requested: ElementEncoding) -> Result<TypeDescriptor, LoadError> {
        let descriptor = self.descriptor()?;
        let stored = encoding_of(&self.name, &descriptor)?;
        if stored != requested {
            return Err(LoadError::UnsupportedEncoding {
                name: self.name.clone(),
                detail: format!("no conversion from {stored} to {requested}"),
            });
        }
        Ok(descriptor)
    }
}

impl Drop for Hdf5Dataset {
    fn drop(&mut self) {
        log::debug!("closed dataset '{}'", self.name);
    }
}

impl Dataset for Hdf5Dataset {
    fn name(&self) -> &str {
        &self.name
    }

    fn shape(&self) -> Result<Shape, LoadError> {
        let space = self
            .dataset
            .space()
            .map_err(|_| LoadError::ShapeQueryFailed {
                name: self.name.clone(),
            })?;
        Ok(Shape::new(space.shape()))
    }

    fn encoding(&self) -> Result<ElementEncoding, LoadError> {
        encoding_of(&self.name, &self.descriptor()?)
    }

    fn read_all(&self, encoding: ElementEncoding, shape: &Shape) -> Result<RawBuffer, LoadError> {
        let descriptor = self.check_encoding(encoding)?;
        log::trace!("reading '{}' {shape} as {encoding}", self.name);
        let reader = self.dataset.as_reader();
        let bytes = match descriptor {
            TypeDescriptor::FixedAscii(width) => match width {
                0..=16 => read_ascii::<16>(&self.dataset, width)?,
                17..=64 => read_ascii::<64>(&self.dataset, width)?,
                65..=256 => read_ascii::<256>(&self.dataset, width)?,
                _ => read_ascii::<MAX_SLOT>(&self.dataset, width)?,
            },
            TypeDescriptor::Integer(IntSize::U1) => to_bytes(&reader.read_raw::<i8>()?),
            TypeDescriptor::Integer(IntSize::U2) => to_bytes(&reader.read_raw::<i16>()?),
            TypeDescriptor::Integer(IntSize::U4) => to_bytes(&reader.read_raw::<i32>()?),
            TypeDescriptor::Integer(IntSize::U8) => to_bytes(&reader.read_raw::<i64>()?),
            TypeDescriptor::Unsigned(IntSize::U1) => to_bytes(&reader.read_raw::<u8>()?),
            TypeDescriptor::Unsigned(IntSize::U2) => to_bytes(&reader.read_raw::<u16>()?),
            TypeDescriptor::Unsigned(IntSize::U4) => to_bytes(&reader.read_raw::<u32>()?),
            TypeDescriptor::Unsigned(IntSize::U8) => to_bytes(&reader.read_raw::<u64>()?),
            TypeDescriptor::Float(FloatSize::U4) => to_bytes(&reader.read_raw::<f32>()?),
            TypeDescriptor::Float(FloatSize::U8) => to_bytes(&reader.read_raw::<f64>()?),
            other => return Err(unsupported(&self.name, &other)),
        };
        Ok(RawBuffer::new(bytes, encoding.width()))
    }

    fn read_region(
        &self,
        encoding: ElementEncoding,
        region: &Region,
    ) -> Result<RawBuffer, LoadError> {
        let descriptor = self.check_encoding(encoding)?;
        let shape = self.shape()?;
        if !region.fits(&shape) {
            return Err(region.invalid(&self.name, &shape));
        }

        log::trace!(
            "reading '{}' region origin {:?} extent {:?}",
            self.name,
            region.origin,
            region.extent
        );
        let rows = region.origin[0]..region.origin[0] + region.extent[0];
        let cols = region.origin[1]..region.origin[1] + region.extent[1];
        let reader = self.dataset.as_reader();
        let bytes = match descriptor {
            TypeDescriptor::Integer(IntSize::U8) => {
                let slab = reader.read_slice_2d::<i64, _>((rows, cols))?;
                slab.iter().flat_map(|v| v.to_ne_bytes()).collect()
            }
            TypeDescriptor::Float(FloatSize::U8) => {
                let slab = reader.read_slice_2d::<f64, _>((rows, cols))?;
                slab.iter().flat_map(|v| v.to_ne_bytes()).collect()
            }
            other => return Err(unsupported(&self.name, &other)),
        };
        Ok(RawBuffer::new(bytes, encoding.width()))
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn encoding_of(name: &str, descriptor: &TypeDescriptor) -> Result<ElementEncoding, LoadError> {
    match descriptor {
        TypeDescriptor::Integer(IntSize::U8) => Ok(ElementEncoding::Int64),
        TypeDescriptor::Float(FloatSize::U8) => Ok(ElementEncoding::Float64),
        TypeDescriptor::FixedAscii(width) if *width <= MAX_SLOT => {
            Ok(ElementEncoding::FixedString { width: *width })
        }
        TypeDescriptor::Integer(_) | TypeDescriptor::Unsigned(_) | TypeDescriptor::Float(_) => {
            Ok(ElementEncoding::Other {
                width: descriptor.size(),
            })
        }
        other => Err(unsupported(name, other)),
    }
}

fn unsupported(name: &str, descriptor: &TypeDescriptor) -> LoadError {
    LoadError::UnsupportedEncoding {
        name: name.to_string(),
        detail: format!("{descriptor:?}"),
    }
}

fn to_bytes<T: bytemuck::NoUninit>(values: &[T]) -> Vec<u8> {
    bytemuck::cast_slice(values).to_vec()
}

/// Read a fixed ASCII dataset through an `N`-byte buffer per element, the
/// smallest bucket holding `width`.
fn read_ascii<const N: usize>(dataset: &hdf5::Dataset, width: usize) -> hdf5::Result<Vec<u8>> {
    let values = dataset.read_raw::<FixedAscii<N>>()?;
    Ok(pad_slots(values.iter().map(|v| v.as_bytes()), width))
}

/// Lay string values out in `width`-byte NUL-padded slots.
fn pad_slots<'a>(values: impl Iterator<Item = &'a [u8]>, width: usize) -> Vec<u8> {
    let mut bytes = Vec::new();
    for value in values {
        let start = bytes.len();
        bytes.extend_from_slice(value);
        bytes.resize(start + width.max(value.len()), 0);
    }
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::BackendRegistry;
    use crate::data::Loader;
    use ndarray::array;

    fn ascii<const N: usize>(values: &[&str]) -> Vec<FixedAscii<N>> {
        values
            .iter()
            .map(|v| FixedAscii::from_ascii(v.as_bytes()).unwrap())
            .collect()
    }

    fn write_sample(path: &Path) -> hdf5::Result<()> {
        let file = hdf5::File::create(path)?;
        file.new_dataset_builder()
            .with_data(&[1i64, 2, 3][..])
            .create("integers")?;
        file.new_dataset_builder()
            .with_data(&[0.0f64, 0.5, 1.5][..])
            .create("floats")?;
        file.new_dataset_builder()
            .with_data(&ascii::<7>(&["string1", "string2", "str"])[..])
            .create("strings")?;
        file.new_dataset_builder()
            .with_data(&ascii::<20>(&["a", "twenty characters!!!"])[..])
            .create("wide")?;
        file.new_dataset_builder()
            .with_data(&array![[1i64, 2], [3, 4]])
            .create("twoD")?;
        file.new_dataset_builder()
            .with_data(&array![[21i64, 22, 23], [24, 25, 26]])
            .create("grid")?;
        file.new_dataset_builder()
            .with_data(&[1u16, 2][..])
            .create("shorts")?;
        Ok(())
    }

    fn sample_loader() -> (tempfile::TempDir, PathBuf, Loader) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.h5");
        write_sample(&path).unwrap();
        let loader = Loader::with_registry(BackendRegistry::with_backend(Hdf5Backend));
        (dir, path, loader)
    }

    #[test]
    fn test_magic_detection() {
        let (dir, path, _) = sample_loader();
        assert!(Hdf5Backend.can_open(&path));

        let other = dir.path().join("other.h5");
        std::fs::write(&other, b"{\"datasets\": {}}").unwrap();
        assert!(!Hdf5Backend.can_open(&other));
    }

    #[test]
    fn test_encoding_and_region_read() {
        let (_dir, path, _) = sample_loader();

        let file = Hdf5Backend.open_file(&path).unwrap();
        assert_eq!(file.path(), path.as_path());
        assert_eq!(
            file.dataset_names().unwrap(),
            vec!["floats", "grid", "integers", "shorts", "strings", "twoD", "wide"]
        );

        let dataset = file.open_dataset("grid").unwrap();
        assert_eq!(dataset.encoding().unwrap(), ElementEncoding::Int64);
        let region = Region {
            origin: [1, 1],
            extent: [1, 2],
        };
        let raw = dataset.read_region(ElementEncoding::Int64, &region).unwrap();
        let values: Vec<i64> = raw
            .as_bytes()
            .chunks_exact(8)
            .map(bytemuck::pod_read_unaligned)
            .collect();
        assert_eq!(values, vec![25, 26]);
    }

    #[test]
    fn test_typed_loads() {
        let (_dir, path, loader) = sample_loader();

        assert_eq!(loader.load_int(&path, "integers").unwrap(), vec![1, 2, 3]);
        assert_eq!(loader.load_float(&path, "floats").unwrap(), vec![0.0, 0.5, 1.5]);
        assert_eq!(
            loader.load_2d_int(&path, "grid").unwrap(),
            array![[21, 22, 23], [24, 25, 26]]
        );
        assert_eq!(
            loader.load_2d_float(&path, "twoD").unwrap(),
            array![[1.0f32, 2.0], [3.0, 4.0]]
        );
        assert_eq!(loader.load_raw::<u16>(&path, "shorts").unwrap(), vec![1, 2]);
    }

    #[test]
    fn test_string_slots_are_repadded() {
        let (_dir, path, loader) = sample_loader();

        let strings = loader.load_strings(&path, "strings").unwrap();
        assert_eq!(strings.len(), 3);
        assert!(strings.iter().all(|s| s.len() == 7));
        assert_eq!(strings.concat(), "string1string2str\0\0\0\0");

        let wide = loader.load_strings(&path, "wide").unwrap();
        assert_eq!(wide.len(), 2);
        assert_eq!(wide[0], format!("a{}", "\0".repeat(19)));
        assert_eq!(wide[1], "twenty characters!!!");
    }

    #[test]
    fn test_missing_file_and_dataset() {
        let (dir, path, loader) = sample_loader();

        let missing = dir.path().join("missing.h5");
        assert!(matches!(
            Hdf5Backend.open_file(&missing),
            Err(LoadError::FileNotFound { .. })
        ));
        assert!(loader.load_int(&missing, "integers").unwrap_err().is_file_not_found());
        assert!(matches!(
            loader.load_float(&path, "nope"),
            Err(LoadError::DatasetNotFound { .. })
        ));
    }

    #[test]
    fn test_pad_slots() {
        let values: Vec<&[u8]> = vec![b"ab", b"cdef"];
        assert_eq!(pad_slots(values.into_iter(), 4), b"ab\0\0cdef".to_vec());
    }
}
