//! Backend selection by file extension and content detection.
//!
//! ```rust,ignore
//! let registry = BackendRegistry::new();
//! let container = registry.open_file(Path::new("testfile.json"))?;
//! ```

use std::path::Path;

use super::{Backend, Container, SnapshotBackend};
use crate::error::LoadError;

/// Registry of available container backends.
pub struct BackendRegistry {
    backends: Vec<Box<dyn Backend>>,
}

impl BackendRegistry {
    /// Registry with every built-in backend.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register(Box::new(SnapshotBackend::new()));
        #[cfg(feature = "hdf5")]
        registry.register(Box::new(super::native::Hdf5Backend));
        registry
    }

    /// Registry without any backend.
    pub fn empty() -> Self {
        Self {
            backends: Vec::new(),
        }
    }

    /// Registry holding a single backend.
    pub fn with_backend(backend: impl Backend + 'static) -> Self {
        let mut registry = Self::empty();
        registry.register(Box::new(backend));
        registry
    }

    /// Register a backend. Earlier registrations win ties.
    pub fn register(&mut self, backend: Box<dyn Backend>) {
        self.backends.push(backend);
    }

    /// All file extensions some backend handles.
    pub fn supported_extensions(&self) -> Vec<&'static str> {
        let mut extensions: Vec<&'static str> = self
            .backends
            .iter()
            .flat_map(|b| b.extensions().iter().copied())
            .collect();
        extensions.sort();
        extensions.dedup();
        extensions
    }

    /// Pick the backend for `path`.
    ///
    /// A backend claiming the file extension wins; otherwise the first
    /// backend whose content detection accepts the file.
    pub fn backend_for(&self, path: &Path) -> Option<&dyn Backend> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        if let Some(ext) = extension {
            if let Some(backend) = self
                .backends
                .iter()
                .find(|b| b.extensions().iter().any(|e| *e == ext))
            {
                log::trace!("{} handled by {} (by extension)", path.display(), backend.id());
                return Some(backend.as_ref());
            }
        }

        let backend = self.backends.iter().find(|b| b.can_open(path))?;
        log::trace!("{} handled by {} (by detection)", path.display(), backend.id());
        Some(backend.as_ref())
    }

    /// Whether some backend reports `path` as an existing container.
    pub fn exists(&self, path: &Path) -> bool {
        self.backend_for(path).is_some_and(|b| b.exists(path))
    }

    /// Open `path` with the backend chosen by [`Self::backend_for`].
    ///
    /// A path no backend claims is reported as `FileNotFound` when it does
    /// not exist, and `UnsupportedFormat` otherwise.
    pub fn open_file(&self, path: &Path) -> Result<Box<dyn Container>, LoadError> {
        match self.backend_for(path) {
            Some(backend) => backend.open_file(path),
            None if !path.exists() => Err(LoadError::FileNotFound {
                path: path.to_path_buf(),
            }),
            None => {
                log::warn!(
                    "no backend claims {} (known extensions: {})",
                    path.display(),
                    self.supported_extensions().join(", ")
                );
                Err(LoadError::UnsupportedFormat {
                    path: path.to_path_buf(),
                })
            }
        }
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::{MemoryBackend, SnapshotBuilder};

    #[test]
    fn test_registry_has_backends() {
        let registry = BackendRegistry::new();
        assert!(registry.supported_extensions().contains(&"json"));
    }

    #[test]
    fn test_dispatch_by_extension() {
        let registry = BackendRegistry::new();
        let backend = registry.backend_for(Path::new("data/testfile.JSON")).unwrap();
        assert_eq!(backend.id(), "snapshot");
    }

    #[test]
    fn test_dispatch_by_detection() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("container.bin");
        SnapshotBuilder::new()
            .int64("integers", &[1])
            .build()
            .write(&path)
            .unwrap();

        let registry = BackendRegistry::new();
        assert_eq!(registry.backend_for(&path).unwrap().id(), "snapshot");
    }

    #[test]
    fn test_unclaimed_paths() {
        let dir = tempfile::tempdir().unwrap();
        let registry = BackendRegistry::new();

        let missing = dir.path().join("missing.xyz");
        assert!(matches!(
            registry.open_file(&missing),
            Err(LoadError::FileNotFound { .. })
        ));

        let garbage = dir.path().join("garbage.xyz");
        std::fs::write(&garbage, b"not a container").unwrap();
        assert!(matches!(
            registry.open_file(&garbage),
            Err(LoadError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn test_memory_backend_claims_registered_paths() {
        let memory = MemoryBackend::new().with_file("in-memory", SnapshotBuilder::new().build());
        let registry = BackendRegistry::with_backend(memory);
        assert_eq!(registry.backend_for(Path::new("in-memory")).unwrap().id(), "memory");
        assert!(registry.exists(Path::new("in-memory")));
        assert!(registry.backend_for(Path::new("whatever")).is_none());
        assert!(!registry.exists(Path::new("whatever")));
    }
}
