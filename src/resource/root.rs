//! Filesystem document root

use std::fs::Metadata;
use std::io;
use std::path::{Path, PathBuf};

use super::path::normalize;
use super::ResourcePath;

/// Directory that server-relative resource paths are mapped onto
#[derive(Debug, Clone)]
pub struct DocumentRoot {
    root: PathBuf,
}

impl DocumentRoot {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Filesystem location of a resource
    pub fn locate(&self, resource: &ResourcePath) -> PathBuf {
        self.root.join(resource.as_str().trim_start_matches('/'))
    }

    /// Filesystem location of an arbitrary request path
    ///
    /// The path is normalized first so the result always stays below the root.
    /// Returns `None` for the root itself.
    pub fn locate_request_path(&self, request_path: &str) -> Option<PathBuf> {
        let normalized = normalize(request_path)?;
        Some(self.root.join(normalized.trim_start_matches('/')))
    }

    pub fn metadata(&self, resource: &ResourcePath) -> io::Result<Metadata> {
        std::fs::metadata(self.locate(resource))
    }

    /// Read a resource, `Ok(None)` when it does not exist or is not a regular file
    pub fn read(&self, resource: &ResourcePath) -> io::Result<Option<Vec<u8>>> {
        let location = self.locate(resource);
        match std::fs::metadata(&location) {
            Ok(meta) if meta.is_file() => std::fs::read(&location).map(Some),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }
}
