//! Resource loading utilities
//!
//! This module reads schema documents and catalogs from their [`Location`],
//! enforcing the configured [`Limits`]. Remote locations are refused: a
//! schema set is compiled from a local snapshot.

use crate::error::{Error, Result};
use crate::limits::Limits;
use crate::locations::Location;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Resource loader for schema documents
#[derive(Debug, Clone, Default)]
pub struct Loader {
    /// Resource limits
    limits: Limits,
}

impl Loader {
    /// Create a new loader with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the limits
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Limits this loader enforces
    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    /// Open a local file for streaming reads, checking its size up front
    ///
    /// The handle is released when the returned reader is dropped.
    pub fn open_path(&self, path: &Path) -> Result<BufReader<File>> {
        let file = File::open(path).map_err(|e| {
            Error::Resource(format!("Failed to open file '{}': {}", path.display(), e))
        })?;
        let meta = file.metadata()?;
        self.limits.check_document_size(meta.len() as usize)?;
        Ok(BufReader::new(file))
    }

    /// Load a resource as bytes
    ///
    /// The file handle lives only for the duration of this call.
    pub fn load_bytes(&self, location: &Location) -> Result<Vec<u8>> {
        match location {
            Location::Path(path) => {
                let mut file = File::open(path).map_err(|e| {
                    Error::Resource(format!("Failed to read file '{}': {}", path.display(), e))
                })?;

                if let Ok(meta) = file.metadata() {
                    self.limits.check_document_size(meta.len() as usize)?;
                }

                let mut content = Vec::new();
                file.read_to_end(&mut content).map_err(|e| {
                    Error::Resource(format!("Failed to read file '{}': {}", path.display(), e))
                })?;

                // The file may have grown since the metadata call
                self.limits.check_document_size(content.len())?;

                Ok(content)
            }
            Location::Url(url) => Err(Error::Resource(format!(
                "Remote resources are not allowed: {}",
                url
            ))),
            Location::String(s) => {
                self.limits.check_document_size(s.len())?;
                Ok(s.as_bytes().to_vec())
            }
        }
    }

    /// Load a resource as a string
    pub fn load(&self, location: &Location) -> Result<String> {
        let bytes = self.load_bytes(location)?;
        String::from_utf8(bytes)
            .map_err(|e| Error::Xml(format!("Document '{}' is not valid UTF-8: {}", location, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "<root>test</root>").unwrap();

        let location = Location::Path(file.path().to_path_buf());
        let loader = Loader::new();
        let content = loader.load(&location).unwrap();

        assert!(content.contains("<root>test</root>"));
    }

    #[test]
    fn test_load_from_string() {
        let location = Location::String("<root>test</root>".to_string());
        let loader = Loader::new();
        let content = loader.load(&location).unwrap();

        assert_eq!(content, "<root>test</root>");
    }

    #[test]
    fn test_missing_file_is_resource_error() {
        let location = Location::Path("/definitely/not/here.xsd".into());
        let result = Loader::new().load(&location);
        assert!(matches!(result, Err(Error::Resource(_))));
    }

    #[test]
    fn test_open_path_streams() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "<root/>").unwrap();

        let mut reader = Loader::new().open_path(file.path()).unwrap();
        let mut content = String::new();
        reader.read_to_string(&mut content).unwrap();
        assert_eq!(content, "<root/>");
    }

    #[test]
    fn test_remote_refused() {
        let location: Location = "https://example.com/schema.xsd".parse().unwrap();
        assert!(matches!(Loader::new().load(&location), Err(Error::Resource(_))));
    }

    #[test]
    fn test_size_limit() {
        let mut file = NamedTempFile::new().unwrap();
        let large_content = "x".repeat(11 * 1024 * 1024); // 11 MB
        write!(file, "{}", large_content).unwrap();

        let location = Location::Path(file.path().to_path_buf());
        let loader = Loader::new().with_limits(Limits::strict());
        let result = loader.load(&location);

        // Strict limits (10 MB max) should reject 11MB file
        assert!(matches!(result, Err(Error::LimitExceeded(_))));
    }
}
