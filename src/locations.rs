//! Resource location resolution
//!
//! A [`Location`] is where a schema document is read from. Resolution
//! results point at canonical paths; `schemaLocation` hints are resolved
//! against the location of the document that contains them.

use crate::error::{Error, Result};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use url::Url;

/// Resource location - can be a URL, file path, or string identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    /// File system path
    Path(PathBuf),
    /// URL (http, https, ftp, etc.)
    Url(Url),
    /// In-memory document content
    String(String),
}

impl FromStr for Location {
    type Err = Error;

    /// Auto-detect the location type; `file:` URLs become paths
    fn from_str(s: &str) -> Result<Self> {
        if let Ok(url) = Url::parse(s) {
            if url.scheme() == "file" {
                let path = url
                    .to_file_path()
                    .map_err(|_| Error::Resource(format!("Not a local file URL: {}", s)))?;
                return Ok(Location::Path(path));
            }
            // Single letters are Windows drive prefixes, not schemes
            if url.scheme().len() > 1 {
                return Ok(Location::Url(url));
            }
        }

        Ok(Location::Path(PathBuf::from(s)))
    }
}

impl Location {
    /// The file system path, if this is a local location
    pub fn as_path(&self) -> Option<&Path> {
        match self {
            Location::Path(p) => Some(p),
            _ => None,
        }
    }

    /// Resolve a `schemaLocation` reference against this location
    ///
    /// Absolute paths and URLs are returned unchanged; relative references
    /// are joined to the directory of this location.
    pub fn join(&self, reference: &str) -> Result<Location> {
        let target: Location = reference.parse()?;
        match (&target, self) {
            (Location::Path(p), Location::Path(base)) if p.is_relative() => {
                let dir = base.parent().unwrap_or_else(|| Path::new(""));
                Ok(Location::Path(dir.join(p)))
            }
            (Location::Path(p), Location::Url(base)) if p.is_relative() => {
                Ok(Location::Url(base.join(reference)?))
            }
            _ => Ok(target),
        }
    }

    /// System identifier as handed to XML tooling (`file:` URL for paths)
    pub fn system_id(&self) -> String {
        match self {
            Location::Path(p) => Url::from_file_path(p)
                .map(|u| u.to_string())
                .unwrap_or_else(|_| p.to_string_lossy().to_string()),
            Location::Url(u) => u.to_string(),
            Location::String(_) => String::new(),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Path(p) => write!(f, "{}", p.display()),
            Location::Url(u) => write!(f, "{}", u),
            Location::String(_) => f.write_str("<in-memory>"),
        }
    }
}

impl From<PathBuf> for Location {
    fn from(path: PathBuf) -> Self {
        Location::Path(path)
    }
}

impl From<&Path> for Location {
    fn from(path: &Path) -> Self {
        Location::Path(path.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_from_url() {
        let loc: Location = "http://example.com/schema.xsd".parse().unwrap();
        assert!(matches!(loc, Location::Url(_)));
        assert_eq!(loc.as_path(), None);
    }

    #[test]
    fn test_location_from_path() {
        let loc: Location = "/tmp/schema.xsd".parse().unwrap();
        assert_eq!(loc.as_path(), Some(Path::new("/tmp/schema.xsd")));
    }

    #[cfg(unix)]
    #[test]
    fn test_file_url_becomes_path() {
        let loc: Location = "file:///tmp/schema.xsd".parse().unwrap();
        assert_eq!(loc, Location::Path(PathBuf::from("/tmp/schema.xsd")));
    }

    #[test]
    fn test_join_relative_path() {
        let base = Location::Path(PathBuf::from("/schemas/main.xsd"));
        let joined = base.join("types/common.xsd").unwrap();
        assert_eq!(joined, Location::Path(PathBuf::from("/schemas/types/common.xsd")));
    }

    #[test]
    fn test_join_absolute_path_unchanged() {
        let base = Location::Path(PathBuf::from("/schemas/main.xsd"));
        let joined = base.join("/other/common.xsd").unwrap();
        assert_eq!(joined, Location::Path(PathBuf::from("/other/common.xsd")));
    }

    #[test]
    fn test_join_against_url() {
        let base: Location = "http://example.com/xsd/main.xsd".parse().unwrap();
        let joined = base.join("common.xsd").unwrap();
        assert_eq!(joined.to_string(), "http://example.com/xsd/common.xsd");
    }

    #[cfg(unix)]
    #[test]
    fn test_system_id_for_path() {
        let loc = Location::Path(PathBuf::from("/schemas/main.xsd"));
        assert_eq!(loc.system_id(), "file:///schemas/main.xsd");
    }
}
