//! XML Catalog support for public identifier entries
//!
//! Schema sets that still reference DTDs or legacy documents by public
//! identifier (e.g. `-//W3C//DTD XMLSCHEMA 200102//EN`) can map those
//! identifiers to local files through an OASIS XML catalog. The entries are
//! merged into the namespace index, where the resolver consults them when a
//! reference carries no namespace.
//!
//! XML Catalogs are defined by OASIS:
//! https://www.oasis-open.org/committees/entity/spec-2001-08-06.html
//!
//! # Supported Elements
//!
//! - `<catalog>` - Root element
//! - `<group>` - Grouping element (honours `xml:base`)
//! - `<public>` - Maps public identifiers to URIs
//! - `<system>` - Maps system identifiers to URIs
//! - `<uri>` - Maps URN names to URIs
//! - `<nextCatalog>` - Includes another catalog file
//!
//! # Example
//!
//! ```xml
//! <catalog xmlns="urn:oasis:names:tc:entity:xmlns:xml:catalog">
//!   <public publicId="-//W3C//DTD XMLSCHEMA 200102//EN" uri="XMLSchema.dtd"/>
//!   <nextCatalog catalog="legacy/catalog.xml"/>
//! </catalog>
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;

use crate::documents::{Document, Element};
use crate::error::{Error, ParseError, Result};
use crate::loaders::Loader;
use crate::locations::Location;
use crate::namespaces::{QName, XML_NAMESPACE};

/// The XML Catalog namespace
pub const CATALOG_NS: &str = "urn:oasis:names:tc:entity:xmlns:xml:catalog";

/// XML Catalog mapping identifiers to local files
#[derive(Debug, Clone, Default)]
pub struct XmlCatalog {
    /// Public ID to path mappings (publicId -> uri)
    public_mappings: IndexMap<String, PathBuf>,
    /// System ID to path mappings (systemId -> uri)
    system_mappings: IndexMap<String, PathBuf>,
    /// URI name to path mappings (name -> uri)
    uri_mappings: IndexMap<String, PathBuf>,
}

impl XmlCatalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a catalog from a file
    ///
    /// This will recursively load any catalogs referenced via `<nextCatalog>`.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_file_with_loader(path, &Loader::new())
    }

    /// Load a catalog from a file through a configured loader
    pub fn from_file_with_loader(path: impl AsRef<Path>, loader: &Loader) -> Result<Self> {
        let mut catalog = Self::new();
        let mut visited = HashSet::new();
        catalog.load_into(path.as_ref(), loader, &mut visited)?;
        Ok(catalog)
    }

    fn load_into(&mut self, path: &Path, loader: &Loader, visited: &mut HashSet<PathBuf>) -> Result<()> {
        let canonical = path.canonicalize().map_err(|e| {
            Error::Resource(format!("Failed to read catalog '{}': {}", path.display(), e))
        })?;
        if !visited.insert(canonical.clone()) {
            tracing::debug!(catalog = %canonical.display(), "catalog already loaded, skipping");
            return Ok(());
        }

        let content = loader.load(&Location::Path(canonical.clone()))?;
        let doc = Document::from_string(&content).map_err(|e| {
            Error::Parse(ParseError::new(e.to_string()).with_location(canonical.display().to_string()))
        })?;
        let root = doc.root().ok_or_else(|| Error::Parse(ParseError::new("Empty catalog document")))?;

        if root.local_name() != "catalog" {
            return Err(Error::Parse(
                ParseError::new(format!("Expected catalog root element, got {}", root.local_name()))
                    .with_location(canonical.display().to_string()),
            ));
        }

        let base_dir = canonical.parent().map(Path::to_path_buf).unwrap_or_default();
        self.process_catalog_children(&root.children, &base_dir, loader, visited)
    }

    /// Process children of a catalog or group element
    fn process_catalog_children(
        &mut self,
        children: &[Element],
        base_dir: &Path,
        loader: &Loader,
        visited: &mut HashSet<PathBuf>,
    ) -> Result<()> {
        for child in children {
            if child.namespace().is_some_and(|ns| ns != CATALOG_NS) {
                continue;
            }
            match child.local_name() {
                "public" => {
                    if let (Some(id), Some(uri)) = (child.get_attribute("publicId"), child.get_attribute("uri")) {
                        self.public_mappings.insert(id.to_string(), base_dir.join(uri));
                    }
                }
                "system" => {
                    if let (Some(id), Some(uri)) = (child.get_attribute("systemId"), child.get_attribute("uri")) {
                        self.system_mappings.insert(id.to_string(), base_dir.join(uri));
                    }
                }
                "uri" => {
                    if let (Some(name), Some(uri)) = (child.get_attribute("name"), child.get_attribute("uri")) {
                        self.uri_mappings.insert(name.to_string(), base_dir.join(uri));
                    }
                }
                "nextCatalog" => {
                    if let Some(catalog_path) = child.get_attribute("catalog") {
                        self.load_into(&base_dir.join(catalog_path), loader, visited)?;
                    }
                }
                "group" => {
                    let xml_base = QName::namespaced(XML_NAMESPACE, "base");
                    let group_base = match child.get_attribute_qname(&xml_base) {
                        Some(rel) => base_dir.join(rel),
                        None => base_dir.to_path_buf(),
                    };
                    self.process_catalog_children(&child.children, &group_base, loader, visited)?;
                }
                _ => {
                    // Skip unknown elements (annotations, etc.)
                }
            }
        }

        Ok(())
    }

    /// All entries usable as index keys: public, then system, then URI names
    pub fn entries(&self) -> impl Iterator<Item = (&str, &Path)> {
        self.public_mappings
            .iter()
            .chain(self.system_mappings.iter())
            .chain(self.uri_mappings.iter())
            .map(|(k, v)| (k.as_str(), v.as_path()))
    }

    /// Check if this catalog is empty (has no mappings)
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get the number of mappings
    pub fn len(&self) -> usize {
        self.public_mappings.len() + self.system_mappings.len() + self.uri_mappings.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn lookup<'a>(catalog: &'a XmlCatalog, identifier: &str) -> Option<&'a Path> {
        catalog.entries().find(|(k, _)| *k == identifier).map(|(_, v)| v)
    }

    #[test]
    fn test_parse_simple_catalog() {
        let catalog_xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<catalog xmlns="urn:oasis:names:tc:entity:xmlns:xml:catalog">
    <public publicId="-//W3C//DTD XMLSCHEMA 200102//EN" uri="XMLSchema.dtd"/>
    <system systemId="urn:example:schema.xsd" uri="schemas/schema.xsd"/>
    <uri name="urn:example:types.xsd" uri="schemas/types.xsd"/>
</catalog>"#;

        let temp_dir = TempDir::new().unwrap();
        let catalog_path = temp_dir.path().join("catalog.xml");
        std::fs::write(&catalog_path, catalog_xml).unwrap();

        let catalog = XmlCatalog::from_file(&catalog_path).unwrap();

        assert_eq!(catalog.len(), 3);
        let keys: Vec<_> = catalog.entries().map(|(k, _)| k).collect();
        assert_eq!(
            keys,
            ["-//W3C//DTD XMLSCHEMA 200102//EN", "urn:example:schema.xsd", "urn:example:types.xsd"]
        );
        assert!(lookup(&catalog, "-//W3C//DTD XMLSCHEMA 200102//EN")
            .unwrap()
            .ends_with("XMLSchema.dtd"));
        assert!(lookup(&catalog, "urn:example:schema.xsd").unwrap().ends_with("schemas/schema.xsd"));
        assert!(lookup(&catalog, "urn:example:types.xsd").unwrap().ends_with("schemas/types.xsd"));
        assert!(lookup(&catalog, "urn:example:not-found.xsd").is_none());
    }

    #[test]
    fn test_nested_catalogs() {
        let temp_dir = TempDir::new().unwrap();

        let main_catalog = r#"<catalog xmlns="urn:oasis:names:tc:entity:xmlns:xml:catalog">
    <public publicId="-//MAIN//EN" uri="main.dtd"/>
    <nextCatalog catalog="sub/catalog.xml"/>
</catalog>"#;

        let sub_dir = temp_dir.path().join("sub");
        std::fs::create_dir_all(&sub_dir).unwrap();

        let sub_catalog = r#"<catalog xmlns="urn:oasis:names:tc:entity:xmlns:xml:catalog">
    <public publicId="-//SUB//EN" uri="sub.dtd"/>
    <nextCatalog catalog="../catalog.xml"/>
</catalog>"#;

        std::fs::write(temp_dir.path().join("catalog.xml"), main_catalog).unwrap();
        std::fs::write(sub_dir.join("catalog.xml"), sub_catalog).unwrap();

        // The cycle back to the main catalog is cut
        let catalog = XmlCatalog::from_file(temp_dir.path().join("catalog.xml")).unwrap();

        assert_eq!(catalog.len(), 2);
        assert!(lookup(&catalog, "-//SUB//EN").unwrap().ends_with("sub/sub.dtd"));
    }

    #[test]
    fn test_broken_next_catalog_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let main_catalog = r#"<catalog xmlns="urn:oasis:names:tc:entity:xmlns:xml:catalog">
    <nextCatalog catalog="missing.xml"/>
</catalog>"#;
        let path = temp_dir.path().join("catalog.xml");
        std::fs::write(&path, main_catalog).unwrap();

        assert!(matches!(XmlCatalog::from_file(&path), Err(Error::Resource(_))));
    }

    #[test]
    fn test_group_with_xml_base() {
        let catalog_xml = r#"<catalog xmlns="urn:oasis:names:tc:entity:xmlns:xml:catalog">
    <group xml:base="dtds/">
        <public publicId="-//GROUPED//EN" uri="grouped.dtd"/>
    </group>
</catalog>"#;

        let temp_dir = TempDir::new().unwrap();
        let catalog_path = temp_dir.path().join("catalog.xml");
        std::fs::write(&catalog_path, catalog_xml).unwrap();

        let catalog = XmlCatalog::from_file(&catalog_path).unwrap();

        assert_eq!(catalog.len(), 1);
        assert!(lookup(&catalog, "-//GROUPED//EN").unwrap().ends_with("dtds/grouped.dtd"));
    }

    #[test]
    fn test_wrong_root_element() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("catalog.xml");
        std::fs::write(&path, "<notacatalog/>").unwrap();

        assert!(matches!(XmlCatalog::from_file(&path), Err(Error::Parse(_))));
    }
}
