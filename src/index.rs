//! Namespace index construction
//!
//! A [`NamespaceIndex`] maps each schema document's declared
//! `targetNamespace` to the document's canonical path. It is built once,
//! from a single scan of one directory, and is read-only afterwards.
//!
//! ```rust,ignore
//! use exi_schema_resolver::index::{DuplicatePolicy, IndexBuilder, IndexOptions};
//!
//! let index = IndexBuilder::new("schemas/")
//!     .with_options(IndexOptions::default().with_duplicates(DuplicatePolicy::Reject))
//!     .catalog("schemas/catalog.xml")
//!     .build()?;
//! ```

use std::ffi::OsStr;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::Serialize;

use crate::catalog::XmlCatalog;
use crate::documents::RootScan;
use crate::error::{ConfigurationError, Error, Result};
use crate::limits::Limits;
use crate::loaders::Loader;
use crate::locations::Location;

/// Namespace identity and location of one indexed document
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentDescriptor {
    /// Declared `targetNamespace`, `""` for no namespace
    pub namespace: String,
    /// Canonical absolute path
    pub path: PathBuf,
}

/// Where an index entry came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryOrigin {
    /// Root declaration of a scanned document
    Document,
    /// Public identifier from a catalog or registered explicitly
    Catalog,
}

/// A single index entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexEntry {
    /// Canonical path of the target document
    pub path: PathBuf,
    /// Origin of the mapping
    pub origin: EntryOrigin,
}

/// What to do when two entries claim the same key
///
/// Documents are indexed in file-name order, so every policy is
/// reproducible across platforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicatePolicy {
    /// Keep the first entry, log the later ones
    #[default]
    FirstWins,
    /// Keep the last entry, log the replaced ones
    LastWins,
    /// Fail with [`Error::DuplicateNamespace`]
    Reject,
}

impl std::str::FromStr for DuplicatePolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "first" | "first-wins" => Ok(DuplicatePolicy::FirstWins),
            "last" | "last-wins" => Ok(DuplicatePolicy::LastWins),
            "reject" | "error" => Ok(DuplicatePolicy::Reject),
            other => Err(format!("Unknown duplicate policy: {}. Use: first, last, reject", other)),
        }
    }
}

/// Options for [`IndexBuilder`]
#[derive(Debug, Clone)]
pub struct IndexOptions {
    /// Eligible file extensions, without the dot; matched case-sensitively
    pub extensions: Vec<String>,
    /// Conflict handling for repeated keys
    pub duplicates: DuplicatePolicy,
    /// Parse each document completely instead of stopping at the root tag
    pub verify_well_formed: bool,
    /// Resource limits
    pub limits: Limits,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            extensions: vec![crate::DEFAULT_EXTENSION.to_string()],
            duplicates: DuplicatePolicy::default(),
            verify_well_formed: false,
            limits: Limits::default(),
        }
    }
}

impl IndexOptions {
    /// Replace the eligible extensions
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    /// Set the duplicate policy
    pub fn with_duplicates(mut self, policy: DuplicatePolicy) -> Self {
        self.duplicates = policy;
        self
    }

    /// Require every document to be well-formed, not only its root tag
    pub fn with_verify_well_formed(mut self, verify: bool) -> Self {
        self.verify_well_formed = verify;
        self
    }

    /// Set the limits
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    fn is_eligible(&self, path: &Path) -> bool {
        path.extension()
            .and_then(OsStr::to_str)
            .is_some_and(|ext| self.extensions.iter().any(|e| e == ext))
    }
}

/// Immutable mapping from namespace (or public identifier) to document path
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NamespaceIndex {
    directory: PathBuf,
    entries: IndexMap<String, IndexEntry>,
}

impl NamespaceIndex {
    /// Build an index over `directory` with default options
    pub fn from_directory(directory: impl AsRef<Path>) -> Result<Self> {
        IndexBuilder::new(directory).build()
    }

    /// Start configuring an index build
    pub fn builder(directory: impl AsRef<Path>) -> IndexBuilder {
        IndexBuilder::new(directory)
    }

    /// Build an index from already known descriptors, e.g. an in-memory set
    pub fn from_descriptors<I>(directory: impl Into<PathBuf>, descriptors: I, policy: DuplicatePolicy) -> Result<Self>
    where
        I: IntoIterator<Item = DocumentDescriptor>,
    {
        let mut entries = IndexMap::new();
        for descriptor in descriptors {
            insert_entry(&mut entries, descriptor.namespace, descriptor.path, EntryOrigin::Document, policy)?;
        }
        Ok(Self {
            directory: directory.into(),
            entries,
        })
    }

    /// Path indexed under `key`
    pub fn get(&self, key: &str) -> Option<&Path> {
        self.entries.get(key).map(|e| e.path.as_path())
    }

    /// Full entry indexed under `key`
    pub fn entry(&self, key: &str) -> Option<&IndexEntry> {
        self.entries.get(key)
    }

    /// Whether `key` is indexed
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the index has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &IndexEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Indexed keys in insertion order
    pub fn namespaces(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Entries that came from document root declarations
    pub fn documents(&self) -> impl Iterator<Item = DocumentDescriptor> + '_ {
        self.entries
            .iter()
            .filter(|(_, e)| e.origin == EntryOrigin::Document)
            .map(|(ns, e)| DocumentDescriptor {
                namespace: ns.clone(),
                path: e.path.clone(),
            })
    }

    /// Canonical directory the index was built from
    pub fn directory(&self) -> &Path {
        &self.directory
    }
}

/// Builder for a [`NamespaceIndex`]
#[derive(Debug, Clone)]
pub struct IndexBuilder {
    directory: PathBuf,
    options: IndexOptions,
    catalogs: Vec<PathBuf>,
    public_ids: Vec<(String, PathBuf)>,
}

impl IndexBuilder {
    /// Index the documents directly under `directory`
    pub fn new(directory: impl AsRef<Path>) -> Self {
        Self {
            directory: directory.as_ref().to_path_buf(),
            options: IndexOptions::default(),
            catalogs: Vec::new(),
            public_ids: Vec::new(),
        }
    }

    /// Set the options
    pub fn with_options(mut self, options: IndexOptions) -> Self {
        self.options = options;
        self
    }

    /// Merge the entries of an XML catalog after the documents
    pub fn catalog(mut self, path: impl AsRef<Path>) -> Self {
        self.catalogs.push(path.as_ref().to_path_buf());
        self
    }

    /// Register a public identifier for a document outside the directory scan
    pub fn public_identifier(mut self, public_id: impl Into<String>, path: impl AsRef<Path>) -> Self {
        self.public_ids.push((public_id.into(), path.as_ref().to_path_buf()));
        self
    }

    /// Scan the directory and build the index
    pub fn build(self) -> Result<NamespaceIndex> {
        let directory = check_directory(&self.directory)?;
        let documents = self.eligible_documents(&directory)?;
        let loader = Loader::new().with_limits(self.options.limits.clone());
        let policy = self.options.duplicates;

        let mut entries = IndexMap::new();
        for path in &documents {
            let descriptor = self.describe(&loader, path)?;
            tracing::info!(
                namespace = %descriptor.namespace,
                path = %descriptor.path.display(),
                "found namespace"
            );
            insert_entry(&mut entries, descriptor.namespace, descriptor.path, EntryOrigin::Document, policy)?;
            self.options.limits.check_index_entries(entries.len())?;
        }

        for catalog_path in &self.catalogs {
            let catalog = XmlCatalog::from_file_with_loader(catalog_path, &loader)?;
            if catalog.is_empty() {
                tracing::warn!(catalog = %catalog_path.display(), "catalog has no entries");
            }
            for (id, target) in catalog.entries() {
                let target = canonical_file(target)?;
                tracing::info!(public_id = %id, path = %target.display(), "catalog entry");
                insert_entry(&mut entries, id.to_string(), target, EntryOrigin::Catalog, policy)?;
                self.options.limits.check_index_entries(entries.len())?;
            }
        }

        for (id, target) in &self.public_ids {
            let target = canonical_file(target)?;
            tracing::info!(public_id = %id, path = %target.display(), "public identifier");
            insert_entry(&mut entries, id.clone(), target, EntryOrigin::Catalog, policy)?;
            self.options.limits.check_index_entries(entries.len())?;
        }

        tracing::debug!(
            directory = %directory.display(),
            documents = documents.len(),
            entries = entries.len(),
            "namespace index built"
        );

        Ok(NamespaceIndex { directory, entries })
    }

    /// Eligible files directly under `directory`, sorted by file name
    fn eligible_documents(&self, directory: &Path) -> Result<Vec<PathBuf>> {
        let mut documents = Vec::new();
        for entry in fs::read_dir(directory)? {
            let path = entry?.path();
            if path.is_file() && self.options.is_eligible(&path) {
                documents.push(path);
            }
        }

        if documents.is_empty() {
            return Err(ConfigurationError::NoDocuments {
                directory: directory.to_path_buf(),
                extensions: self.options.extensions.join(", "),
            }
            .into());
        }

        documents.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        Ok(documents)
    }

    /// Read one document's namespace identity
    fn describe(&self, loader: &Loader, path: &Path) -> Result<DocumentDescriptor> {
        let canonical = canonical_file(path)?;

        let scan = if self.options.verify_well_formed {
            let bytes = loader.load_bytes(&Location::Path(canonical.clone()))?;
            RootScan::scan_well_formed(&bytes)
        } else {
            // The reader, and with it the file handle, is dropped here
            RootScan::scan_reader(loader.open_path(&canonical)?)
        }
        .map_err(|e| e.into_malformed(&canonical))?;

        Ok(DocumentDescriptor {
            namespace: scan.target_namespace().to_string(),
            path: canonical,
        })
    }
}

fn check_directory(directory: &Path) -> Result<PathBuf> {
    let meta = match fs::metadata(directory) {
        Ok(meta) => meta,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(ConfigurationError::MissingDirectory(directory.to_path_buf()).into());
        }
        Err(e) => return Err(e.into()),
    };
    if !meta.is_dir() {
        return Err(ConfigurationError::NotADirectory(directory.to_path_buf()).into());
    }
    Ok(directory.canonicalize()?)
}

fn canonical_file(path: &Path) -> Result<PathBuf> {
    path.canonicalize()
        .map_err(|e| Error::Resource(format!("Failed to resolve '{}': {}", path.display(), e)))
}

fn insert_entry(
    entries: &mut IndexMap<String, IndexEntry>,
    key: String,
    path: PathBuf,
    origin: EntryOrigin,
    policy: DuplicatePolicy,
) -> Result<()> {
    let Some(existing) = entries.get_mut(&key) else {
        entries.insert(key, IndexEntry { path, origin });
        return Ok(());
    };

    if existing.path == path {
        return Ok(());
    }

    match policy {
        DuplicatePolicy::FirstWins => {
            tracing::warn!(
                namespace = %key,
                kept = %existing.path.display(),
                ignored = %path.display(),
                "duplicate namespace, keeping first"
            );
        }
        DuplicatePolicy::LastWins => {
            tracing::warn!(
                namespace = %key,
                replaced = %existing.path.display(),
                kept = %path.display(),
                "duplicate namespace, keeping last"
            );
            *existing = IndexEntry { path, origin };
        }
        DuplicatePolicy::Reject => {
            return Err(Error::DuplicateNamespace {
                namespace: key,
                first: existing.path.clone(),
                second: path,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn schema(ns: Option<&str>) -> String {
        let tns = ns.map(|ns| format!(r#" targetNamespace="{}""#, ns)).unwrap_or_default();
        format!(r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"{}/>"#, tns)
    }

    fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path.canonicalize().unwrap()
    }

    #[test]
    fn test_index_maps_namespaces_to_paths() {
        let dir = TempDir::new().unwrap();
        let a = write(&dir, "a.xsd", &schema(Some("urn:a")));
        let b = write(&dir, "b.xsd", &schema(Some("urn:b")));

        let index = NamespaceIndex::from_directory(dir.path()).unwrap();

        assert_eq!(index.len(), 2);
        assert_eq!(index.get("urn:a"), Some(a.as_path()));
        assert_eq!(index.get("urn:b"), Some(b.as_path()));
        assert_eq!(index.directory(), dir.path().canonicalize().unwrap());
    }

    #[test]
    fn test_missing_target_namespace_is_empty_key() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "plain.xsd", &schema(None));

        let index = NamespaceIndex::from_directory(dir.path()).unwrap();
        assert_eq!(index.get(""), Some(path.as_path()));
    }

    #[test]
    fn test_ineligible_files_and_subdirectories_ignored() {
        let dir = TempDir::new().unwrap();
        write(&dir, "a.xsd", &schema(Some("urn:a")));
        write(&dir, "notes.txt", "not xml at all <");
        write(&dir, "upper.XSD", &schema(Some("urn:upper")));
        fs::create_dir(dir.path().join("nested.xsd")).unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub").join("deep.xsd"), schema(Some("urn:deep"))).unwrap();

        let index = NamespaceIndex::from_directory(dir.path()).unwrap();
        assert_eq!(index.namespaces().collect::<Vec<_>>(), ["urn:a"]);
    }

    #[test]
    fn test_custom_extensions() {
        let dir = TempDir::new().unwrap();
        write(&dir, "a.xsd", &schema(Some("urn:a")));
        write(&dir, "b.xml", &schema(Some("urn:b")));

        let index = IndexBuilder::new(dir.path())
            .with_options(IndexOptions::default().with_extensions(["xsd", "xml"]))
            .build()
            .unwrap();
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_missing_directory_is_configuration_error() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope");

        let err = NamespaceIndex::from_directory(&missing).unwrap_err();
        assert!(matches!(
            err,
            Error::Configuration(ConfigurationError::MissingDirectory(_))
        ));
    }

    #[test]
    fn test_file_is_not_a_directory() {
        let dir = TempDir::new().unwrap();
        let file = write(&dir, "a.xsd", &schema(Some("urn:a")));

        let err = NamespaceIndex::from_directory(&file).unwrap_err();
        assert!(matches!(
            err,
            Error::Configuration(ConfigurationError::NotADirectory(_))
        ));
    }

    #[test]
    fn test_empty_directory_is_configuration_error() {
        let dir = TempDir::new().unwrap();
        write(&dir, "readme.md", "# nothing here");

        let err = NamespaceIndex::from_directory(dir.path()).unwrap_err();
        assert!(matches!(
            err,
            Error::Configuration(ConfigurationError::NoDocuments { .. })
        ));
    }

    #[test]
    fn test_malformed_document_aborts_build() {
        let dir = TempDir::new().unwrap();
        write(&dir, "a.xsd", &schema(Some("urn:a")));
        write(&dir, "b.xsd", "<xs:schema targetNamespace=");

        let err = NamespaceIndex::from_directory(dir.path()).unwrap_err();
        match err {
            Error::MalformedDocument(e) => {
                assert!(e.location.unwrap().ends_with("b.xsd"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_well_formed_verification() {
        let dir = TempDir::new().unwrap();
        write(&dir, "a.xsd", r#"<schema targetNamespace="urn:a"><unclosed></schema>"#);

        // Root-only scanning accepts the document
        assert!(NamespaceIndex::from_directory(dir.path()).is_ok());

        let err = IndexBuilder::new(dir.path())
            .with_options(IndexOptions::default().with_verify_well_formed(true))
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::MalformedDocument(_)));
    }

    #[test]
    fn test_duplicate_first_wins_by_file_name() {
        let dir = TempDir::new().unwrap();
        let first = write(&dir, "a_first.xsd", &schema(Some("urn:dup")));
        write(&dir, "b_second.xsd", &schema(Some("urn:dup")));

        let index = NamespaceIndex::from_directory(dir.path()).unwrap();
        assert_eq!(index.get("urn:dup"), Some(first.as_path()));
    }

    #[test]
    fn test_duplicate_last_wins() {
        let dir = TempDir::new().unwrap();
        write(&dir, "a_first.xsd", &schema(Some("urn:dup")));
        let last = write(&dir, "b_second.xsd", &schema(Some("urn:dup")));

        let index = IndexBuilder::new(dir.path())
            .with_options(IndexOptions::default().with_duplicates(DuplicatePolicy::LastWins))
            .build()
            .unwrap();
        assert_eq!(index.get("urn:dup"), Some(last.as_path()));
    }

    #[test]
    fn test_duplicate_reject() {
        let dir = TempDir::new().unwrap();
        write(&dir, "a_first.xsd", &schema(Some("urn:dup")));
        write(&dir, "b_second.xsd", &schema(Some("urn:dup")));

        let err = IndexBuilder::new(dir.path())
            .with_options(IndexOptions::default().with_duplicates(DuplicatePolicy::Reject))
            .build()
            .unwrap_err();
        match err {
            Error::DuplicateNamespace { namespace, first, second } => {
                assert_eq!(namespace, "urn:dup");
                assert!(first.ends_with("a_first.xsd"));
                assert!(second.ends_with("b_second.xsd"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_public_identifiers_and_catalogs() {
        let dir = TempDir::new().unwrap();
        write(&dir, "a.xsd", &schema(Some("urn:a")));
        let dtd = write(&dir, "XMLSchema.dtd", "<!ELEMENT schema ANY>");
        let datatypes = write(&dir, "datatypes.dtd", "<!ENTITY % p ''>");
        let catalog = write(
            &dir,
            "catalog.xml",
            r#"<catalog xmlns="urn:oasis:names:tc:entity:xmlns:xml:catalog">
  <public publicId="-//W3C//DTD XMLSCHEMA 200102//EN" uri="XMLSchema.dtd"/>
</catalog>"#,
        );

        let index = IndexBuilder::new(dir.path())
            .catalog(&catalog)
            .public_identifier("datatypes", &datatypes)
            .build()
            .unwrap();

        assert_eq!(index.get("-//W3C//DTD XMLSCHEMA 200102//EN"), Some(dtd.as_path()));
        assert_eq!(index.get("datatypes"), Some(datatypes.as_path()));
        assert_eq!(index.entry("datatypes").unwrap().origin, EntryOrigin::Catalog);
        assert_eq!(index.documents().count(), 1);
    }

    #[test]
    fn test_index_entry_limit() {
        let dir = TempDir::new().unwrap();
        write(&dir, "a.xsd", &schema(Some("urn:a")));
        write(&dir, "b.xsd", &schema(Some("urn:b")));

        let limits = Limits {
            max_index_entries: 1,
            ..Limits::default()
        };
        let err = IndexBuilder::new(dir.path())
            .with_options(IndexOptions::default().with_limits(limits))
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::LimitExceeded(_)));
    }

    #[test]
    fn test_from_descriptors() {
        let index = NamespaceIndex::from_descriptors(
            "/virtual",
            vec![
                DocumentDescriptor { namespace: "urn:a".into(), path: "/virtual/a.xsd".into() },
                DocumentDescriptor { namespace: "urn:a".into(), path: "/virtual/b.xsd".into() },
            ],
            DuplicatePolicy::FirstWins,
        )
        .unwrap();
        assert_eq!(index.get("urn:a"), Some(Path::new("/virtual/a.xsd")));
    }

    #[test]
    fn test_duplicate_policy_from_str() {
        assert_eq!("first".parse::<DuplicatePolicy>().unwrap(), DuplicatePolicy::FirstWins);
        assert_eq!("LAST".parse::<DuplicatePolicy>().unwrap(), DuplicatePolicy::LastWins);
        assert_eq!("reject".parse::<DuplicatePolicy>().unwrap(), DuplicatePolicy::Reject);
        assert_eq!(
            "sometimes".parse::<DuplicatePolicy>(),
            Err("Unknown duplicate policy: sometimes. Use: first, last, reject".to_string())
        );
    }
}
