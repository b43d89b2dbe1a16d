//! Entity resolution against a namespace index
//!
//! The grammar compiler asks an [`EntityResolver`] where to read each
//! cross-document reference from. Every request maps to exactly one
//! [`Resolution`]:
//!
//! | namespace | public id | index hit | outcome        |
//! |-----------|-----------|-----------|----------------|
//! | non-empty | any       | yes       | `Resolved`     |
//! | non-empty | any       | no        | `Unresolved`   |
//! | empty     | non-empty | yes / no  | `Resolved` / `Unresolved` |
//! | empty     | empty     | -         | `Skip`         |
//!
//! A miss is a value, not an error; the caller decides whether it matters.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::Result;
use crate::index::NamespaceIndex;

/// A reference the compiler wants located
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ResolutionRequest {
    /// Namespace of the referenced document (`xs:import/@namespace`)
    pub namespace: Option<String>,
    /// Legacy public identifier
    pub public_id: Option<String>,
    /// System id of the document containing the reference
    pub base_location: Option<String>,
    /// Location hint as written in the reference (`schemaLocation`);
    /// carried for the caller's fallback, never used as a key
    pub literal_system_id: Option<String>,
}

impl ResolutionRequest {
    /// An empty request
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the namespace
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Set the public identifier
    pub fn with_public_id(mut self, public_id: impl Into<String>) -> Self {
        self.public_id = Some(public_id.into());
        self
    }

    /// Set the base location
    pub fn with_base_location(mut self, base: impl Into<String>) -> Self {
        self.base_location = Some(base.into());
        self
    }

    /// Set the literal system id
    pub fn with_literal_system_id(mut self, system_id: impl Into<String>) -> Self {
        self.literal_system_id = Some(system_id.into());
        self
    }

    /// The lookup key: non-empty namespace, else non-empty public id
    pub fn key(&self) -> Option<ResolutionKey> {
        if let Some(ns) = self.namespace.as_deref().filter(|ns| !ns.is_empty()) {
            return Some(ResolutionKey::Namespace(ns.to_string()));
        }
        self.public_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .map(|id| ResolutionKey::PublicId(id.to_string()))
    }
}

impl fmt::Display for ResolutionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "namespace={:?} publicId={:?} base={:?} literal={:?}",
            self.namespace, self.public_id, self.base_location, self.literal_system_id
        )
    }
}

/// Which request field selected the index entry
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResolutionKey {
    /// Looked up by namespace
    Namespace(String),
    /// Looked up by public identifier
    PublicId(String),
}

impl ResolutionKey {
    /// The key string
    pub fn as_str(&self) -> &str {
        match self {
            ResolutionKey::Namespace(k) | ResolutionKey::PublicId(k) => k,
        }
    }
}

impl fmt::Display for ResolutionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolutionKey::Namespace(ns) => write!(f, "namespace '{}'", ns),
            ResolutionKey::PublicId(id) => write!(f, "public id '{}'", id),
        }
    }
}

/// A successful lookup
///
/// Only the location changes; the reference's identity metadata is
/// passed through untouched.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResolvedEntity {
    /// Key that matched
    pub key: ResolutionKey,
    /// Canonical path to read from
    pub system_id: PathBuf,
    /// Public identifier of the request
    pub public_id: Option<String>,
    /// Base location of the request
    pub base_location: Option<String>,
}

/// Outcome of one resolution request
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Resolution {
    /// No namespace and no public id: not a reference for this mechanism
    Skip,
    /// The key matched an index entry
    Resolved(ResolvedEntity),
    /// A key was present but nothing is indexed under it
    Unresolved {
        /// Key that missed
        key: ResolutionKey,
    },
}

impl Resolution {
    /// Whether this is `Skip`
    pub fn is_skip(&self) -> bool {
        matches!(self, Resolution::Skip)
    }

    /// Whether this is `Resolved`
    pub fn is_resolved(&self) -> bool {
        matches!(self, Resolution::Resolved(_))
    }

    /// Whether this is `Unresolved`
    pub fn is_unresolved(&self) -> bool {
        matches!(self, Resolution::Unresolved { .. })
    }

    /// Target location of a resolved request
    pub fn system_id(&self) -> Option<&Path> {
        match self {
            Resolution::Resolved(entity) => Some(&entity.system_id),
            _ => None,
        }
    }

    /// The resolved entity, if any
    pub fn into_resolved(self) -> Option<ResolvedEntity> {
        match self {
            Resolution::Resolved(entity) => Some(entity),
            _ => None,
        }
    }
}

/// Answers resolution requests during schema compilation
///
/// Implementations must be pure: equal requests yield equal results for the
/// lifetime of the resolver.
pub trait EntityResolver {
    /// Locate the document a request refers to
    fn resolve(&self, request: &ResolutionRequest) -> Resolution;
}

impl<R: EntityResolver + ?Sized> EntityResolver for &R {
    fn resolve(&self, request: &ResolutionRequest) -> Resolution {
        (**self).resolve(request)
    }
}

impl<R: EntityResolver + ?Sized> EntityResolver for Box<R> {
    fn resolve(&self, request: &ResolutionRequest) -> Resolution {
        (**self).resolve(request)
    }
}

impl<R: EntityResolver + ?Sized> EntityResolver for Arc<R> {
    fn resolve(&self, request: &ResolutionRequest) -> Resolution {
        (**self).resolve(request)
    }
}

/// Resolver backed by a [`NamespaceIndex`]
#[derive(Debug, Clone)]
pub struct NamespaceResolver {
    index: Arc<NamespaceIndex>,
}

impl NamespaceResolver {
    /// Wrap a built index
    pub fn new(index: impl Into<Arc<NamespaceIndex>>) -> Self {
        Self { index: index.into() }
    }

    /// Build an index over `directory` with default options and wrap it
    pub fn from_directory(directory: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(NamespaceIndex::from_directory(directory)?))
    }

    /// The underlying index
    pub fn index(&self) -> &NamespaceIndex {
        &self.index
    }
}

impl EntityResolver for NamespaceResolver {
    fn resolve(&self, request: &ResolutionRequest) -> Resolution {
        let Some(key) = request.key() else {
            tracing::debug!(%request, "skipping lookup without namespace or public id");
            return Resolution::Skip;
        };

        match self.index.get(key.as_str()) {
            Some(path) => {
                tracing::info!(%key, location = %path.display(), "resolved");
                Resolution::Resolved(ResolvedEntity {
                    key,
                    system_id: path.to_path_buf(),
                    public_id: request.public_id.clone(),
                    base_location: request.base_location.clone(),
                })
            }
            None => {
                tracing::warn!(%key, "unable to resolve");
                Resolution::Unresolved { key }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{DocumentDescriptor, DuplicatePolicy};
    use pretty_assertions::assert_eq;

    fn resolver() -> NamespaceResolver {
        let index = NamespaceIndex::from_descriptors(
            "/schemas",
            vec![
                DocumentDescriptor { namespace: "urn:a".into(), path: "/schemas/a.xsd".into() },
                DocumentDescriptor { namespace: "".into(), path: "/schemas/plain.xsd".into() },
                DocumentDescriptor { namespace: "-//LEGACY//EN".into(), path: "/schemas/legacy.dtd".into() },
            ],
            DuplicatePolicy::FirstWins,
        )
        .unwrap();
        NamespaceResolver::new(index)
    }

    #[test]
    fn test_key_prefers_namespace() {
        let request = ResolutionRequest::new().with_namespace("urn:a").with_public_id("-//X//EN");
        assert_eq!(request.key(), Some(ResolutionKey::Namespace("urn:a".into())));
    }

    #[test]
    fn test_key_falls_back_to_public_id() {
        let request = ResolutionRequest::new().with_namespace("").with_public_id("-//X//EN");
        assert_eq!(request.key(), Some(ResolutionKey::PublicId("-//X//EN".into())));
    }

    #[test]
    fn test_no_key() {
        assert_eq!(ResolutionRequest::new().key(), None);
        assert_eq!(ResolutionRequest::new().with_namespace("").with_public_id("").key(), None);
    }

    #[test]
    fn test_resolved_keeps_request_metadata() {
        let request = ResolutionRequest::new()
            .with_namespace("urn:a")
            .with_public_id("-//A//EN")
            .with_base_location("file:///schemas/main.xsd")
            .with_literal_system_id("somewhere/else.xsd");

        let resolution = resolver().resolve(&request);
        assert_eq!(
            resolution,
            Resolution::Resolved(ResolvedEntity {
                key: ResolutionKey::Namespace("urn:a".into()),
                system_id: "/schemas/a.xsd".into(),
                public_id: Some("-//A//EN".into()),
                base_location: Some("file:///schemas/main.xsd".into()),
            })
        );
    }

    #[test]
    fn test_public_id_lookup() {
        let request = ResolutionRequest::new().with_public_id("-//LEGACY//EN");
        let resolution = resolver().resolve(&request);
        assert_eq!(resolution.system_id(), Some(Path::new("/schemas/legacy.dtd")));
    }

    #[test]
    fn test_empty_namespace_skips_even_if_indexed() {
        let resolution = resolver().resolve(&ResolutionRequest::new().with_namespace(""));
        assert!(resolution.is_skip());
    }

    #[test]
    fn test_miss_is_unresolved() {
        let resolution = resolver().resolve(&ResolutionRequest::new().with_namespace("urn:missing"));
        assert_eq!(
            resolution,
            Resolution::Unresolved {
                key: ResolutionKey::Namespace("urn:missing".into())
            }
        );
        assert!(resolution.into_resolved().is_none());
    }

    #[test]
    fn test_namespace_miss_does_not_fall_back_to_public_id() {
        let request = ResolutionRequest::new()
            .with_namespace("urn:missing")
            .with_public_id("-//LEGACY//EN");
        assert!(resolver().resolve(&request).is_unresolved());
    }

    #[test]
    fn test_resolver_through_references() {
        let resolver = resolver();
        let boxed: Box<dyn EntityResolver> = Box::new(resolver.clone());
        let request = ResolutionRequest::new().with_namespace("urn:a");

        assert_eq!((&resolver).resolve(&request), boxed.resolve(&request));
        assert_eq!(Arc::new(resolver).resolve(&request), boxed.resolve(&request));
    }
}
