//! Error types for exi-schema-resolver
//!
//! This module defines all error types used throughout the library.
//! Index construction and grammar compilation abort on the first error;
//! resolution misses are never errors (see [`crate::resolver::Resolution`]).

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using the crate Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type
#[derive(Error, Debug)]
pub enum Error {
    /// The caller pointed the index builder at something unusable
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    /// A document could not be parsed while building the namespace index
    #[error("malformed document: {0}")]
    MalformedDocument(ParseError),

    /// Schema parsing error raised by the grammar compiler
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// The assembled schema set broke an invariant the compiler relies on
    #[error("internal consistency violation: {0}")]
    Consistency(#[from] ConsistencyViolation),

    /// A required import could neither be resolved nor located
    #[error("unresolved import of namespace '{namespace}' from {base}")]
    UnresolvedImport {
        /// Imported namespace
        namespace: String,
        /// Document that contains the import
        base: String,
    },

    /// Two documents declare the same namespace under `DuplicatePolicy::Reject`
    #[error("namespace '{namespace}' is declared by both {} and {}", .first.display(), .second.display())]
    DuplicateNamespace {
        /// The duplicated namespace
        namespace: String,
        /// Document indexed first
        first: PathBuf,
        /// Document that collided with it
        second: PathBuf,
    },

    /// Resource loading error
    #[error("resource error: {0}")]
    Resource(String),

    /// Namespace error
    #[error("namespace error: {0}")]
    Namespace(String),

    /// Name error (invalid XML name)
    #[error("name error: {0}")]
    Name(String),

    /// Limit exceeded error
    #[error("limit exceeded: {0}")]
    LimitExceeded(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// XML parsing error
    #[error("XML error: {0}")]
    Xml(String),

    /// URL parsing error
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),
}

impl Error {
    /// Whether this error is an internal consistency violation
    pub fn is_consistency_violation(&self) -> bool {
        matches!(self, Error::Consistency(_))
    }

    /// Re-tag a parse failure as a malformed document found during indexing
    pub(crate) fn into_malformed(self, path: &std::path::Path) -> Self {
        match self {
            Error::Parse(e) | Error::MalformedDocument(e) => {
                Error::MalformedDocument(e.with_location(path.display().to_string()))
            }
            Error::Xml(msg) => Error::MalformedDocument(
                ParseError::new(msg).with_location(path.display().to_string()),
            ),
            other => other,
        }
    }
}

/// Caller misconfiguration detected before any resolution happens
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    /// The index directory does not exist
    #[error("index directory '{}' does not exist", .0.display())]
    MissingDirectory(PathBuf),

    /// The index path exists but is not a directory
    #[error("'{}' is not a directory", .0.display())]
    NotADirectory(PathBuf),

    /// The directory holds no document with an eligible extension
    #[error("no eligible documents ({extensions}) in '{}'", .directory.display())]
    NoDocuments {
        /// Directory that was scanned
        directory: PathBuf,
        /// Eligible extensions, comma separated
        extensions: String,
    },
}

/// Schema document parsing error
#[derive(Debug, Clone)]
pub struct ParseError {
    /// Error message
    pub message: String,
    /// Location in the schema set (file path, optionally line/column)
    pub location: Option<String>,
}

impl ParseError {
    /// Create a new parse error
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            location: None,
        }
    }

    /// Set the location
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;

        if let Some(ref loc) = self.location {
            write!(f, "\n\nLocation: {}", loc)?;
        }

        Ok(())
    }
}

impl std::error::Error for ParseError {}

/// What kind of invariant the compiler found broken
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationKind {
    /// A resolved document declares another namespace than the one requested
    NamespaceMismatch,
    /// Two documents declare the same global component
    DuplicateComponent,
    /// A reference names a component no loaded document declares
    DanglingReference,
    /// A reference uses a prefix with no namespace binding in scope
    UnboundPrefix,
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ViolationKind::NamespaceMismatch => "namespace mismatch",
            ViolationKind::DuplicateComponent => "duplicate component",
            ViolationKind::DanglingReference => "dangling reference",
            ViolationKind::UnboundPrefix => "unbound prefix",
        };
        f.write_str(s)
    }
}

/// Internal consistency violation raised by the grammar compiler
#[derive(Debug, Clone)]
pub struct ConsistencyViolation {
    /// Kind of violation
    pub kind: ViolationKind,
    /// Error message
    pub message: String,
    /// Document in which the violation surfaced
    pub document: Option<PathBuf>,
}

impl ConsistencyViolation {
    /// Create a new violation
    pub fn new(kind: ViolationKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            document: None,
        }
    }

    /// Set the document
    pub fn with_document(mut self, document: impl Into<PathBuf>) -> Self {
        self.document = Some(document.into());
        self
    }
}

impl fmt::Display for ConsistencyViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)?;

        if let Some(ref doc) = self.document {
            write!(f, " (in {})", doc.display())?;
        }

        Ok(())
    }
}

impl std::error::Error for ConsistencyViolation {}
