//! # exi-schema-resolver
//!
//! Namespace-indexed entity resolution for schema-informed EXI grammar
//! construction.
//!
//! Schema sets rarely carry reliable `schemaLocation` hints. This library
//! scans a directory of schema documents once, indexes each document by the
//! `targetNamespace` its root element declares, and answers the grammar
//! compiler's resolution requests from that index.
//!
//! ## Features
//!
//! - Immutable namespace index built from a single directory scan
//! - Configurable handling of namespaces declared by more than one document
//! - Legacy public identifiers from XML catalogs or explicit mappings
//! - Three-way resolution outcome: skip, resolved, unresolved
//! - Schema set compilation with consistency checks over the loaded documents
//!
//! ## Example
//!
//! ```rust,ignore
//! use exi_schema_resolver::{GrammarCompiler, NamespaceResolver};
//!
//! let resolver = NamespaceResolver::from_directory("schemas/xsf")?;
//! let grammars = GrammarCompiler::new(resolver).compile("schemas/xsf/defaultSchema.xsd")?;
//! println!("{} components", grammars.component_count());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

// Foundation
pub mod error;
pub mod limits;

// Utilities
pub mod namespaces;
pub mod names;
pub mod locations;

// Resource loading
pub mod loaders;
pub mod documents;
pub mod catalog;

// Resolution
pub mod index;
pub mod resolver;

// Grammar compilation
pub mod compiler;

// Re-exports for convenience
pub use compiler::{CompileOptions, GrammarCompiler, SchemaGrammars};
pub use error::{ConfigurationError, ConsistencyViolation, Error, Result, ViolationKind};
pub use index::{DuplicatePolicy, IndexBuilder, IndexOptions, NamespaceIndex};
pub use limits::Limits;
pub use resolver::{EntityResolver, NamespaceResolver, Resolution, ResolutionRequest};

/// Version of the exi-schema-resolver library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default extension of indexed schema documents
pub const DEFAULT_EXTENSION: &str = "xsd";
