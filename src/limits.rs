//! Limits and constraints for schema set processing
//!
//! This module defines limits that keep index construction and grammar
//! compilation bounded: oversized documents, runaway import chains and
//! pathological directories are rejected instead of exhausting resources.

use crate::error::{Error, Result};

/// Resource limits shared by the index builder and the grammar compiler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limits {
    /// Maximum schema document size in bytes
    pub max_document_size: usize,

    /// Maximum nesting of imports/includes below the entry document
    pub max_schema_depth: usize,

    /// Maximum number of documents a single compilation may load
    pub max_documents: usize,

    /// Maximum number of entries in a namespace index
    pub max_index_entries: usize,

    /// Maximum number of global components in a compiled schema set
    pub max_schema_components: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_document_size: 100 * 1024 * 1024, // 100 MB
            max_schema_depth: 100,
            max_documents: 10_000,
            max_index_entries: 10_000,
            max_schema_components: 100_000,
        }
    }
}

impl Limits {
    /// Create a new Limits with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Create strict limits (more restrictive)
    pub fn strict() -> Self {
        Self {
            max_document_size: 10 * 1024 * 1024, // 10 MB
            max_schema_depth: 20,
            max_documents: 500,
            max_index_entries: 500,
            max_schema_components: 10_000,
        }
    }

    /// Create permissive limits (less restrictive, use with caution)
    pub fn permissive() -> Self {
        Self {
            max_document_size: 1024 * 1024 * 1024, // 1 GB
            max_schema_depth: 1000,
            max_documents: 1_000_000,
            max_index_entries: 1_000_000,
            max_schema_components: 1_000_000,
        }
    }

    /// Check if a document size is within limits
    pub fn check_document_size(&self, size: usize) -> Result<()> {
        if size > self.max_document_size {
            Err(Error::LimitExceeded(format!(
                "document size {} bytes exceeds maximum {} bytes",
                size, self.max_document_size
            )))
        } else {
            Ok(())
        }
    }

    /// Check if import/include nesting is within limits
    pub fn check_schema_depth(&self, depth: usize) -> Result<()> {
        if depth > self.max_schema_depth {
            Err(Error::LimitExceeded(format!(
                "schema depth {} exceeds maximum {}",
                depth, self.max_schema_depth
            )))
        } else {
            Ok(())
        }
    }

    /// Check if the number of loaded documents is within limits
    pub fn check_documents(&self, count: usize) -> Result<()> {
        if count > self.max_documents {
            Err(Error::LimitExceeded(format!(
                "document count {} exceeds maximum {}",
                count, self.max_documents
            )))
        } else {
            Ok(())
        }
    }

    /// Check if the index size is within limits
    pub fn check_index_entries(&self, count: usize) -> Result<()> {
        if count > self.max_index_entries {
            Err(Error::LimitExceeded(format!(
                "index entry count {} exceeds maximum {}",
                count, self.max_index_entries
            )))
        } else {
            Ok(())
        }
    }

    /// Check if number of schema components is within limits
    pub fn check_schema_components(&self, count: usize) -> Result<()> {
        if count > self.max_schema_components {
            Err(Error::LimitExceeded(format!(
                "schema component count {} exceeds maximum {}",
                count, self.max_schema_components
            )))
        } else {
            Ok(())
        }
    }
}
