//! Core types for the Folio document database
//!
//! This crate defines the foundational types used throughout the system:
//! - KeyPart / EmitKey: ordered primitive tuple parts and emit-key tuples
//! - KeySpace / Key: the canonical tuple key layout under a namespace
//! - Document: schemaless JSON document with reserved `_id` / `_rev` fields
//! - Versionstamp: opaque per-key revision token
//! - FolioError: error type hierarchy

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod document;
pub mod error;
pub mod types;
pub mod version;

// Re-export commonly used types at the crate root
pub use document::{Document, ID_FIELD, REV_FIELD};
pub use error::{FolioError, Result};
pub use types::{EmitKey, Key, KeyPart, KeySpace};
pub use version::Versionstamp;
