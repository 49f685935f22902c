//! Folio database engine
//!
//! This crate orchestrates the lower layers into the public document API:
//! - Database: open/close, document CRUD with compare-and-swap on `_rev`
//! - Views: map-reduce secondary indexes, incrementally maintained
//! - Query: fluent builder, immutable specification, ordered-scan executor
//!
//! The engine is the only component that knows about:
//! - the document ↔ view fan-out on every mutation
//! - the view-row key layout the executor scans
//! - design records and rebuild scheduling

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod database;
pub mod query;
pub mod views;

pub use database::{Database, DatabaseBuilder, WriteAck};
pub use query::builder::{GroupAs, Query};
pub use query::spec::{Order, QuerySpec, Row, Shape};
pub use views::{Emitter, RowRef, View};

// Re-export the types callers need to drive the API
pub use folio_core::{Document, EmitKey, FolioError, Key, KeyPart, Result, Versionstamp};
pub use folio_store::{KvBackend, MemoryKv};
