//! Ordered key-value storage for Folio
//!
//! This crate defines the contract the document layer builds on, and the
//! default in-memory backend:
//! - KvBackend: point reads, ordered range/prefix scans, atomic batches
//! - AtomicOp: check/set/delete builder committed as one batch
//! - MemoryKv: `BTreeMap` + `parking_lot::RwLock` backend with a global
//!   commit sequence for versionstamp allocation
//!
//! Every successful commit allocates one versionstamp; a key's stamp is the
//! compare-and-swap predicate for the checks of later batches.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod atomic;
pub mod backend;
pub mod memory;

pub use atomic::AtomicOp;
pub use backend::{AtomicCommit, Check, CommitResult, KvBackend, KvEntry, Mutation, ScanOptions, Selector};
pub use memory::MemoryKv;
