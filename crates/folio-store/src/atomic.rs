//! Atomic batch builder
//!
//! Accumulates version checks and mutations, then commits them as one
//! all-or-nothing batch against a backend.

use std::sync::Arc;

use folio_core::{Key, Result, Versionstamp};

use crate::backend::{AtomicCommit, Check, CommitResult, KvBackend, Mutation};

/// Builder for one atomic commit
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use folio_core::Key;
/// use folio_store::{AtomicOp, KvBackend, MemoryKv};
///
/// let kv: Arc<dyn KvBackend> = Arc::new(MemoryKv::new());
/// let key = Key::doc("default", "alice");
///
/// // Insert-if-absent
/// let result = AtomicOp::new(kv.clone())
///     .check(key.clone(), None)
///     .set(key.clone(), b"{}".to_vec())
///     .commit()
///     .unwrap();
/// assert!(result.ok);
///
/// // A second insert-if-absent fails the check
/// let result = AtomicOp::new(kv)
///     .check(key.clone(), None)
///     .set(key, b"{}".to_vec())
///     .commit()
///     .unwrap();
/// assert!(!result.ok);
/// ```
#[derive(Clone)]
pub struct AtomicOp {
    backend: Arc<dyn KvBackend>,
    batch: AtomicCommit,
}

impl AtomicOp {
    /// Start an empty batch against the given backend
    pub fn new(backend: Arc<dyn KvBackend>) -> Self {
        Self {
            backend,
            batch: AtomicCommit::default(),
        }
    }

    /// Require the key's versionstamp to equal `versionstamp`
    ///
    /// `None` requires the key to be absent.
    pub fn check(mut self, key: Key, versionstamp: Option<Versionstamp>) -> Self {
        self.batch.checks.push(Check { key, versionstamp });
        self
    }

    /// Write `value` at `key` when the batch commits
    pub fn set(mut self, key: Key, value: Vec<u8>) -> Self {
        self.batch.mutations.push(Mutation::Set { key, value });
        self
    }

    /// Delete `key` when the batch commits
    pub fn delete(mut self, key: Key) -> Self {
        self.batch.mutations.push(Mutation::Delete { key });
        self
    }

    /// Total number of accumulated operations
    pub fn len(&self) -> usize {
        self.batch.len()
    }

    /// True if nothing has been accumulated
    pub fn is_empty(&self) -> bool {
        self.batch.is_empty()
    }

    /// Commit the batch
    pub fn commit(self) -> Result<CommitResult> {
        self.backend.commit(self.batch)
    }
}
