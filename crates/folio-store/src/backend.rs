//! Storage backend contract
//!
//! The document layer talks to storage exclusively through [`KvBackend`]:
//! point reads, ordered scans, and atomic commits. Keys are tuples ordered
//! lexicographically (see `folio_core::Key`); values are opaque bytes.

use folio_core::{Key, Result, Versionstamp};

/// A stored entry as returned by reads and scans
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KvEntry {
    /// The entry's key
    pub key: Key,
    /// The stored bytes
    pub value: Vec<u8>,
    /// Versionstamp of the commit that last wrote this key
    pub versionstamp: Versionstamp,
}

/// Which keys a scan covers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    /// Every key starting with the given prefix
    Prefix(Key),
    /// The half-open interval `[start, end)` in key order
    Range {
        /// Inclusive lower bound
        start: Key,
        /// Exclusive upper bound
        end: Key,
    },
}

/// Scan iteration options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanOptions {
    /// Iterate in descending key order
    pub reverse: bool,
    /// Maximum number of entries to return (applied after direction)
    pub limit: Option<usize>,
}

impl ScanOptions {
    /// Forward, unbounded scan
    pub fn all() -> Self {
        Self::default()
    }
}

/// One version check inside an atomic commit
///
/// The commit applies only if the key's current versionstamp equals the
/// expected one; `None` asserts the key is absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Check {
    /// The checked key
    pub key: Key,
    /// Expected versionstamp, or `None` for "must not exist"
    pub versionstamp: Option<Versionstamp>,
}

/// One mutation inside an atomic commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    /// Write `value` at `key`
    Set {
        /// Target key
        key: Key,
        /// Bytes to store
        value: Vec<u8>,
    },
    /// Delete `key` (absent keys delete to a no-op)
    Delete {
        /// Target key
        key: Key,
    },
}

/// A fully assembled atomic batch
///
/// All checks and mutations succeed or fail together. Assembled by
/// [`AtomicOp`](crate::AtomicOp).
#[derive(Debug, Clone, Default)]
pub struct AtomicCommit {
    /// Version checks; all must pass
    pub checks: Vec<Check>,
    /// Mutations applied when every check passes
    pub mutations: Vec<Mutation>,
}

impl AtomicCommit {
    /// Total number of operations in the batch
    pub fn len(&self) -> usize {
        self.checks.len() + self.mutations.len()
    }

    /// True if the batch holds no checks and no mutations
    pub fn is_empty(&self) -> bool {
        self.checks.is_empty() && self.mutations.is_empty()
    }
}

/// Outcome of an atomic commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitResult {
    /// True if every check passed and all mutations were applied
    pub ok: bool,
    /// Versionstamp of the commit; present only on success
    pub versionstamp: Option<Versionstamp>,
}

/// Ordered key-value store with atomic batches and per-key versionstamps
///
/// Implementations must provide:
/// - lexicographic ordering over tuple keys, in both directions
/// - one monotonically increasing versionstamp per successful commit
/// - all-or-nothing application of a commit's checks and mutations
pub trait KvBackend: Send + Sync {
    /// Read one key
    fn get(&self, key: &Key) -> Result<Option<KvEntry>>;

    /// Scan a prefix or half-open range in key order
    fn list(&self, selector: &Selector, options: &ScanOptions) -> Result<Vec<KvEntry>>;

    /// Apply an atomic batch
    ///
    /// Returns `ok: false` (with no versionstamp) when any check fails;
    /// the store is unchanged in that case.
    fn commit(&self, batch: AtomicCommit) -> Result<CommitResult>;
}
