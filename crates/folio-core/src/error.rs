//! Error types for the Folio database
//!
//! One variant per semantic error kind. Errors surface to the caller at the
//! operation boundary; no retries are attempted inside the core, and a failed
//! mutation leaves no trace (atomic commit semantics).

use thiserror::Error;

/// Result type alias for Folio operations
pub type Result<T> = std::result::Result<T, FolioError>;

/// Error type for all Folio operations
#[derive(Debug, Error)]
pub enum FolioError {
    /// A `_rev` field was supplied to `insert`
    ///
    /// New documents cannot carry a revision token; use `replace` to update
    /// an existing document.
    #[error("unexpected _rev in insert payload")]
    UnexpectedRev,

    /// `insert` against an id that already exists
    #[error("document already exists: {id}")]
    DuplicateDocument {
        /// The conflicting document id
        id: String,
    },

    /// `replace` or `remove` with a stale or absent revision token
    ///
    /// Retryable: re-read the document and retry with the current `_rev`.
    #[error("revision conflict on document {id}")]
    RevisionConflict {
        /// The contested document id
        id: String,
    },

    /// Query against a view name with no registered definition
    #[error("view is not defined: {name}")]
    UndefinedView {
        /// The unknown view name
        name: String,
    },

    /// `group` argument that is neither a boolean nor a non-negative number
    #[error("invalid group level: {given}")]
    InvalidGroupLevel {
        /// The rejected argument, rendered for the message
        given: String,
    },

    /// A query shape the executor does not support
    #[error("not implemented: {feature}")]
    NotImplemented {
        /// The unsupported feature
        feature: String,
    },

    /// Operation on a database after `close()`
    #[error("database is closed")]
    Closed,

    /// Invalid encoding of a stored value
    #[error("serialization error: {message}")]
    Serialization {
        /// What went wrong
        message: String,
    },

    /// Backend failure
    #[error("storage error: {message}")]
    Storage {
        /// What went wrong
        message: String,
    },
}

impl FolioError {
    /// Create a DuplicateDocument error
    pub fn duplicate_document(id: impl Into<String>) -> Self {
        FolioError::DuplicateDocument { id: id.into() }
    }

    /// Create a RevisionConflict error
    pub fn revision_conflict(id: impl Into<String>) -> Self {
        FolioError::RevisionConflict { id: id.into() }
    }

    /// Create an UndefinedView error
    pub fn undefined_view(name: impl Into<String>) -> Self {
        FolioError::UndefinedView { name: name.into() }
    }

    /// Create an InvalidGroupLevel error
    pub fn invalid_group_level(given: impl std::fmt::Display) -> Self {
        FolioError::InvalidGroupLevel {
            given: given.to_string(),
        }
    }

    /// Create a NotImplemented error
    pub fn not_implemented(feature: impl Into<String>) -> Self {
        FolioError::NotImplemented {
            feature: feature.into(),
        }
    }

    /// Create a Serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        FolioError::Serialization {
            message: message.into(),
        }
    }

    /// Create a Storage error
    pub fn storage(message: impl Into<String>) -> Self {
        FolioError::Storage {
            message: message.into(),
        }
    }

    /// Check if this error is a concurrency conflict
    ///
    /// Conflicts are temporal failures: the operation may succeed when
    /// retried with fresh data (`RevisionConflict`) or a different id
    /// (`DuplicateDocument`).
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            FolioError::RevisionConflict { .. } | FolioError::DuplicateDocument { .. }
        )
    }

    /// Check if this error means the database handle is unusable
    pub fn is_closed(&self) -> bool {
        matches!(self, FolioError::Closed)
    }

    /// Check if this error is a caller mistake that retrying cannot fix
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            FolioError::UnexpectedRev | FolioError::InvalidGroupLevel { .. }
        )
    }
}

impl From<serde_json::Error> for FolioError {
    fn from(e: serde_json::Error) -> Self {
        FolioError::Serialization {
            message: e.to_string(),
        }
    }
}
