//! Database facade: document lifecycle and entry points
//!
//! ## Design: STATELESS OVER THE STORE
//!
//! `Database` owns only the namespace, the (closable) backend handle, and
//! the view registry. All persisted state lives in the ordered store under
//! the canonical key layout; a document mutation commits the document write
//! in one atomic batch (compare-and-swap on the key's versionstamp plus the
//! set or delete), then fans out to the view engine before returning.
//!
//! ## Thread Safety
//!
//! `Database` is `Send + Sync` and cheap to clone; clones share the same
//! backend handle and registry. `close()` takes effect for all clones.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use folio_core::{Document, FolioError, Key, Result, Versionstamp, ID_FIELD};
use folio_store::{AtomicOp, CommitResult, KvBackend, MemoryKv};

use crate::query::builder::Query;
use crate::query::executor;
use crate::query::spec::Row;
use crate::views::{View, ViewEngine};

/// Acknowledgement of a successful insert or replace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteAck {
    /// The stored document id
    pub id: String,
    /// The new revision token
    pub rev: Versionstamp,
}

struct Inner {
    namespace: String,
    backend: RwLock<Option<Arc<dyn KvBackend>>>,
    views: ViewEngine,
}

/// An embedded document database over one namespace of an ordered store
///
/// # Examples
///
/// ```
/// use folio_engine::{Database, Document, Query, View};
/// use serde_json::{json, Value};
///
/// let db = Database::open("default");
///
/// db.define_view("by-name", View::new("by-name:v1", |doc, emit| {
///     if let Some(name) = doc.get("name").and_then(Value::as_str) {
///         emit.emit(name);
///     }
/// })).unwrap();
///
/// let ack = db
///     .insert(Document::from_value(json!({"_id": "alice", "name": "Alice"})).unwrap())
///     .unwrap();
/// assert_eq!(ack.id, "alice");
///
/// let rows = db.query(&Query::for_view("by-name")).unwrap();
/// assert_eq!(rows.len(), 1);
/// ```
#[derive(Clone)]
pub struct Database {
    inner: Arc<Inner>,
}

impl Database {
    /// Start configuring a database
    pub fn builder() -> DatabaseBuilder {
        DatabaseBuilder::new()
    }

    /// Open a database over a fresh in-memory backend
    pub fn open(namespace: impl Into<String>) -> Database {
        Self::builder().namespace(namespace).open()
    }

    /// Open a database over an existing backend
    ///
    /// Two databases with different namespaces over the same backend are
    /// fully isolated.
    pub fn open_with(namespace: impl Into<String>, backend: Arc<dyn KvBackend>) -> Database {
        Self::builder().namespace(namespace).backend(backend).open()
    }

    /// The namespace this database operates in
    pub fn namespace(&self) -> &str {
        &self.inner.namespace
    }

    /// Release the backend handle
    ///
    /// Every subsequent operation fails with `Closed`. Idempotent.
    pub fn close(&self) {
        let released = self.inner.backend.write().take().is_some();
        if released {
            info!(target: "folio::db", namespace = %self.inner.namespace, "database closed");
        }
    }

    fn backend(&self) -> Result<Arc<dyn KvBackend>> {
        self.inner
            .backend
            .read()
            .clone()
            .ok_or(FolioError::Closed)
    }

    // ========================================================================
    // Document operations
    // ========================================================================

    /// Read a document by id
    ///
    /// Returns the stored value with `_rev` set to the key's current
    /// versionstamp, or `None` when absent.
    pub fn get(&self, id: &str) -> Result<Option<Document>> {
        let backend = self.backend()?;
        let key = Key::doc(&self.inner.namespace, id);

        match backend.get(&key)? {
            Some(entry) => {
                let mut doc = Document::from_bytes(&entry.value)?;
                doc.set_rev(&entry.versionstamp);
                Ok(Some(doc))
            }
            None => Ok(None),
        }
    }

    /// Create a new document
    ///
    /// The id is taken from `_id` when present, otherwise freshly generated.
    /// Fails with `UnexpectedRev` when the payload carries `_rev`, and with
    /// `DuplicateDocument` when the id already exists.
    pub fn insert(&self, doc: Document) -> Result<WriteAck> {
        let backend = self.backend()?;

        if doc.has_rev() {
            return Err(FolioError::UnexpectedRev);
        }
        let id = match doc.get(ID_FIELD) {
            Some(value) => value
                .as_str()
                .map(str::to_string)
                .ok_or_else(|| FolioError::serialization("_id must be a string"))?,
            None => Uuid::new_v4().to_string(),
        };

        let mut stored = doc;
        stored.set_id(&id);

        let key = Key::doc(&self.inner.namespace, &id);
        let result = AtomicOp::new(backend.clone())
            .check(key.clone(), None)
            .set(key, stored.to_bytes()?)
            .commit()?;
        if !result.ok {
            return Err(FolioError::duplicate_document(id));
        }
        let rev = commit_stamp(result)?;

        stored.set_rev(&rev);
        self.inner
            .views
            .update_for_doc(&backend, &id, Some(&stored))?;

        debug!(target: "folio::db", id = %id, "document inserted");
        Ok(WriteAck { id, rev })
    }

    /// Replace an existing document
    ///
    /// `rev` must be the document's current revision token; a stale or
    /// absent token fails with `RevisionConflict`. Any `_rev` inside the
    /// payload is stripped and `_id` is forced to `id`.
    pub fn replace(&self, id: &str, rev: &Versionstamp, doc: Document) -> Result<WriteAck> {
        let backend = self.backend()?;

        let mut stored = doc;
        stored.strip_rev();
        stored.set_id(id);

        let key = Key::doc(&self.inner.namespace, id);
        let result = AtomicOp::new(backend.clone())
            .check(key.clone(), Some(rev.clone()))
            .set(key, stored.to_bytes()?)
            .commit()?;
        if !result.ok {
            return Err(FolioError::revision_conflict(id));
        }
        let new_rev = commit_stamp(result)?;

        stored.set_rev(&new_rev);
        self.inner
            .views
            .update_for_doc(&backend, id, Some(&stored))?;

        debug!(target: "folio::db", id, "document replaced");
        Ok(WriteAck {
            id: id.to_string(),
            rev: new_rev,
        })
    }

    /// Remove a document
    ///
    /// `rev` must be the current revision token; a stale token, or an id
    /// that does not exist, fails with `RevisionConflict`.
    pub fn remove(&self, id: &str, rev: &Versionstamp) -> Result<()> {
        let backend = self.backend()?;

        let key = Key::doc(&self.inner.namespace, id);
        let result = AtomicOp::new(backend.clone())
            .check(key.clone(), Some(rev.clone()))
            .delete(key)
            .commit()?;
        if !result.ok {
            return Err(FolioError::revision_conflict(id));
        }

        self.inner.views.update_for_doc(&backend, id, None)?;

        debug!(target: "folio::db", id, "document removed");
        Ok(())
    }

    // ========================================================================
    // Views and queries
    // ========================================================================

    /// Register a view and materialize its index
    ///
    /// Replaces any prior registration under `name`. The index is rebuilt
    /// only when the view's signature differs from the persisted design
    /// record; see [`View`] for the fingerprint contract.
    pub fn define_view(&self, name: &str, view: View) -> Result<()> {
        let backend = self.backend()?;
        self.inner.views.define_view(&backend, name, view)
    }

    /// Execute a query
    ///
    /// Materializes the builder's specification, scans the view's rows, and
    /// returns map rows or grouped reductions (see [`Row`]).
    pub fn query(&self, query: &Query) -> Result<Vec<Row>> {
        let backend = self.backend()?;
        let spec = query.params()?;
        executor::execute(&backend, &self.inner.namespace, &self.inner.views, &spec)
    }
}

fn commit_stamp(result: CommitResult) -> Result<Versionstamp> {
    result
        .versionstamp
        .ok_or_else(|| FolioError::storage("successful commit returned no versionstamp"))
}

// =============================================================================
// DatabaseBuilder
// =============================================================================

/// Builder for [`Database`]
///
/// Defaults: namespace `"default"`, a fresh [`MemoryKv`] backend.
pub struct DatabaseBuilder {
    namespace: String,
    backend: Option<Arc<dyn KvBackend>>,
}

impl DatabaseBuilder {
    fn new() -> Self {
        DatabaseBuilder {
            namespace: "default".to_string(),
            backend: None,
        }
    }

    /// Set the namespace scoping every key
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Use an existing backend instead of a fresh in-memory store
    pub fn backend(mut self, backend: Arc<dyn KvBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Open the database
    pub fn open(self) -> Database {
        let backend = self
            .backend
            .unwrap_or_else(|| Arc::new(MemoryKv::new()) as Arc<dyn KvBackend>);
        info!(target: "folio::db", namespace = %self.namespace, "database opened");
        Database {
            inner: Arc::new(Inner {
                views: ViewEngine::new(self.namespace.clone()),
                namespace: self.namespace,
                backend: RwLock::new(Some(backend)),
            }),
        }
    }
}

impl Default for DatabaseBuilder {
    fn default() -> Self {
        Self::new()
    }
}
