//! Map-reduce views: definition, rebuild, incremental maintenance
//!
//! ## Design
//!
//! The in-memory registry is authoritative for view logic in the running
//! process. The store persists, per view:
//! - a design record `{signature, state}` deciding whether a rebuild is due
//! - one row per emission at `(N, "view", V, ...emit_key, doc_id)`
//! - one back-reference per `(view, doc_id)` listing the emitted composite
//!   keys, so invalidation on mutation is O(emitted rows)
//!
//! A rewrite in a systems language cannot recover a function from bytes on
//! disk, so the design record stores only a digest of a caller-supplied
//! fingerprint (the textual form, or any stable version string, of the map
//! function). Callers re-register every view at startup; the digest
//! comparison then short-circuits rebuilds when the source has not changed.
//!
//! ## Atomicity
//!
//! Per document mutation, each view's invalidation + re-emission is a single
//! atomic batch; across views the updates are sequential. Rebuild batches are
//! bounded at [`BATCH_SIZE`] operations and are not globally atomic: while a
//! design record is `building`, queries may observe partial state.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use folio_core::{Document, EmitKey, Key, Result};
use folio_store::{AtomicCommit, AtomicOp, KvBackend, Mutation, ScanOptions, Selector};

/// Maximum operations per rebuild commit
pub const BATCH_SIZE: usize = 1000;

/// Map function signature
///
/// Invoked once per document; emissions go through the [`Emitter`].
pub type MapFn = Arc<dyn Fn(&Document, &mut Emitter) + Send + Sync>;

/// Reduce function signature
///
/// Receives the `(emit_key, doc_id)` pairs and the row values of one group,
/// returns the reduction.
pub type ReduceFn = Arc<dyn Fn(&[RowRef], &[Json]) -> Json + Send + Sync>;

// =============================================================================
// Emitter
// =============================================================================

/// Collects the emissions of one map invocation
pub struct Emitter {
    rows: Vec<(EmitKey, Json)>,
}

impl Emitter {
    pub(crate) fn new() -> Self {
        Emitter { rows: Vec::new() }
    }

    /// Emit an index entry with a null value
    pub fn emit(&mut self, key: impl Into<EmitKey>) {
        self.rows.push((key.into(), Json::Null));
    }

    /// Emit an index entry with an explicit value
    pub fn emit_value(&mut self, key: impl Into<EmitKey>, value: impl Into<Json>) {
        self.rows.push((key.into(), value.into()));
    }

    fn into_rows(self) -> Vec<(EmitKey, Json)> {
        self.rows
    }
}

// =============================================================================
// View definition
// =============================================================================

/// Reference to one emitted row, as seen by a reduce function
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowRef {
    /// The row's emit key
    pub key: EmitKey,
    /// The id of the document that emitted the row
    pub id: String,
}

/// A view definition: map function, optional reduce function, fingerprint
///
/// The fingerprint is the stable textual form (or version string) of the map
/// function; its SHA-256 digest is the view's signature, persisted in the
/// design record. Re-registering with an unchanged fingerprint does not
/// re-execute the map.
///
/// # Examples
///
/// ```
/// use folio_engine::View;
/// use serde_json::Value;
///
/// let view = View::new("by-name:v1", |doc, emit| {
///     if doc.get("type").and_then(Value::as_str) == Some("user") {
///         if let Some(name) = doc.get("name").and_then(Value::as_str) {
///             emit.emit(name);
///         }
///     }
/// });
/// assert!(!view.has_reduce());
/// ```
#[derive(Clone)]
pub struct View {
    fingerprint: String,
    signature: String,
    map: MapFn,
    reduce: Option<ReduceFn>,
}

impl View {
    /// Define a map-only view
    pub fn new(
        fingerprint: impl Into<String>,
        map: impl Fn(&Document, &mut Emitter) + Send + Sync + 'static,
    ) -> Self {
        let fingerprint = fingerprint.into();
        let signature = signature_of(&fingerprint);
        View {
            fingerprint,
            signature,
            map: Arc::new(map),
            reduce: None,
        }
    }

    /// Attach a reduce function
    pub fn with_reduce(
        mut self,
        reduce: impl Fn(&[RowRef], &[Json]) -> Json + Send + Sync + 'static,
    ) -> Self {
        self.reduce = Some(Arc::new(reduce));
        self
    }

    /// The caller-supplied fingerprint
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// SHA-256 digest of the fingerprint, hex encoded
    pub fn signature(&self) -> &str {
        &self.signature
    }

    /// True if the view carries a reduce function
    pub fn has_reduce(&self) -> bool {
        self.reduce.is_some()
    }

    pub(crate) fn map(&self) -> &MapFn {
        &self.map
    }

    pub(crate) fn reduce(&self) -> Option<&ReduceFn> {
        self.reduce.as_ref()
    }
}

impl fmt::Debug for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("View")
            .field("fingerprint", &self.fingerprint)
            .field("signature", &self.signature)
            .field("reduce", &self.reduce.is_some())
            .finish()
    }
}

/// Hex-encoded SHA-256 of the fingerprint text
fn signature_of(fingerprint: &str) -> String {
    use std::fmt::Write;

    let digest = Sha256::digest(fingerprint.as_bytes());
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        let _ = write!(out, "{byte:02x}");
    }
    out
}

// =============================================================================
// Persisted shapes
// =============================================================================

/// Per-view persisted metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct DesignRecord {
    pub(crate) signature: String,
    pub(crate) state: DesignState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum DesignState {
    Building,
    Ready,
}

/// Stored payload of one view row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct RowPayload {
    /// The optional second argument of `emit`, null when omitted
    pub(crate) value: Json,
    /// Document snapshot at emit time (including `_rev`)
    pub(crate) doc: Document,
}

// =============================================================================
// ViewEngine
// =============================================================================

/// Registry plus maintenance of materialized view state
///
/// Holds no backend: the owning database passes its (closable) handle into
/// every call, so a closed database fails before reaching the engine.
pub(crate) struct ViewEngine {
    namespace: String,
    registry: RwLock<BTreeMap<String, Arc<View>>>,
}

impl ViewEngine {
    pub(crate) fn new(namespace: String) -> Self {
        ViewEngine {
            namespace,
            registry: RwLock::new(BTreeMap::new()),
        }
    }

    /// Look up a registered view
    pub(crate) fn resolve(&self, name: &str) -> Option<Arc<View>> {
        self.registry.read().get(name).cloned()
    }

    /// Observation-stable snapshot of the registry
    ///
    /// Mutation paths iterate this snapshot, so a concurrent `define_view`
    /// cannot change the set of views mid-update.
    fn snapshot(&self) -> Vec<(String, Arc<View>)> {
        self.registry
            .read()
            .iter()
            .map(|(name, view)| (name.clone(), view.clone()))
            .collect()
    }

    /// Register a view and rebuild its rows if its signature changed
    ///
    /// No-ops when the persisted design record matches the new signature, or
    /// when another rebuild of the same view is in progress.
    pub(crate) fn define_view(
        &self,
        backend: &Arc<dyn KvBackend>,
        name: &str,
        view: View,
    ) -> Result<()> {
        let view = Arc::new(view);
        self.registry
            .write()
            .insert(name.to_string(), view.clone());

        let design_key = Key::design(&self.namespace, name);
        if let Some(entry) = backend.get(&design_key)? {
            let record: DesignRecord = serde_json::from_slice(&entry.value)?;
            if record.signature == view.signature() {
                debug!(target: "folio::views", view = name, "signature unchanged, skipping rebuild");
                return Ok(());
            }
            if record.state == DesignState::Building {
                debug!(target: "folio::views", view = name, "rebuild already in progress");
                return Ok(());
            }
        }

        self.rebuild(backend, name, &view)
    }

    /// Rebuild a view's rows and back-refs from every live document
    fn rebuild(&self, backend: &Arc<dyn KvBackend>, name: &str, view: &View) -> Result<()> {
        let ns = self.namespace.as_str();
        info!(target: "folio::views", view = name, "rebuilding view");

        let design_key = Key::design(ns, name);
        let building = DesignRecord {
            signature: view.signature().to_string(),
            state: DesignState::Building,
        };
        AtomicOp::new(backend.clone())
            .set(design_key.clone(), serde_json::to_vec(&building)?)
            .commit()?;

        let mut pending: Vec<Mutation> = Vec::new();

        // Drop every existing row and back-ref for this view
        for prefix in [Key::view_prefix(ns, name), Key::view_ref_prefix(ns, name)] {
            for entry in backend.list(&Selector::Prefix(prefix), &ScanOptions::all())? {
                pending.push(Mutation::Delete { key: entry.key });
                if pending.len() >= BATCH_SIZE {
                    flush(backend, &mut pending)?;
                }
            }
        }

        // Re-emit every document in key order
        let mut docs = 0usize;
        let doc_prefix = Key::doc_prefix(ns);
        for entry in backend.list(&Selector::Prefix(doc_prefix), &ScanOptions::all())? {
            let Some(id) = entry.key.doc_id().map(str::to_string) else {
                continue;
            };
            let mut doc = Document::from_bytes(&entry.value)?;
            doc.set_rev(&entry.versionstamp);

            let mut emitter = Emitter::new();
            (view.map())(&doc, &mut emitter);

            let rows = emitter.into_rows();
            let mut refs: Vec<Key> = Vec::with_capacity(rows.len());
            for (emit_key, value) in rows {
                let row_key = Key::view_row(ns, name, &emit_key, &id);
                let payload = RowPayload {
                    value,
                    doc: doc.clone(),
                };
                refs.push(row_key.clone());
                pending.push(Mutation::Set {
                    key: row_key,
                    value: serde_json::to_vec(&payload)?,
                });
                if pending.len() >= BATCH_SIZE {
                    flush(backend, &mut pending)?;
                }
            }
            pending.push(Mutation::Set {
                key: Key::view_ref(ns, name, &id),
                value: serde_json::to_vec(&refs)?,
            });
            if pending.len() >= BATCH_SIZE {
                flush(backend, &mut pending)?;
            }
            docs += 1;
        }
        flush(backend, &mut pending)?;

        let ready = DesignRecord {
            signature: view.signature().to_string(),
            state: DesignState::Ready,
        };
        AtomicOp::new(backend.clone())
            .set(design_key, serde_json::to_vec(&ready)?)
            .commit()?;

        info!(target: "folio::views", view = name, docs, "view rebuild complete");
        Ok(())
    }

    /// Re-emit rows for one document across every registered view
    ///
    /// `doc` is the committed document including `_rev`; `None` means the
    /// document was removed. Per view: one atomic batch deleting the keys
    /// named by the back-ref and writing the new rows and back-ref.
    pub(crate) fn update_for_doc(
        &self,
        backend: &Arc<dyn KvBackend>,
        id: &str,
        doc: Option<&Document>,
    ) -> Result<()> {
        let ns = self.namespace.as_str();

        for (name, view) in self.snapshot() {
            let ref_key = Key::view_ref(ns, &name, id);
            let old_refs: Vec<Key> = match backend.get(&ref_key)? {
                Some(entry) => serde_json::from_slice(&entry.value)?,
                None => Vec::new(),
            };

            let mut op = AtomicOp::new(backend.clone());
            for key in old_refs {
                op = op.delete(key);
            }

            match doc {
                None => {
                    op = op.delete(ref_key);
                }
                Some(doc) => {
                    let mut emitter = Emitter::new();
                    (view.map())(doc, &mut emitter);

                    let rows = emitter.into_rows();
                    let mut refs: Vec<Key> = Vec::with_capacity(rows.len());
                    for (emit_key, value) in rows {
                        let row_key = Key::view_row(ns, &name, &emit_key, id);
                        let payload = RowPayload {
                            value,
                            doc: doc.clone(),
                        };
                        refs.push(row_key.clone());
                        op = op.set(row_key, serde_json::to_vec(&payload)?);
                    }
                    op = op.set(ref_key, serde_json::to_vec(&refs)?);
                }
            }

            debug!(target: "folio::views", view = %name, doc = id, ops = op.len(), "updating view");
            op.commit()?;
        }
        Ok(())
    }
}

fn flush(backend: &Arc<dyn KvBackend>, pending: &mut Vec<Mutation>) -> Result<()> {
    if pending.is_empty() {
        return Ok(());
    }
    let batch = AtomicCommit {
        checks: Vec::new(),
        mutations: std::mem::take(pending),
    };
    backend.commit(batch)?;
    Ok(())
}
