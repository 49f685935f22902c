//! Query executor
//!
//! Translates a [`QuerySpec`] into one ordered-range scan over the view-row
//! layout, then either streams map rows or performs grouped reduction.
//!
//! ## Ordering guarantees
//!
//! Map rows come back in store order (reversed when descending). Grouped
//! reduction discovers groups in the same iteration order, so `skip`/`limit`
//! apply to groups in encounter order; under a descending scan, groups form
//! in reverse-scan order.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value as Json;
use tracing::debug;

use folio_core::{EmitKey, FolioError, Key, Result};
use folio_store::{KvBackend, KvEntry, ScanOptions, Selector};

use crate::query::spec::{Order, QuerySpec, Row, Shape};
use crate::views::{ReduceFn, RowPayload, RowRef, ViewEngine};

/// Execute a materialized query
pub(crate) fn execute(
    backend: &Arc<dyn KvBackend>,
    namespace: &str,
    views: &ViewEngine,
    spec: &QuerySpec,
) -> Result<Vec<Row>> {
    let view = views
        .resolve(&spec.view)
        .ok_or_else(|| FolioError::undefined_view(spec.view.as_str()))?;

    let selector = selector_for(namespace, spec)?;
    debug!(
        target: "folio::query",
        view = %spec.view,
        shape = spec.shape.kind(),
        reduce = spec.reduce,
        "executing query"
    );

    match view.reduce() {
        Some(reduce) if spec.reduce => reduce_rows(backend, &selector, spec, reduce),
        _ => map_rows(backend, &selector, spec),
    }
}

/// Build the scan selector from the view-row prefix and the query shape
fn selector_for(namespace: &str, spec: &QuerySpec) -> Result<Selector> {
    let view = spec.view.as_str();
    match &spec.shape {
        Shape::Scan => Ok(Selector::Prefix(Key::view_prefix(namespace, view))),
        Shape::Key(key) => Ok(Selector::Prefix(Key::view_row_prefix(namespace, view, key))),
        Shape::Prefix(prefix) => Ok(Selector::Prefix(Key::view_row_prefix(
            namespace, view, prefix,
        ))),
        Shape::Range {
            start,
            end,
            start_doc_id,
            end_doc_id,
        } => Ok(Selector::Range {
            start: Key::view_row_bound(namespace, view, start, start_doc_id.as_deref()),
            end: Key::view_row_bound(namespace, view, end, end_doc_id.as_deref()),
        }),
        Shape::Keys(_) => Err(FolioError::not_implemented("keys query shape")),
    }
}

/// Stream map rows: drop `skip`, yield up to `limit`
fn map_rows(
    backend: &Arc<dyn KvBackend>,
    selector: &Selector,
    spec: &QuerySpec,
) -> Result<Vec<Row>> {
    // Push skip + limit down to the store as a native limit
    let options = ScanOptions {
        reverse: spec.order == Order::Descending,
        limit: spec.limit.map(|limit| spec.skip.saturating_add(limit)),
    };

    let entries = backend.list(selector, &options)?;
    let take = spec.limit.unwrap_or(usize::MAX);

    let mut rows = Vec::new();
    for entry in entries.into_iter().skip(spec.skip).take(take) {
        let (emit_key, doc_id, payload) = decode_row(&entry)?;
        rows.push(Row {
            key: Some(emit_key),
            id: Some(doc_id),
            value: payload.value,
            doc: spec.include_docs.then_some(payload.doc),
        });
    }
    Ok(rows)
}

/// Scan the full range into insertion-ordered groups, then reduce each
fn reduce_rows(
    backend: &Arc<dyn KvBackend>,
    selector: &Selector,
    spec: &QuerySpec,
    reduce: &ReduceFn,
) -> Result<Vec<Row>> {
    let options = ScanOptions {
        reverse: spec.order == Order::Descending,
        limit: None,
    };

    struct Group {
        key: Option<EmitKey>,
        refs: Vec<RowRef>,
        values: Vec<Json>,
    }

    // Encounter order must be preserved for deterministic skip/limit, so a
    // plain hash map is insufficient: groups live in a vector, the map only
    // indexes their stable serialized identity.
    let mut groups: Vec<Group> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for entry in backend.list(selector, &options)? {
        let (emit_key, doc_id, payload) = decode_row(&entry)?;

        let group_key = match spec.group_level {
            None => None,
            Some(0) => Some(emit_key.clone()),
            Some(n) => Some(emit_key.first_n(n)),
        };
        let identity = serde_json::to_string(&group_key)?;

        let slot = match index.get(&identity) {
            Some(&slot) => slot,
            None => {
                groups.push(Group {
                    key: group_key,
                    refs: Vec::new(),
                    values: Vec::new(),
                });
                index.insert(identity, groups.len() - 1);
                groups.len() - 1
            }
        };
        groups[slot].refs.push(RowRef {
            key: emit_key,
            id: doc_id,
        });
        groups[slot].values.push(payload.value);
    }

    let take = spec.limit.unwrap_or(usize::MAX);
    let rows = groups
        .into_iter()
        .skip(spec.skip)
        .take(take)
        .map(|group| Row {
            value: (reduce)(&group.refs, &group.values),
            key: group.key,
            id: None,
            doc: None,
        })
        .collect();
    Ok(rows)
}

/// Decompose a stored view row into its emit key, doc id, and payload
fn decode_row(entry: &KvEntry) -> Result<(EmitKey, String, RowPayload)> {
    let (emit_key, doc_id) = entry.key.view_row_parts().ok_or_else(|| {
        FolioError::serialization(format!("malformed view row key: {}", entry.key))
    })?;
    let payload: RowPayload = serde_json::from_slice(&entry.value)?;
    Ok((emit_key, doc_id.to_string(), payload))
}
