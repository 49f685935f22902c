//! View engine integration tests
//!
//! Validates incremental index maintenance under document mutation, the
//! back-reference invariant, rebuild scheduling by signature, and the
//! building-state no-op.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use folio_engine::{
    Database, Document, EmitKey, Key, KvBackend, MemoryKv, Query, Versionstamp, View,
};
use folio_store::{AtomicOp, ScanOptions, Selector};
use serde_json::{json, Value};

fn doc(value: Value) -> Document {
    Document::from_value(value).unwrap()
}

fn by_name() -> View {
    View::new("by-name:v1", |doc, emit| {
        if doc.get("type").and_then(Value::as_str) == Some("user") {
            if let Some(name) = doc.get("name").and_then(Value::as_str) {
                emit.emit(name);
            }
        }
    })
}

fn user(id: &str, name: &str) -> Document {
    doc(json!({"_id": id, "type": "user", "name": name}))
}

// ============================================================================
// Incremental maintenance (seed scenario S2)
// ============================================================================

#[test]
fn test_rows_track_inserts_and_replaces() {
    let db = Database::open("default");
    db.define_view("by-name", by_name()).unwrap();

    db.insert(user("alice", "Alice")).unwrap();
    db.insert(user("bob", "Bob")).unwrap();

    let rows = db.query(&Query::for_view("by-name")).unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].key, Some(EmitKey::from("Alice")));
    assert_eq!(rows[0].id.as_deref(), Some("alice"));
    assert_eq!(rows[1].key, Some(EmitKey::from("Bob")));
    assert_eq!(rows[1].id.as_deref(), Some("bob"));

    // Rename Alice; the old row must vanish and the new one appear
    let alice = db.get("alice").unwrap().unwrap();
    let rev = Versionstamp::new(alice.rev().unwrap());
    db.replace("alice", &rev, user("alice", "Alicia")).unwrap();

    let old = db.query(&Query::for_view("by-name").key("Alice")).unwrap();
    assert!(old.is_empty());
    let new = db.query(&Query::for_view("by-name").key("Alicia")).unwrap();
    assert_eq!(new.len(), 1);
    assert_eq!(new[0].id.as_deref(), Some("alice"));
}

#[test]
fn test_rows_vanish_on_remove() {
    let db = Database::open("default");
    db.define_view("by-name", by_name()).unwrap();

    let ack = db.insert(user("alice", "Alice")).unwrap();
    db.insert(user("bob", "Bob")).unwrap();
    db.remove("alice", &ack.rev).unwrap();

    let rows = db.query(&Query::for_view("by-name")).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id.as_deref(), Some("bob"));
}

#[test]
fn test_non_matching_documents_emit_nothing() {
    let db = Database::open("default");
    db.define_view("by-name", by_name()).unwrap();

    db.insert(doc(json!({"_id": "cfg", "type": "config", "name": "ignored"})))
        .unwrap();
    db.insert(user("alice", "Alice")).unwrap();

    let rows = db.query(&Query::for_view("by-name")).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id.as_deref(), Some("alice"));
}

// ============================================================================
// Compound keys (seed scenario S3)
// ============================================================================

#[test]
fn test_compound_prefix_selects_department() {
    let db = Database::open("default");
    db.define_view(
        "by-dept-name",
        View::new("by-dept-name:v1", |doc, emit| {
            if let (Some(dept), Some(name)) = (
                doc.get("department").and_then(Value::as_str),
                doc.get("name").and_then(Value::as_str),
            ) {
                emit.emit((dept, name));
            }
        }),
    )
    .unwrap();

    for (id, name, dept) in [
        ("alice", "Alice", "engineering"),
        ("bob", "Bob", "engineering"),
        ("charlie", "Charlie", "sales"),
    ] {
        db.insert(doc(json!({"_id": id, "name": name, "department": dept})))
            .unwrap();
    }

    let rows = db
        .query(&Query::for_view("by-dept-name").prefix("engineering"))
        .unwrap();
    assert_eq!(rows.len(), 2);
    for row in &rows {
        let key = row.key.as_ref().unwrap();
        assert_eq!(key.parts()[0].as_str(), Some("engineering"));
    }
}

// ============================================================================
// Views defined after data exist (rebuild)
// ============================================================================

#[test]
fn test_define_after_inserts_materializes_existing_documents() {
    let db = Database::open("default");
    db.insert(user("alice", "Alice")).unwrap();
    db.insert(user("bob", "Bob")).unwrap();

    db.define_view("by-name", by_name()).unwrap();

    let rows = db.query(&Query::for_view("by-name")).unwrap();
    assert_eq!(rows.len(), 2);
}

#[test]
fn test_redefine_with_same_fingerprint_does_not_rerun_map() {
    let db = Database::open("default");
    db.insert(user("alice", "Alice")).unwrap();
    db.insert(user("bob", "Bob")).unwrap();

    let calls = Arc::new(AtomicUsize::new(0));
    let make_view = |calls: Arc<AtomicUsize>| {
        View::new("counted:v1", move |doc, emit| {
            calls.fetch_add(1, Ordering::SeqCst);
            if let Some(name) = doc.get("name").and_then(Value::as_str) {
                emit.emit(name);
            }
        })
    };

    db.define_view("counted", make_view(calls.clone())).unwrap();
    let after_first = calls.load(Ordering::SeqCst);
    assert_eq!(after_first, 2);

    // Same fingerprint: the design record short-circuits the rebuild
    db.define_view("counted", make_view(calls.clone())).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), after_first);
}

#[test]
fn test_redefine_with_changed_fingerprint_rebuilds() {
    let db = Database::open("default");
    db.insert(user("alice", "Alice")).unwrap();

    let calls = Arc::new(AtomicUsize::new(0));
    let make_view = |fingerprint: &str, calls: Arc<AtomicUsize>| {
        View::new(fingerprint, move |doc, emit| {
            calls.fetch_add(1, Ordering::SeqCst);
            if let Some(name) = doc.get("name").and_then(Value::as_str) {
                emit.emit(name);
            }
        })
    };

    db.define_view("v", make_view("v:1", calls.clone())).unwrap();
    db.define_view("v", make_view("v:2", calls.clone())).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn test_define_is_a_noop_while_design_is_building() {
    let backend: Arc<dyn KvBackend> = Arc::new(MemoryKv::new());
    let db = Database::open_with("default", backend.clone());
    db.insert(user("alice", "Alice")).unwrap();

    // Simulate a rebuild in progress by another caller
    let design = Key::design("default", "by-name");
    AtomicOp::new(backend.clone())
        .set(
            design,
            br#"{"signature":"someone-elses-signature","state":"building"}"#.to_vec(),
        )
        .commit()
        .unwrap();

    db.define_view("by-name", by_name()).unwrap();

    // Registered (queries resolve), but no rows were materialized
    let rows = db.query(&Query::for_view("by-name")).unwrap();
    assert!(rows.is_empty());
}

// ============================================================================
// Back-reference invariant
// ============================================================================

/// For every document and view, the rows under the view prefix whose trailing
/// part is the doc id must equal the composite keys listed by its back-ref.
fn assert_backrefs_match_rows(backend: &Arc<dyn KvBackend>, namespace: &str, view: &str) {
    let rows = backend
        .list(
            &Selector::Prefix(Key::view_prefix(namespace, view)),
            &ScanOptions::all(),
        )
        .unwrap();
    let refs = backend
        .list(
            &Selector::Prefix(Key::view_ref_prefix(namespace, view)),
            &ScanOptions::all(),
        )
        .unwrap();

    let mut row_keys: Vec<Key> = rows.into_iter().map(|entry| entry.key).collect();
    let mut ref_keys: Vec<Key> = refs
        .into_iter()
        .flat_map(|entry| serde_json::from_slice::<Vec<Key>>(&entry.value).unwrap())
        .collect();
    row_keys.sort();
    ref_keys.sort();
    assert_eq!(row_keys, ref_keys);
}

#[test]
fn test_backrefs_name_exactly_the_live_rows() {
    let backend: Arc<dyn KvBackend> = Arc::new(MemoryKv::new());
    let db = Database::open_with("default", backend.clone());
    db.define_view("by-name", by_name()).unwrap();

    db.insert(user("alice", "Alice")).unwrap();
    db.insert(user("bob", "Bob")).unwrap();
    assert_backrefs_match_rows(&backend, "default", "by-name");

    let alice = db.get("alice").unwrap().unwrap();
    let rev = Versionstamp::new(alice.rev().unwrap());
    db.replace("alice", &rev, user("alice", "Alicia")).unwrap();
    assert_backrefs_match_rows(&backend, "default", "by-name");

    let bob = db.get("bob").unwrap().unwrap();
    let rev = Versionstamp::new(bob.rev().unwrap());
    db.remove("bob", &rev).unwrap();
    assert_backrefs_match_rows(&backend, "default", "by-name");

    // An absent document leaves neither rows nor a back-ref
    let refs = backend
        .list(
            &Selector::Prefix(Key::view_ref("default", "by-name", "bob")),
            &ScanOptions::all(),
        )
        .unwrap();
    assert!(refs.is_empty());
}

#[test]
fn test_quiescent_rows_equal_map_over_live_documents() {
    let db = Database::open("default");
    db.define_view("by-name", by_name()).unwrap();

    let a = db.insert(user("alice", "Alice")).unwrap();
    db.insert(user("bob", "Bob")).unwrap();
    let c = db.insert(user("charlie", "Charlie")).unwrap();
    db.insert(doc(json!({"_id": "cfg", "type": "config"}))).unwrap();

    db.replace("alice", &a.rev, user("alice", "Alicia")).unwrap();
    db.remove("charlie", &c.rev).unwrap();

    // Live users: Alicia (alice), Bob (bob)
    let rows = db.query(&Query::for_view("by-name")).unwrap();
    let observed: Vec<(Option<&str>, Option<&str>)> = rows
        .iter()
        .map(|row| {
            (
                row.key.as_ref().and_then(|k| k.parts()[0].as_str()),
                row.id.as_deref(),
            )
        })
        .collect();
    assert_eq!(
        observed,
        vec![(Some("Alicia"), Some("alice")), (Some("Bob"), Some("bob"))]
    );
}

// ============================================================================
// Multiple views per mutation
// ============================================================================

#[test]
fn test_every_registered_view_updates_on_mutation() {
    let db = Database::open("default");
    db.define_view("by-name", by_name()).unwrap();
    db.define_view(
        "by-type",
        View::new("by-type:v1", |doc, emit| {
            if let Some(kind) = doc.get("type").and_then(Value::as_str) {
                emit.emit(kind);
            }
        }),
    )
    .unwrap();

    db.insert(user("alice", "Alice")).unwrap();

    assert_eq!(db.query(&Query::for_view("by-name")).unwrap().len(), 1);
    assert_eq!(db.query(&Query::for_view("by-type")).unwrap().len(), 1);
}

#[test]
fn test_multiple_emissions_per_document() {
    let db = Database::open("default");
    db.define_view(
        "by-tag",
        View::new("by-tag:v1", |doc, emit| {
            if let Some(tags) = doc.get("tags").and_then(Value::as_array) {
                for tag in tags.iter().filter_map(Value::as_str) {
                    emit.emit(tag);
                }
            }
        }),
    )
    .unwrap();

    let ack = db
        .insert(doc(json!({"_id": "post", "tags": ["rust", "databases", "views"]})))
        .unwrap();
    assert_eq!(db.query(&Query::for_view("by-tag")).unwrap().len(), 3);

    db.replace("post", &ack.rev, doc(json!({"tags": ["rust"]})))
        .unwrap();
    let rows = db.query(&Query::for_view("by-tag")).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].key, Some(EmitKey::from("rust")));
}
