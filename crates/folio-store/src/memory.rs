//! MemoryKv: in-memory storage backend with BTreeMap and version management
//!
//! Implements the [`KvBackend`] trait using:
//! - `BTreeMap<Key, Stored>` for ordered key storage
//! - `parking_lot::RwLock` for thread-safe access
//! - `AtomicU64` for monotonically increasing commit sequence numbers
//!
//! # Design Notes
//!
//! - **No version history**: each key stores only its latest value
//! - **One versionstamp per commit**: every key written by a batch carries
//!   the same stamp, allocated from the global sequence
//! - **Sequence allocation before the write lock**: keeps version assignment
//!   off the critical section; uniqueness is what the checks rely on

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use folio_core::{Key, Result, Versionstamp};

use crate::backend::{
    AtomicCommit, CommitResult, KvBackend, KvEntry, Mutation, ScanOptions, Selector,
};

#[derive(Debug, Clone)]
struct Stored {
    value: Vec<u8>,
    versionstamp: Versionstamp,
}

/// In-memory ordered store
///
/// Thread-safe through `parking_lot::RwLock` and `AtomicU64`. Suitable as the
/// default backend for an embedded database and as the substrate for tests.
#[derive(Debug, Default)]
pub struct MemoryKv {
    data: RwLock<BTreeMap<Key, Stored>>,
    sequence: AtomicU64,
}

impl MemoryKv {
    /// Create a new empty store
    ///
    /// The commit sequence starts at 0 (no commits have occurred).
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next commit sequence number
    fn next_sequence(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Number of live entries (test and introspection helper)
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// True if the store holds no entries
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }
}

impl KvBackend for MemoryKv {
    fn get(&self, key: &Key) -> Result<Option<KvEntry>> {
        let data = self.data.read();
        Ok(data.get(key).map(|stored| KvEntry {
            key: key.clone(),
            value: stored.value.clone(),
            versionstamp: stored.versionstamp.clone(),
        }))
    }

    fn list(&self, selector: &Selector, options: &ScanOptions) -> Result<Vec<KvEntry>> {
        let data = self.data.read();

        let mut entries: Vec<KvEntry> = match selector {
            Selector::Prefix(prefix) => data
                .range((Bound::Included(prefix.clone()), Bound::Unbounded))
                .take_while(|(k, _)| k.starts_with(prefix))
                .map(|(k, stored)| KvEntry {
                    key: k.clone(),
                    value: stored.value.clone(),
                    versionstamp: stored.versionstamp.clone(),
                })
                .collect(),
            Selector::Range { start, end } => {
                // BTreeMap::range panics on inverted bounds; an empty or
                // inverted interval selects nothing
                if start >= end {
                    Vec::new()
                } else {
                    data.range((Bound::Included(start.clone()), Bound::Excluded(end.clone())))
                        .map(|(k, stored)| KvEntry {
                            key: k.clone(),
                            value: stored.value.clone(),
                            versionstamp: stored.versionstamp.clone(),
                        })
                        .collect()
                }
            }
        };

        if options.reverse {
            entries.reverse();
        }
        if let Some(limit) = options.limit {
            entries.truncate(limit);
        }

        Ok(entries)
    }

    fn commit(&self, batch: AtomicCommit) -> Result<CommitResult> {
        // Allocate the stamp BEFORE acquiring the write lock
        let versionstamp = Versionstamp::from_sequence(self.next_sequence());

        let mut data = self.data.write();

        for check in &batch.checks {
            let current = data.get(&check.key).map(|stored| &stored.versionstamp);
            if current != check.versionstamp.as_ref() {
                return Ok(CommitResult {
                    ok: false,
                    versionstamp: None,
                });
            }
        }

        for mutation in batch.mutations {
            match mutation {
                Mutation::Set { key, value } => {
                    data.insert(
                        key,
                        Stored {
                            value,
                            versionstamp: versionstamp.clone(),
                        },
                    );
                }
                Mutation::Delete { key } => {
                    data.remove(&key);
                }
            }
        }

        Ok(CommitResult {
            ok: true,
            versionstamp: Some(versionstamp),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    use folio_core::EmitKey;

    fn set(kv: &MemoryKv, key: Key, value: &[u8]) -> Versionstamp {
        let batch = AtomicCommit {
            checks: vec![],
            mutations: vec![Mutation::Set {
                key,
                value: value.to_vec(),
            }],
        };
        kv.commit(batch).unwrap().versionstamp.unwrap()
    }

    // ========================================
    // Creation and point reads
    // ========================================

    #[test]
    fn test_store_creation() {
        let kv = MemoryKv::new();
        assert!(kv.is_empty());
        assert!(kv.get(&Key::doc("n", "missing")).unwrap().is_none());
    }

    #[test]
    fn test_set_and_get() {
        let kv = MemoryKv::new();
        let key = Key::doc("n", "alice");
        let stamp = set(&kv, key.clone(), b"payload");

        let entry = kv.get(&key).unwrap().unwrap();
        assert_eq!(entry.value, b"payload");
        assert_eq!(entry.versionstamp, stamp);
    }

    // ========================================
    // Versionstamp allocation
    // ========================================

    #[test]
    fn test_versionstamps_are_monotonic_per_commit() {
        let kv = MemoryKv::new();
        let v1 = set(&kv, Key::doc("n", "a"), b"1");
        let v2 = set(&kv, Key::doc("n", "b"), b"2");
        let v3 = set(&kv, Key::doc("n", "a"), b"3");
        assert!(v1 < v2);
        assert!(v2 < v3);
    }

    #[test]
    fn test_one_stamp_per_batch() {
        let kv = MemoryKv::new();
        let batch = AtomicCommit {
            checks: vec![],
            mutations: vec![
                Mutation::Set {
                    key: Key::doc("n", "a"),
                    value: vec![1],
                },
                Mutation::Set {
                    key: Key::doc("n", "b"),
                    value: vec![2],
                },
            ],
        };
        let stamp = kv.commit(batch).unwrap().versionstamp.unwrap();
        assert_eq!(kv.get(&Key::doc("n", "a")).unwrap().unwrap().versionstamp, stamp);
        assert_eq!(kv.get(&Key::doc("n", "b")).unwrap().unwrap().versionstamp, stamp);
    }

    // ========================================
    // Checks
    // ========================================

    #[test]
    fn test_absent_check_passes_then_fails() {
        let kv = MemoryKv::new();
        let key = Key::doc("n", "a");

        let first = kv
            .commit(AtomicCommit {
                checks: vec![crate::backend::Check {
                    key: key.clone(),
                    versionstamp: None,
                }],
                mutations: vec![Mutation::Set {
                    key: key.clone(),
                    value: vec![1],
                }],
            })
            .unwrap();
        assert!(first.ok);

        let second = kv
            .commit(AtomicCommit {
                checks: vec![crate::backend::Check {
                    key: key.clone(),
                    versionstamp: None,
                }],
                mutations: vec![Mutation::Set {
                    key,
                    value: vec![2],
                }],
            })
            .unwrap();
        assert!(!second.ok);
    }

    #[test]
    fn test_stale_stamp_check_fails_and_changes_nothing() {
        let kv = MemoryKv::new();
        let key = Key::doc("n", "a");
        let v1 = set(&kv, key.clone(), b"1");
        let _v2 = set(&kv, key.clone(), b"2");

        let result = kv
            .commit(AtomicCommit {
                checks: vec![crate::backend::Check {
                    key: key.clone(),
                    versionstamp: Some(v1),
                }],
                mutations: vec![Mutation::Set {
                    key: key.clone(),
                    value: b"3".to_vec(),
                }],
            })
            .unwrap();
        assert!(!result.ok);
        assert_eq!(kv.get(&key).unwrap().unwrap().value, b"2");
    }

    #[test]
    fn test_current_stamp_check_passes() {
        let kv = MemoryKv::new();
        let key = Key::doc("n", "a");
        let v1 = set(&kv, key.clone(), b"1");

        let result = kv
            .commit(AtomicCommit {
                checks: vec![crate::backend::Check {
                    key: key.clone(),
                    versionstamp: Some(v1),
                }],
                mutations: vec![Mutation::Delete { key: key.clone() }],
            })
            .unwrap();
        assert!(result.ok);
        assert!(kv.get(&key).unwrap().is_none());
    }

    // ========================================
    // Scans
    // ========================================

    #[test]
    fn test_prefix_scan_is_ordered_and_scoped() {
        let kv = MemoryKv::new();
        set(&kv, Key::doc("n", "charlie"), b"3");
        set(&kv, Key::doc("n", "alice"), b"1");
        set(&kv, Key::doc("n", "bob"), b"2");
        set(&kv, Key::doc("other", "dora"), b"x");
        set(&kv, Key::design("n", "view"), b"d");

        let entries = kv
            .list(&Selector::Prefix(Key::doc_prefix("n")), &ScanOptions::all())
            .unwrap();
        let ids: Vec<_> = entries.iter().filter_map(|e| e.key.doc_id()).collect();
        assert_eq!(ids, vec!["alice", "bob", "charlie"]);
    }

    #[test]
    fn test_prefix_scan_over_emit_keys() {
        let kv = MemoryKv::new();
        for (dept, name, id) in [
            ("engineering", "Alice", "alice"),
            ("engineering", "Bob", "bob"),
            ("sales", "Charlie", "charlie"),
        ] {
            let key = Key::view_row("n", "by-dept", &EmitKey::from((dept, name)), id);
            set(&kv, key, b"{}");
        }

        let prefix = Key::view_row_prefix("n", "by-dept", &EmitKey::from("engineering"));
        let entries = kv
            .list(&Selector::Prefix(prefix), &ScanOptions::all())
            .unwrap();
        assert_eq!(entries.len(), 2);
    }

    #[test]
    fn test_range_scan_is_half_open() {
        let kv = MemoryKv::new();
        for id in ["a", "b", "c", "d"] {
            set(&kv, Key::doc("n", id), b"x");
        }
        let entries = kv
            .list(
                &Selector::Range {
                    start: Key::doc("n", "b"),
                    end: Key::doc("n", "d"),
                },
                &ScanOptions::all(),
            )
            .unwrap();
        let ids: Vec<_> = entries.iter().filter_map(|e| e.key.doc_id()).collect();
        assert_eq!(ids, vec!["b", "c"]);
    }

    #[test]
    fn test_inverted_range_selects_nothing() {
        let kv = MemoryKv::new();
        set(&kv, Key::doc("n", "a"), b"x");
        let entries = kv
            .list(
                &Selector::Range {
                    start: Key::doc("n", "z"),
                    end: Key::doc("n", "a"),
                },
                &ScanOptions::all(),
            )
            .unwrap();
        assert!(entries.is_empty());
    }

    #[test]
    fn test_reverse_scan_with_limit_takes_the_tail() {
        let kv = MemoryKv::new();
        for id in ["a", "b", "c", "d"] {
            set(&kv, Key::doc("n", id), b"x");
        }
        let entries = kv
            .list(
                &Selector::Prefix(Key::doc_prefix("n")),
                &ScanOptions {
                    reverse: true,
                    limit: Some(2),
                },
            )
            .unwrap();
        let ids: Vec<_> = entries.iter().filter_map(|e| e.key.doc_id()).collect();
        assert_eq!(ids, vec!["d", "c"]);
    }

    #[test]
    fn test_forward_limit() {
        let kv = MemoryKv::new();
        for id in ["a", "b", "c"] {
            set(&kv, Key::doc("n", id), b"x");
        }
        let entries = kv
            .list(
                &Selector::Prefix(Key::doc_prefix("n")),
                &ScanOptions {
                    reverse: false,
                    limit: Some(2),
                },
            )
            .unwrap();
        let ids: Vec<_> = entries.iter().filter_map(|e| e.key.doc_id()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    // ========================================
    // Concurrency
    // ========================================

    #[test]
    fn test_concurrent_commits_allocate_unique_stamps() {
        let kv = Arc::new(MemoryKv::new());
        let num_threads = 8;
        let writes_per_thread = 50;

        let mut handles = vec![];
        for t in 0..num_threads {
            let kv = Arc::clone(&kv);
            handles.push(thread::spawn(move || {
                for i in 0..writes_per_thread {
                    let key = Key::doc("n", &format!("t{t}-k{i}"));
                    let batch = AtomicCommit {
                        checks: vec![],
                        mutations: vec![Mutation::Set {
                            key,
                            value: vec![t as u8, i as u8],
                        }],
                    };
                    assert!(kv.commit(batch).unwrap().ok);
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(kv.len(), num_threads * writes_per_thread);
    }

    #[test]
    fn test_store_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}
        assert_send::<MemoryKv>();
        assert_sync::<MemoryKv>();
    }
}
