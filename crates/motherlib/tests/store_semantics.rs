//! End-to-end semantics of the record store and the move engine,
//! exercised through the `RecordStore` trait the way the daemon uses it.

use std::sync::Arc;
use std::thread;

use cas::ContentStore;
use motherlib::{move_history, FileStore, MemoryStore, RecordStore};
use motherproto::{Latest, MoveSpec, StoreError, TagSet};

fn memory_store() -> MemoryStore {
    MemoryStore::new(Arc::new(cas::MemoryStore::new()))
}

fn ts(s: &str) -> TagSet {
    s.parse().unwrap()
}

#[test]
fn concurrent_writers_to_one_tag_set() {
    let store = Arc::new(memory_store());
    let writers = 8;
    let per_writer = 25;

    let mut handles = Vec::new();
    for w in 0..writers {
        let store = Arc::clone(&store);
        handles.push(thread::spawn(move || {
            for i in 0..per_writer {
                let data = format!("writer {w} value {i}");
                store
                    .put_latest("alice", &ts("shared/slot"), data.as_bytes())
                    .unwrap();
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    let history = store.get_history("alice", &ts("shared/slot")).unwrap();
    assert_eq!(history.len(), writers * per_writer);
    assert!(history.windows(2).all(|w| w[0].seq < w[1].seq));
    // The latest is the final history entry, whoever wrote it.
    assert_eq!(
        store
            .get_latest("alice", &ts("shared/slot"))
            .unwrap()
            .unique(),
        history.last().cloned()
    );
}

#[test]
fn concurrent_writers_to_distinct_tag_sets() {
    let store = Arc::new(memory_store());
    let mut handles = Vec::new();
    for w in 0..8 {
        let store = Arc::clone(&store);
        handles.push(thread::spawn(move || {
            let tags = ts(&format!("writer-{w}/data"));
            for i in 0..20u8 {
                store.put_latest("alice", &tags, &[w, i]).unwrap();
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    for w in 0..8 {
        let history = store
            .get_history("alice", &ts(&format!("writer-{w}/data")))
            .unwrap();
        assert_eq!(history.len(), 20);
    }
    assert_eq!(store.record_count(), 160);
}

#[test]
fn concurrent_file_store_writers_never_fail_and_all_persist() {
    let dir = tempfile::tempdir().unwrap();
    let cas: Arc<dyn ContentStore> =
        Arc::new(cas::FileStore::at_path(dir.path().join("cas")).unwrap());
    let snapshot = dir.path().join("records.json");

    let store = Arc::new(FileStore::open(&snapshot, cas.clone()).unwrap());
    let mut handles = Vec::new();
    for w in 0..8 {
        let store = Arc::clone(&store);
        handles.push(thread::spawn(move || {
            let tags = ts(&format!("writer-{w}/data"));
            for i in 0..50u8 {
                // Every acknowledged write comes back Ok, no matter how
                // many snapshot rewrites are in flight.
                store.put_latest("alice", &tags, &[w, i]).unwrap();
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(store.record_count(), 400);
    drop(store);

    // The last snapshot on disk carries every acknowledged write.
    let store = FileStore::open(&snapshot, cas).unwrap();
    assert_eq!(store.record_count(), 400);
    for w in 0..8 {
        let history = store
            .get_history("alice", &ts(&format!("writer-{w}/data")))
            .unwrap();
        assert_eq!(history.len(), 50);
        assert!(history.windows(2).all(|h| h[0].seq < h[1].seq));
    }
}

#[test]
fn latest_ambiguity_resolves_as_sets_narrow() {
    let store = memory_store();
    store.put_latest("alice", &ts("proj/a/draft"), b"d").unwrap();
    store.put_latest("alice", &ts("proj/a/final"), b"f").unwrap();
    store.put_latest("alice", &ts("proj/b"), b"b").unwrap();

    match store.get_latest("alice", &ts("proj")).unwrap() {
        Latest::Ambiguous(records) => assert_eq!(records.len(), 3),
        Latest::Unique(_) => panic!("expected ambiguity at the broad query"),
    }
    match store.get_latest("alice", &ts("proj/a")).unwrap() {
        Latest::Ambiguous(records) => assert_eq!(records.len(), 2),
        Latest::Unique(_) => panic!("expected ambiguity at the middle query"),
    }
    assert!(store
        .get_latest("alice", &ts("proj/a/final"))
        .unwrap()
        .unique()
        .is_some());
}

#[test]
fn deleting_records_leaves_blobs_for_other_tag_sets() {
    let store = memory_store();
    let shared = store.put_latest("alice", &ts("keep"), b"shared").unwrap();
    store.put_latest("alice", &ts("drop"), b"shared").unwrap();

    store.delete_history("alice", &ts("drop")).unwrap();
    assert_eq!(store.get_blob(&shared.ref_).unwrap(), b"shared");
}

#[test]
fn superset_move_then_query_under_new_prefix() {
    let store = memory_store();
    store.put_latest("alice", &ts("work/2025/notes"), b"n1").unwrap();
    store.put_latest("alice", &ts("work/2025/notes"), b"n2").unwrap();
    store.put_latest("alice", &ts("work/2026/plan"), b"p").unwrap();

    let spec = MoveSpec::new(ts("work"), ts("archive"), true, false, TagSet::new());
    move_history(&store, "alice", &spec).unwrap();

    let notes = store
        .get_history("alice", &ts("archive/2025/notes"))
        .unwrap();
    assert_eq!(notes.len(), 2);
    assert_eq!(store.get_blob(&notes[1].ref_).unwrap(), b"n2");
    assert!(store.get_latest("alice", &ts("archive/2026/plan")).is_ok());
    assert!(matches!(
        store.get_superset_latest("alice", &ts("work")),
        Err(StoreError::NotFound)
    ));
}

#[test]
fn move_is_owner_scoped() {
    let store = memory_store();
    store.put_latest("alice", &ts("a"), b"alice").unwrap();
    store.put_latest("bob", &ts("a"), b"bob").unwrap();

    let spec = MoveSpec::new(ts("a"), ts("b"), false, false, TagSet::new());
    move_history(&store, "alice", &spec).unwrap();

    // Bob's record under the old tags is untouched.
    let bob = store.get_latest("bob", &ts("a")).unwrap().unique().unwrap();
    assert_eq!(store.get_blob(&bob.ref_).unwrap(), b"bob");
    assert!(matches!(
        store.get_latest("bob", &ts("b")),
        Err(StoreError::NotFound)
    ));
}

#[test]
fn file_store_survives_moves_across_restart() {
    let dir = tempfile::tempdir().unwrap();
    let cas: Arc<dyn ContentStore> =
        Arc::new(cas::FileStore::at_path(dir.path().join("cas")).unwrap());
    let snapshot = dir.path().join("records.json");

    {
        let store = FileStore::open(&snapshot, cas.clone()).unwrap();
        store.put_latest("alice", &ts("a"), b"v1").unwrap();
        let spec = MoveSpec::new(ts("a"), ts("b"), false, false, TagSet::new());
        move_history(&store, "alice", &spec).unwrap();
    }

    let store = FileStore::open(&snapshot, cas).unwrap();
    let latest = store.get_latest("alice", &ts("b")).unwrap().unique().unwrap();
    assert_eq!(store.get_blob(&latest.ref_).unwrap(), b"v1");
    assert!(matches!(
        store.get_history("alice", &ts("a")),
        Err(StoreError::NotFound)
    ));
}
