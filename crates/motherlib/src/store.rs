//! Record store backends.
//!
//! `MemoryStore` keeps histories in a sharded map keyed by
//! `(owner, canonical tag-set key)` with an inverted tag index alongside;
//! `FileStore` wraps it with a JSON snapshot on disk so the daemon can
//! restart without losing the index (blobs persist through the CAS).
//!
//! Concurrency: appends to the same tag-set serialize under that entry's
//! shard lock while writes to different tag-sets proceed independently.
//! The sequence counter is store-global, so record order is total even
//! when timestamps tie.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use cas::{ContentHash, ContentStore};
use dashmap::DashMap;
use motherproto::{Latest, Record, StoreError, TagSet};

use crate::snapshot::Snapshot;

/// Trait for record storage backends.
///
/// Every operation is scoped to the caller's owner identity; an owner
/// never observes another owner's tag-sets or records.
pub trait RecordStore: Send + Sync {
    /// Store the blob and append a new record under the exact tag-set.
    fn put_latest(&self, owner: &str, tags: &TagSet, data: &[u8]) -> Result<Record, StoreError>;

    /// Append a record pointing at an already-stored digest.
    ///
    /// Used by the move engine: content is never re-uploaded or re-hashed.
    /// Fails `NotFound` if the digest is not in the content store.
    fn append_existing(
        &self,
        owner: &str,
        tags: &TagSet,
        ref_: ContentHash,
    ) -> Result<Record, StoreError>;

    /// Latest record for the query.
    ///
    /// Matches every tag-set containing the query tags: one match yields
    /// `Unique`, several yield `Ambiguous` (one latest per tag-set, in
    /// creation order), none is `NotFound`.
    fn get_latest(&self, owner: &str, query: &TagSet) -> Result<Latest, StoreError>;

    /// Full history of the exact tag-set, oldest first.
    fn get_history(&self, owner: &str, tags: &TagSet) -> Result<Vec<Record>, StoreError>;

    /// One latest record per tag-set matching the superset relation.
    fn get_superset_latest(&self, owner: &str, query: &TagSet) -> Result<Vec<Record>, StoreError>;

    /// All records across every matching tag-set, oldest first.
    fn get_superset_history(&self, owner: &str, query: &TagSet)
        -> Result<Vec<Record>, StoreError>;

    /// Remove every record under the exact tag-set.
    ///
    /// Idempotent: deleting an absent history returns 0.
    fn delete_history(&self, owner: &str, tags: &TagSet) -> Result<u64, StoreError>;

    /// Remove every record under every tag-set matching the superset
    /// relation. Idempotent like `delete_history`.
    fn delete_superset_history(&self, owner: &str, query: &TagSet) -> Result<u64, StoreError>;

    /// Fetch a blob by digest.
    fn get_blob(&self, ref_: &ContentHash) -> Result<Vec<u8>, StoreError>;

    /// Total records across all owners (for health reporting).
    fn record_count(&self) -> u64;

    /// Distinct blobs in the content store (for health reporting).
    fn blob_count(&self) -> Result<u64, StoreError>;

    /// Persist pending state, if the backend persists at all.
    fn flush(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Key of one history partition.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct SlotKey {
    owner: String,
    key: String,
}

impl SlotKey {
    fn new(owner: &str, tags: &TagSet) -> Self {
        Self {
            owner: owner.to_string(),
            key: tags.canonical_key(),
        }
    }
}

/// In-memory record store.
pub struct MemoryStore {
    cas: Arc<dyn ContentStore>,
    histories: DashMap<SlotKey, Vec<Record>>,
    /// Inverted index: (owner, tag) -> canonical keys of tag-sets
    /// containing that tag.
    index: DashMap<(String, String), HashSet<String>>,
    next_seq: AtomicU64,
}

impl MemoryStore {
    pub fn new(cas: Arc<dyn ContentStore>) -> Self {
        Self {
            cas,
            histories: DashMap::new(),
            index: DashMap::new(),
            next_seq: AtomicU64::new(0),
        }
    }

    /// The content store backing this record store.
    pub fn cas(&self) -> &Arc<dyn ContentStore> {
        &self.cas
    }

    fn append(&self, owner: &str, tags: &TagSet, ref_: ContentHash) -> Record {
        let slot = SlotKey::new(owner, tags);

        // Sequence assignment happens under the entry lock so that one
        // history is always ascending in seq.
        let record = {
            let mut history = self.histories.entry(slot.clone()).or_default();
            let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
            let record = Record::new(tags.clone(), ref_, seq);
            history.push(record.clone());
            record
        };

        for tag in tags.iter() {
            self.index
                .entry((owner.to_string(), tag.as_str().to_string()))
                .or_default()
                .insert(slot.key.clone());
        }

        record
    }

    /// Re-insert a record loaded from a snapshot, preserving its sequence
    /// number and timestamp. Callers feed records in ascending seq order.
    pub(crate) fn restore(&self, owner: &str, record: Record) {
        let slot = SlotKey::new(owner, &record.tags);
        self.next_seq.fetch_max(record.seq + 1, Ordering::SeqCst);
        for tag in record.tags.iter() {
            self.index
                .entry((owner.to_string(), tag.as_str().to_string()))
                .or_default()
                .insert(slot.key.clone());
        }
        self.histories.entry(slot).or_default().push(record);
    }

    /// Canonical keys of every tag-set of `owner` containing `query`.
    fn superset_slots(&self, owner: &str, query: &TagSet) -> Vec<SlotKey> {
        let candidates: Option<HashSet<String>> = if query.is_empty() {
            // Empty query matches everything the owner has.
            Some(
                self.histories
                    .iter()
                    .filter(|entry| entry.key().owner == owner)
                    .map(|entry| entry.key().key.clone())
                    .collect(),
            )
        } else {
            // Intersect the per-tag key sets, cheapest set first would be
            // nice but the sets are small; clone out to avoid holding
            // index shard locks while we touch histories.
            let mut acc: Option<HashSet<String>> = None;
            for tag in query.iter() {
                let keys = self
                    .index
                    .get(&(owner.to_string(), tag.as_str().to_string()))
                    .map(|entry| entry.value().clone())
                    .unwrap_or_default();
                acc = Some(match acc {
                    None => keys,
                    Some(prev) => prev.intersection(&keys).cloned().collect(),
                });
                if acc.as_ref().is_some_and(HashSet::is_empty) {
                    break;
                }
            }
            acc
        };

        let mut slots: Vec<SlotKey> = candidates
            .unwrap_or_default()
            .into_iter()
            .map(|key| SlotKey {
                owner: owner.to_string(),
                key,
            })
            // The index is a candidate set; confirm the subset relation
            // against the actual tag-set.
            .filter(|slot| {
                self.histories
                    .get(slot)
                    .map(|history| {
                        history
                            .first()
                            .is_some_and(|record| query.is_subset(&record.tags))
                    })
                    .unwrap_or(false)
            })
            .collect();
        slots.sort_by(|a, b| a.key.cmp(&b.key));
        slots
    }

    /// Remove one history and prune its tags from the inverted index.
    fn remove_slot(&self, slot: &SlotKey) -> u64 {
        let Some((_, records)) = self.histories.remove(slot) else {
            return 0;
        };
        if let Some(first) = records.first() {
            for tag in first.tags.iter() {
                let index_key = (slot.owner.clone(), tag.as_str().to_string());
                if let Some(mut keys) = self.index.get_mut(&index_key) {
                    keys.remove(&slot.key);
                    if keys.is_empty() {
                        drop(keys);
                        self.index.remove_if(&index_key, |_, v| v.is_empty());
                    }
                }
            }
        }
        records.len() as u64
    }

    /// Dump every record, ascending by seq, for snapshotting.
    pub(crate) fn snapshot(&self) -> Snapshot {
        let mut snapshot = Snapshot {
            next_seq: self.next_seq.load(Ordering::SeqCst),
            records: Vec::new(),
        };
        for entry in self.histories.iter() {
            for record in entry.value().iter() {
                snapshot.push(&entry.key().owner, record.clone());
            }
        }
        snapshot.records.sort_by_key(|r| r.record.seq);
        snapshot
    }
}

impl RecordStore for MemoryStore {
    fn put_latest(&self, owner: &str, tags: &TagSet, data: &[u8]) -> Result<Record, StoreError> {
        tags.require_tags()?;
        let ref_ = self.cas.put(data).map_err(StoreError::unavailable)?;
        Ok(self.append(owner, tags, ref_))
    }

    fn append_existing(
        &self,
        owner: &str,
        tags: &TagSet,
        ref_: ContentHash,
    ) -> Result<Record, StoreError> {
        tags.require_tags()?;
        if !self.cas.exists(&ref_) {
            return Err(StoreError::NotFound);
        }
        Ok(self.append(owner, tags, ref_))
    }

    fn get_latest(&self, owner: &str, query: &TagSet) -> Result<Latest, StoreError> {
        let mut latest = self.get_superset_latest(owner, query)?;
        if latest.len() == 1 {
            Ok(Latest::Unique(latest.remove(0)))
        } else {
            Ok(Latest::Ambiguous(latest))
        }
    }

    fn get_history(&self, owner: &str, tags: &TagSet) -> Result<Vec<Record>, StoreError> {
        tags.require_tags()?;
        let slot = SlotKey::new(owner, tags);
        match self.histories.get(&slot) {
            Some(history) if !history.is_empty() => Ok(history.value().clone()),
            _ => Err(StoreError::NotFound),
        }
    }

    fn get_superset_latest(&self, owner: &str, query: &TagSet) -> Result<Vec<Record>, StoreError> {
        let slots = self.superset_slots(owner, query);
        let mut latest: Vec<Record> = slots
            .iter()
            .filter_map(|slot| {
                self.histories
                    .get(slot)
                    .and_then(|history| history.last().cloned())
            })
            .collect();
        if latest.is_empty() {
            return Err(StoreError::NotFound);
        }
        latest.sort_by_key(|record| record.seq);
        Ok(latest)
    }

    fn get_superset_history(
        &self,
        owner: &str,
        query: &TagSet,
    ) -> Result<Vec<Record>, StoreError> {
        let slots = self.superset_slots(owner, query);
        let mut records: Vec<Record> = slots
            .iter()
            .filter_map(|slot| self.histories.get(slot).map(|history| history.value().clone()))
            .flatten()
            .collect();
        if records.is_empty() {
            return Err(StoreError::NotFound);
        }
        records.sort_by_key(|record| record.seq);
        Ok(records)
    }

    fn delete_history(&self, owner: &str, tags: &TagSet) -> Result<u64, StoreError> {
        tags.require_tags()?;
        Ok(self.remove_slot(&SlotKey::new(owner, tags)))
    }

    fn delete_superset_history(&self, owner: &str, query: &TagSet) -> Result<u64, StoreError> {
        let slots = self.superset_slots(owner, query);
        let mut deleted = 0;
        for slot in &slots {
            deleted += self.remove_slot(slot);
        }
        Ok(deleted)
    }

    fn get_blob(&self, ref_: &ContentHash) -> Result<Vec<u8>, StoreError> {
        self.cas
            .get(ref_)
            .map_err(StoreError::unavailable)?
            .ok_or(StoreError::NotFound)
    }

    fn record_count(&self) -> u64 {
        self.histories
            .iter()
            .map(|entry| entry.value().len() as u64)
            .sum()
    }

    fn blob_count(&self) -> Result<u64, StoreError> {
        self.cas
            .len()
            .map(|n| n as u64)
            .map_err(StoreError::unavailable)
    }
}

/// File-backed record store: `MemoryStore` plus a JSON snapshot rewritten
/// after every mutation (atomic write: temp file, then rename).
///
/// Saves serialize on `save_lock` and build the snapshot while holding
/// it, so the rename that lands last always carries the newest state.
pub struct FileStore {
    path: PathBuf,
    inner: MemoryStore,
    save_lock: Mutex<()>,
}

impl FileStore {
    /// Open (or create) a snapshot at `path`, rebuilding the index from it.
    pub fn open(path: impl AsRef<Path>, cas: Arc<dyn ContentStore>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let inner = MemoryStore::new(cas);

        if let Some(mut snapshot) = Snapshot::load(&path)? {
            snapshot.records.sort_by_key(|r| r.record.seq);
            let count = snapshot.records.len();
            inner
                .next_seq
                .fetch_max(snapshot.next_seq, Ordering::SeqCst);
            for owned in snapshot.records {
                inner.restore(&owned.owner, owned.record);
            }
            tracing::info!(records = count, path = %path.display(), "loaded record snapshot");
        }

        Ok(Self {
            path,
            inner,
            save_lock: Mutex::new(()),
        })
    }

    /// The content store backing this record store.
    pub fn cas(&self) -> &Arc<dyn ContentStore> {
        self.inner.cas()
    }

    fn save(&self) -> Result<(), StoreError> {
        let _guard = match self.save_lock.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        self.inner.snapshot().save(&self.path)
    }

    /// A record that appended in memory is already visible to readers,
    /// so a failed snapshot write must not fail the mutation. The next
    /// mutation or `flush` rewrites the whole file anyway.
    fn save_after_mutation(&self) {
        if let Err(err) = self.save() {
            tracing::error!(error = %err, path = %self.path.display(), "snapshot write failed");
        }
    }
}

impl RecordStore for FileStore {
    fn put_latest(&self, owner: &str, tags: &TagSet, data: &[u8]) -> Result<Record, StoreError> {
        let record = self.inner.put_latest(owner, tags, data)?;
        self.save_after_mutation();
        Ok(record)
    }

    fn append_existing(
        &self,
        owner: &str,
        tags: &TagSet,
        ref_: ContentHash,
    ) -> Result<Record, StoreError> {
        let record = self.inner.append_existing(owner, tags, ref_)?;
        self.save_after_mutation();
        Ok(record)
    }

    fn get_latest(&self, owner: &str, query: &TagSet) -> Result<Latest, StoreError> {
        self.inner.get_latest(owner, query)
    }

    fn get_history(&self, owner: &str, tags: &TagSet) -> Result<Vec<Record>, StoreError> {
        self.inner.get_history(owner, tags)
    }

    fn get_superset_latest(&self, owner: &str, query: &TagSet) -> Result<Vec<Record>, StoreError> {
        self.inner.get_superset_latest(owner, query)
    }

    fn get_superset_history(
        &self,
        owner: &str,
        query: &TagSet,
    ) -> Result<Vec<Record>, StoreError> {
        self.inner.get_superset_history(owner, query)
    }

    fn delete_history(&self, owner: &str, tags: &TagSet) -> Result<u64, StoreError> {
        let deleted = self.inner.delete_history(owner, tags)?;
        if deleted > 0 {
            self.save_after_mutation();
        }
        Ok(deleted)
    }

    fn delete_superset_history(&self, owner: &str, query: &TagSet) -> Result<u64, StoreError> {
        let deleted = self.inner.delete_superset_history(owner, query)?;
        if deleted > 0 {
            self.save_after_mutation();
        }
        Ok(deleted)
    }

    fn get_blob(&self, ref_: &ContentHash) -> Result<Vec<u8>, StoreError> {
        self.inner.get_blob(ref_)
    }

    fn record_count(&self) -> u64 {
        self.inner.record_count()
    }

    fn blob_count(&self) -> Result<u64, StoreError> {
        self.inner.blob_count()
    }

    fn flush(&self) -> Result<(), StoreError> {
        self.save()
    }
}
