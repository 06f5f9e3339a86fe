//! JSON snapshot of the record index.
//!
//! Blobs live in the content store; only the tag-set histories and the
//! sequence counter need to survive a restart. The snapshot is a flat
//! list of owner-tagged records, written whole through a temp file and
//! an atomic rename.

use std::fs;
use std::path::Path;

use motherproto::{Record, StoreError};
use serde::{Deserialize, Serialize};

/// One record together with the owner it belongs to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OwnedRecord {
    pub owner: String,
    #[serde(flatten)]
    pub record: Record,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Snapshot {
    pub next_seq: u64,
    pub records: Vec<OwnedRecord>,
}

impl Snapshot {
    pub(crate) fn push(&mut self, owner: &str, record: Record) {
        self.records.push(OwnedRecord {
            owner: owner.to_string(),
            record,
        });
    }

    /// Read a snapshot from `path`. A missing file is not an error; it
    /// just means a fresh store.
    pub fn load(path: &Path) -> Result<Option<Self>, StoreError> {
        let data = match fs::read(path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(StoreError::unavailable(err)),
        };
        let snapshot = serde_json::from_slice(&data).map_err(StoreError::unavailable)?;
        Ok(Some(snapshot))
    }

    /// Write the snapshot to `path`, atomically.
    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(StoreError::unavailable)?;
        }
        let json = serde_json::to_vec_pretty(self).map_err(StoreError::unavailable)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, &json).map_err(StoreError::unavailable)?;
        fs::rename(&tmp, path).map_err(StoreError::unavailable)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cas::ContentHash;
    use motherproto::TagSet;

    #[test]
    fn test_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.json");

        let tags: TagSet = "a/b".parse().unwrap();
        let mut snapshot = Snapshot {
            next_seq: 7,
            records: Vec::new(),
        };
        snapshot.push("alice", Record::new(tags, ContentHash::from_data(b"x"), 6));
        snapshot.save(&path).unwrap();

        let loaded = Snapshot::load(&path).unwrap().unwrap();
        assert_eq!(loaded.next_seq, 7);
        assert_eq!(loaded.records.len(), 1);
        assert_eq!(loaded.records[0].owner, "alice");
        assert_eq!(loaded.records[0].record.seq, 6);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = Snapshot::load(&dir.path().join("absent.json")).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_load_corrupt_file_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.json");
        fs::write(&path, b"{ not json").unwrap();
        assert!(matches!(
            Snapshot::load(&path),
            Err(StoreError::Unavailable(_))
        ));
    }
}
