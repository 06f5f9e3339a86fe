//! Records: one immutable write event under a tag-set.

use cas::ContentHash;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::tags::TagSet;

/// One version in a tag-set's history.
///
/// Records are immutable once created: a write never mutates an existing
/// record, it appends a new one. `seq` is assigned from a store-global
/// monotonic counter at append time and totally orders records, breaking
/// `created` timestamp ties deterministically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// The tag-set at time of write.
    pub tags: TagSet,

    /// Digest of the associated blob in the content store.
    #[serde(rename = "ref")]
    pub ref_: ContentHash,

    /// When the record was written.
    pub created: DateTime<Utc>,

    /// Store-global append sequence number.
    pub seq: u64,
}

impl Record {
    pub fn new(tags: TagSet, ref_: ContentHash, seq: u64) -> Self {
        Self {
            tags,
            ref_,
            created: Utc::now(),
            seq,
        }
    }
}

/// Result of a latest-version lookup.
///
/// The query matches every tag-set containing the queried tags; exactly one
/// match yields `Unique`, several yield `Ambiguous` with one latest record
/// per matching tag-set so the caller can disambiguate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Latest {
    Unique(Record),
    Ambiguous(Vec<Record>),
}

impl Latest {
    /// The unique record, if the lookup was unambiguous.
    pub fn unique(self) -> Option<Record> {
        match self {
            Latest::Unique(record) => Some(record),
            Latest::Ambiguous(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_serializes_ref_field() {
        let record = Record::new(
            "a/b".parse().unwrap(),
            ContentHash::from_data(b"payload"),
            7,
        );

        let json = serde_json::to_value(&record).unwrap();
        assert!(json.get("ref").is_some());
        assert!(json.get("ref_").is_none());
        assert_eq!(json["seq"], 7);
        assert_eq!(json["tags"], serde_json::json!(["a", "b"]));

        let back: Record = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_latest_unique() {
        let record = Record::new("a".parse().unwrap(), ContentHash::from_data(b"x"), 1);
        assert_eq!(Latest::Unique(record.clone()).unique(), Some(record));
        assert_eq!(Latest::Ambiguous(vec![]).unique(), None);
    }
}
