//! Typed response shapes.
//!
//! JSON conversion happens only at the daemon edge; the store core returns
//! domain types and `motherd` wraps them in these.

use cas::ContentHash;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::record::{Latest, Record};

/// Response to `putLatest`: the digest of the stored blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PutResponse {
    #[serde(rename = "ref")]
    pub ref_: ContentHash,
}

/// Response to `getLatest`.
///
/// A unique match carries `record`; an ambiguous one carries `records`
/// (one latest per matching tag-set) so the caller can disambiguate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LatestResponse {
    Unique { record: Record },
    Ambiguous { records: Vec<Record> },
}

impl From<Latest> for LatestResponse {
    fn from(latest: Latest) -> Self {
        match latest {
            Latest::Unique(record) => LatestResponse::Unique { record },
            Latest::Ambiguous(records) => LatestResponse::Ambiguous { records },
        }
    }
}

/// Response to history and superset queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordsResponse {
    pub records: Vec<Record>,
}

/// Response to delete operations: how many records were removed.
/// Deleting an absent history is a no-op, reported as zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletedResponse {
    pub deleted: u64,
}

/// Response to a move: the records written under the destination,
/// in replay order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovedResponse {
    pub records: Vec<Record>,
}

/// Liveness and store statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub records: u64,
    pub blobs: u64,
}

/// Wire shape of every error: `{kind, err}`.
///
/// `kind` is the stable string clients pattern-match on
/// (e.g. `exc.kind != "Not found"`); `err` is human-readable detail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub kind: String,
    pub err: String,
}

impl From<&StoreError> for ErrorResponse {
    fn from(err: &StoreError) -> Self {
        Self {
            kind: err.kind().to_string(),
            err: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn record(tags: &str, data: &[u8], seq: u64) -> Record {
        Record::new(tags.parse().unwrap(), ContentHash::from_data(data), seq)
    }

    #[test]
    fn test_latest_response_unique_shape() {
        let resp = LatestResponse::from(Latest::Unique(record("a/b", b"x", 1)));
        let json = serde_json::to_value(&resp).unwrap();
        assert!(json.get("record").is_some());
        assert!(json.get("records").is_none());
    }

    #[test]
    fn test_latest_response_ambiguous_shape() {
        let resp = LatestResponse::from(Latest::Ambiguous(vec![
            record("a/b", b"x", 1),
            record("a/c", b"y", 2),
        ]));
        let json = serde_json::to_value(&resp).unwrap();
        assert!(json.get("record").is_none());
        assert_eq!(json["records"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_latest_response_roundtrip() {
        let resp = LatestResponse::from(Latest::Unique(record("a", b"x", 3)));
        let json = serde_json::to_string(&resp).unwrap();
        let back: LatestResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(resp, back);
    }

    #[test]
    fn test_error_response_shape() {
        let resp = ErrorResponse::from(&StoreError::NotFound);
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["kind"], "Not found");
        assert!(json["err"].is_string());
    }
}
