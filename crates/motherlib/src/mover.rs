//! Tag-set moves.
//!
//! A move replays a source history (or, for superset moves, every history
//! under the source) into rewritten tag-sets, then deletes the source.
//! The two phases never interleave: all destination records are written
//! before anything is removed, so a crash mid-move can lose the cleanup
//! but never the data. Blobs are referenced by digest and never copied.

use std::collections::HashMap;

use cas::ContentHash;
use motherproto::{MoveSpec, Record, StoreError, TagSet};
use tracing::{debug, info};

use crate::store::RecordStore;

/// Move every record matching the spec's source to its destination.
///
/// Returns the destination records written by this call. Replaying a
/// partially-completed move is safe: records whose digest is already
/// present in the destination history are not appended again.
pub fn move_history(
    store: &dyn RecordStore,
    owner: &str,
    spec: &MoveSpec,
) -> Result<Vec<Record>, StoreError> {
    spec.validate()?;

    let src = spec.effective_src();
    let source = if spec.src_superset {
        store.get_superset_history(owner, &src)?
    } else {
        store.get_history(owner, &src)?
    };

    // With a plain source the record's tags are consumed by the move;
    // with a superset source only the source tags are stripped, leaving
    // the differentiating tags in place. A superset destination keeps
    // the source tags entirely, filing them under the new prefix.
    let strip_src = spec.src_superset || !spec.dst_superset;
    let dst = spec.effective_dst();

    debug!(
        owner,
        source_records = source.len(),
        src = %src,
        dst = %dst,
        "starting move"
    );

    // Phase one: write every destination record, oldest first, so the
    // destination histories come out in source order.
    let mut dedupe = DestDedupe::new(store, owner);
    let mut written = Vec::new();
    for record in &source {
        let residual = if strip_src {
            record.tags.difference(&src)
        } else {
            record.tags.clone()
        };
        let new_tags = dst.union(&residual);
        if dedupe.already_present(&new_tags, &record.ref_)? {
            continue;
        }
        written.push(store.append_existing(owner, &new_tags, record.ref_.clone())?);
    }

    // Phase two: drop the source, exactly once.
    let deleted = if spec.src_superset {
        store.delete_superset_history(owner, &src)?
    } else {
        store.delete_history(owner, &src)?
    };

    info!(
        owner,
        written = written.len(),
        deleted,
        src = %src,
        dst = %dst,
        "move complete"
    );
    Ok(written)
}

/// Per-destination-slot digest counts, consumed as replay matches them.
///
/// A retried move finds its earlier writes already in the destination;
/// matching them by digest occurrence keeps the replay idempotent.
struct DestDedupe<'a> {
    store: &'a dyn RecordStore,
    owner: &'a str,
    counts: HashMap<String, HashMap<ContentHash, usize>>,
}

impl<'a> DestDedupe<'a> {
    fn new(store: &'a dyn RecordStore, owner: &'a str) -> Self {
        Self {
            store,
            owner,
            counts: HashMap::new(),
        }
    }

    fn already_present(&mut self, tags: &TagSet, ref_: &ContentHash) -> Result<bool, StoreError> {
        let key = tags.canonical_key();
        if !self.counts.contains_key(&key) {
            let mut counts: HashMap<ContentHash, usize> = HashMap::new();
            match self.store.get_history(self.owner, tags) {
                Ok(history) => {
                    for record in history {
                        *counts.entry(record.ref_).or_default() += 1;
                    }
                }
                Err(StoreError::NotFound) => {}
                Err(err) => return Err(err),
            }
            self.counts.insert(key.clone(), counts);
        }
        let counts = self
            .counts
            .get_mut(&key)
            .ok_or_else(|| StoreError::unavailable("dedupe state missing"))?;
        match counts.get_mut(ref_) {
            Some(n) if *n > 0 => {
                *n -= 1;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
