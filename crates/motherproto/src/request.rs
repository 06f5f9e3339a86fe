//! Request shapes for operations that take a body.

use serde::{Deserialize, Serialize};

use crate::error::MoveConflict;
use crate::tags::{TagError, TagSet};

/// Wire shape of a move request.
///
/// `src`/`dst` are the user-meaningful tags; `namespace` carries the
/// caller's ambient base tags so the server can evaluate preconditions on
/// the normalized sets. The superset flags correspond to a trailing slash
/// in the client syntax (`work/` moves every tag-set under `work`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoveRequest {
    pub src: Vec<String>,
    pub dst: Vec<String>,

    #[serde(default)]
    pub src_superset: bool,

    #[serde(default)]
    pub dst_superset: bool,

    #[serde(default)]
    pub namespace: Vec<String>,
}

/// Validated move parameters.
///
/// `src` and `dst` are normalized: namespace tags are stripped on
/// construction, so the conflict checks compare only user-meaningful tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveSpec {
    src: TagSet,
    dst: TagSet,
    pub src_superset: bool,
    pub dst_superset: bool,
    namespace: TagSet,
}

impl MoveSpec {
    pub fn new(
        src: TagSet,
        dst: TagSet,
        src_superset: bool,
        dst_superset: bool,
        namespace: TagSet,
    ) -> Self {
        Self {
            src: src.difference(&namespace),
            dst: dst.difference(&namespace),
            src_superset,
            dst_superset,
            namespace,
        }
    }

    /// Normalized (namespace-stripped) source tags.
    pub fn src(&self) -> &TagSet {
        &self.src
    }

    /// Normalized (namespace-stripped) destination tags.
    pub fn dst(&self) -> &TagSet {
        &self.dst
    }

    pub fn namespace(&self) -> &TagSet {
        &self.namespace
    }

    /// Source tag-set as queried against the store (namespace included).
    pub fn effective_src(&self) -> TagSet {
        self.namespace.union(&self.src)
    }

    /// Destination tag-set as written to the store (namespace included).
    pub fn effective_dst(&self) -> TagSet {
        self.namespace.union(&self.dst)
    }

    /// Check the move preconditions on the normalized tag-sets.
    ///
    /// Equal, source-subset, and destination-subset moves are all rejected:
    /// the first is a no-op, the second would conflate the source with an
    /// existing broader scope, the third would silently discard the tags
    /// being moved away from.
    pub fn validate(&self) -> Result<(), MoveConflict> {
        if self.src == self.dst {
            return Err(MoveConflict::SourceEqualsDestination);
        }
        if self.src.is_subset(&self.dst) {
            return Err(MoveConflict::SourceSubsetOfDestination);
        }
        if self.dst.is_subset(&self.src) {
            return Err(MoveConflict::DestinationSubsetOfSource);
        }
        Ok(())
    }
}

impl TryFrom<MoveRequest> for MoveSpec {
    type Error = TagError;

    fn try_from(req: MoveRequest) -> Result<Self, Self::Error> {
        let src = TagSet::try_from(req.src)?;
        let dst = TagSet::try_from(req.dst)?;
        let namespace = TagSet::try_from(req.namespace)?;
        src.require_tags()?;
        dst.require_tags()?;
        Ok(MoveSpec::new(
            src,
            dst,
            req.src_superset,
            req.dst_superset,
            namespace,
        ))
    }
}
