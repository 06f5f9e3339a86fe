//! motherproto - Protocol types for the Mothership record store.
//!
//! This crate defines the domain types shared by the store core
//! (`motherlib`) and the HTTP daemon (`motherd`), plus the request and
//! response shapes that cross the wire.
//!
//! ## Design Principles
//!
//! 1. **Rich types** - tag-sets are a real set type with explicit
//!    equality, subset, and union operations, not ambient language
//!    semantics over string lists.
//! 2. **Results, not exceptions** - lookups return
//!    `Found | NotFound | Ambiguous(list)` style variants; callers
//!    pattern-match instead of catching.
//! 3. **Stable wire shapes** - records serialize with a `ref` field and
//!    errors as `{kind, err}`, which is exactly what the existing
//!    clients pattern-match on.

pub mod error;
pub mod record;
pub mod request;
pub mod responses;
pub mod tags;

pub use error::{MoveConflict, StoreError};
pub use record::{Latest, Record};
pub use request::{MoveRequest, MoveSpec};
pub use responses::{
    DeletedResponse, ErrorResponse, HealthResponse, LatestResponse, MovedResponse, PutResponse,
    RecordsResponse,
};
pub use tags::{Tag, TagError, TagSet};
