//! motherlib - the record store behind the `m`/`ms` clients.
//!
//! Content lives in the CAS (`cas` crate); this crate owns everything
//! above it: the tag index, the per-tag-set version histories, and the
//! move engine that re-tags whole histories without duplicating blobs.
//!
//! Every operation is scoped to an owner identity, so tenants cannot see
//! or modify each other's tag-sets.
//!
//! # Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use motherlib::{MemoryStore, RecordStore};
//!
//! let store = MemoryStore::new(Arc::new(cas::MemoryStore::new()));
//!
//! let tags = "work/notes".parse().unwrap();
//! let record = store.put_latest("alice", &tags, b"first draft").unwrap();
//! assert!(store.get_blob(&record.ref_).is_ok());
//! ```

pub mod mover;
pub mod snapshot;
pub mod store;

pub use mover::move_history;
pub use store::{FileStore, MemoryStore, RecordStore};
