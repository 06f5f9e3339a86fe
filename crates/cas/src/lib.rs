//! Content Addressable Storage (CAS) for Mothership.
//!
//! Blobs are immutable byte payloads keyed by the BLAKE3 digest of their
//! content. Writing the same bytes twice returns the same digest and stores
//! nothing new, which is all the deduplication the record store needs.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use cas::{ContentStore, FileStore};
//!
//! let store = FileStore::at_path("/var/lib/mothership/cas").unwrap();
//!
//! let digest = store.put(b"Hello, World!").unwrap();
//! println!("stored as {}", digest);
//!
//! if let Some(data) = store.get(&digest).unwrap() {
//!     println!("got {} bytes back", data.len());
//! }
//! ```
//!
//! # Shared storage
//!
//! The file layout is safe on shared filesystems: content is write-once
//! (content-addressed = no conflicts), so readers never need locks and a
//! read-only mount works with [`FileStore::read_only_at`].

pub mod hash;
pub mod store;

pub use hash::{ContentHash, HashError};
pub use store::{ContentStore, FileStore, MemoryStore};
