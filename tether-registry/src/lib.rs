//! Tether Registry - Pointer Registration and Invalidation
//!
//! The concurrency-safe mapping from dependency pointers to the query cache
//! keys that depend on them. Registration is serialized per pointer inside
//! one process via an owned lock table; invalidation fans out concurrently
//! over the recorded dependents.

pub mod lock_table;
pub mod record;
pub mod registry;

pub use lock_table::LockTable;
pub use record::PointerRecord;
pub use registry::{PointerRegistry, EVICTION_MARKER, EVICTION_MARKER_RETENTION};
