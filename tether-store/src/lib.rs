//! Tether Store - Key/Value Store Boundary
//!
//! The coherence engine treats its persistence substrate as a plain
//! key/value store: opaque string keys, opaque string values, optional
//! per-entry expiry, no transactions and no secondary indexes. This crate
//! defines that boundary and ships an in-memory reference backend used by
//! the test suites.

pub mod memory;

pub use memory::InMemoryStore;

use async_trait::async_trait;
use std::time::Duration;
use tether_core::TetherResult;

/// Write options for a single `set`.
///
/// `expire_after: None` means infinite retention. Pointer registry records
/// are always written with infinite retention; everything else may expire
/// independently.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetOptions {
    pub expire_after: Option<Duration>,
}

impl SetOptions {
    /// Infinite retention.
    pub fn keep_forever() -> Self {
        Self { expire_after: None }
    }

    /// Expire the entry after the given duration.
    pub fn expire_after(duration: Duration) -> Self {
        Self {
            expire_after: Some(duration),
        }
    }
}

/// Asynchronous key/value store collaborator.
///
/// Implementations may retry internally; this layer is agnostic to any
/// such policy and adds no retries of its own.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a value. `None` means absent (or expired).
    async fn get(&self, key: &str) -> TetherResult<Option<String>>;

    /// Write a value, replacing any existing entry at `key`.
    async fn set(&self, key: &str, value: String, options: SetOptions) -> TetherResult<()>;
}
