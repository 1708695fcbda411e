//! The pointer registry.
//!
//! Maps a pointer key to the set of query cache keys depending on it.
//! `register` is an idempotent read-modify-write serialized per pointer
//! within this process; cross-process races are a documented limitation of
//! this layer (no distributed or optimistic locking is provided).

use crate::lock_table::LockTable;
use crate::record::PointerRecord;
use futures_util::future::try_join_all;
use std::sync::Arc;
use std::time::Duration;
use tether_core::TetherResult;
use tether_store::{KeyValueStore, SetOptions};

/// Value written over an invalidated query cache entry. The query
/// orchestrator treats it as a cache miss.
pub const EVICTION_MARKER: &str = "";

/// Retention for eviction markers. An expired marker reads as absent,
/// which is the same cache miss; bounding it keeps tombstones over
/// short-lived query entries from accumulating forever.
pub const EVICTION_MARKER_RETENTION: Duration = Duration::from_secs(24 * 3600);

/// Concurrency-safe store of pointer-to-dependents records.
#[derive(Debug)]
pub struct PointerRegistry<S> {
    store: Arc<S>,
    locks: LockTable,
}

impl<S: KeyValueStore> PointerRegistry<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            locks: LockTable::new(),
        }
    }

    /// Register `query_key` as a dependent of `pointer_key`.
    ///
    /// Idempotent; a repeat call is a no-op. The record is written with
    /// infinite retention.
    pub async fn register(&self, pointer_key: &str, query_key: &str) -> TetherResult<()> {
        let _guard = self.locks.acquire(pointer_key).await;
        let mut record = match self.store.get(pointer_key).await? {
            None => PointerRecord::new(),
            Some(raw) => PointerRecord::parse(pointer_key, &raw)?,
        };
        if !record.add_dependent(query_key) {
            return Ok(());
        }
        self.store
            .set(
                pointer_key,
                record.to_json_string(),
                SetOptions::keep_forever(),
            )
            .await?;
        tracing::debug!(pointer = pointer_key, query = query_key, "dependent registered");
        Ok(())
    }

    /// Invalidate every query cache entry depending on `pointer_key`.
    ///
    /// Absent record: nothing depends on this pointer, zero writes. A
    /// malformed record fails fast. Otherwise each dependent entry is
    /// overwritten with the eviction marker, concurrently and in no
    /// particular order, and the list of invalidated keys is returned.
    /// The record itself is left intact so dependents stay tracked for
    /// future invalidations.
    pub async fn invalidate(&self, pointer_key: &str) -> TetherResult<Vec<String>> {
        let Some(raw) = self.store.get(pointer_key).await? else {
            return Ok(Vec::new());
        };
        let record = PointerRecord::parse(pointer_key, &raw)?;
        try_join_all(record.dependents().iter().map(|query_key| {
            self.store.set(
                query_key,
                EVICTION_MARKER.to_string(),
                SetOptions::expire_after(EVICTION_MARKER_RETENTION),
            )
        }))
        .await?;
        tracing::debug!(
            pointer = pointer_key,
            invalidated = record.dependents().len(),
            "pointer invalidated"
        );
        Ok(record.dependents().to_vec())
    }
}
