//! The mutation orchestrator.
//!
//! Execute the wrapped logic, scan impact against prior snapshots,
//! invalidate every impacted pointer, then persist the updated entity
//! snapshots. Snapshots land strictly after invalidation so a concurrent
//! reader observing a reference key never sees new data while its
//! dependent query caches are still un-invalidated.
//!
//! Atomicity across the entities touched by one mutation is not
//! guaranteed: each reference key is written independently, and partial
//! visibility between two entities' updates is an accepted limitation.

use crate::engine::CoherenceEngine;
use crate::impact::scan_impact;
use crate::query::LogicFn;
use serde_json::json;
use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use tether_core::{events, DomainValue, TetherResult};
use tether_store::{KeyValueStore, SetOptions};

/// A mutation function wrapped for coherence tracking.
#[derive(Clone)]
pub struct CachedMutation {
    pub(crate) name: String,
    pub(crate) logic: LogicFn,
}

impl CachedMutation {
    pub fn new<F, Fut>(name: impl Into<String>, logic: F) -> Self
    where
        F: Fn(DomainValue) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = TetherResult<DomainValue>> + Send + 'static,
    {
        Self {
            name: name.into(),
            logic: Arc::new(move |input| Box::pin(logic(input))),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<S: KeyValueStore> CoherenceEngine<S> {
    /// Execute a mutation and fan out its invalidations.
    pub async fn mutate(
        &self,
        mutation: &CachedMutation,
        input: DomainValue,
    ) -> TetherResult<DomainValue> {
        let output = (mutation.logic)(input).await?;

        let report = scan_impact(self.store.as_ref(), &self.schema, &output).await?;

        let mut seen = BTreeSet::new();
        let mut invalidated = Vec::new();
        for pointer_key in &report.pointer_keys {
            for query_key in self.registry.invalidate(pointer_key).await? {
                if seen.insert(query_key.clone()) {
                    invalidated.push(query_key);
                }
            }
        }
        if !invalidated.is_empty() {
            self.emit(
                events::INVALIDATED,
                json!({
                    "mutation": mutation.name,
                    "queries": invalidated,
                }),
            );
        }

        for reference in &report.references {
            self.store
                .set(
                    &reference.key,
                    reference.snapshot_json(&self.schema)?.to_string(),
                    SetOptions::expire_after(self.config.reference_retention),
                )
                .await?;
        }

        tracing::debug!(
            mutation = mutation.name.as_str(),
            references = report.references.len(),
            pointers = report.pointer_keys.len(),
            invalidated = invalidated.len(),
            "mutation effects applied"
        );
        self.emit(
            events::MUTATION_EFFECTS,
            json!({
                "mutation": mutation.name,
                "references_updated": report.references.len(),
                "pointers_evaluated": report.pointer_keys.len(),
                "queries_invalidated": invalidated.len(),
                "emitted_at": chrono::Utc::now().to_rfc3339(),
            }),
        );

        Ok(output)
    }
}
