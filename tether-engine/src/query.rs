//! The query orchestrator.
//!
//! Wraps a query function behind the cache:
//!
//! ```text
//! CheckCache -> Hit: denormalize, return
//!            -> Miss: execute -> validate
//!                 invalid: return uncached
//!                 valid:   resolve deps -> register -> persist -> return
//! ```
//!
//! Registration happens strictly before the query's own output is
//! persisted. This ordering is a hard invariant: registering first closes
//! the race where a mutation invalidates the pointer, finds no dependents
//! yet, and the query's stale write lands afterward and is never
//! invalidated.

use crate::deps::DependencySpec;
use crate::engine::CoherenceEngine;
use crate::resolve::resolve_dependencies;
use futures_util::future::BoxFuture;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tether_core::{
    canonical_serialize, events, DomainValue, EntityInstance, StateError, TetherResult,
};
use tether_normalize::{
    collect_reference_keys, denormalize, normalize, parse_snapshot, snapshot_reference_keys,
};
use tether_registry::EVICTION_MARKER;
use tether_store::{KeyValueStore, SetOptions};

/// Async logic wrapped by the orchestrators.
pub type LogicFn =
    Arc<dyn Fn(DomainValue) -> BoxFuture<'static, TetherResult<DomainValue>> + Send + Sync>;

/// Caller-supplied cache-key serializer over the query input.
pub type CacheKeyFn = Arc<dyn Fn(&DomainValue) -> String + Send + Sync>;

/// Optional `valid(input, output)` predicate; false means "return the
/// output but cache nothing".
pub type ValidateFn = Arc<dyn Fn(&DomainValue, &DomainValue) -> bool + Send + Sync>;

/// A query function plus its caching and dependency declarations.
#[derive(Clone)]
pub struct CachedQuery {
    pub(crate) name: String,
    pub(crate) logic: LogicFn,
    pub(crate) dependencies: DependencySpec,
    pub(crate) cache_key: Option<CacheKeyFn>,
    pub(crate) validate: Option<ValidateFn>,
    pub(crate) expire_after: Option<Duration>,
}

impl CachedQuery {
    pub fn new<F, Fut>(name: impl Into<String>, logic: F) -> Self
    where
        F: Fn(DomainValue) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = TetherResult<DomainValue>> + Send + 'static,
    {
        Self {
            name: name.into(),
            logic: Arc::new(move |input| Box::pin(logic(input))),
            dependencies: DependencySpec::none(),
            cache_key: None,
            validate: None,
            expire_after: None,
        }
    }

    pub fn with_dependencies(mut self, dependencies: DependencySpec) -> Self {
        self.dependencies = dependencies;
        self
    }

    /// Override the default canonical-serialization cache key.
    pub fn with_cache_key<F>(mut self, serializer: F) -> Self
    where
        F: Fn(&DomainValue) -> String + Send + Sync + 'static,
    {
        self.cache_key = Some(Arc::new(serializer));
        self
    }

    pub fn with_validator<F>(mut self, validate: F) -> Self
    where
        F: Fn(&DomainValue, &DomainValue) -> bool + Send + Sync + 'static,
    {
        self.validate = Some(Arc::new(validate));
        self
    }

    /// Expiry for the query's own cache entry only; shared reference
    /// snapshots keep their own retention.
    pub fn with_expire_after(mut self, expire_after: Duration) -> Self {
        self.expire_after = Some(expire_after);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The cache key this query stores its result under for `input`.
    pub fn cache_key_for(
        &self,
        input: &DomainValue,
        schema: &tether_core::SchemaRegistry,
    ) -> TetherResult<String> {
        let suffix = match &self.cache_key {
            Some(serializer) => serializer(input),
            None => canonical_serialize(input, schema)?,
        };
        Ok(format!("q:{}:{}", self.name, suffix))
    }
}

impl<S: KeyValueStore> CoherenceEngine<S> {
    /// Execute a cached query.
    pub async fn query(&self, query: &CachedQuery, input: DomainValue) -> TetherResult<DomainValue> {
        let cache_key = query.cache_key_for(&input, &self.schema)?;

        if let Some(raw) = self.store.get(&cache_key).await? {
            if raw != EVICTION_MARKER {
                if let Some(value) = self.read_cached(&cache_key, &raw).await? {
                    tracing::debug!(query = query.name.as_str(), key = cache_key.as_str(), "cache hit");
                    self.emit(
                        events::CACHE_HIT,
                        json!({ "query": query.name, "cache_key": cache_key }),
                    );
                    return Ok(value);
                }
            }
        }

        tracing::debug!(query = query.name.as_str(), key = cache_key.as_str(), "cache miss");
        self.emit(
            events::CACHE_MISS,
            json!({ "query": query.name, "cache_key": cache_key }),
        );

        let output = (query.logic)(input.clone()).await?;

        if let Some(validate) = &query.validate {
            if !validate(&input, &output) {
                // Invalid output is handed back verbatim and never cached.
                return Ok(output);
            }
        }

        let pointer_keys =
            resolve_dependencies(&self.schema, &query.dependencies, &input, &output)?;
        for pointer_key in &pointer_keys {
            self.registry.register(pointer_key, &cache_key).await?;
        }
        self.emit(
            events::REGISTERED,
            json!({
                "query": query.name,
                "cache_key": cache_key,
                "pointers": pointer_keys,
            }),
        );

        let (normalized, references) = normalize(&output, &self.schema)?;
        for reference in &references {
            self.store
                .set(
                    &reference.key,
                    reference.snapshot_json(&self.schema)?.to_string(),
                    SetOptions::expire_after(self.config.reference_retention),
                )
                .await?;
        }
        let options = match query.expire_after {
            Some(expire_after) => SetOptions::expire_after(expire_after),
            None => SetOptions::keep_forever(),
        };
        self.store
            .set(&cache_key, normalized.to_string(), options)
            .await?;

        Ok(output)
    }

    /// Denormalize a cached entry. `None` means a referenced snapshot has
    /// expired and the entry can no longer be served; the caller treats
    /// that as a miss.
    async fn read_cached(&self, cache_key: &str, raw: &str) -> TetherResult<Option<DomainValue>> {
        let normalized: Value = serde_json::from_str(raw).map_err(|e| {
            StateError::MalformedCacheEntry {
                key: cache_key.to_string(),
                reason: e.to_string(),
            }
        })?;
        // Snapshots can reference further snapshots (entities nested in
        // entity properties), so resolution chases keys to closure.
        let mut snapshots: HashMap<String, EntityInstance> = HashMap::new();
        let mut pending = collect_reference_keys(&normalized);
        while let Some(reference_key) = pending.pop() {
            if snapshots.contains_key(&reference_key) {
                continue;
            }
            match self.store.get(&reference_key).await? {
                None => return Ok(None),
                Some(raw_snapshot) => {
                    let snapshot = parse_snapshot(&reference_key, &raw_snapshot)?;
                    pending.extend(snapshot_reference_keys(&snapshot));
                    snapshots.insert(reference_key, snapshot);
                }
            }
        }
        Ok(Some(denormalize(&normalized, &snapshots)?))
    }
}
