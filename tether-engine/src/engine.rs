//! Engine wiring: store, schema, registry, observer, config.

use serde_json::Value;
use std::sync::Arc;
use tether_core::{CoherenceObserver, EngineConfig, SchemaRegistry};
use tether_registry::PointerRegistry;
use tether_store::KeyValueStore;

/// The coherence engine: wraps caller-supplied query and mutation logic and
/// keeps cached results coherent with entity state, all on top of one plain
/// key/value store.
pub struct CoherenceEngine<S> {
    pub(crate) store: Arc<S>,
    pub(crate) schema: Arc<SchemaRegistry>,
    pub(crate) registry: PointerRegistry<S>,
    pub(crate) observer: Option<Arc<dyn CoherenceObserver>>,
    pub(crate) config: EngineConfig,
}

impl<S: KeyValueStore> CoherenceEngine<S> {
    pub fn new(store: Arc<S>, schema: Arc<SchemaRegistry>) -> Self {
        Self {
            registry: PointerRegistry::new(Arc::clone(&store)),
            store,
            schema,
            observer: None,
            config: EngineConfig::default(),
        }
    }

    /// Attach a checkpoint observer. Absence never alters behavior.
    pub fn with_observer(mut self, observer: Arc<dyn CoherenceObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn schema(&self) -> &SchemaRegistry {
        &self.schema
    }

    pub(crate) fn emit(&self, event: &str, payload: Value) {
        if let Some(observer) = &self.observer {
            observer.emit(event, payload);
        }
    }
}
