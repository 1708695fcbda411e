//! The logging collaborator.
//!
//! One callback, invoked at defined checkpoints with a structured payload.
//! Correctness never depends on an observer being present.

use serde_json::Value;

/// Checkpoint event names emitted by the engine.
pub mod events {
    pub const CACHE_HIT: &str = "query.cache_hit";
    pub const CACHE_MISS: &str = "query.cache_miss";
    pub const REGISTERED: &str = "query.registered";
    pub const INVALIDATED: &str = "registry.invalidated";
    pub const MUTATION_EFFECTS: &str = "mutation.effects";
}

/// Structured-event sink injected into the engine.
pub trait CoherenceObserver: Send + Sync {
    /// Record one checkpoint event with its structured payload.
    fn emit(&self, event: &str, payload: Value);
}

/// Observer that records every emitted event, for assertions in tests.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: std::sync::Mutex<Vec<(String, Value)>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every event emitted so far.
    pub fn events(&self) -> Vec<(String, Value)> {
        self.events.lock().expect("observer lock poisoned").clone()
    }

    /// Events with the given name.
    pub fn events_named(&self, name: &str) -> Vec<Value> {
        self.events()
            .into_iter()
            .filter(|(event, _)| event == name)
            .map(|(_, payload)| payload)
            .collect()
    }
}

impl CoherenceObserver for RecordingObserver {
    fn emit(&self, event: &str, payload: Value) {
        self.events
            .lock()
            .expect("observer lock poisoned")
            .push((event.to_string(), payload));
    }
}
