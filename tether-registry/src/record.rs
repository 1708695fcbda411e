//! Persisted pointer registry records.
//!
//! A record holds the order-irrelevant set of query cache keys currently
//! dependent on one pointer. Records are mutated only by the registry and
//! never expire: losing one silently breaks coherence, whereas keeping a
//! stale dependency merely wastes a redundant invalidation.

use serde::{Deserialize, Serialize};
use tether_core::{StateError, TetherResult};

/// The set of query cache keys dependent on one pointer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointerRecord {
    dependents: Vec<String>,
}

impl PointerRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a stored record.
    ///
    /// Anything that is not the expected shape is cache-key-namespace
    /// corruption and must not be papered over.
    pub fn parse(key: &str, raw: &str) -> TetherResult<Self> {
        serde_json::from_str(raw).map_err(|e| {
            StateError::MalformedRegistryRecord {
                key: key.to_string(),
                reason: e.to_string(),
            }
            .into()
        })
    }

    /// Serialize for storage.
    pub fn to_json_string(&self) -> String {
        // A Vec<String> record cannot fail to serialize.
        serde_json::to_string(self).expect("pointer record serialization")
    }

    /// Append a dependent if absent. Returns whether the record changed.
    pub fn add_dependent(&mut self, query_key: &str) -> bool {
        if self.dependents.iter().any(|existing| existing == query_key) {
            return false;
        }
        self.dependents.push(query_key.to_string());
        true
    }

    pub fn dependents(&self) -> &[String] {
        &self.dependents
    }

    pub fn is_empty(&self) -> bool {
        self.dependents.is_empty()
    }
}
