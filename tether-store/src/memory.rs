//! In-memory reference backend.
//!
//! Expiry is lazy: an expired entry is dropped on the read that observes
//! it. Good enough for tests and single-process embedding; production
//! deployments plug in their own [`KeyValueStore`].

use crate::{KeyValueStore, SetOptions};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tether_core::TetherResult;

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|deadline| now >= deadline)
    }
}

/// In-memory key/value store backed by a `tokio::sync::RwLock`.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    entries: RwLock<HashMap<String, Entry>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (non-expired) entries.
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .read()
            .await
            .values()
            .filter(|entry| !entry.is_expired(now))
            .count()
    }

    /// Whether the store holds no live entries.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl KeyValueStore for InMemoryStore {
    async fn get(&self, key: &str) -> TetherResult<Option<String>> {
        let now = Instant::now();
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                None => return Ok(None),
                Some(entry) if !entry.is_expired(now) => {
                    return Ok(Some(entry.value.clone()))
                }
                Some(_) => {}
            }
        }
        // Expired: drop it under the write lock, re-checking the deadline
        // in case a concurrent set replaced the entry in between.
        let mut entries = self.entries.write().await;
        if entries.get(key).is_some_and(|entry| entry.is_expired(now)) {
            entries.remove(key);
        }
        Ok(entries.get(key).map(|entry| entry.value.clone()))
    }

    async fn set(&self, key: &str, value: String, options: SetOptions) -> TetherResult<()> {
        let entry = Entry {
            value,
            expires_at: options.expire_after.map(|ttl| Instant::now() + ttl),
        };
        self.entries.write().await.insert(key.to_string(), entry);
        Ok(())
    }
}
