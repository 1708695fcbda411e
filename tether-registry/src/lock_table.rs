//! Owned per-pointer lock table.
//!
//! Serializes read-modify-write cycles per distinct pointer key within one
//! process. Locks are created lazily on first use and reused for the
//! lifetime of the owning registry; distinct pointers proceed fully in
//! parallel. This is pure coordination state, never data.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Table mapping pointer key to its exclusion handle.
#[derive(Debug, Default)]
pub struct LockTable {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl LockTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for `key`, creating it on first use.
    ///
    /// The returned guard holds the per-key mutex; the table-level mutex is
    /// released before waiting so contention on one key never blocks
    /// acquisition on another.
    pub async fn acquire(&self, key: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            Arc::clone(
                locks
                    .entry(key.to_string())
                    .or_insert_with(|| Arc::new(Mutex::new(()))),
            )
        };
        lock.lock_owned().await
    }

    /// Number of distinct keys that have ever been locked.
    pub async fn len(&self) -> usize {
        self.locks.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_lock_created_lazily_and_reused() {
        let table = LockTable::new();
        assert!(table.is_empty().await);
        drop(table.acquire("dep:a").await);
        drop(table.acquire("dep:a").await);
        drop(table.acquire("dep:b").await);
        assert_eq!(table.len().await, 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_same_key_serializes_critical_sections() {
        let table = Arc::new(LockTable::new());
        let in_flight = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..50 {
            let table = Arc::clone(&table);
            let in_flight = Arc::clone(&in_flight);
            let max_seen = Arc::clone(&max_seen);
            handles.push(tokio::spawn(async move {
                let _guard = table.acquire("dep:same").await;
                let current = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(current, Ordering::SeqCst);
                tokio::task::yield_now().await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_distinct_keys_do_not_block() {
        let table = LockTable::new();
        let _guard_a = table.acquire("dep:a").await;
        // Acquiring a different key while holding the first must not hang.
        let _guard_b = table.acquire("dep:b").await;
    }
}
