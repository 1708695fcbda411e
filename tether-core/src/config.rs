//! Engine configuration.

use std::time::Duration;

/// Configuration for the coherence engine.
///
/// Pointer registry records always use infinite retention regardless of
/// this configuration; losing one silently breaks coherence, whereas a
/// stale dependency only costs a redundant invalidation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Retention for shared entity reference snapshots. Deliberately long
    /// and distinct from any per-query expiry: snapshots are shared across
    /// every query result that mentions the entity.
    pub reference_retention: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            reference_retention: Duration::from_secs(30 * 24 * 3600),
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the reference snapshot retention.
    pub fn with_reference_retention(mut self, retention: Duration) -> Self {
        self.reference_retention = retention;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_reference_retention_is_long() {
        let config = EngineConfig::default();
        assert!(config.reference_retention >= Duration::from_secs(24 * 3600));
    }

    #[test]
    fn test_builder_override() {
        let config = EngineConfig::new().with_reference_retention(Duration::from_secs(5));
        assert_eq!(config.reference_retention, Duration::from_secs(5));
    }
}
