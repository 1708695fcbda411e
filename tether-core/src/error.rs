//! Error types for Tether operations.

use thiserror::Error;

/// Caller-authoring mistakes in schema or dependency declarations.
///
/// These abort the current operation immediately and surface unchanged.
/// Skipping any of them would open a coherence gap that only manifests
/// later as an unexplained stale read.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Unknown entity type: {type_name}")]
    UnknownEntityType { type_name: String },

    #[error("Duplicate descriptor registered for entity type {type_name}")]
    DuplicateDescriptor { type_name: String },

    #[error(
        "Entity {type_name} has no stable identifier in field {identifier_field}"
    )]
    MissingIdentifier {
        type_name: String,
        identifier_field: String,
    },

    #[error(
        "Relationship property {property} on {via_type} does not reference {expected_type}; \
         the relationship is likely wired backwards"
    )]
    RelationshipNamingMismatch {
        via_type: String,
        property: String,
        expected_type: String,
    },

    #[error(
        "Relationship via type {via_type} matches neither side ({from_type} / {to_type})"
    )]
    RelationshipViaMismatch {
        via_type: String,
        from_type: String,
        to_type: String,
    },
}

/// A value read from the store does not match its expected record shape.
///
/// Fatal for the operation that observed it. The engine never attempts to
/// repair or merge into unknown data; doing so could mask real corruption.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StateError {
    #[error("Malformed pointer registry record at {key}: {reason}")]
    MalformedRegistryRecord { key: String, reason: String },

    #[error("Malformed entity snapshot at {key}: {reason}")]
    MalformedSnapshot { key: String, reason: String },

    #[error("Malformed cached query entry at {key}: {reason}")]
    MalformedCacheEntry { key: String, reason: String },
}

/// Key/value store backend errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Store read failed for {key}: {reason}")]
    ReadFailed { key: String, reason: String },

    #[error("Store write failed for {key}: {reason}")]
    WriteFailed { key: String, reason: String },
}

/// Master error type for all Tether operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TetherError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Corrupt state: {0}")]
    CorruptState(#[from] StateError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Failure raised by wrapped query/mutation logic. Propagated
    /// unchanged; this layer adds no retries and swallows nothing.
    #[error("Logic error in {name}: {reason}")]
    Logic { name: String, reason: String },
}

impl TetherError {
    /// Build a logic-layer error for a named query or mutation.
    pub fn logic(name: impl Into<String>, reason: impl Into<String>) -> Self {
        TetherError::Logic {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for Tether operations.
pub type TetherResult<T> = Result<T, TetherError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display_naming_mismatch() {
        let err = ConfigError::RelationshipNamingMismatch {
            via_type: "Job".to_string(),
            property: "color".to_string(),
            expected_type: "Provider".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("color"));
        assert!(msg.contains("Provider"));
        assert!(msg.contains("wired backwards"));
    }

    #[test]
    fn test_state_error_display_registry_record() {
        let err = StateError::MalformedRegistryRecord {
            key: "dep:Job:uuid:abc:name".to_string(),
            reason: "expected object".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("Malformed pointer registry record"));
        assert!(msg.contains("dep:Job:uuid:abc:name"));
    }

    #[test]
    fn test_master_error_from_config() {
        let err: TetherError = ConfigError::UnknownEntityType {
            type_name: "Ghost".to_string(),
        }
        .into();
        assert!(matches!(err, TetherError::Config(_)));
        assert!(format!("{}", err).contains("Configuration error"));
    }

    #[test]
    fn test_logic_error_constructor() {
        let err = TetherError::logic("getJobByUuid", "backend unavailable");
        assert_eq!(
            format!("{}", err),
            "Logic error in getJobByUuid: backend unavailable"
        );
    }
}
