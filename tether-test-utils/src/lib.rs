//! Tether Test Utilities
//!
//! Centralized test infrastructure for the Tether workspace: the
//! Job/Provider/Ship fixture schema used across crate test suites, entity
//! builders, and convenience re-exports.

pub use tether_core::{
    DomainValue, EntityDescriptor, EntityInstance, RecordingObserver, SchemaRegistry,
};
pub use tether_normalize::reference_key;
pub use tether_store::InMemoryStore;

use uuid::Uuid;

/// The fixture schema: a small service-marketplace domain.
///
/// Jobs carry two foreign-key-style links (`providerUuid`, `onShipUuid`);
/// `AuditEvent` has no updatable properties and so never produces
/// invalidation.
pub fn fixture_schema() -> SchemaRegistry {
    let mut schema = SchemaRegistry::new();
    schema
        .register(EntityDescriptor::new(
            "Job",
            "uuid",
            ["name", "providerUuid", "onShipUuid"],
        ))
        .expect("fixture schema");
    schema
        .register(EntityDescriptor::new("Provider", "uuid", ["name"]))
        .expect("fixture schema");
    schema
        .register(EntityDescriptor::new("Ship", "uuid", ["name"]))
        .expect("fixture schema");
    schema
        .register(EntityDescriptor::new(
            "AuditEvent",
            "uuid",
            Vec::<String>::new(),
        ))
        .expect("fixture schema");
    schema
}

/// Fresh sortable id for fixtures.
pub fn new_uuid() -> String {
    Uuid::now_v7().to_string()
}

/// Build an entity instance from a type, id and property pairs.
pub fn entity(
    entity_type: &str,
    uuid: &str,
    pairs: &[(&str, DomainValue)],
) -> EntityInstance {
    let mut properties = vec![("uuid".to_string(), DomainValue::str(uuid))];
    properties.extend(
        pairs
            .iter()
            .map(|(name, value)| (name.to_string(), value.clone())),
    );
    EntityInstance::new(entity_type, properties)
}

/// A Job with a name.
pub fn job(uuid: &str, name: &str) -> EntityInstance {
    entity("Job", uuid, &[("name", DomainValue::str(name))])
}

/// A Provider with a name.
pub fn provider(uuid: &str, name: &str) -> EntityInstance {
    entity("Provider", uuid, &[("name", DomainValue::str(name))])
}

/// A Ship with a name.
pub fn ship(uuid: &str, name: &str) -> EntityInstance {
    entity("Ship", uuid, &[("name", DomainValue::str(name))])
}

/// A single-field mapping input, the common query-input shape.
pub fn input(field: &str, value: &str) -> DomainValue {
    DomainValue::mapping([(field.to_string(), DomainValue::str(value))])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_schema_registers_all_types() {
        let schema = fixture_schema();
        for entity_type in ["Job", "Provider", "Ship", "AuditEvent"] {
            assert!(schema.descriptor(entity_type).is_ok());
        }
        assert!(!schema.descriptor("AuditEvent").unwrap().is_mutable());
    }

    #[test]
    fn test_entity_builder_sets_identifier() {
        let schema = fixture_schema();
        let job = job("job-1", "Junk Removal");
        assert_eq!(schema.identifier_of(&job).unwrap(), "job-1");
        assert_eq!(job.property("name"), Some(&DomainValue::str("Junk Removal")));
    }
}
