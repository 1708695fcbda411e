//! The mutation impact scanner.
//!
//! Given a mutation's output, determines which pointers a mutation must
//! invalidate by comparing every contained mutable entity against its prior
//! cached snapshot. Change-detection compares only the declared updatable
//! properties, through canonical-serialization inequality.

use std::collections::BTreeSet;
use tether_core::{
    canonical_serialize, DependencyPointer, DomainValue, SchemaRegistry, TetherResult,
};
use tether_normalize::{
    extract_references, markers_to_identifiers, parse_snapshot, EntityReference,
};
use tether_store::KeyValueStore;

/// Result of one impact scan.
#[derive(Debug)]
pub struct ImpactReport {
    /// Deduplicated pointer keys that must be invalidated.
    pub pointer_keys: Vec<String>,
    /// Every entity reference contained in the mutation output; persisted
    /// by the mutation orchestrator after invalidation.
    pub references: Vec<EntityReference>,
}

/// Scan a mutation's output against prior snapshots in the store.
pub async fn scan_impact<S: KeyValueStore>(
    store: &S,
    schema: &SchemaRegistry,
    output: &DomainValue,
) -> TetherResult<ImpactReport> {
    // Extraction fails fast on any entity lacking its stable identifier;
    // invalidation pointers cannot be constructed without one.
    let references = extract_references(output, schema)?;
    let mut seen = BTreeSet::new();
    let mut pointer_keys = Vec::new();

    for reference in &references {
        let descriptor = schema.descriptor(&reference.entity.entity_type)?;
        if !descriptor.is_mutable() {
            continue;
        }
        let entity_type = &reference.entity.entity_type;
        let uuid = schema.identifier_of(&reference.entity)?;

        let prior = match store.get(&reference.key).await? {
            None => None,
            Some(raw) => Some(parse_snapshot(&reference.key, &raw)?),
        };

        let mut any_changed = false;
        for property in &descriptor.updatable_fields {
            let new_value = reference
                .entity
                .property(property)
                .cloned()
                .unwrap_or(DomainValue::Null);
            // Stored snapshots hold nested entities as reference markers;
            // reduced to identifiers they compare against the live value.
            let old_value = prior
                .as_ref()
                .and_then(|snapshot| snapshot.property(property))
                .map(markers_to_identifiers)
                .unwrap_or(DomainValue::Null);

            let changed = match &prior {
                // First write: an unseen entity could newly satisfy
                // dependents that have not registered against its
                // identity pointer yet, so nothing is skipped.
                None => true,
                Some(_) => {
                    canonical_serialize(&old_value, schema)?
                        != canonical_serialize(&new_value, schema)?
                }
            };
            if !changed {
                continue;
            }
            any_changed = true;

            push_key(
                &mut seen,
                &mut pointer_keys,
                DependencyPointer::identity(entity_type.clone(), property.clone(), uuid.clone())
                    .derive_key(schema)?,
            );
            // A relationship changing from A to B must invalidate
            // dependents watching either endpoint, so both the old and
            // new value(s) fan out; array-valued properties expand per
            // element.
            for element in old_value
                .expand_elements()
                .into_iter()
                .chain(new_value.expand_elements())
            {
                push_key(
                    &mut seen,
                    &mut pointer_keys,
                    DependencyPointer::value(
                        entity_type.clone(),
                        property.clone(),
                        element.clone(),
                    )
                    .derive_key(schema)?,
                );
            }
        }

        // Any change to the instance is a change to "the instance with
        // this identifier", which is the fact identity dependencies are
        // registered against.
        if any_changed {
            push_key(
                &mut seen,
                &mut pointer_keys,
                DependencyPointer::value(
                    entity_type.clone(),
                    descriptor.identifier_field.clone(),
                    uuid.clone(),
                )
                .derive_key(schema)?,
            );
        }
    }

    Ok(ImpactReport {
        pointer_keys,
        references,
    })
}

fn push_key(seen: &mut BTreeSet<String>, keys: &mut Vec<String>, key: String) {
    if seen.insert(key.clone()) {
        keys.push(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tether_core::{EntityDescriptor, EntityInstance, TetherError};
    use tether_normalize::reference_key;
    use tether_store::{InMemoryStore, SetOptions};

    fn schema() -> SchemaRegistry {
        let mut schema = SchemaRegistry::new();
        schema
            .register(EntityDescriptor::new(
                "Job",
                "uuid",
                ["name", "providerUuid", "onShipUuid"],
            ))
            .unwrap();
        schema
            .register(EntityDescriptor::new("Provider", "uuid", ["name"]))
            .unwrap();
        schema
            .register(EntityDescriptor::new("AuditEvent", "uuid", Vec::<String>::new()))
            .unwrap();
        schema
    }

    fn job(uuid: &str, pairs: &[(&str, DomainValue)]) -> EntityInstance {
        let mut properties = vec![("uuid".to_string(), DomainValue::str(uuid))];
        properties.extend(
            pairs
                .iter()
                .map(|(name, value)| (name.to_string(), value.clone())),
        );
        EntityInstance::new("Job", properties)
    }

    async fn seed_snapshot(store: &InMemoryStore, schema: &SchemaRegistry, entity: &EntityInstance) {
        let uuid = schema.identifier_of(entity).unwrap();
        let reference = EntityReference {
            key: reference_key(&entity.entity_type, &uuid),
            entity: entity.clone(),
        };
        store
            .set(
                &reference.key,
                reference.snapshot_json(schema).unwrap().to_string(),
                SetOptions::keep_forever(),
            )
            .await
            .unwrap();
    }

    fn key_of(schema: &SchemaRegistry, pointer: DependencyPointer) -> String {
        pointer.derive_key(schema).unwrap()
    }

    #[tokio::test]
    async fn test_first_write_marks_every_updatable_property_changed() {
        let schema = schema();
        let store = InMemoryStore::new();
        let output = DomainValue::Entity(job(
            "job-1",
            &[("name", DomainValue::str("Junk Removal"))],
        ));

        let report = scan_impact(&store, &schema, &output).await.unwrap();
        for property in ["name", "providerUuid", "onShipUuid"] {
            let identity = key_of(
                &schema,
                DependencyPointer::identity("Job", property, "job-1"),
            );
            assert!(
                report.pointer_keys.contains(&identity),
                "missing identity pointer for {property}"
            );
        }
        // The identifier value pointer closes the loop for identity
        // dependencies.
        let identifier = key_of(&schema, DependencyPointer::value("Job", "uuid", "job-1"));
        assert!(report.pointer_keys.contains(&identifier));
    }

    #[tokio::test]
    async fn test_change_detection_emits_old_and_new_values_only() {
        let schema = schema();
        let store = InMemoryStore::new();
        let before = job(
            "job-1",
            &[
                ("name", DomainValue::str("Junk Removal")),
                ("onShipUuid", DomainValue::str("A")),
            ],
        );
        seed_snapshot(&store, &schema, &before).await;

        let after = DomainValue::Entity(job(
            "job-1",
            &[
                ("name", DomainValue::str("Junk Removal")),
                ("onShipUuid", DomainValue::str("B")),
            ],
        ));
        let report = scan_impact(&store, &schema, &after).await.unwrap();

        let old_endpoint = key_of(&schema, DependencyPointer::value("Job", "onShipUuid", "A"));
        let new_endpoint = key_of(&schema, DependencyPointer::value("Job", "onShipUuid", "B"));
        assert!(report.pointer_keys.contains(&old_endpoint));
        assert!(report.pointer_keys.contains(&new_endpoint));

        // The unchanged property produces nothing.
        let unchanged = key_of(
            &schema,
            DependencyPointer::identity("Job", "name", "job-1"),
        );
        assert!(!report.pointer_keys.contains(&unchanged));
    }

    #[tokio::test]
    async fn test_unchanged_entity_emits_no_pointers() {
        let schema = schema();
        let store = InMemoryStore::new();
        let entity = job("job-1", &[("name", DomainValue::str("Junk Removal"))]);
        seed_snapshot(&store, &schema, &entity).await;

        let report = scan_impact(&store, &schema, &DomainValue::Entity(entity))
            .await
            .unwrap();
        assert!(report.pointer_keys.is_empty());
        assert_eq!(report.references.len(), 1);
    }

    #[tokio::test]
    async fn test_sequence_valued_property_expands_per_element() {
        let schema = schema();
        let store = InMemoryStore::new();
        let before = job(
            "job-1",
            &[(
                "providerUuid",
                DomainValue::Sequence(vec![DomainValue::str("P1"), DomainValue::str("P2")]),
            )],
        );
        seed_snapshot(&store, &schema, &before).await;

        let after = DomainValue::Entity(job(
            "job-1",
            &[(
                "providerUuid",
                DomainValue::Sequence(vec![DomainValue::str("P2"), DomainValue::str("P3")]),
            )],
        ));
        let report = scan_impact(&store, &schema, &after).await.unwrap();
        for endpoint in ["P1", "P2", "P3"] {
            let key = key_of(
                &schema,
                DependencyPointer::value("Job", "providerUuid", endpoint),
            );
            assert!(report.pointer_keys.contains(&key), "missing endpoint {endpoint}");
        }
    }

    #[tokio::test]
    async fn test_immutable_entity_is_skipped() {
        let schema = schema();
        let store = InMemoryStore::new();
        let output = DomainValue::Entity(EntityInstance::new(
            "AuditEvent",
            [("uuid".to_string(), DomainValue::str("evt-1"))],
        ));
        let report = scan_impact(&store, &schema, &output).await.unwrap();
        assert!(report.pointer_keys.is_empty());
    }

    #[tokio::test]
    async fn test_entity_without_identifier_is_fatal() {
        let schema = schema();
        let store = InMemoryStore::new();
        let output = DomainValue::Entity(EntityInstance::new(
            "Job",
            [("name".to_string(), DomainValue::str("x"))],
        ));
        let err = scan_impact(&store, &schema, &output).await.unwrap_err();
        assert!(matches!(err, TetherError::Config(_)));
    }

    #[tokio::test]
    async fn test_duplicated_entities_deduplicate_pointers() {
        let schema = schema();
        let store = InMemoryStore::new();
        let entity = job("job-1", &[("name", DomainValue::str("x"))]);
        let output = DomainValue::Sequence(vec![
            DomainValue::Entity(entity.clone()),
            DomainValue::Entity(entity),
        ]);
        let report = scan_impact(&store, &schema, &output).await.unwrap();
        let mut sorted = report.pointer_keys.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), report.pointer_keys.len());
        assert_eq!(report.references.len(), 1);
    }

    #[tokio::test]
    async fn test_entity_valued_property_compares_by_identifier() {
        let schema = schema();
        let store = InMemoryStore::new();
        let provider = EntityInstance::new(
            "Provider",
            [
                ("uuid".to_string(), DomainValue::str("prov-1")),
                ("name".to_string(), DomainValue::str("Acme Disposal")),
            ],
        );
        let before = job(
            "job-1",
            &[("providerUuid", DomainValue::Entity(provider.clone()))],
        );
        seed_snapshot(&store, &schema, &provider).await;
        seed_snapshot(&store, &schema, &before).await;

        // Same nested entity: the stored marker and the live entity reduce
        // to the same identifier, so nothing changed.
        let report = scan_impact(&store, &schema, &DomainValue::Entity(before.clone()))
            .await
            .unwrap();
        assert!(report.pointer_keys.is_empty());

        // Swapping the nested entity fans out over both identifiers.
        let replacement = EntityInstance::new(
            "Provider",
            [
                ("uuid".to_string(), DomainValue::str("prov-2")),
                ("name".to_string(), DomainValue::str("Budget Disposal")),
            ],
        );
        let after = job("job-1", &[("providerUuid", DomainValue::Entity(replacement))]);
        let report = scan_impact(&store, &schema, &DomainValue::Entity(after))
            .await
            .unwrap();
        for endpoint in ["prov-1", "prov-2"] {
            let key = key_of(
                &schema,
                DependencyPointer::value("Job", "providerUuid", endpoint),
            );
            assert!(report.pointer_keys.contains(&key), "missing endpoint {endpoint}");
        }
    }

    #[tokio::test]
    async fn test_malformed_prior_snapshot_fails_fast() {
        let schema = schema();
        let store = InMemoryStore::new();
        store
            .set(
                "ent:Job:job-1",
                "garbage".to_string(),
                SetOptions::keep_forever(),
            )
            .await
            .unwrap();
        let output = DomainValue::Entity(job("job-1", &[]));
        let err = scan_impact(&store, &schema, &output).await.unwrap_err();
        assert!(matches!(err, TetherError::CorruptState(_)));
    }
}
