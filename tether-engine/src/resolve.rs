//! The dependency resolver.
//!
//! Turns a query's dependency spec plus one execution's `{input, output}`
//! into the ordered list of pointer keys the query's cache entry must be
//! registered against.

use crate::deps::{DependencyDeclaration, DependencySpec, EntitySelector, RelationshipVia};
use tether_core::{
    ConfigError, DependencyPointer, DomainValue, SchemaRegistry, TetherResult,
};

/// Resolve a dependency spec to pointer keys.
///
/// The output preserves declaration order and may contain duplicates;
/// registration is idempotent downstream.
pub fn resolve_dependencies(
    schema: &SchemaRegistry,
    spec: &DependencySpec,
    input: &DomainValue,
    output: &DomainValue,
) -> TetherResult<Vec<String>> {
    let declarations = spec.evaluate(input, output);
    let mut keys = Vec::new();
    for declaration in &declarations {
        match declaration {
            DependencyDeclaration::Identity { entity_type, uuids } => {
                let descriptor = schema.descriptor(entity_type)?;
                for uuid in uuids(input, output) {
                    keys.push(
                        DependencyPointer::value(
                            entity_type.clone(),
                            descriptor.identifier_field.clone(),
                            uuid,
                        )
                        .derive_key(schema)?,
                    );
                }
            }
            DependencyDeclaration::Relationship {
                from,
                to_entity,
                via,
            } => {
                check_relationship_wiring(from, to_entity, via)?;
                let link_on_source = via.entity_type == from.entity_type;
                for uuid in (from.uuids)(input, output) {
                    let pointer = if link_on_source {
                        // The foreign key lives on the source instance:
                        // watch that instance's property directly.
                        DependencyPointer::identity(
                            via.entity_type.clone(),
                            via.property.clone(),
                            uuid,
                        )
                    } else {
                        // The foreign key lives on the far side: watch the
                        // set of instances whose property equals the id.
                        DependencyPointer::value(
                            via.entity_type.clone(),
                            via.property.clone(),
                            uuid,
                        )
                    };
                    keys.push(pointer.derive_key(schema)?);
                }
            }
        }
    }
    Ok(keys)
}

/// Fail fast on relationships wired backwards.
///
/// `via` must name one of the two sides, and its property name must
/// plausibly reference the *other* side's entity class. The naming rule is
/// deliberately conservative (case-insensitive containment): it rejects
/// only clearly-unrelated names, at declaration time, instead of producing
/// silently-wrong invalidation later.
fn check_relationship_wiring(
    from: &EntitySelector,
    to_entity: &str,
    via: &RelationshipVia,
) -> TetherResult<()> {
    let other = if via.entity_type == from.entity_type {
        to_entity
    } else if via.entity_type == to_entity {
        from.entity_type.as_str()
    } else {
        return Err(ConfigError::RelationshipViaMismatch {
            via_type: via.entity_type.clone(),
            from_type: from.entity_type.clone(),
            to_type: to_entity.to_string(),
        }
        .into());
    };
    if !via
        .property
        .to_lowercase()
        .contains(&other.to_lowercase())
    {
        return Err(ConfigError::RelationshipNamingMismatch {
            via_type: via.entity_type.clone(),
            property: via.property.clone(),
            expected_type: other.to_string(),
        }
        .into());
    }
    Ok(())
}
