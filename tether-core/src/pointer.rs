//! Dependency pointers and deterministic key derivation.
//!
//! A pointer names one observable fact: either "any value of `property`
//! belonging to the entity instance identified by `uuid`" (identity), or
//! "the set of all entity instances for which `property` equals `value`"
//! (value). Registrations and invalidations coordinate purely by agreeing
//! on these strings, so derivation must be deterministic across processes
//! and time.
//!
//! # Key grammar
//!
//! ```text
//! identity: dep:{entityType}:uuid:{uuid}:{property}
//! value:    dep:{entityType}:{property}:{slug}:{sha256-hex}
//! ```
//!
//! The value form carries both a lossy human-readable slug (lowercase
//! alphanumerics of the canonical serialization, for debuggability) and the
//! full SHA-256 of that same serialization. The hash is mandatory: the slug
//! strips non-alphanumerics and could collide.

use crate::canonical::canonical_serialize;
use crate::error::TetherResult;
use crate::schema::SchemaRegistry;
use crate::value::DomainValue;
use sha2::{Digest, Sha256};

/// Maximum slug length embedded in a value-pointer key. Readability only;
/// uniqueness comes from the hash segment.
const SLUG_MAX_LEN: usize = 40;

/// Which fact a pointer observes.
#[derive(Debug, Clone, PartialEq)]
pub enum PointerSpecifier {
    /// Any value of the property on the instance identified by `uuid`.
    Identity { uuid: String },
    /// All instances for which the property equals `value`.
    Value { value: DomainValue },
}

/// A dependency pointer: `{entity_type, property, specifier}`.
#[derive(Debug, Clone, PartialEq)]
pub struct DependencyPointer {
    pub entity_type: String,
    pub property: String,
    pub specifier: PointerSpecifier,
}

impl DependencyPointer {
    /// Build an identity pointer.
    pub fn identity(
        entity_type: impl Into<String>,
        property: impl Into<String>,
        uuid: impl Into<String>,
    ) -> Self {
        Self {
            entity_type: entity_type.into(),
            property: property.into(),
            specifier: PointerSpecifier::Identity { uuid: uuid.into() },
        }
    }

    /// Build a value pointer.
    pub fn value(
        entity_type: impl Into<String>,
        property: impl Into<String>,
        value: impl Into<DomainValue>,
    ) -> Self {
        Self {
            entity_type: entity_type.into(),
            property: property.into(),
            specifier: PointerSpecifier::Value {
                value: value.into(),
            },
        }
    }

    /// Derive the deterministic string key for this pointer.
    ///
    /// Pure function: no I/O, no side effects, same input always yields the
    /// same output.
    pub fn derive_key(&self, schema: &SchemaRegistry) -> TetherResult<String> {
        match &self.specifier {
            PointerSpecifier::Identity { uuid } => Ok(format!(
                "dep:{}:uuid:{}:{}",
                self.entity_type, uuid, self.property
            )),
            PointerSpecifier::Value { value } => {
                let canonical = canonical_serialize(value, schema)?;
                Ok(format!(
                    "dep:{}:{}:{}:{}",
                    self.entity_type,
                    self.property,
                    slugify(&canonical),
                    content_hash(&canonical)
                ))
            }
        }
    }
}

/// Lossy human-readable slug of a canonical serialization: lowercase
/// alphanumerics only, truncated.
fn slugify(canonical: &str) -> String {
    canonical
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .take(SLUG_MAX_LEN)
        .collect()
}

/// Full hex SHA-256 of a canonical serialization.
fn content_hash(canonical: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::EntityDescriptor;
    use crate::value::EntityInstance;

    fn schema() -> SchemaRegistry {
        let mut schema = SchemaRegistry::new();
        schema
            .register(EntityDescriptor::new("Job", "uuid", ["name"]))
            .unwrap();
        schema
    }

    #[test]
    fn test_identity_key_is_human_readable() {
        let schema = schema();
        let pointer = DependencyPointer::identity("Job", "onShipUuid", "job-1");
        assert_eq!(
            pointer.derive_key(&schema).unwrap(),
            "dep:Job:uuid:job-1:onShipUuid"
        );
    }

    #[test]
    fn test_value_key_embeds_slug_and_hash() {
        let schema = schema();
        let pointer = DependencyPointer::value("Job", "providerUuid", "Prov-42");
        let key = pointer.derive_key(&schema).unwrap();
        let segments: Vec<&str> = key.split(':').collect();
        assert_eq!(segments[0], "dep");
        assert_eq!(segments[1], "Job");
        assert_eq!(segments[2], "providerUuid");
        assert_eq!(segments[3], "prov42");
        assert_eq!(segments[4].len(), 64);
        assert!(segments[4].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_derivation_is_deterministic() {
        let schema = schema();
        let pointer = DependencyPointer::value("Job", "name", "Junk Removal");
        assert_eq!(
            pointer.derive_key(&schema).unwrap(),
            pointer.derive_key(&schema).unwrap()
        );
    }

    #[test]
    fn test_slug_collisions_disambiguated_by_hash() {
        // Both slugs reduce to "ab1", only the hash keeps them apart.
        let schema = schema();
        let a = DependencyPointer::value("Job", "name", "a-b1");
        let b = DependencyPointer::value("Job", "name", "a_b!1");
        let key_a = a.derive_key(&schema).unwrap();
        let key_b = b.derive_key(&schema).unwrap();
        assert_ne!(key_a, key_b);
    }

    #[test]
    fn test_entity_valued_pointer_uses_identifier() {
        let schema = schema();
        let entity = EntityInstance::new(
            "Job",
            [("uuid".to_string(), DomainValue::str("job-1"))],
        );
        let by_entity = DependencyPointer::value("Job", "job", DomainValue::Entity(entity));
        let by_id = DependencyPointer::value("Job", "job", "job-1");
        assert_eq!(
            by_entity.derive_key(&schema).unwrap(),
            by_id.derive_key(&schema).unwrap()
        );
    }

    #[test]
    fn test_identity_and_value_keys_never_collide_on_uuid_property() {
        let schema = schema();
        let identity = DependencyPointer::identity("Job", "name", "job-1");
        let value = DependencyPointer::value("Job", "uuid", "job-1");
        assert_ne!(
            identity.derive_key(&schema).unwrap(),
            value.derive_key(&schema).unwrap()
        );
    }
}
