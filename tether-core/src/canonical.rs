//! Canonical serialization of domain values.
//!
//! Pointer derivation and change-detection both compare values through this
//! single serialization, so it must be deterministic: stable field ordering
//! (mappings are `BTreeMap`-backed, and `serde_json::Map` sorts keys), and
//! entities resolve to their declared unique identifier rather than their
//! full property set. Pure function, no I/O.

use crate::error::TetherResult;
use crate::schema::SchemaRegistry;
use crate::value::DomainValue;
use serde_json::{Map, Number, Value};

/// Serialize a value to its canonical string form.
///
/// Identical inputs always yield identical strings, across processes and
/// time. Entity occurrences serialize as their identifier value.
pub fn canonical_serialize(value: &DomainValue, schema: &SchemaRegistry) -> TetherResult<String> {
    let json = to_canonical_json(value, schema)?;
    // Value -> String cannot fail for the shapes produced above.
    Ok(json.to_string())
}

/// Lower a domain value to a `serde_json::Value` with entities resolved to
/// their identifiers.
pub fn to_canonical_json(value: &DomainValue, schema: &SchemaRegistry) -> TetherResult<Value> {
    Ok(match value {
        DomainValue::Null => Value::Null,
        DomainValue::Bool(b) => Value::Bool(*b),
        DomainValue::Int(n) => Value::Number((*n).into()),
        DomainValue::Float(f) => Number::from_f64(*f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        DomainValue::Str(s) => Value::String(s.clone()),
        DomainValue::Sequence(items) => Value::Array(
            items
                .iter()
                .map(|item| to_canonical_json(item, schema))
                .collect::<TetherResult<Vec<_>>>()?,
        ),
        DomainValue::Mapping(map) => {
            let mut out = Map::new();
            for (key, item) in map {
                out.insert(key.clone(), to_canonical_json(item, schema)?);
            }
            Value::Object(out)
        }
        DomainValue::Entity(entity) => Value::String(schema.identifier_of(entity)?),
    })
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
    fn test_scalars() {
        let schema = schema();
        assert_eq!(
            canonical_serialize(&DomainValue::Null, &schema).unwrap(),
            "null"
        );
        assert_eq!(
            canonical_serialize(&DomainValue::Bool(true), &schema).unwrap(),
            "true"
        );
        assert_eq!(
            canonical_serialize(&DomainValue::Int(42), &schema).unwrap(),
            "42"
        );
        assert_eq!(
            canonical_serialize(&DomainValue::str("a"), &schema).unwrap(),
            "\"a\""
        );
    }

    #[test]
    fn test_mapping_field_order_is_stable() {
        let schema = schema();
        let forward = DomainValue::mapping([
            ("a".to_string(), DomainValue::Int(1)),
            ("b".to_string(), DomainValue::Int(2)),
        ]);
        let reversed = DomainValue::mapping([
            ("b".to_string(), DomainValue::Int(2)),
            ("a".to_string(), DomainValue::Int(1)),
        ]);
        assert_eq!(
            canonical_serialize(&forward, &schema).unwrap(),
            canonical_serialize(&reversed, &schema).unwrap()
        );
    }

    #[test]
    fn test_entity_resolves_to_identifier() {
        let schema = schema();
        let entity = DomainValue::Entity(EntityInstance::new(
            "Job",
            [
                ("uuid".to_string(), DomainValue::str("job-1")),
                ("name".to_string(), DomainValue::str("Junk Removal")),
            ],
        ));
        assert_eq!(
            canonical_serialize(&entity, &schema).unwrap(),
            "\"job-1\""
        );
    }

    #[test]
    fn test_nested_sequence() {
        let schema = schema();
        let value = DomainValue::Sequence(vec![
            DomainValue::Int(1),
            DomainValue::Sequence(vec![DomainValue::str("x")]),
        ]);
        assert_eq!(
            canonical_serialize(&value, &schema).unwrap(),
            "[1,[\"x\"]]"
        );
    }
}
