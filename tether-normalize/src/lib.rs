//! Tether Normalize - Entity Reference Extraction and Substitution
//!
//! Normalization walks an arbitrarily nested value, extracts every entity
//! occurrence into a standalone snapshot stored once under its reference
//! key, and replaces the occurrence with a lightweight `{"$ref": key}`
//! marker. Denormalization is the inverse, substituting resolved snapshots
//! back into the full nested shape on read.
//!
//! This is what lets one mutation's entity write become visible to every
//! query result mentioning that entity without touching each query's cache
//! entry individually.
//!
//! Snapshot properties are themselves normalized: an entity occurring
//! inside another entity's properties is stored as a reference marker and
//! extracted as its own snapshot, so denormalization reconstructs the full
//! nested shape on read. Change-detection compares snapshot properties
//! through [`markers_to_identifiers`], which reduces a marker to the same
//! canonical form a live entity value reduces to.

use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tether_core::{
    to_canonical_json, DomainValue, EntityInstance, SchemaRegistry, StateError, TetherResult,
};

/// Marker field identifying a reference inside a normalized value.
pub const REF_MARKER: &str = "$ref";

/// Snapshot envelope fields.
const SNAPSHOT_TYPE: &str = "type";
const SNAPSHOT_PROPERTIES: &str = "properties";

/// Stable storage key for one logical entity instance's latest snapshot.
pub fn reference_key(entity_type: &str, uuid: &str) -> String {
    format!("ent:{entity_type}:{uuid}")
}

/// One entity occurrence extracted from a value tree.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityReference {
    /// Stable per-logical-instance storage key.
    pub key: String,
    /// The extracted instance as observed in the value.
    pub entity: EntityInstance,
}

impl EntityReference {
    /// Serialize this reference's snapshot for storage. Entity-valued
    /// properties are stored as reference markers.
    pub fn snapshot_json(&self, schema: &SchemaRegistry) -> TetherResult<Value> {
        let mut properties = Map::new();
        for (name, value) in &self.entity.properties {
            properties.insert(name.clone(), substitute_out(value, schema)?);
        }
        Ok(json!({
            SNAPSHOT_TYPE: self.entity.entity_type,
            SNAPSHOT_PROPERTIES: Value::Object(properties),
        }))
    }
}

/// Extract every entity occurrence from `value`, however deeply nested or
/// duplicated, deduplicated by reference key in first-occurrence order.
///
/// An entity lacking its declared identifier is a fatal configuration
/// error, raised immediately.
pub fn extract_references(
    value: &DomainValue,
    schema: &SchemaRegistry,
) -> TetherResult<Vec<EntityReference>> {
    let mut seen = BTreeSet::new();
    let mut references = Vec::new();
    walk_references(value, schema, &mut seen, &mut references)?;
    Ok(references)
}

fn walk_references(
    value: &DomainValue,
    schema: &SchemaRegistry,
    seen: &mut BTreeSet<String>,
    references: &mut Vec<EntityReference>,
) -> TetherResult<()> {
    match value {
        DomainValue::Sequence(items) => {
            for item in items {
                walk_references(item, schema, seen, references)?;
            }
        }
        DomainValue::Mapping(map) => {
            for item in map.values() {
                walk_references(item, schema, seen, references)?;
            }
        }
        DomainValue::Entity(entity) => {
            let uuid = schema.identifier_of(entity)?;
            let key = reference_key(&entity.entity_type, &uuid);
            if seen.insert(key.clone()) {
                references.push(EntityReference {
                    key,
                    entity: entity.clone(),
                });
            }
            // Entities nested inside entity properties are extracted as
            // their own references even though the enclosing snapshot
            // stores them as identifiers.
            for item in entity.properties.values() {
                walk_references(item, schema, seen, references)?;
            }
        }
        _ => {}
    }
    Ok(())
}

/// Normalize a value: entity occurrences become `{"$ref": key}` markers and
/// the extracted references are returned alongside the normalized shape.
pub fn normalize(
    value: &DomainValue,
    schema: &SchemaRegistry,
) -> TetherResult<(Value, Vec<EntityReference>)> {
    let references = extract_references(value, schema)?;
    let normalized = substitute_out(value, schema)?;
    Ok((normalized, references))
}

fn substitute_out(value: &DomainValue, schema: &SchemaRegistry) -> TetherResult<Value> {
    Ok(match value {
        DomainValue::Entity(entity) => {
            let uuid = schema.identifier_of(entity)?;
            json!({ REF_MARKER: reference_key(&entity.entity_type, &uuid) })
        }
        DomainValue::Sequence(items) => Value::Array(
            items
                .iter()
                .map(|item| substitute_out(item, schema))
                .collect::<TetherResult<Vec<_>>>()?,
        ),
        DomainValue::Mapping(map) => {
            let mut out = Map::new();
            for (key, item) in map {
                out.insert(key.clone(), substitute_out(item, schema)?);
            }
            Value::Object(out)
        }
        scalar => to_canonical_json(scalar, schema)?,
    })
}

/// Collect every reference key mentioned by a normalized value.
pub fn collect_reference_keys(normalized: &Value) -> Vec<String> {
    let mut seen = BTreeSet::new();
    let mut keys = Vec::new();
    collect_keys(normalized, &mut seen, &mut keys);
    keys
}

fn collect_keys(value: &Value, seen: &mut BTreeSet<String>, keys: &mut Vec<String>) {
    match value {
        Value::Array(items) => {
            for item in items {
                collect_keys(item, seen, keys);
            }
        }
        Value::Object(map) => {
            if let Some(Value::String(key)) = map.get(REF_MARKER) {
                if map.len() == 1 && seen.insert(key.clone()) {
                    keys.push(key.clone());
                }
                return;
            }
            for item in map.values() {
                collect_keys(item, seen, keys);
            }
        }
        _ => {}
    }
}

/// The reference key if `value` is a `{"$ref": key}` marker mapping.
pub fn marker_key_of(value: &DomainValue) -> Option<&str> {
    let DomainValue::Mapping(map) = value else {
        return None;
    };
    if map.len() != 1 {
        return None;
    }
    match map.get(REF_MARKER) {
        Some(DomainValue::Str(key)) => Some(key.as_str()),
        _ => None,
    }
}

/// Reference keys mentioned inside a parsed snapshot's properties.
///
/// A snapshot mentioning another entity stores it as a marker; resolving a
/// cache entry must fetch those transitively.
pub fn snapshot_reference_keys(entity: &EntityInstance) -> Vec<String> {
    let mut seen = BTreeSet::new();
    let mut keys = Vec::new();
    for value in entity.properties.values() {
        collect_domain_keys(value, &mut seen, &mut keys);
    }
    keys
}

fn collect_domain_keys(value: &DomainValue, seen: &mut BTreeSet<String>, keys: &mut Vec<String>) {
    if let Some(key) = marker_key_of(value) {
        if seen.insert(key.to_string()) {
            keys.push(key.to_string());
        }
        return;
    }
    match value {
        DomainValue::Sequence(items) => {
            for item in items {
                collect_domain_keys(item, seen, keys);
            }
        }
        DomainValue::Mapping(map) => {
            for item in map.values() {
                collect_domain_keys(item, seen, keys);
            }
        }
        _ => {}
    }
}

/// Replace reference markers with the bare identifier of the entity they
/// point at, recursively.
///
/// A stored marker and a live entity value then reduce to the same
/// canonical serialization, which is what change-detection compares.
pub fn markers_to_identifiers(value: &DomainValue) -> DomainValue {
    if let Some(key) = marker_key_of(value) {
        return DomainValue::Str(marker_identifier(key).to_string());
    }
    match value {
        DomainValue::Sequence(items) => {
            DomainValue::Sequence(items.iter().map(markers_to_identifiers).collect())
        }
        DomainValue::Mapping(map) => DomainValue::Mapping(
            map.iter()
                .map(|(key, item)| (key.clone(), markers_to_identifiers(item)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// The identifier segment of an `ent:{type}:{uuid}` reference key.
fn marker_identifier(key: &str) -> &str {
    key.rsplit(':').next().unwrap_or(key)
}

/// Parse a stored snapshot back into an entity instance.
pub fn parse_snapshot(key: &str, raw: &str) -> TetherResult<EntityInstance> {
    let malformed = |reason: &str| StateError::MalformedSnapshot {
        key: key.to_string(),
        reason: reason.to_string(),
    };
    let json: Value =
        serde_json::from_str(raw).map_err(|e| malformed(&format!("invalid JSON: {e}")))?;
    let Value::Object(map) = json else {
        return Err(malformed("expected object envelope").into());
    };
    let Some(Value::String(entity_type)) = map.get(SNAPSHOT_TYPE) else {
        return Err(malformed("missing type field").into());
    };
    let Some(Value::Object(properties)) = map.get(SNAPSHOT_PROPERTIES) else {
        return Err(malformed("missing properties field").into());
    };
    let properties: BTreeMap<String, DomainValue> = properties
        .iter()
        .map(|(name, value)| (name.clone(), json_to_domain(value)))
        .collect();
    Ok(EntityInstance {
        entity_type: entity_type.clone(),
        properties,
    })
}

/// Substitute resolved snapshots back into a normalized value, rebuilding
/// the full nested shape: markers inside snapshot properties resolve
/// recursively against the same map.
///
/// Every key reachable from `normalized` (directly or through snapshot
/// properties) must be present in `snapshots`; a missing key here indicates
/// the caller skipped resolution.
pub fn denormalize(
    normalized: &Value,
    snapshots: &HashMap<String, EntityInstance>,
) -> TetherResult<DomainValue> {
    denormalize_inner(normalized, snapshots, &mut Vec::new())
}

fn denormalize_inner(
    normalized: &Value,
    snapshots: &HashMap<String, EntityInstance>,
    in_progress: &mut Vec<String>,
) -> TetherResult<DomainValue> {
    Ok(match normalized {
        Value::Array(items) => DomainValue::Sequence(
            items
                .iter()
                .map(|item| denormalize_inner(item, snapshots, in_progress))
                .collect::<TetherResult<Vec<_>>>()?,
        ),
        Value::Object(map) => {
            if let Some(Value::String(key)) = map.get(REF_MARKER) {
                if map.len() == 1 {
                    return Ok(DomainValue::Entity(resolve_entity(
                        key,
                        snapshots,
                        in_progress,
                    )?));
                }
            }
            let mut out = BTreeMap::new();
            for (key, item) in map {
                out.insert(
                    key.clone(),
                    denormalize_inner(item, snapshots, in_progress)?,
                );
            }
            DomainValue::Mapping(out)
        }
        scalar => json_to_domain(scalar),
    })
}

fn resolve_entity(
    key: &str,
    snapshots: &HashMap<String, EntityInstance>,
    in_progress: &mut Vec<String>,
) -> TetherResult<EntityInstance> {
    // A key already being resolved means the stored snapshots form a
    // reference cycle, which no finite value tree can materialize.
    if in_progress.iter().any(|pending| pending == key) {
        return Err(StateError::MalformedCacheEntry {
            key: key.to_string(),
            reason: "cyclic entity reference".to_string(),
        }
        .into());
    }
    let entity = snapshots
        .get(key)
        .ok_or_else(|| StateError::MalformedCacheEntry {
            key: key.to_string(),
            reason: "unresolved entity reference".to_string(),
        })?;
    in_progress.push(key.to_string());
    let mut properties = BTreeMap::new();
    for (name, value) in &entity.properties {
        properties.insert(name.clone(), resolve_value(value, snapshots, in_progress)?);
    }
    in_progress.pop();
    Ok(EntityInstance {
        entity_type: entity.entity_type.clone(),
        properties,
    })
}

fn resolve_value(
    value: &DomainValue,
    snapshots: &HashMap<String, EntityInstance>,
    in_progress: &mut Vec<String>,
) -> TetherResult<DomainValue> {
    if let Some(key) = marker_key_of(value) {
        return Ok(DomainValue::Entity(resolve_entity(
            key,
            snapshots,
            in_progress,
        )?));
    }
    Ok(match value {
        DomainValue::Sequence(items) => DomainValue::Sequence(
            items
                .iter()
                .map(|item| resolve_value(item, snapshots, in_progress))
                .collect::<TetherResult<Vec<_>>>()?,
        ),
        DomainValue::Mapping(map) => {
            let mut out = BTreeMap::new();
            for (name, item) in map {
                out.insert(name.clone(), resolve_value(item, snapshots, in_progress)?);
            }
            DomainValue::Mapping(out)
        }
        other => other.clone(),
    })
}

/// Lift a plain JSON value into the domain value model.
pub fn json_to_domain(json: &Value) -> DomainValue {
    match json {
        Value::Null => DomainValue::Null,
        Value::Bool(b) => DomainValue::Bool(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => DomainValue::Int(i),
            None => DomainValue::Float(n.as_f64().unwrap_or(f64::NAN)),
        },
        Value::String(s) => DomainValue::Str(s.clone()),
        Value::Array(items) => DomainValue::Sequence(items.iter().map(json_to_domain).collect()),
        Value::Object(map) => DomainValue::Mapping(
            map.iter()
                .map(|(key, item)| (key.clone(), json_to_domain(item)))
                .collect(),
        ),
    }
}
