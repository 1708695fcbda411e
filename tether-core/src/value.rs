//! The closed tagged value model.
//!
//! Every input and output that flows through the coherence engine is a
//! [`DomainValue`]: a scalar, a sequence, a string-keyed mapping, or a
//! domain entity instance. Modeling this as a closed sum type (rather than
//! an open "anything serializable" surface) lets normalization and
//! change-detection dispatch on the tag instead of guessing at shape.
//!
//! Mappings are backed by `BTreeMap` so that field ordering is canonical by
//! construction; two logically equal mappings always serialize identically.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A domain entity occurrence inside a value tree.
///
/// `entity_type` names a descriptor in the
/// [`SchemaRegistry`](crate::schema::SchemaRegistry); `properties` carries
/// the instance's current observable state, including its identifier field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityInstance {
    pub entity_type: String,
    pub properties: BTreeMap<String, DomainValue>,
}

impl EntityInstance {
    /// Create an entity instance from a type name and property pairs.
    pub fn new(
        entity_type: impl Into<String>,
        properties: impl IntoIterator<Item = (String, DomainValue)>,
    ) -> Self {
        Self {
            entity_type: entity_type.into(),
            properties: properties.into_iter().collect(),
        }
    }

    /// Get a property value, if present.
    pub fn property(&self, name: &str) -> Option<&DomainValue> {
        self.properties.get(name)
    }
}

/// The closed value model consumed and produced by cached queries and
/// mutations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DomainValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Sequence(Vec<DomainValue>),
    Mapping(BTreeMap<String, DomainValue>),
    Entity(EntityInstance),
}

impl DomainValue {
    /// Build a mapping from key/value pairs.
    pub fn mapping(pairs: impl IntoIterator<Item = (String, DomainValue)>) -> Self {
        DomainValue::Mapping(pairs.into_iter().collect())
    }

    /// Build a string value.
    pub fn str(s: impl Into<String>) -> Self {
        DomainValue::Str(s.into())
    }

    /// Get a field from a mapping value; `None` for non-mappings.
    pub fn get(&self, key: &str) -> Option<&DomainValue> {
        match self {
            DomainValue::Mapping(map) => map.get(key),
            _ => None,
        }
    }

    /// Get a string field from a mapping value.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        match self.get(key)? {
            DomainValue::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Whether this value is `Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, DomainValue::Null)
    }

    /// Expand a value into its invalidation elements: sequences expand per
    /// element, everything else stands for itself. `Null` expands to
    /// nothing (there is no observable fact to point at).
    pub fn expand_elements(&self) -> Vec<&DomainValue> {
        match self {
            DomainValue::Null => Vec::new(),
            DomainValue::Sequence(items) => {
                items.iter().filter(|item| !item.is_null()).collect()
            }
            other => vec![other],
        }
    }
}

impl From<&str> for DomainValue {
    fn from(s: &str) -> Self {
        DomainValue::Str(s.to_string())
    }
}

impl From<String> for DomainValue {
    fn from(s: String) -> Self {
        DomainValue::Str(s)
    }
}

impl From<i64> for DomainValue {
    fn from(n: i64) -> Self {
        DomainValue::Int(n)
    }
}

impl From<bool> for DomainValue {
    fn from(b: bool) -> Self {
        DomainValue::Bool(b)
    }
}

impl From<EntityInstance> for DomainValue {
    fn from(entity: EntityInstance) -> Self {
        DomainValue::Entity(entity)
    }
}
