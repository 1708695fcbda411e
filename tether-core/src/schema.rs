//! Explicit entity schema descriptors.
//!
//! Every entity type that participates in coherence tracking is registered
//! once as an [`EntityDescriptor`]. All components consume descriptors by
//! lookup; nothing in the engine inspects runtime types.

use crate::error::{ConfigError, TetherResult};
use crate::value::{DomainValue, EntityInstance};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Schema descriptor for one entity type.
///
/// `identifier_field` names the property holding the entity's stable unique
/// identifier. `updatable_fields` lists the properties compared for
/// change-detection; everything else on the instance is treated as
/// structural metadata and never produces invalidation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityDescriptor {
    pub type_name: String,
    pub identifier_field: String,
    pub updatable_fields: Vec<String>,
}

impl EntityDescriptor {
    pub fn new(
        type_name: impl Into<String>,
        identifier_field: impl Into<String>,
        updatable_fields: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            type_name: type_name.into(),
            identifier_field: identifier_field.into(),
            updatable_fields: updatable_fields.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether this entity type has any updatable properties at all.
    pub fn is_mutable(&self) -> bool {
        !self.updatable_fields.is_empty()
    }
}

/// Registry of entity descriptors, keyed by type name.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    descriptors: BTreeMap<String, EntityDescriptor>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a descriptor. Registering the same type name twice is a
    /// caller-authoring mistake and fails fast.
    pub fn register(&mut self, descriptor: EntityDescriptor) -> TetherResult<()> {
        if self.descriptors.contains_key(&descriptor.type_name) {
            return Err(ConfigError::DuplicateDescriptor {
                type_name: descriptor.type_name,
            }
            .into());
        }
        self.descriptors
            .insert(descriptor.type_name.clone(), descriptor);
        Ok(())
    }

    /// Look up a descriptor by type name.
    pub fn descriptor(&self, type_name: &str) -> TetherResult<&EntityDescriptor> {
        self.descriptors
            .get(type_name)
            .ok_or_else(|| {
                ConfigError::UnknownEntityType {
                    type_name: type_name.to_string(),
                }
                .into()
            })
    }

    /// Resolve an entity instance's stable unique identifier.
    ///
    /// A missing or non-string identifier is fatal: invalidation pointers
    /// cannot be constructed without it, and skipping the entity would
    /// leave a coherence gap that surfaces later as a stale read.
    pub fn identifier_of(&self, entity: &EntityInstance) -> TetherResult<String> {
        let descriptor = self.descriptor(&entity.entity_type)?;
        match entity.property(&descriptor.identifier_field) {
            Some(DomainValue::Str(id)) if !id.is_empty() => Ok(id.clone()),
            _ => Err(ConfigError::MissingIdentifier {
                type_name: entity.entity_type.clone(),
                identifier_field: descriptor.identifier_field.clone(),
            }
            .into()),
        }
    }
}
