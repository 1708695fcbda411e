//! Query dependency declarations.
//!
//! A cached query declares which entity/relationship facts its result was
//! derived from. The spec is either a static list or a function of the
//! execution's `{input, output}`, evaluated exactly once per execution
//! after the query has run.

use std::sync::Arc;
use tether_core::DomainValue;

/// Extracts the one-or-many entity ids a declaration applies to, from one
/// execution's `{input, output}`.
pub type UuidExtractor = Arc<dyn Fn(&DomainValue, &DomainValue) -> Vec<String> + Send + Sync>;

/// Extractor reading a single string field off the query input.
pub fn input_field(name: &str) -> UuidExtractor {
    let name = name.to_string();
    Arc::new(move |input, _output| {
        input.get_str(&name).map(str::to_string).into_iter().collect()
    })
}

/// Extractor reading a single string field off the query output.
pub fn output_field(name: &str) -> UuidExtractor {
    let name = name.to_string();
    Arc::new(move |_input, output| {
        output.get_str(&name).map(str::to_string).into_iter().collect()
    })
}

/// One side of a relationship declaration.
#[derive(Clone)]
pub struct EntitySelector {
    pub entity_type: String,
    pub uuids: UuidExtractor,
}

impl EntitySelector {
    pub fn new(entity_type: impl Into<String>, uuids: UuidExtractor) -> Self {
        Self {
            entity_type: entity_type.into(),
            uuids,
        }
    }
}

/// The property realizing a foreign-key-style link, and the entity class it
/// lives on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationshipVia {
    pub entity_type: String,
    pub property: String,
}

impl RelationshipVia {
    pub fn new(entity_type: impl Into<String>, property: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            property: property.into(),
        }
    }
}

/// One declared dependency of a cached query.
#[derive(Clone)]
pub enum DependencyDeclaration {
    /// The query depends on the existence/identity-scoped properties of
    /// specific entity instances.
    Identity {
        entity_type: String,
        uuids: UuidExtractor,
    },
    /// The query depends on a foreign-key-style link between two entity
    /// classes, realized by `via.property` on whichever side matches
    /// `via.entity_type`.
    Relationship {
        from: EntitySelector,
        to_entity: String,
        via: RelationshipVia,
    },
}

impl DependencyDeclaration {
    pub fn identity(entity_type: impl Into<String>, uuids: UuidExtractor) -> Self {
        DependencyDeclaration::Identity {
            entity_type: entity_type.into(),
            uuids,
        }
    }

    pub fn relationship(
        from: EntitySelector,
        to_entity: impl Into<String>,
        via: RelationshipVia,
    ) -> Self {
        DependencyDeclaration::Relationship {
            from,
            to_entity: to_entity.into(),
            via,
        }
    }
}

/// How a query declares its dependencies.
#[derive(Clone)]
pub enum DependencySpec {
    /// A fixed, ordered list of declarations.
    Static(Vec<DependencyDeclaration>),
    /// A function of `{input, output}` producing that list; evaluated once
    /// per execution, after the output is known.
    Dynamic(Arc<dyn Fn(&DomainValue, &DomainValue) -> Vec<DependencyDeclaration> + Send + Sync>),
}

impl DependencySpec {
    /// A query with no declared dependencies.
    pub fn none() -> Self {
        DependencySpec::Static(Vec::new())
    }

    /// Evaluate to a concrete declaration list for one execution.
    pub fn evaluate(
        &self,
        input: &DomainValue,
        output: &DomainValue,
    ) -> Vec<DependencyDeclaration> {
        match self {
            DependencySpec::Static(declarations) => declarations.clone(),
            DependencySpec::Dynamic(producer) => producer(input, output),
        }
    }
}

impl Default for DependencySpec {
    fn default() -> Self {
        Self::none()
    }
}
