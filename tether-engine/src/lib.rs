//! Tether Engine - Query and Mutation Orchestration
//!
//! The cache-coherence engine: deterministic dependency-pointer derivation
//! (from `tether-core`), dependency resolution, mutation impact scanning,
//! and the two orchestrators that wrap caller-supplied query/mutation
//! logic over a plain key/value store.
//!
//! Guarantees provided by this layer:
//! - no stale read survives a relevant write, within one process;
//! - dependency registration always lands before the query's own output;
//! - entity snapshots are persisted only after invalidation fan-out.
//!
//! Cross-process mutual exclusion and multi-entity transactional atomicity
//! are explicitly out of scope.

pub mod deps;
pub mod engine;
pub mod impact;
pub mod mutation;
pub mod query;
pub mod resolve;

pub use deps::{
    input_field, output_field, DependencyDeclaration, DependencySpec, EntitySelector,
    RelationshipVia, UuidExtractor,
};
pub use engine::CoherenceEngine;
pub use impact::{scan_impact, ImpactReport};
pub use mutation::CachedMutation;
pub use query::{CacheKeyFn, CachedQuery, LogicFn, ValidateFn};
pub use resolve::resolve_dependencies;
