//! Tether Core - Value Model, Schema and Pointer Derivation
//!
//! Pure data structures and pure functions with no I/O. All other crates
//! depend on this. Pointer key derivation, canonical serialization and the
//! error taxonomy live here; everything that touches a store lives in the
//! crates layered on top.

pub mod canonical;
pub mod config;
pub mod error;
pub mod observer;
pub mod pointer;
pub mod schema;
pub mod value;

pub use canonical::{canonical_serialize, to_canonical_json};
pub use config::EngineConfig;
pub use error::{ConfigError, StateError, StoreError, TetherError, TetherResult};
pub use observer::{events, CoherenceObserver, RecordingObserver};
pub use pointer::{DependencyPointer, PointerSpecifier};
pub use schema::{EntityDescriptor, SchemaRegistry};
pub use value::{DomainValue, EntityInstance};
