//! Mapping metadata: classes, properties and relations.
//!
//! The mapping is built once and shared read-only by every transaction.
//! Nothing in this module is mutated after [`MappingBuilder::build`].

mod class;
mod configuration;
mod relation;

pub use class::{ClassDefinition, PropertyDefinition, PropertyKind};
pub use configuration::{MappingBuilder, MappingConfiguration};
pub use relation::{Cardinality, EndPointKind, RelationDefinition, RelationEndPointDefinition};
