//! Schema element models
//!
//! Immutable-once-built records making up the Entity Data Model. Elements
//! reference each other by `FullQualifiedName`; identity-sharing happens
//! through `Arc` in the registry and the published graph.

pub mod association;
pub mod complex_type;
pub mod container;
pub mod entity_type;
pub mod name;
pub mod property;
pub mod schema;
pub mod simple_type;

pub use association::{
    Association, AssociationEnd, AssociationSet, AssociationSetEnd, Multiplicity,
    ReferentialConstraint, ReferentialConstraintRole,
};
pub use complex_type::ComplexType;
pub use container::{
    EntityContainer, EntitySet, FunctionImport, FunctionImportParameter, HttpMethod, ReturnType,
    TypeReference,
};
pub use entity_type::{EntityType, Key, NavigationProperty};
pub use name::{EDM_NAMESPACE, FullQualifiedName};
pub use property::{Facets, Property, PropertyMapping, PropertyType};
pub use schema::Schema;
pub use simple_type::EdmSimpleType;
