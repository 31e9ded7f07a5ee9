//! EDM Metadata - Entity Data Model construction for protocol services
//!
//! Provides:
//! - Metadata sources (annotated classes, persistence metamodels, schema documents)
//! - A registry of built elements with at-most-once construction
//! - Type resolution, key expansion and association merging
//! - Entity containers with `extends` inheritance and cached lookups
//! - Validation of the assembled schema graph
//!
//! # Example
//!
//! ```rust
//! use edm_metadata::models::{EdmSimpleType, Multiplicity};
//! use edm_metadata::source::{AnnotatedClass, AnnotatedClassSource};
//! use edm_metadata::EdmBuilder;
//!
//! let source = AnnotatedClassSource::new("Acme")
//!     .with_class(AnnotatedClass::entity("Building").key("id", EdmSimpleType::Int32))
//!     .with_class(
//!         AnnotatedClass::entity("Room")
//!             .key("id", EdmSimpleType::Int32)
//!             .navigation("building", "Building", Multiplicity::One),
//!     );
//!
//! let graph = EdmBuilder::new(source).build().unwrap();
//! let container = graph.default_entity_container();
//! assert!(container.get_entity_set("Rooms").is_some());
//! assert!(graph.association("BuildingRooms").is_some());
//! ```

pub mod association;
pub mod config;
pub mod error;
pub mod expand;
pub mod graph;
pub mod models;
pub mod naming;
pub mod registry;
pub mod resolver;
pub mod source;
pub mod validation;
pub mod view;

// Re-export commonly used types
pub use config::{BuildConfig, BuildConfigBuilder};
pub use error::{BuildError, BuildReport};
pub use graph::{EdmBuilder, SchemaGraph};
pub use registry::{ElementKind, Registry, SchemaElement};
pub use source::{
    AnnotatedClass, AnnotatedClassSource, EdmAnnotated, ExternalSchemaSource, MappingModel,
    MetadataSource, PersistenceMetamodelSource, PersistenceUnit, SchemaDocument,
};
pub use validation::{GraphValidationResult, validate_graph};
pub use view::{BuildContext, BuildState, Builder, View};

// Re-export models
pub use models::{
    Association, AssociationSet, ComplexType, EdmSimpleType, EntityContainer, EntitySet,
    EntityType, FullQualifiedName, FunctionImport, Multiplicity, NavigationProperty, Property,
    Schema,
};
