//! Metadata sources
//!
//! A `MetadataSource` yields plain descriptor records for the core to build
//! from. Three sources are provided:
//! - `AnnotatedClassSource`: per-class declarations (`EdmAnnotated`)
//! - `PersistenceMetamodelSource`: a persistence unit's managed types and attributes
//! - `ExternalSchemaSource`: an already-parsed schema document (JSON/YAML)
//!
//! The core never inspects host-language type information directly, only the
//! descriptors returned here.

pub mod annotated;
pub mod document;
pub mod mapping;
pub mod metamodel;

pub use annotated::{AnnotatedClass, AnnotatedClassSource, EdmAnnotated};
pub use document::{ExternalSchemaSource, SchemaDocument};
pub use mapping::MappingModel;
pub use metamodel::{Attribute, ManagedType, ManagedTypeKind, PersistenceMetamodelSource, PersistenceUnit};

use serde::{Deserialize, Serialize};

use crate::error::BuildError;
use crate::models::{EdmSimpleType, Facets, FullQualifiedName, HttpMethod, Multiplicity};

/// Kind of schema type a candidate describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CandidateKind {
    Entity,
    Complex,
}

/// Member kind as reported by a persistence metamodel
///
/// `Navigation` carries an explicit target multiplicity for sources that
/// declare relationships directly rather than through JPA-style kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttributeKind {
    Basic,
    Embedded,
    EmbeddedId,
    OneToOne,
    ManyToOne,
    OneToMany,
    ManyToMany,
    Navigation(Multiplicity),
}

impl AttributeKind {
    pub fn is_navigation(&self) -> bool {
        !matches!(
            self,
            AttributeKind::Basic | AttributeKind::Embedded | AttributeKind::EmbeddedId
        )
    }
}

/// Per-type descriptor handed out by `list_candidates`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDescriptor {
    pub name: FullQualifiedName,
    pub kind: CandidateKind,
    pub base_type: Option<FullQualifiedName>,
    pub is_abstract: bool,
    pub has_stream: bool,
    /// Explicit entity set name
    pub entity_set: Option<String>,
    /// Source-private index; opaque to the core
    pub handle: usize,
}

impl TypeDescriptor {
    pub fn new(name: FullQualifiedName, kind: CandidateKind, handle: usize) -> Self {
        Self {
            name,
            kind,
            base_type: None,
            is_abstract: false,
            has_stream: false,
            entity_set: None,
            handle,
        }
    }
}

/// Declared type of a member before resolution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RawType {
    /// Already an EDM simple type
    Simple(EdmSimpleType),
    /// Qualified type name: `Edm.*` or a complex/entity type
    Named(FullQualifiedName),
    /// Host-language type name to be mapped onto a simple type
    Native(String),
}

/// Simple or complex member of a type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyDescriptor {
    pub name: String,
    pub raw_type: RawType,
    /// `Basic` for simple members, `Embedded`/`EmbeddedId` for complex ones
    pub kind: AttributeKind,
    pub facets: Facets,
    pub concurrency_token: bool,
    /// Backing column name
    pub column: Option<String>,
}

impl PropertyDescriptor {
    pub fn new(name: impl Into<String>, raw_type: RawType, kind: AttributeKind) -> Self {
        Self {
            name: name.into(),
            raw_type,
            kind,
            facets: Facets::default(),
            concurrency_token: false,
            column: None,
        }
    }
}

/// Foreign-key column pairing behind a relationship
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinColumn {
    /// Column (or property) on the declaring side
    pub name: String,
    /// Column (or property) on the target side
    pub referenced_column_name: String,
}

/// Navigation member of an entity type (or of an embeddable)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationDescriptor {
    pub name: String,
    pub target: FullQualifiedName,
    pub kind: AttributeKind,
    /// Whether the target end may be absent
    pub optional: bool,
    /// Explicitly declared multiplicity of the declaring end
    pub from_multiplicity: Option<Multiplicity>,
    pub association: Option<String>,
    pub from_role: Option<String>,
    pub to_role: Option<String>,
    pub join_columns: Vec<JoinColumn>,
}

impl NavigationDescriptor {
    pub fn new(name: impl Into<String>, target: FullQualifiedName, kind: AttributeKind) -> Self {
        Self {
            name: name.into(),
            target,
            kind,
            optional: false,
            from_multiplicity: None,
            association: None,
            from_role: None,
            to_role: None,
            join_columns: Vec::new(),
        }
    }
}

/// How a type's key is declared
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum KeyDescriptor {
    /// No key declared (abstract types, or keys inherited from a base type)
    #[default]
    None,
    /// Simple properties, in key order
    Properties(Vec<String>),
    /// A single embedded (complex) property whose leaves form the key
    Embedded(String),
}

/// Entity set declared on a container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntitySetDescriptor {
    pub name: String,
    pub entity_type: FullQualifiedName,
}

/// Function import parameter before resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterDescriptor {
    pub name: String,
    pub raw_type: RawType,
    pub facets: Facets,
}

/// Function import before resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionImportDescriptor {
    pub name: String,
    pub return_type: Option<RawType>,
    pub return_multiplicity: Multiplicity,
    pub entity_set: Option<String>,
    pub http_method: HttpMethod,
    pub parameters: Vec<ParameterDescriptor>,
}

impl FunctionImportDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            return_type: None,
            return_multiplicity: Multiplicity::One,
            entity_set: None,
            http_method: HttpMethod::Get,
            parameters: Vec::new(),
        }
    }
}

/// Entity container declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerDescriptor {
    pub name: String,
    pub namespace: String,
    pub is_default: bool,
    pub extends: Option<String>,
    pub entity_sets: Vec<EntitySetDescriptor>,
    /// Add an entity set for every root entity type built in the session
    pub expose_all_entity_types: bool,
    pub function_imports: Vec<FunctionImportDescriptor>,
}

impl ContainerDescriptor {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            is_default: false,
            extends: None,
            entity_sets: Vec::new(),
            expose_all_entity_types: false,
            function_imports: Vec::new(),
        }
    }
}

/// Capability interface every metadata source implements
pub trait MetadataSource: Send + Sync {
    /// Label used in logs and reports
    fn source_name(&self) -> &str;

    /// Namespace for the default container and unqualified references
    fn default_namespace(&self) -> &str;

    /// Every type candidate, in declaration order
    fn list_candidates(&self) -> Vec<TypeDescriptor>;

    /// Candidate by qualified name and kind
    ///
    /// Sources that can describe types they do not list override this; those
    /// types are built on demand after publication.
    fn find_candidate(&self, name: &FullQualifiedName, kind: CandidateKind) -> Option<TypeDescriptor> {
        self.list_candidates()
            .into_iter()
            .find(|c| c.name == *name && c.kind == kind)
    }

    fn describe_properties(&self, descriptor: &TypeDescriptor) -> Result<Vec<PropertyDescriptor>, BuildError>;

    fn describe_navigations(&self, descriptor: &TypeDescriptor) -> Result<Vec<NavigationDescriptor>, BuildError>;

    fn describe_key(&self, descriptor: &TypeDescriptor) -> Result<KeyDescriptor, BuildError>;

    /// Declared containers; a default container is synthesized when none is marked default
    fn containers(&self) -> Vec<ContainerDescriptor> {
        Vec::new()
    }

    /// Function imports for the synthesized default container
    fn function_imports(&self) -> Vec<FunctionImportDescriptor> {
        Vec::new()
    }
}

/// Described members of one candidate
#[derive(Debug, Clone)]
pub(crate) struct TypeEntry {
    pub descriptor: TypeDescriptor,
    /// Returned by `list_candidates`; unlisted entries are only found by name
    pub listed: bool,
    pub properties: Vec<PropertyDescriptor>,
    pub navigations: Vec<NavigationDescriptor>,
    pub key: KeyDescriptor,
}

/// Candidate storage shared by the bundled sources
///
/// Handles are indices into the table.
#[derive(Debug, Clone, Default)]
pub(crate) struct CandidateTable {
    entries: Vec<TypeEntry>,
}

impl CandidateTable {
    pub fn push(&mut self, mut entry: TypeEntry) {
        let duplicate = self.entries.iter().any(|e| {
            e.descriptor.name == entry.descriptor.name && e.descriptor.kind == entry.descriptor.kind
        });
        if duplicate {
            tracing::warn!(
                "Ignoring second {:?} candidate named '{}'",
                entry.descriptor.kind,
                entry.descriptor.name
            );
            return;
        }
        entry.descriptor.handle = self.entries.len();
        self.entries.push(entry);
    }

    pub fn listed(&self) -> Vec<TypeDescriptor> {
        self.entries
            .iter()
            .filter(|e| e.listed)
            .map(|e| e.descriptor.clone())
            .collect()
    }

    pub fn find(&self, name: &FullQualifiedName, kind: CandidateKind) -> Option<TypeDescriptor> {
        self.entries
            .iter()
            .find(|e| e.descriptor.name == *name && e.descriptor.kind == kind)
            .map(|e| e.descriptor.clone())
    }

    pub fn entry(&self, descriptor: &TypeDescriptor) -> Result<&TypeEntry, BuildError> {
        self.entries
            .get(descriptor.handle)
            .filter(|e| e.descriptor.name == descriptor.name)
            .ok_or_else(|| BuildError::model(&descriptor.name, "descriptor does not belong to this source"))
    }
}
