//! Annotated class source
//!
//! Classes describe their EDM shape declaratively through `EdmAnnotated`,
//! returning an `AnnotatedClass` built fluently:
//!
//! ```rust
//! use edm_metadata::models::{EdmSimpleType, Multiplicity};
//! use edm_metadata::source::{AnnotatedClass, AnnotatedClassSource, EdmAnnotated};
//!
//! struct Room;
//!
//! impl EdmAnnotated for Room {
//!     fn edm_class() -> AnnotatedClass {
//!         AnnotatedClass::entity("Room")
//!             .key("id", EdmSimpleType::Int32)
//!             .property("buildingId", EdmSimpleType::Int32)
//!             .navigation("building", "Building", Multiplicity::One)
//!     }
//! }
//!
//! let source = AnnotatedClassSource::new("Acme").register::<Room>();
//! ```

use super::{
    AttributeKind, CandidateKind, CandidateTable, ContainerDescriptor, FunctionImportDescriptor,
    KeyDescriptor, MetadataSource, NavigationDescriptor, PropertyDescriptor, RawType,
    TypeDescriptor, TypeEntry,
};
use crate::error::BuildError;
use crate::models::{EdmSimpleType, Facets, FullQualifiedName, Multiplicity};

/// Implemented by types that describe themselves to the EDM builder
pub trait EdmAnnotated {
    fn edm_class() -> AnnotatedClass;
}

#[derive(Debug, Clone)]
enum TypeRef {
    Simple(EdmSimpleType),
    Named(String),
    Native(String),
}

#[derive(Debug, Clone)]
struct AnnotatedProperty {
    name: String,
    type_ref: TypeRef,
    kind: AttributeKind,
    facets: Facets,
    concurrency_token: bool,
}

#[derive(Debug, Clone)]
struct AnnotatedNavigation {
    name: String,
    target: String,
    multiplicity: Multiplicity,
    from_multiplicity: Option<Multiplicity>,
    association: Option<String>,
    from_role: Option<String>,
    to_role: Option<String>,
}

/// Declarative description of one class
#[derive(Debug, Clone)]
pub struct AnnotatedClass {
    name: String,
    namespace: Option<String>,
    kind: CandidateKind,
    base_type: Option<String>,
    is_abstract: bool,
    has_stream: bool,
    entity_set: Option<String>,
    properties: Vec<AnnotatedProperty>,
    navigations: Vec<AnnotatedNavigation>,
    key: KeyDescriptor,
}

impl AnnotatedClass {
    fn new(name: impl Into<String>, kind: CandidateKind) -> Self {
        Self {
            name: name.into(),
            namespace: None,
            kind,
            base_type: None,
            is_abstract: false,
            has_stream: false,
            entity_set: None,
            properties: Vec::new(),
            navigations: Vec::new(),
            key: KeyDescriptor::None,
        }
    }

    pub fn entity(name: impl Into<String>) -> Self {
        Self::new(name, CandidateKind::Entity)
    }

    pub fn complex(name: impl Into<String>) -> Self {
        Self::new(name, CandidateKind::Complex)
    }

    /// Namespace overriding the source default
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Base type; bare names resolve in this class's namespace
    pub fn base_type(mut self, base_type: impl Into<String>) -> Self {
        self.base_type = Some(base_type.into());
        self
    }

    pub fn abstract_type(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    /// Mark the entity as a media resource
    pub fn media_resource(mut self) -> Self {
        self.has_stream = true;
        self
    }

    pub fn entity_set(mut self, name: impl Into<String>) -> Self {
        self.entity_set = Some(name.into());
        self
    }

    fn push_property(mut self, name: impl Into<String>, type_ref: TypeRef, kind: AttributeKind, facets: Facets) -> Self {
        self.properties.push(AnnotatedProperty {
            name: name.into(),
            type_ref,
            kind,
            facets,
            concurrency_token: false,
        });
        self
    }

    /// Simple key property, appended to the key in call order
    pub fn key(self, name: impl Into<String>, simple_type: EdmSimpleType) -> Self {
        let name = name.into();
        let mut class = self.push_property(
            name.clone(),
            TypeRef::Simple(simple_type),
            AttributeKind::Basic,
            Facets::nullable(false),
        );
        class.key = match class.key {
            KeyDescriptor::Properties(mut refs) => {
                refs.push(name);
                KeyDescriptor::Properties(refs)
            }
            _ => KeyDescriptor::Properties(vec![name]),
        };
        class
    }

    pub fn property(self, name: impl Into<String>, simple_type: EdmSimpleType) -> Self {
        self.push_property(name, TypeRef::Simple(simple_type), AttributeKind::Basic, Facets::default())
    }

    pub fn property_with_facets(self, name: impl Into<String>, simple_type: EdmSimpleType, facets: Facets) -> Self {
        self.push_property(name, TypeRef::Simple(simple_type), AttributeKind::Basic, facets)
    }

    /// Property typed by a qualified EDM name (`Edm.String`) or a type name
    pub fn typed(self, name: impl Into<String>, type_name: impl Into<String>) -> Self {
        self.push_property(name, TypeRef::Named(type_name.into()), AttributeKind::Basic, Facets::default())
    }

    /// Property typed by a host-language type name (`i64`, `Option<String>`)
    pub fn native(self, name: impl Into<String>, type_name: impl Into<String>) -> Self {
        self.push_property(name, TypeRef::Native(type_name.into()), AttributeKind::Basic, Facets::default())
    }

    /// Simple property used for optimistic concurrency
    pub fn concurrency_token(self, name: impl Into<String>, simple_type: EdmSimpleType) -> Self {
        let mut class = self.property(name, simple_type);
        if let Some(property) = class.properties.last_mut() {
            property.concurrency_token = true;
        }
        class
    }

    /// Embedded member of a complex type
    pub fn embedded(self, name: impl Into<String>, complex_type: impl Into<String>) -> Self {
        self.push_property(
            name,
            TypeRef::Named(complex_type.into()),
            AttributeKind::Embedded,
            Facets::default(),
        )
    }

    /// Embedded member whose leaves form the key
    pub fn embedded_key(self, name: impl Into<String>, complex_type: impl Into<String>) -> Self {
        let name = name.into();
        let mut class = self.push_property(
            name.clone(),
            TypeRef::Named(complex_type.into()),
            AttributeKind::EmbeddedId,
            Facets::nullable(false),
        );
        class.key = KeyDescriptor::Embedded(name);
        class
    }

    /// Navigation to `target` with the given target-end multiplicity
    pub fn navigation(mut self, name: impl Into<String>, target: impl Into<String>, multiplicity: Multiplicity) -> Self {
        self.navigations.push(AnnotatedNavigation {
            name: name.into(),
            target: target.into(),
            multiplicity,
            from_multiplicity: None,
            association: None,
            from_role: None,
            to_role: None,
        });
        self
    }

    /// Navigation with an explicit association name and roles
    pub fn navigation_in(
        mut self,
        name: impl Into<String>,
        target: impl Into<String>,
        multiplicity: Multiplicity,
        association: impl Into<String>,
        roles: Option<(&str, &str)>,
    ) -> Self {
        self.navigations.push(AnnotatedNavigation {
            name: name.into(),
            target: target.into(),
            multiplicity,
            from_multiplicity: None,
            association: Some(association.into()),
            from_role: roles.map(|(from, _)| from.to_string()),
            to_role: roles.map(|(_, to)| to.to_string()),
        });
        self
    }

    /// State the declaring end's multiplicity of the last navigation
    pub fn from_multiplicity(mut self, multiplicity: Multiplicity) -> Self {
        if let Some(navigation) = self.navigations.last_mut() {
            navigation.from_multiplicity = Some(multiplicity);
        }
        self
    }

    fn into_entry(self, default_namespace: &str, listed: bool) -> TypeEntry {
        let namespace = self.namespace.unwrap_or_else(|| default_namespace.to_string());
        let resolve = |reference: &str| FullQualifiedName::parse_in(reference, &namespace);

        let mut descriptor = TypeDescriptor::new(FullQualifiedName::new(&namespace, &self.name), self.kind, 0);
        descriptor.base_type = self.base_type.as_deref().map(resolve);
        descriptor.is_abstract = self.is_abstract;
        descriptor.has_stream = self.has_stream;
        descriptor.entity_set = self.entity_set;

        let properties = self
            .properties
            .into_iter()
            .map(|p| {
                let raw_type = match p.type_ref {
                    TypeRef::Simple(simple) => RawType::Simple(simple),
                    TypeRef::Named(name) => RawType::Named(resolve(&name)),
                    TypeRef::Native(name) => RawType::Native(name),
                };
                let mut property = PropertyDescriptor::new(p.name, raw_type, p.kind);
                property.facets = p.facets;
                property.concurrency_token = p.concurrency_token;
                property
            })
            .collect();

        let navigations = self
            .navigations
            .into_iter()
            .map(|n| {
                let mut navigation = NavigationDescriptor::new(
                    n.name,
                    resolve(&n.target),
                    AttributeKind::Navigation(n.multiplicity),
                );
                navigation.optional = n.multiplicity == Multiplicity::ZeroOrOne;
                navigation.from_multiplicity = n.from_multiplicity;
                navigation.association = n.association;
                navigation.from_role = n.from_role;
                navigation.to_role = n.to_role;
                navigation
            })
            .collect();

        TypeEntry {
            descriptor,
            listed,
            properties,
            navigations,
            key: self.key,
        }
    }
}

/// Source built from annotated classes
#[derive(Debug, Clone)]
pub struct AnnotatedClassSource {
    name: String,
    namespace: String,
    table: CandidateTable,
    containers: Vec<ContainerDescriptor>,
    function_imports: Vec<FunctionImportDescriptor>,
}

impl AnnotatedClassSource {
    pub fn new(namespace: impl Into<String>) -> Self {
        let namespace = namespace.into();
        Self {
            name: format!("annotated:{}", namespace),
            namespace,
            table: CandidateTable::default(),
            containers: Vec::new(),
            function_imports: Vec::new(),
        }
    }

    /// Register a type implementing `EdmAnnotated`
    pub fn register<T: EdmAnnotated>(self) -> Self {
        self.with_class(T::edm_class())
    }

    pub fn with_class(mut self, class: AnnotatedClass) -> Self {
        self.table.push(class.into_entry(&self.namespace, true));
        self
    }

    /// Class that is not listed but can be built on demand by name
    pub fn with_on_demand_class(mut self, class: AnnotatedClass) -> Self {
        self.table.push(class.into_entry(&self.namespace, false));
        self
    }

    pub fn with_container(mut self, container: ContainerDescriptor) -> Self {
        self.containers.push(container);
        self
    }

    /// Function import on the synthesized default container
    pub fn with_function_import(mut self, function_import: FunctionImportDescriptor) -> Self {
        self.function_imports.push(function_import);
        self
    }
}

impl MetadataSource for AnnotatedClassSource {
    fn source_name(&self) -> &str {
        &self.name
    }

    fn default_namespace(&self) -> &str {
        &self.namespace
    }

    fn list_candidates(&self) -> Vec<TypeDescriptor> {
        self.table.listed()
    }

    fn find_candidate(&self, name: &FullQualifiedName, kind: CandidateKind) -> Option<TypeDescriptor> {
        self.table.find(name, kind)
    }

    fn describe_properties(&self, descriptor: &TypeDescriptor) -> Result<Vec<PropertyDescriptor>, BuildError> {
        Ok(self.table.entry(descriptor)?.properties.clone())
    }

    fn describe_navigations(&self, descriptor: &TypeDescriptor) -> Result<Vec<NavigationDescriptor>, BuildError> {
        Ok(self.table.entry(descriptor)?.navigations.clone())
    }

    fn describe_key(&self, descriptor: &TypeDescriptor) -> Result<KeyDescriptor, BuildError> {
        Ok(self.table.entry(descriptor)?.key.clone())
    }

    fn containers(&self) -> Vec<ContainerDescriptor> {
        self.containers.clone()
    }

    fn function_imports(&self) -> Vec<FunctionImportDescriptor> {
        self.function_imports.clone()
    }
}
