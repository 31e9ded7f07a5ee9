//! View/Builder protocol
//!
//! A `View` pairs one schema element key with its source input, its build
//! state and its `Builder`. Views move through
//! `Unbuilt -> Building -> Consistent`; `clean` returns them to `Unbuilt`.
//! Builders dispatch on the element kind and pull sibling elements through
//! the `BuildContext`, which is also where re-entrant construction is caught.

mod association;
mod complex_type;
mod container;
pub mod context;
mod entity_type;

pub use context::BuildContext;

use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::association::AssociationFragment;
use crate::config::BuildConfig;
use crate::error::BuildError;
use crate::models::name::{validate_identifier, validate_namespace};
use crate::models::{Facets, FullQualifiedName, Property, PropertyMapping};
use crate::registry::{ElementKind, Registry, SchemaElement};
use crate::resolver::{self, ResolvedType};
use crate::source::{AttributeKind, ContainerDescriptor, PropertyDescriptor, TypeDescriptor};

/// Build state of a view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildState {
    Unbuilt,
    /// Transient, only while the view's builder runs
    Building,
    Consistent,
}

/// Source input a view is built from
#[derive(Debug, Clone, PartialEq)]
pub enum ViewSource {
    /// Entity or complex type candidate
    Type(TypeDescriptor),
    /// Fragments of one association, in arrival order
    Fragments(Vec<AssociationFragment>),
    Container(ContainerDescriptor),
}

/// Construction logic for one view
///
/// A builder's identity derives from its view's key, so every call to
/// `View::get_builder` yields an equal builder.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Builder {
    id: Uuid,
    kind: ElementKind,
}

impl Builder {
    pub fn new(kind: ElementKind, name: &FullQualifiedName) -> Self {
        let key = format!("{:?}:{}", kind, name);
        Self {
            id: Uuid::new_v5(&Uuid::NAMESPACE_OID, key.as_bytes()),
            kind,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn kind(&self) -> ElementKind {
        self.kind
    }

    /// Construct the element for `name` from `source`
    pub(crate) fn build(
        &self,
        ctx: &mut BuildContext<'_>,
        name: &FullQualifiedName,
        source: &ViewSource,
    ) -> Result<SchemaElement, BuildError> {
        match (self.kind, source) {
            (ElementKind::EntityType, ViewSource::Type(descriptor)) => {
                let (entity_type, fragments) = entity_type::build_entity_type(ctx, descriptor)?;
                ctx.commit_fragments(name, fragments);
                Ok(SchemaElement::EntityType(Arc::new(entity_type)))
            }
            (ElementKind::ComplexType, ViewSource::Type(descriptor)) => {
                let complex_type = complex_type::build_complex_type(ctx, descriptor)?;
                Ok(SchemaElement::ComplexType(Arc::new(complex_type)))
            }
            (ElementKind::Association, ViewSource::Fragments(fragments)) => {
                let association = association::build_association(ctx, fragments)?;
                Ok(SchemaElement::Association(Arc::new(association)))
            }
            (ElementKind::EntityContainer, ViewSource::Container(descriptor)) => {
                let container = container::build_container(ctx, descriptor)?;
                Ok(SchemaElement::EntityContainer(Arc::new(container)))
            }
            (kind, _) => Err(BuildError::model(
                name,
                format!("view source does not describe a {:?}", kind),
            )),
        }
    }
}

/// One schema element under construction
#[derive(Debug, Clone)]
pub struct View {
    kind: ElementKind,
    name: FullQualifiedName,
    source: ViewSource,
    state: BuildState,
    built: Option<SchemaElement>,
    builder: Builder,
}

impl View {
    pub fn new(kind: ElementKind, name: FullQualifiedName, source: ViewSource) -> Self {
        let builder = Builder::new(kind, &name);
        Self {
            kind,
            name,
            source,
            state: BuildState::Unbuilt,
            built: None,
            builder,
        }
    }

    /// View for an entity or complex type candidate
    pub fn for_candidate(descriptor: TypeDescriptor) -> Self {
        let kind = match descriptor.kind {
            crate::source::CandidateKind::Entity => ElementKind::EntityType,
            crate::source::CandidateKind::Complex => ElementKind::ComplexType,
        };
        Self::new(kind, descriptor.name.clone(), ViewSource::Type(descriptor))
    }

    pub fn kind(&self) -> ElementKind {
        self.kind
    }

    pub fn name(&self) -> &FullQualifiedName {
        &self.name
    }

    pub fn source(&self) -> &ViewSource {
        &self.source
    }

    pub fn state(&self) -> BuildState {
        self.state
    }

    pub fn get_builder(&self) -> &Builder {
        &self.builder
    }

    pub fn is_consistent(&self) -> bool {
        self.state == BuildState::Consistent
    }

    /// The built element, once consistent
    pub fn built(&self) -> Option<&SchemaElement> {
        self.built.as_ref()
    }

    /// Discard the built element and evict it from `registry`
    ///
    /// Sibling elements stay cached.
    pub fn clean(&mut self, registry: &Registry) {
        if let Some(built) = self.built.take() {
            let ours = registry
                .resolve(self.kind, &self.name)
                .is_some_and(|cached| cached.ptr_eq(&built));
            if ours {
                registry.evict(self.kind, &self.name);
            }
        }
        debug!("Cleaned {:?} view '{}'", self.kind, self.name);
        self.state = BuildState::Unbuilt;
    }

    pub(crate) fn begin(&mut self) {
        self.state = BuildState::Building;
    }

    pub(crate) fn complete(&mut self, element: SchemaElement) {
        self.built = Some(element);
        self.state = BuildState::Consistent;
    }

    pub(crate) fn abort(&mut self) {
        self.state = BuildState::Unbuilt;
    }
}

fn check_names(config: &BuildConfig, name: &FullQualifiedName) -> Result<(), BuildError> {
    if !config.validate_names {
        return Ok(());
    }
    validate_namespace(name.namespace())
        .and_then(|_| validate_identifier(name.name()))
        .map_err(|reason| BuildError::model(name, reason))
}

fn check_member_name(config: &BuildConfig, owner: &FullQualifiedName, member: &str) -> Result<(), BuildError> {
    if !config.validate_names {
        return Ok(());
    }
    validate_identifier(member).map_err(|reason| BuildError::model(format!("{}.{}", owner, member), reason))
}

/// Simple or complex property from its descriptor
fn build_property(
    ctx: &mut BuildContext<'_>,
    owner: &FullQualifiedName,
    descriptor: &PropertyDescriptor,
) -> Result<Property, BuildError> {
    let element = format!("{}.{}", owner, descriptor.name);
    check_member_name(ctx.config(), owner, &descriptor.name)?;
    if descriptor.kind.is_navigation() {
        return Err(BuildError::model(
            &element,
            format!("{:?} member described as a property", descriptor.kind),
        ));
    }

    let property = match resolver::resolve_member(ctx, &descriptor.raw_type, &element)? {
        ResolvedType::Simple(simple_type) => {
            if matches!(descriptor.kind, AttributeKind::Embedded | AttributeKind::EmbeddedId) {
                return Err(BuildError::model(
                    &element,
                    format!("embedded member has simple type {}", simple_type),
                ));
            }
            descriptor
                .facets
                .validate_for(simple_type)
                .map_err(|reason| BuildError::model(&element, reason))?;
            Property::simple(descriptor.name.clone(), simple_type)
                .with_facets(descriptor.facets.clone())
                .with_concurrency_token(descriptor.concurrency_token)
        }
        ResolvedType::Complex(complex_type) => {
            if descriptor.concurrency_token {
                return Err(BuildError::model(
                    &element,
                    "a complex property cannot be a concurrency token",
                ));
            }
            let facets = Facets {
                nullable: descriptor.facets.nullable,
                ..Facets::default()
            };
            Property::complex(descriptor.name.clone(), complex_type.name.clone()).with_facets(facets)
        }
        ResolvedType::Entity(entity_type) => {
            return Err(BuildError::model(
                &element,
                format!(
                    "property refers to entity type {}; declare it as a navigation",
                    entity_type.name
                ),
            ));
        }
    };

    Ok(match &descriptor.column {
        Some(column) => property.with_mapping(PropertyMapping {
            column_name: column.clone(),
            source_path: descriptor.name.clone(),
        }),
        None => property,
    })
}

fn check_unique<'n>(
    owner: &FullQualifiedName,
    names: impl IntoIterator<Item = &'n str>,
) -> Result<(), BuildError> {
    let mut seen = std::collections::HashSet::new();
    for name in names {
        if !seen.insert(name) {
            return Err(BuildError::model(
                owner,
                format!("member '{}' is declared more than once", name),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EdmSimpleType, Multiplicity};
    use crate::source::{AnnotatedClass, AnnotatedClassSource, MetadataSource};

    fn fqn(name: &str) -> FullQualifiedName {
        FullQualifiedName::new("Acme", name)
    }

    fn source() -> AnnotatedClassSource {
        AnnotatedClassSource::new("Acme")
            .with_class(
                AnnotatedClass::entity("Room")
                    .key("id", EdmSimpleType::Int32)
                    .embedded("address", "Address")
                    .navigation("building", "Building", Multiplicity::One),
            )
            .with_class(AnnotatedClass::entity("Building").key("id", EdmSimpleType::Int32))
            .with_class(AnnotatedClass::complex("Address").property("city", EdmSimpleType::String))
            .with_class(AnnotatedClass::complex("Loop").embedded("inner", "Inner"))
            .with_class(AnnotatedClass::complex("Inner").embedded("outer", "Loop"))
            .with_class(AnnotatedClass::entity("Chicken").key("id", EdmSimpleType::Int32).base_type("Egg"))
            .with_class(AnnotatedClass::entity("Egg").key("id", EdmSimpleType::Int32).base_type("Chicken"))
    }

    #[test]
    fn test_builder_identity_follows_view_key() {
        let source = source();
        let room = source
            .list_candidates()
            .into_iter()
            .find(|c| c.name == fqn("Room"))
            .unwrap();
        let first = View::for_candidate(room.clone());
        let second = View::for_candidate(room);
        assert_eq!(first.get_builder(), second.get_builder());
        assert_eq!(first.get_builder().id(), second.get_builder().id());

        let other = Builder::new(ElementKind::ComplexType, &fqn("Room"));
        assert_ne!(first.get_builder(), &other);
    }

    #[test]
    fn test_view_states_and_clean() {
        let source = source();
        let registry = Registry::new();
        let config = BuildConfig::default();
        let mut ctx = BuildContext::new(&source, &registry, &config);

        let room = ctx.build_entity_type(&fqn("Room")).unwrap();
        let view = ctx.view(ElementKind::EntityType, &fqn("Room")).unwrap();
        assert!(view.is_consistent());
        assert_eq!(view.state(), BuildState::Consistent);

        // a second build returns the same instance
        let again = ctx.build_entity_type(&fqn("Room")).unwrap();
        assert!(Arc::ptr_eq(&room, &again));
        assert!(ctx.view(ElementKind::EntityType, &fqn("Room")).unwrap().is_consistent());

        // embedded complex types are built as a side effect; the navigation target is not
        assert!(registry.contains(ElementKind::ComplexType, &fqn("Address")));
        assert!(!registry.contains(ElementKind::EntityType, &fqn("Building")));
        assert_eq!(ctx.fragments().len(), 1);
        assert_eq!(ctx.fragments()[0].name, fqn("BuildingRooms"));

        assert!(ctx.clean_view(ElementKind::EntityType, &fqn("Room")));
        assert_eq!(
            ctx.view(ElementKind::EntityType, &fqn("Room")).unwrap().state(),
            BuildState::Unbuilt
        );
        assert!(!registry.contains(ElementKind::EntityType, &fqn("Room")));
        assert!(registry.contains(ElementKind::ComplexType, &fqn("Address")));

        let rebuilt = ctx.build_entity_type(&fqn("Room")).unwrap();
        assert!(!Arc::ptr_eq(&room, &rebuilt));
        assert_eq!(*room, *rebuilt);
    }

    #[test]
    fn test_cached_element_is_adopted() {
        let source = source();
        let registry = Registry::new();
        let config = BuildConfig::default();

        let first = BuildContext::new(&source, &registry, &config)
            .build_entity_type(&fqn("Building"))
            .unwrap();
        let mut ctx = BuildContext::new(&source, &registry, &config);
        let second = ctx.build_entity_type(&fqn("Building")).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(ctx.view(ElementKind::EntityType, &fqn("Building")).unwrap().is_consistent());
    }

    #[test]
    fn test_cyclic_builds_are_rejected() {
        let source = source();
        let registry = Registry::new();
        let config = BuildConfig::default();
        let mut ctx = BuildContext::new(&source, &registry, &config);

        let err = ctx.build_complex_type(&fqn("Loop")).unwrap_err();
        assert_eq!(
            err,
            BuildError::CyclicComplexType {
                complex_type: fqn("Loop"),
                path: vec![fqn("Loop"), fqn("Inner"), fqn("Loop")],
            }
        );
        assert_eq!(
            ctx.view(ElementKind::ComplexType, &fqn("Loop")).unwrap().state(),
            BuildState::Unbuilt
        );

        let err = ctx.build_entity_type(&fqn("Chicken")).unwrap_err();
        assert!(matches!(err, BuildError::CyclicBuildError { kind: ElementKind::EntityType, .. }));
        assert!(registry.is_empty());
    }
}
