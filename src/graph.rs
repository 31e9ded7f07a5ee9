//! Build driver and the published schema graph
//!
//! `EdmBuilder` runs one build session over a metadata source:
//! 1. every listed candidate is built (recoverable errors are aggregated or skipped)
//! 2. association fragments are grouped and merged
//! 3. containers are assembled, with a default container synthesized when none is declared
//! 4. elements are grouped into one `Schema` per namespace
//! 5. the graph is validated
//!
//! The resulting `SchemaGraph` is immutable apart from on-demand construction
//! of types the source can describe but never listed.

use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::association::{check_compatible, group_fragments, merge_fragments};
use crate::config::BuildConfig;
use crate::error::{BuildError, BuildReport};
use crate::expand::{ComplexTypeProvider, Expander};
use crate::models::{
    Association, ComplexType, EntityContainer, EntityType, FullQualifiedName, Key, Property,
    PropertyType, Schema,
};
use crate::naming;
use crate::registry::{ElementKind, Registry, SchemaElement};
use crate::source::{CandidateKind, ContainerDescriptor, MetadataSource, TypeDescriptor};
use crate::validation::{self, GraphValidationResult};
use crate::view::BuildContext;

fn element_kind(kind: CandidateKind) -> ElementKind {
    match kind {
        CandidateKind::Entity => ElementKind::EntityType,
        CandidateKind::Complex => ElementKind::ComplexType,
    }
}

/// Driver for one build session
pub struct EdmBuilder {
    source: Arc<dyn MetadataSource>,
    config: BuildConfig,
}

impl EdmBuilder {
    pub fn new(source: impl MetadataSource + 'static) -> Self {
        Self::from_arc(Arc::new(source))
    }

    pub fn from_arc(source: Arc<dyn MetadataSource>) -> Self {
        Self {
            source,
            config: BuildConfig::default(),
        }
    }

    pub fn with_config(mut self, config: BuildConfig) -> Self {
        self.config = config;
        self
    }

    /// Run the session
    ///
    /// Fatal errors abort immediately. Recoverable errors from the candidate
    /// walk are collected; without `skip_invalid_types` they fail the build
    /// together as `BuildError::Aggregate`.
    pub fn build(self) -> Result<SchemaGraph, BuildError> {
        let Self { source, config } = self;
        let registry = Registry::new();
        let mut report = BuildReport::new(source.source_name());

        let default_container = {
            let mut ctx = BuildContext::new(source.as_ref(), &registry, &config);
            report.skipped = build_candidates(&mut ctx)?;
            build_associations(&mut ctx)?;
            build_containers(&mut ctx)?
        };

        let schemas = assemble_schemas(&registry);
        report.entity_types = registry.entity_types().len();
        report.complex_types = registry.complex_types().len();
        report.associations = registry.associations().len();
        report.entity_containers = registry.elements_of(ElementKind::EntityContainer).len();

        validation::validate_graph(&registry, &config).into_result()?;

        info!(
            "Built EDM from '{}': {} entity types, {} complex types, {} associations, {} containers ({} skipped)",
            report.source,
            report.entity_types,
            report.complex_types,
            report.associations,
            report.entity_containers,
            report.skipped.len()
        );

        Ok(SchemaGraph {
            source,
            config,
            registry,
            schemas,
            default_container,
            report,
        })
    }
}

/// Build every listed candidate, returning the skipped types' errors
fn build_candidates(ctx: &mut BuildContext<'_>) -> Result<Vec<BuildError>, BuildError> {
    let candidates = ctx.source().list_candidates();
    info!(
        "Walking {} candidates from '{}'",
        candidates.len(),
        ctx.source().source_name()
    );
    for candidate in &candidates {
        ctx.add_candidate(candidate.clone());
    }

    let mut errors: Vec<BuildError> = Vec::new();
    for candidate in &candidates {
        let kind = element_kind(candidate.kind);
        match ctx.build_view(kind, &candidate.name) {
            Ok(_) => {}
            Err(err) if err.is_recoverable() => {
                if !errors.contains(&err) {
                    warn!("Skipping {:?} '{}': {}", kind, candidate.name, err);
                    errors.push(err);
                }
            }
            Err(err) => return Err(err),
        }
    }

    if !errors.is_empty() && !ctx.config().skip_invalid_types {
        return Err(BuildError::Aggregate(errors));
    }
    Ok(errors)
}

fn build_associations(ctx: &mut BuildContext<'_>) -> Result<(), BuildError> {
    let groups = group_fragments(ctx.take_fragments());
    info!("Merging {} associations", groups.len());
    for (name, fragments) in groups {
        ctx.add_association(name.clone(), fragments);
        ctx.build_view(ElementKind::Association, &name)?;
    }
    Ok(())
}

/// Build declared containers (plus the synthesized default); returns the default
fn build_containers(ctx: &mut BuildContext<'_>) -> Result<Arc<EntityContainer>, BuildError> {
    let source = ctx.source();
    let mut containers = source.containers();
    if !containers.iter().any(|c| c.is_default) {
        let namespace = source.default_namespace();
        let mut descriptor = ContainerDescriptor::new(
            naming::default_container_name(namespace, ctx.config()),
            namespace,
        );
        descriptor.is_default = true;
        descriptor.expose_all_entity_types = true;
        descriptor.function_imports = source.function_imports();
        containers.insert(0, descriptor);
    }

    let keys: Vec<FullQualifiedName> = containers
        .iter()
        .map(|c| FullQualifiedName::new(c.namespace.clone(), c.name.clone()))
        .collect();
    let default_key = containers
        .iter()
        .zip(&keys)
        .find(|(c, _)| c.is_default)
        .map(|(_, key)| key.clone());
    let defaults = containers.iter().filter(|c| c.is_default).count();
    if let Some(key) = &default_key
        && defaults > 1
    {
        warn!("{} containers are marked default; using '{}'", defaults, key);
    }

    for container in containers {
        ctx.add_container(container);
    }
    let mut default_container = None;
    for key in &keys {
        let container = ctx.build_container(key)?;
        if default_key.as_ref() == Some(key) {
            default_container = Some(container);
        }
    }
    default_container.ok_or_else(|| BuildError::model("<containers>", "no default entity container"))
}

fn assemble_schemas(registry: &Registry) -> BTreeMap<String, Schema> {
    let mut schemas: BTreeMap<String, Schema> = BTreeMap::new();
    fn schema<'s>(schemas: &'s mut BTreeMap<String, Schema>, namespace: &str) -> &'s mut Schema {
        schemas
            .entry(namespace.to_string())
            .or_insert_with(|| Schema::new(namespace))
    }

    for entity_type in registry.entity_types() {
        schema(&mut schemas, entity_type.name.namespace()).entity_types.push(entity_type);
    }
    for complex_type in registry.complex_types() {
        schema(&mut schemas, complex_type.name.namespace()).complex_types.push(complex_type);
    }
    for association in registry.associations() {
        schema(&mut schemas, association.name.namespace()).associations.push(association);
    }
    for element in registry.elements_of(ElementKind::EntityContainer) {
        if let SchemaElement::EntityContainer(container) = element {
            let namespace = container.namespace.clone();
            schema(&mut schemas, &namespace).entity_containers.push(container);
        }
    }
    schemas
}

/// Published, read-only schema graph
///
/// Lookups are safe from any number of threads. A lookup of a type the
/// source can describe but never listed builds it once under the registry's
/// build lock.
pub struct SchemaGraph {
    source: Arc<dyn MetadataSource>,
    config: BuildConfig,
    registry: Registry,
    schemas: BTreeMap<String, Schema>,
    default_container: Arc<EntityContainer>,
    report: BuildReport,
}

impl std::fmt::Debug for SchemaGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaGraph")
            .field("source", &self.source.source_name())
            .field("schemas", &self.schemas.keys().collect::<Vec<_>>())
            .field("default_container", &self.default_container.name)
            .finish()
    }
}

impl SchemaGraph {
    /// Schema assembled for `namespace` at publication
    pub fn schema(&self, namespace: &str) -> Option<&Schema> {
        self.schemas.get(namespace)
    }

    /// Schemas in namespace order
    pub fn schemas(&self) -> impl Iterator<Item = &Schema> {
        self.schemas.values()
    }

    fn qualify(&self, name: &str) -> FullQualifiedName {
        FullQualifiedName::parse_in(name, self.source.default_namespace())
    }

    /// Entity type by qualified (or default-namespace) name, built on demand
    pub fn entity_type(&self, name: &str) -> Result<Option<Arc<EntityType>>, BuildError> {
        let name = self.qualify(name);
        Ok(self
            .resolve_lazily(ElementKind::EntityType, &name)?
            .and_then(|e| e.as_entity_type().cloned()))
    }

    /// Complex type by qualified (or default-namespace) name, built on demand
    pub fn complex_type(&self, name: &str) -> Result<Option<Arc<ComplexType>>, BuildError> {
        let name = self.qualify(name);
        Ok(self
            .resolve_lazily(ElementKind::ComplexType, &name)?
            .and_then(|e| e.as_complex_type().cloned()))
    }

    pub fn association(&self, name: &str) -> Option<Arc<Association>> {
        self.registry.association(&self.qualify(name))
    }

    pub fn default_entity_container(&self) -> &Arc<EntityContainer> {
        &self.default_container
    }

    /// Container by qualified name, or by bare name in any namespace
    pub fn entity_container(&self, name: &str) -> Option<Arc<EntityContainer>> {
        if let Some(container) = self.registry.entity_container(&self.qualify(name)) {
            return Some(container);
        }
        self.schemas
            .values()
            .find_map(|s| s.get_entity_container(name).cloned())
    }

    /// Key of `entity_type`, inherited from the nearest base type declaring one
    pub fn effective_key(&self, entity_type: &EntityType) -> Result<Option<Key>, BuildError> {
        self.registry
            .effective_key(entity_type, self.config.max_inheritance_depth)
    }

    /// Path-qualified leaves (`address_geo_lat`) of a complex property
    pub fn flatten_complex_property(&self, entity_type: &str, property: &str) -> Result<Vec<Property>, BuildError> {
        let name = self.qualify(entity_type);
        let entity = self
            .entity_type(entity_type)?
            .ok_or_else(|| BuildError::UnresolvableType(name.clone()))?;
        let chain = self
            .registry
            .entity_type_chain(&entity.name, self.config.max_inheritance_depth)?;
        let member = chain
            .iter()
            .find_map(|t| t.property(property))
            .ok_or_else(|| BuildError::model(&name, format!("no property '{}'", property)))?;
        let PropertyType::Complex(complex_name) = &member.property_type else {
            return Err(BuildError::model(
                format!("{}.{}", name, property),
                "not a complex property",
            ));
        };
        let complex = self
            .registry
            .complex_type(complex_name)
            .ok_or_else(|| BuildError::UnresolvableType(complex_name.clone()))?;

        let mut leaves = Vec::new();
        Expander::new(&self.registry)
            .with_max_nesting(self.config.max_complex_nesting)
            .flatten(&complex, &mut leaves, &member.name)?;
        Ok(leaves)
    }

    /// Re-run the consistency checks over everything registered so far
    pub fn validate(&self) -> GraphValidationResult {
        validation::validate_graph(&self.registry, &self.config)
    }

    pub fn report(&self) -> &BuildReport {
        &self.report
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    /// Build one candidate plus the associations its navigations introduce
    ///
    /// Fragments of already registered associations are all checked before
    /// any new association is registered. The caller rolls the registry back
    /// when this fails.
    fn build_on_demand(
        &self,
        kind: ElementKind,
        name: &FullQualifiedName,
        descriptor: TypeDescriptor,
    ) -> Result<SchemaElement, BuildError> {
        let mut ctx = BuildContext::new(self.source.as_ref(), &self.registry, &self.config);
        ctx.add_candidate(descriptor);
        let element = ctx.build_view(kind, name)?;

        let mut new_groups = Vec::new();
        for (association_name, fragments) in group_fragments(ctx.take_fragments()) {
            match self.registry.association(&association_name) {
                Some(existing) => {
                    for fragment in &fragments {
                        check_compatible(&existing, fragment)?;
                    }
                }
                None => {
                    merge_fragments(&fragments)?;
                    new_groups.push((association_name, fragments));
                }
            }
        }
        for (association_name, fragments) in new_groups {
            ctx.add_association(association_name.clone(), fragments);
            ctx.build_view(ElementKind::Association, &association_name)?;
        }
        Ok(element)
    }

    /// Cached element, or build the source's candidate under the build lock
    fn resolve_lazily(&self, kind: ElementKind, name: &FullQualifiedName) -> Result<Option<SchemaElement>, BuildError> {
        if let Some(element) = self.registry.resolve(kind, name) {
            return Ok(Some(element));
        }
        let candidate_kind = match kind {
            ElementKind::EntityType => CandidateKind::Entity,
            ElementKind::ComplexType => CandidateKind::Complex,
            ElementKind::Association | ElementKind::EntityContainer => return Ok(None),
        };

        let _guard = self.registry.lock_build();
        if let Some(element) = self.registry.resolve(kind, name) {
            debug!("{:?} '{}' was built while waiting for the build lock", kind, name);
            return Ok(Some(element));
        }
        let Some(descriptor) = self.source.find_candidate(name, candidate_kind) else {
            return Ok(None);
        };

        let mark = self.registry.mark();
        let built = self.build_on_demand(kind, name, descriptor);
        let element = match built {
            Ok(element) => element,
            Err(err) => {
                let evicted = self.registry.rollback(mark);
                warn!(
                    "On-demand build of {:?} '{}' failed, rolled back {} elements: {}",
                    kind,
                    name,
                    evicted.len(),
                    err
                );
                return Err(err);
            }
        };

        info!("Built {:?} '{}' on demand", kind, name);
        Ok(Some(element))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EdmSimpleType, Multiplicity};
    use crate::source::{AnnotatedClass, AnnotatedClassSource};

    fn source() -> AnnotatedClassSource {
        AnnotatedClassSource::new("Acme")
            .with_class(
                AnnotatedClass::entity("Building")
                    .key("id", EdmSimpleType::Int32)
                    .property("name", EdmSimpleType::String),
            )
            .with_class(
                AnnotatedClass::entity("Room")
                    .key("id", EdmSimpleType::Int32)
                    .embedded("address", "Address")
                    .navigation("building", "Building", Multiplicity::One),
            )
            .with_class(
                AnnotatedClass::complex("Address")
                    .property("street", EdmSimpleType::String)
                    .embedded("geo", "Geo"),
            )
            .with_class(
                AnnotatedClass::complex("Geo")
                    .property("lat", EdmSimpleType::Double)
                    .property("lon", EdmSimpleType::Double),
            )
    }

    #[test]
    fn test_build_publishes_schema_and_default_container() {
        let graph = EdmBuilder::new(source()).build().unwrap();
        let schema = graph.schema("Acme").unwrap();
        assert_eq!(schema.entity_types.len(), 2);
        assert_eq!(schema.complex_types.len(), 2);
        assert_eq!(schema.associations.len(), 1);

        let container = graph.default_entity_container();
        assert_eq!(container.name, "AcmeContainer");
        assert!(container.is_default);
        assert!(container.get_entity_set("Rooms").is_some());
        assert!(container.get_entity_set("Buildings").is_some());
        assert_eq!(container.association_sets().len(), 1);

        assert_eq!(graph.report().entity_types, 2);
        assert_eq!(graph.report().entity_containers, 1);
        assert!(graph.validate().is_valid());
    }

    #[test]
    fn test_lookups_by_bare_and_qualified_name() {
        let graph = EdmBuilder::new(source()).build().unwrap();
        let bare = graph.entity_type("Room").unwrap().unwrap();
        let qualified = graph.entity_type("Acme.Room").unwrap().unwrap();
        assert!(Arc::ptr_eq(&bare, &qualified));
        assert!(graph.entity_type("Ghost").unwrap().is_none());
        assert!(graph.complex_type("Geo").unwrap().is_some());
        assert!(graph.association("BuildingRooms").is_some());
        assert!(graph.entity_container("AcmeContainer").is_some());
    }

    #[test]
    fn test_flatten_complex_property() {
        let graph = EdmBuilder::new(source()).build().unwrap();
        let leaves = graph.flatten_complex_property("Room", "address").unwrap();
        let names: Vec<_> = leaves.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["address_street", "address_geo_lat", "address_geo_lon"]);

        assert!(graph.flatten_complex_property("Room", "id").is_err());
        assert!(graph.flatten_complex_property("Room", "missing").is_err());
    }

    #[test]
    fn test_effective_key_is_inherited() {
        let source = source().with_class(
            AnnotatedClass::entity("ConferenceRoom")
                .base_type("Room")
                .property("seats", EdmSimpleType::Int32),
        );
        let graph = EdmBuilder::new(source).build().unwrap();
        let conference = graph.entity_type("ConferenceRoom").unwrap().unwrap();
        assert!(conference.key.is_empty());
        let key = graph.effective_key(&conference).unwrap().unwrap();
        assert_eq!(key.property_refs, vec!["id".to_string()]);

        // subtypes share their root's entity set
        let container = graph.default_entity_container();
        assert!(container.get_entity_set("ConferenceRooms").is_none());
    }

    #[test]
    fn test_graph_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SchemaGraph>();
    }
}
