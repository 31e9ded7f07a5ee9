//! Build context shared by all views of one build session

use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use super::{BuildState, View, ViewSource};
use crate::association::AssociationFragment;
use crate::config::BuildConfig;
use crate::error::BuildError;
use crate::models::{ComplexType, EntityContainer, EntityType, FullQualifiedName};
use crate::registry::{ElementKind, Registry, SchemaElement};
use crate::source::{CandidateKind, ContainerDescriptor, MetadataSource, TypeDescriptor};

type ViewKey = (ElementKind, FullQualifiedName);

/// Views, fragments and collaborators of one build session
///
/// The context is single-threaded; concurrent on-demand builds are
/// serialized by the registry's build lock before a context is created.
pub struct BuildContext<'a> {
    source: &'a dyn MetadataSource,
    registry: &'a Registry,
    config: &'a BuildConfig,
    views: HashMap<ViewKey, View>,
    /// Views currently in `Building`, outermost first
    building: Vec<ViewKey>,
    fragments: Vec<AssociationFragment>,
}

impl<'a> BuildContext<'a> {
    pub fn new(source: &'a dyn MetadataSource, registry: &'a Registry, config: &'a BuildConfig) -> Self {
        Self {
            source,
            registry,
            config,
            views: HashMap::new(),
            building: Vec::new(),
            fragments: Vec::new(),
        }
    }

    pub fn source(&self) -> &'a dyn MetadataSource {
        self.source
    }

    pub fn registry(&self) -> &'a Registry {
        self.registry
    }

    pub fn config(&self) -> &'a BuildConfig {
        self.config
    }

    /// Add a view unless one already exists for its key
    pub fn add_view(&mut self, view: View) {
        let key = (view.kind(), view.name().clone());
        self.views.entry(key).or_insert(view);
    }

    pub fn add_candidate(&mut self, descriptor: TypeDescriptor) {
        self.add_view(View::for_candidate(descriptor));
    }

    /// Add a container view keyed by `<namespace>.<name>`
    pub fn add_container(&mut self, descriptor: ContainerDescriptor) {
        let name = FullQualifiedName::new(descriptor.namespace.clone(), descriptor.name.clone());
        self.add_view(View::new(
            ElementKind::EntityContainer,
            name,
            ViewSource::Container(descriptor),
        ));
    }

    /// Add the association view for one group of fragments
    pub fn add_association(&mut self, name: FullQualifiedName, fragments: Vec<AssociationFragment>) {
        self.add_view(View::new(
            ElementKind::Association,
            name,
            ViewSource::Fragments(fragments),
        ));
    }

    pub fn view(&self, kind: ElementKind, name: &FullQualifiedName) -> Option<&View> {
        self.views.get(&(kind, name.clone()))
    }

    /// Type candidate by kind and name, from known views or the source
    pub fn candidate(&self, kind: ElementKind, name: &FullQualifiedName) -> Option<TypeDescriptor> {
        if let Some(View {
            source: ViewSource::Type(descriptor),
            ..
        }) = self.view(kind, name)
        {
            return Some(descriptor.clone());
        }
        let candidate_kind = match kind {
            ElementKind::EntityType => CandidateKind::Entity,
            ElementKind::ComplexType => CandidateKind::Complex,
            ElementKind::Association | ElementKind::EntityContainer => return None,
        };
        self.source.find_candidate(name, candidate_kind)
    }

    /// Whether `name` is built, viewed or describable as `kind`
    pub fn is_known(&self, kind: ElementKind, name: &FullQualifiedName) -> bool {
        self.registry.contains(kind, name)
            || self.views.contains_key(&(kind, name.clone()))
            || self.candidate(kind, name).is_some()
    }

    /// Explicit entity set name declared for an entity type
    pub fn entity_set_hint(&self, name: &FullQualifiedName) -> Option<String> {
        self.candidate(ElementKind::EntityType, name)
            .and_then(|descriptor| descriptor.entity_set)
    }

    /// Build the view for `kind`/`name`, at most once
    ///
    /// A consistent view returns its element; a view already in `Building`
    /// is a `CyclicBuildError`, or a `CyclicComplexType` carrying the
    /// containment path when the view is a complex type. An element already
    /// in the registry is adopted without running the builder.
    pub fn build_view(&mut self, kind: ElementKind, name: &FullQualifiedName) -> Result<SchemaElement, BuildError> {
        let key = (kind, name.clone());
        if !self.views.contains_key(&key) {
            let descriptor = self
                .candidate(kind, name)
                .ok_or_else(|| BuildError::UnresolvableType(name.clone()))?;
            self.add_candidate(descriptor);
        }
        let Some(view) = self.views.get_mut(&key) else {
            return Err(BuildError::UnresolvableType(name.clone()));
        };

        match view.state() {
            BuildState::Consistent => {
                if let Some(built) = view.built() {
                    return Ok(built.clone());
                }
            }
            BuildState::Building if kind == ElementKind::ComplexType => {
                let start = self.building.iter().position(|k| *k == key).unwrap_or(0);
                let mut path: Vec<FullQualifiedName> = self.building[start..]
                    .iter()
                    .filter(|(k, _)| *k == ElementKind::ComplexType)
                    .map(|(_, n)| n.clone())
                    .collect();
                path.push(name.clone());
                return Err(BuildError::CyclicComplexType {
                    complex_type: name.clone(),
                    path,
                });
            }
            BuildState::Building => {
                return Err(BuildError::CyclicBuildError {
                    kind,
                    element: name.to_string(),
                });
            }
            BuildState::Unbuilt => {}
        }

        if let Some(cached) = self.registry.resolve(kind, name) {
            debug!("Cache hit for {:?} '{}'", kind, name);
            view.complete(cached.clone());
            return Ok(cached);
        }

        view.begin();
        let builder = view.get_builder().clone();
        let source = view.source().clone();
        debug!("Building {:?} '{}'", kind, name);

        self.building.push(key.clone());
        let result = builder
            .build(self, name, &source)
            .and_then(|element| {
                self.registry.register(name.clone(), element.clone())?;
                Ok(element)
            });
        self.building.pop();

        if let Some(view) = self.views.get_mut(&key) {
            match &result {
                Ok(element) => view.complete(element.clone()),
                Err(_) => view.abort(),
            }
        }
        result
    }

    pub fn build_entity_type(&mut self, name: &FullQualifiedName) -> Result<Arc<EntityType>, BuildError> {
        match self.build_view(ElementKind::EntityType, name)? {
            SchemaElement::EntityType(entity_type) => Ok(entity_type),
            _ => Err(BuildError::UnresolvableType(name.clone())),
        }
    }

    pub fn build_complex_type(&mut self, name: &FullQualifiedName) -> Result<Arc<ComplexType>, BuildError> {
        match self.build_view(ElementKind::ComplexType, name)? {
            SchemaElement::ComplexType(complex_type) => Ok(complex_type),
            _ => Err(BuildError::UnresolvableType(name.clone())),
        }
    }

    pub fn build_container(&mut self, name: &FullQualifiedName) -> Result<Arc<EntityContainer>, BuildError> {
        match self.build_view(ElementKind::EntityContainer, name)? {
            SchemaElement::EntityContainer(container) => Ok(container),
            _ => Err(BuildError::model(name, "not an entity container")),
        }
    }

    /// Reset one view and evict its element; returns whether the view exists
    pub fn clean_view(&mut self, kind: ElementKind, name: &FullQualifiedName) -> bool {
        let registry = self.registry;
        match self.views.get_mut(&(kind, name.clone())) {
            Some(view) => {
                view.clean(registry);
                true
            }
            None => false,
        }
    }

    /// Walk the declared base-type chain of a type candidate
    ///
    /// A chain longer than `max_inheritance_depth`, or one that returns to
    /// `name`, is a `CyclicBuildError`.
    pub fn check_type_chain(&self, kind: ElementKind, name: &FullQualifiedName) -> Result<(), BuildError> {
        let cyclic = || BuildError::CyclicBuildError {
            kind,
            element: name.to_string(),
        };
        let mut next = self.candidate(kind, name).and_then(|d| d.base_type);
        let mut depth = 0;
        while let Some(base) = next {
            depth += 1;
            if base == *name || depth > self.config.max_inheritance_depth {
                return Err(cyclic());
            }
            next = self.candidate(kind, &base).and_then(|d| d.base_type);
        }
        Ok(())
    }

    /// Walk the `extends` chain of a container view
    pub fn check_container_chain(&self, name: &FullQualifiedName) -> Result<(), BuildError> {
        let extends_of = |key: &FullQualifiedName| match self.view(ElementKind::EntityContainer, key) {
            Some(View {
                source: ViewSource::Container(descriptor),
                ..
            }) => descriptor
                .extends
                .as_deref()
                .map(|extends| container_key(extends, &descriptor.namespace)),
            _ => None,
        };
        let mut next = extends_of(name);
        let mut depth = 0;
        while let Some(parent) = next {
            depth += 1;
            if parent == *name || depth > self.config.max_inheritance_depth {
                return Err(BuildError::CyclicBuildError {
                    kind: ElementKind::EntityContainer,
                    element: name.to_string(),
                });
            }
            next = extends_of(&parent);
        }
        Ok(())
    }

    /// Replace the fragments emitted by `declaring`
    pub(crate) fn commit_fragments(&mut self, declaring: &FullQualifiedName, fragments: Vec<AssociationFragment>) {
        self.fragments.retain(|f| f.source.entity_type != *declaring);
        self.fragments.extend(fragments);
    }

    /// Fragments emitted so far, in arrival order
    pub fn fragments(&self) -> &[AssociationFragment] {
        &self.fragments
    }

    pub fn take_fragments(&mut self) -> Vec<AssociationFragment> {
        std::mem::take(&mut self.fragments)
    }
}

/// Registry key of a container referenced from a container in `namespace`
pub fn container_key(reference: &str, namespace: &str) -> FullQualifiedName {
    FullQualifiedName::parse_in(reference, namespace)
}
