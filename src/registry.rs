//! Registry of built schema elements
//!
//! One registry is owned by each build session and, after publication, by the
//! `SchemaGraph`. Every "search by name" either returns the cached element or
//! constructs it exactly once.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

use crate::error::BuildError;
use crate::expand::ComplexTypeProvider;
use crate::models::{Association, ComplexType, EntityContainer, EntityType, FullQualifiedName, Key};

/// Kind of schema element, the first half of every registry key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ElementKind {
    EntityType,
    ComplexType,
    Association,
    EntityContainer,
}

/// A built, shareable schema element
#[derive(Debug, Clone)]
pub enum SchemaElement {
    EntityType(Arc<EntityType>),
    ComplexType(Arc<ComplexType>),
    Association(Arc<Association>),
    EntityContainer(Arc<EntityContainer>),
}

impl SchemaElement {
    pub fn kind(&self) -> ElementKind {
        match self {
            SchemaElement::EntityType(_) => ElementKind::EntityType,
            SchemaElement::ComplexType(_) => ElementKind::ComplexType,
            SchemaElement::Association(_) => ElementKind::Association,
            SchemaElement::EntityContainer(_) => ElementKind::EntityContainer,
        }
    }

    /// Identity comparison: both sides hold the same allocation
    pub fn ptr_eq(&self, other: &SchemaElement) -> bool {
        match (self, other) {
            (SchemaElement::EntityType(a), SchemaElement::EntityType(b)) => Arc::ptr_eq(a, b),
            (SchemaElement::ComplexType(a), SchemaElement::ComplexType(b)) => Arc::ptr_eq(a, b),
            (SchemaElement::Association(a), SchemaElement::Association(b)) => Arc::ptr_eq(a, b),
            (SchemaElement::EntityContainer(a), SchemaElement::EntityContainer(b)) => {
                Arc::ptr_eq(a, b)
            }
            _ => false,
        }
    }

    pub fn as_entity_type(&self) -> Option<&Arc<EntityType>> {
        match self {
            SchemaElement::EntityType(entity_type) => Some(entity_type),
            _ => None,
        }
    }

    pub fn as_complex_type(&self) -> Option<&Arc<ComplexType>> {
        match self {
            SchemaElement::ComplexType(complex_type) => Some(complex_type),
            _ => None,
        }
    }

    pub fn as_association(&self) -> Option<&Arc<Association>> {
        match self {
            SchemaElement::Association(association) => Some(association),
            _ => None,
        }
    }

    pub fn as_entity_container(&self) -> Option<&Arc<EntityContainer>> {
        match self {
            SchemaElement::EntityContainer(container) => Some(container),
            _ => None,
        }
    }
}

type RegistryKey = (ElementKind, FullQualifiedName);

#[derive(Debug, Default)]
struct RegistryState {
    elements: HashMap<RegistryKey, SchemaElement>,
    order: Vec<RegistryKey>,
}

/// Cache of built elements keyed by kind and qualified name
///
/// Reads take a shared lock; `lock_build` hands out the single construction
/// lock used for lazy builds after publication. Callers holding it must
/// re-check `resolve` before constructing anything.
#[derive(Debug, Default)]
pub struct Registry {
    state: RwLock<RegistryState>,
    build_lock: Mutex<()>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached element for `kind` and `name`
    pub fn resolve(&self, kind: ElementKind, name: &FullQualifiedName) -> Option<SchemaElement> {
        self.read()
            .elements
            .get(&(kind, name.clone()))
            .cloned()
    }

    pub fn contains(&self, kind: ElementKind, name: &FullQualifiedName) -> bool {
        self.read().elements.contains_key(&(kind, name.clone()))
    }

    /// Register `element` under `name`
    ///
    /// Registering the instance already cached under the key is a no-op; a
    /// different instance is a `DuplicateRegistration`.
    pub fn register(&self, name: FullQualifiedName, element: SchemaElement) -> Result<(), BuildError> {
        let kind = element.kind();
        let mut state = self.write();
        let key = (kind, name);
        if let Some(existing) = state.elements.get(&key) {
            if existing.ptr_eq(&element) {
                return Ok(());
            }
            return Err(BuildError::DuplicateRegistration {
                kind,
                name: key.1,
            });
        }
        debug!("Registered {:?} '{}'", kind, key.1);
        state.order.push(key.clone());
        state.elements.insert(key, element);
        Ok(())
    }

    /// Remove the element cached under the key, returning it
    pub fn evict(&self, kind: ElementKind, name: &FullQualifiedName) -> Option<SchemaElement> {
        let mut state = self.write();
        let key = (kind, name.clone());
        let removed = state.elements.remove(&key);
        if removed.is_some() {
            state.order.retain(|k| *k != key);
            debug!("Evicted {:?} '{}'", kind, name);
        }
        removed
    }

    /// Position in registration order, for a later `rollback`
    pub fn mark(&self) -> usize {
        self.read().order.len()
    }

    /// Evict everything registered after `mark`, returning the evicted keys
    ///
    /// Only meaningful while the caller holds the build lock, so that no
    /// other registration interleaves.
    pub fn rollback(&self, mark: usize) -> Vec<(ElementKind, FullQualifiedName)> {
        let mut state = self.write();
        if mark >= state.order.len() {
            return Vec::new();
        }
        let evicted = state.order.split_off(mark);
        for key in &evicted {
            state.elements.remove(key);
            debug!("Rolled back {:?} '{}'", key.0, key.1);
        }
        evicted
    }

    /// Elements of one kind in registration order
    pub fn elements_of(&self, kind: ElementKind) -> Vec<SchemaElement> {
        let state = self.read();
        state
            .order
            .iter()
            .filter(|(k, _)| *k == kind)
            .filter_map(|key| state.elements.get(key).cloned())
            .collect()
    }

    pub fn entity_type(&self, name: &FullQualifiedName) -> Option<Arc<EntityType>> {
        self.resolve(ElementKind::EntityType, name)
            .and_then(|e| e.as_entity_type().cloned())
    }

    pub fn association(&self, name: &FullQualifiedName) -> Option<Arc<Association>> {
        self.resolve(ElementKind::Association, name)
            .and_then(|e| e.as_association().cloned())
    }

    pub fn entity_container(&self, name: &FullQualifiedName) -> Option<Arc<EntityContainer>> {
        self.resolve(ElementKind::EntityContainer, name)
            .and_then(|e| e.as_entity_container().cloned())
    }

    pub fn entity_types(&self) -> Vec<Arc<EntityType>> {
        self.elements_of(ElementKind::EntityType)
            .iter()
            .filter_map(|e| e.as_entity_type().cloned())
            .collect()
    }

    pub fn complex_types(&self) -> Vec<Arc<ComplexType>> {
        self.elements_of(ElementKind::ComplexType)
            .iter()
            .filter_map(|e| e.as_complex_type().cloned())
            .collect()
    }

    pub fn associations(&self) -> Vec<Arc<Association>> {
        self.elements_of(ElementKind::Association)
            .iter()
            .filter_map(|e| e.as_association().cloned())
            .collect()
    }

    /// Base-type chain of `name`, starting with the type itself
    ///
    /// Stops at the first base type that is not registered; a chain longer
    /// than `max_depth` is a `CyclicBuildError`.
    pub fn entity_type_chain(
        &self,
        name: &FullQualifiedName,
        max_depth: usize,
    ) -> Result<Vec<Arc<EntityType>>, BuildError> {
        let mut chain = Vec::new();
        let mut next = self.entity_type(name);
        while let Some(entity_type) = next {
            if chain.len() > max_depth {
                return Err(BuildError::CyclicBuildError {
                    kind: ElementKind::EntityType,
                    element: name.to_string(),
                });
            }
            next = entity_type
                .base_type
                .as_ref()
                .and_then(|base| self.entity_type(base));
            chain.push(entity_type);
        }
        Ok(chain)
    }

    /// Key declared by `entity_type` or, failing that, by its nearest
    /// registered base type
    pub fn effective_key(&self, entity_type: &EntityType, max_depth: usize) -> Result<Option<Key>, BuildError> {
        if !entity_type.key.is_empty() {
            return Ok(Some(entity_type.key.clone()));
        }
        let Some(base) = &entity_type.base_type else {
            return Ok(None);
        };
        Ok(self
            .entity_type_chain(base, max_depth)?
            .into_iter()
            .find(|t| !t.key.is_empty())
            .map(|t| t.key.clone()))
    }

    pub fn len(&self) -> usize {
        self.read().elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Acquire the construction lock for on-demand builds
    pub fn lock_build(&self) -> MutexGuard<'_, ()> {
        self.build_lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Cached element, or construct it once under the construction lock
    ///
    /// `build` runs at most once per key across threads; whatever it returns
    /// is registered if it is not already.
    pub fn resolve_or_build<F>(
        &self,
        kind: ElementKind,
        name: &FullQualifiedName,
        build: F,
    ) -> Result<SchemaElement, BuildError>
    where
        F: FnOnce() -> Result<SchemaElement, BuildError>,
    {
        if let Some(element) = self.resolve(kind, name) {
            return Ok(element);
        }
        let _guard = self.lock_build();
        if let Some(element) = self.resolve(kind, name) {
            debug!("{:?} '{}' was built while waiting for the build lock", kind, name);
            return Ok(element);
        }
        let element = build()?;
        self.register(name.clone(), element.clone())?;
        Ok(element)
    }

    fn read(&self) -> RwLockReadGuard<'_, RegistryState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, RegistryState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ComplexTypeProvider for Registry {
    fn complex_type(&self, name: &FullQualifiedName) -> Option<Arc<ComplexType>> {
        self.resolve(ElementKind::ComplexType, name)
            .and_then(|e| e.as_complex_type().cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn room() -> SchemaElement {
        SchemaElement::EntityType(Arc::new(EntityType::new(FullQualifiedName::new(
            "Acme", "Room",
        ))))
    }

    #[test]
    fn test_same_instance_registration_is_noop() {
        let registry = Registry::new();
        let element = room();
        let name = FullQualifiedName::new("Acme", "Room");

        registry.register(name.clone(), element.clone()).unwrap();
        registry.register(name.clone(), element.clone()).unwrap();

        assert_eq!(registry.len(), 1);
        assert!(registry.resolve(ElementKind::EntityType, &name).unwrap().ptr_eq(&element));
    }

    #[test]
    fn test_different_instance_is_duplicate() {
        let registry = Registry::new();
        let name = FullQualifiedName::new("Acme", "Room");
        registry.register(name.clone(), room()).unwrap();

        let result = registry.register(name.clone(), room());
        assert_eq!(
            result,
            Err(BuildError::DuplicateRegistration {
                kind: ElementKind::EntityType,
                name,
            })
        );
    }

    #[test]
    fn test_kinds_do_not_collide() {
        let registry = Registry::new();
        let name = FullQualifiedName::new("Acme", "Room");
        registry.register(name.clone(), room()).unwrap();
        let complex = SchemaElement::ComplexType(Arc::new(ComplexType::new(name.clone(), vec![])));
        registry.register(name.clone(), complex).unwrap();

        assert!(registry.contains(ElementKind::ComplexType, &name));
        assert!(registry.contains(ElementKind::EntityType, &name));
    }

    #[test]
    fn test_rollback_to_mark() {
        let registry = Registry::new();
        let room_name = FullQualifiedName::new("Acme", "Room");
        registry.register(room_name.clone(), room()).unwrap();

        let mark = registry.mark();
        let annex = FullQualifiedName::new("Acme", "Annex");
        registry
            .register(annex.clone(), SchemaElement::EntityType(Arc::new(EntityType::new(annex.clone()))))
            .unwrap();
        let address = FullQualifiedName::new("Acme", "Address");
        registry
            .register(address.clone(), SchemaElement::ComplexType(Arc::new(ComplexType::new(address.clone(), vec![]))))
            .unwrap();

        let evicted = registry.rollback(mark);
        assert_eq!(
            evicted,
            vec![(ElementKind::EntityType, annex.clone()), (ElementKind::ComplexType, address)]
        );
        assert_eq!(registry.len(), 1);
        assert!(registry.contains(ElementKind::EntityType, &room_name));
        assert!(!registry.contains(ElementKind::EntityType, &annex));
        assert!(registry.rollback(mark).is_empty());
    }

    #[test]
    fn test_evict_then_reregister() {
        let registry = Registry::new();
        let name = FullQualifiedName::new("Acme", "Room");
        registry.register(name.clone(), room()).unwrap();

        assert!(registry.evict(ElementKind::EntityType, &name).is_some());
        assert!(registry.is_empty());
        assert!(registry.evict(ElementKind::EntityType, &name).is_none());
        registry.register(name, room()).unwrap();
    }

    #[test]
    fn test_elements_in_registration_order() {
        let registry = Registry::new();
        for name in ["Room", "Building", "Floor"] {
            let fqn = FullQualifiedName::new("Acme", name);
            let element = SchemaElement::EntityType(Arc::new(EntityType::new(fqn.clone())));
            registry.register(fqn, element).unwrap();
        }
        let names: Vec<String> = registry
            .entity_types()
            .iter()
            .map(|t| t.name.name().to_string())
            .collect();
        assert_eq!(names, vec!["Room", "Building", "Floor"]);
    }

    #[test]
    fn test_resolve_or_build_constructs_once() {
        let registry = Registry::new();
        let name = FullQualifiedName::new("Acme", "Room");
        let calls = AtomicUsize::new(0);

        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    registry
                        .resolve_or_build(ElementKind::EntityType, &name, || {
                            calls.fetch_add(1, Ordering::SeqCst);
                            Ok(room())
                        })
                        .unwrap()
                });
            }
        });

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_entity_type_chain_walks_registered_bases() {
        let registry = Registry::new();
        let base = FullQualifiedName::new("Acme", "Space");
        let mut derived = EntityType::new(FullQualifiedName::new("Acme", "Room"));
        derived.base_type = Some(base.clone());
        registry
            .register(base.clone(), SchemaElement::EntityType(Arc::new(EntityType::new(base))))
            .unwrap();
        registry
            .register(derived.name.clone(), SchemaElement::EntityType(Arc::new(derived)))
            .unwrap();

        let chain = registry
            .entity_type_chain(&FullQualifiedName::new("Acme", "Room"), 32)
            .unwrap();
        assert_eq!(chain.len(), 2);
        assert_eq!(chain[1].name.name(), "Space");
    }
}
