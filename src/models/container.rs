//! Entity container model: entity sets, association sets, function imports
//!
//! Containers are immutable once built, apart from a per-container lookup
//! cache. Lookups that miss locally fall through to the extended container
//! and the result (including a definitive miss) is cached in the asking
//! container.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::association::AssociationSet;
use super::entity_type::NavigationProperty;
use super::name::FullQualifiedName;
use super::property::Facets;
use super::simple_type::EdmSimpleType;

/// Addressable collection of entities of one type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntitySet {
    pub name: String,
    pub entity_type: FullQualifiedName,
    /// Name of the owning container
    pub container: String,
}

impl EntitySet {
    pub fn entity_type(&self) -> &FullQualifiedName {
        &self.entity_type
    }
}

/// Resolved type reference (return types of function imports)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeReference {
    Simple(EdmSimpleType),
    Complex(FullQualifiedName),
    Entity(FullQualifiedName),
}

/// Return type of a function import
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReturnType {
    pub type_ref: TypeReference,
    /// `Many` for collections
    pub multiplicity: super::association::Multiplicity,
}

/// HTTP method a function import is invoked with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Delete,
}

/// Input parameter of a function import
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionImportParameter {
    pub name: String,
    pub parameter_type: EdmSimpleType,
    #[serde(default)]
    pub facets: Facets,
}

/// Service operation exposed by a container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionImport {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_type: Option<ReturnType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_set: Option<String>,
    #[serde(default)]
    pub http_method: HttpMethod,
    #[serde(default)]
    pub parameters: Vec<FunctionImportParameter>,
}

#[derive(Debug, Default)]
struct LookupCache {
    entity_sets: HashMap<String, Option<Arc<EntitySet>>>,
    association_sets: HashMap<(String, FullQualifiedName, String), Option<Arc<AssociationSet>>>,
    function_imports: HashMap<String, Option<Arc<FunctionImport>>>,
}

/// Grouping of entity sets, association sets and function imports
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use edm_metadata::models::{EntityContainer, EntitySet, FullQualifiedName};
///
/// let rooms = EntitySet {
///     name: "Rooms".to_string(),
///     entity_type: FullQualifiedName::new("Acme", "Room"),
///     container: "Base".to_string(),
/// };
/// let base = Arc::new(EntityContainer::new("Base", "Acme").with_entity_sets(vec![rooms]));
/// let derived = EntityContainer::new("Derived", "Acme").with_parent(base.clone());
///
/// assert_eq!(derived.get_entity_set("Rooms"), base.get_entity_set("Rooms"));
/// ```
#[derive(Debug)]
pub struct EntityContainer {
    pub name: String,
    pub namespace: String,
    pub is_default: bool,
    parent: Option<Arc<EntityContainer>>,
    entity_sets: Vec<Arc<EntitySet>>,
    association_sets: Vec<Arc<AssociationSet>>,
    function_imports: Vec<Arc<FunctionImport>>,
    cache: Mutex<LookupCache>,
    inherited_lookups: AtomicUsize,
}

impl EntityContainer {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            is_default: false,
            parent: None,
            entity_sets: Vec::new(),
            association_sets: Vec::new(),
            function_imports: Vec::new(),
            cache: Mutex::new(LookupCache::default()),
            inherited_lookups: AtomicUsize::new(0),
        }
    }

    pub fn with_default(mut self, is_default: bool) -> Self {
        self.is_default = is_default;
        self
    }

    pub fn with_parent(mut self, parent: Arc<EntityContainer>) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn with_entity_sets(mut self, entity_sets: Vec<EntitySet>) -> Self {
        self.entity_sets = entity_sets.into_iter().map(Arc::new).collect();
        self
    }

    pub fn with_association_sets(mut self, association_sets: Vec<AssociationSet>) -> Self {
        self.association_sets = association_sets.into_iter().map(Arc::new).collect();
        self
    }

    pub fn with_function_imports(mut self, function_imports: Vec<FunctionImport>) -> Self {
        self.function_imports = function_imports.into_iter().map(Arc::new).collect();
        self
    }

    /// Name of the extended container, if any
    pub fn extends(&self) -> Option<&str> {
        self.parent.as_deref().map(|p| p.name.as_str())
    }

    pub fn parent(&self) -> Option<&Arc<EntityContainer>> {
        self.parent.as_ref()
    }

    /// Extended containers, nearest first
    pub fn ancestors(&self) -> impl Iterator<Item = &EntityContainer> {
        std::iter::successors(self.parent.as_deref(), |c| c.parent.as_deref())
    }

    /// Entity sets declared by this container (not inherited)
    pub fn entity_sets(&self) -> &[Arc<EntitySet>] {
        &self.entity_sets
    }

    pub fn association_sets(&self) -> &[Arc<AssociationSet>] {
        &self.association_sets
    }

    pub fn function_imports(&self) -> &[Arc<FunctionImport>] {
        &self.function_imports
    }

    /// Number of lookups that had to walk the `extends` chain
    pub fn inherited_lookups(&self) -> usize {
        self.inherited_lookups.load(Ordering::Relaxed)
    }

    pub fn get_entity_set(&self, name: &str) -> Option<Arc<EntitySet>> {
        self.cached_lookup(
            |cache| &mut cache.entity_sets,
            name.to_string(),
            |container| {
                container
                    .entity_sets
                    .iter()
                    .find(|set| set.name == name)
                    .cloned()
            },
        )
    }

    /// Association set reached by following `navigation` out of `source`
    pub fn get_association_set(
        &self,
        source: &EntitySet,
        navigation: &NavigationProperty,
    ) -> Option<Arc<AssociationSet>> {
        let key = (
            source.name.clone(),
            navigation.relationship.clone(),
            navigation.from_role.clone(),
        );
        self.cached_lookup(
            |cache| &mut cache.association_sets,
            key,
            |container| {
                container
                    .association_sets
                    .iter()
                    .find(|set| {
                        set.connects(&navigation.relationship, &navigation.from_role, &source.name)
                    })
                    .cloned()
            },
        )
    }

    pub fn get_function_import(&self, name: &str) -> Option<Arc<FunctionImport>> {
        self.cached_lookup(
            |cache| &mut cache.function_imports,
            name.to_string(),
            |container| {
                container
                    .function_imports
                    .iter()
                    .find(|f| f.name == name)
                    .cloned()
            },
        )
    }

    /// Entity set exposing exactly `entity_type`, searching this container then its ancestors
    pub fn entity_set_for_type(&self, entity_type: &FullQualifiedName) -> Option<Arc<EntitySet>> {
        std::iter::once(self)
            .chain(self.ancestors())
            .find_map(|container| {
                container
                    .entity_sets
                    .iter()
                    .find(|set| set.entity_type == *entity_type)
                    .cloned()
            })
    }

    fn lock_cache(&self) -> MutexGuard<'_, LookupCache> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn cached_lookup<K, T>(
        &self,
        select: impl Fn(&mut LookupCache) -> &mut HashMap<K, Option<Arc<T>>>,
        key: K,
        local: impl Fn(&EntityContainer) -> Option<Arc<T>>,
    ) -> Option<Arc<T>>
    where
        K: Eq + Hash,
    {
        {
            let mut cache = self.lock_cache();
            if let Some(hit) = select(&mut cache).get(&key) {
                return hit.clone();
            }
        }

        let found = local(self).or_else(|| {
            self.parent.as_ref()?;
            self.inherited_lookups.fetch_add(1, Ordering::Relaxed);
            self.ancestors().find_map(&local)
        });

        select(&mut self.lock_cache()).insert(key, found.clone());
        found
    }
}
