//! Schema model: the elements of one namespace

use std::sync::Arc;

use super::association::Association;
use super::complex_type::ComplexType;
use super::container::EntityContainer;
use super::entity_type::EntityType;

/// Entity types, complex types, associations and containers of one namespace
///
/// Lookups accept either the qualified name (`Acme.Room`) or the bare name
/// (`Room`).
#[derive(Debug, Default)]
pub struct Schema {
    pub namespace: String,
    pub entity_types: Vec<Arc<EntityType>>,
    pub complex_types: Vec<Arc<ComplexType>>,
    pub associations: Vec<Arc<Association>>,
    pub entity_containers: Vec<Arc<EntityContainer>>,
}

impl Schema {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            ..Self::default()
        }
    }

    pub fn get_entity_type(&self, name: &str) -> Option<&Arc<EntityType>> {
        self.entity_types.iter().find(|t| t.name.matches(name))
    }

    pub fn get_complex_type(&self, name: &str) -> Option<&Arc<ComplexType>> {
        self.complex_types.iter().find(|t| t.name.matches(name))
    }

    pub fn get_association(&self, name: &str) -> Option<&Arc<Association>> {
        self.associations.iter().find(|a| a.name.matches(name))
    }

    pub fn get_entity_container(&self, name: &str) -> Option<&Arc<EntityContainer>> {
        self.entity_containers.iter().find(|c| c.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.entity_types.is_empty()
            && self.complex_types.is_empty()
            && self.associations.is_empty()
            && self.entity_containers.is_empty()
    }
}
