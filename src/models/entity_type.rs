//! Entity type model

use serde::{Deserialize, Serialize};

use super::name::FullQualifiedName;
use super::property::Property;

/// Ordered list of property names forming an entity key
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Key {
    pub property_refs: Vec<String>,
}

impl Key {
    pub fn new(property_refs: Vec<String>) -> Self {
        Self { property_refs }
    }

    pub fn is_empty(&self) -> bool {
        self.property_refs.is_empty()
    }

    pub fn contains(&self, property: &str) -> bool {
        self.property_refs.iter().any(|p| p == property)
    }
}

/// A typed reference from one entity type to another, backed by an association
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationProperty {
    pub name: String,
    /// Qualified name of the backing association
    pub relationship: FullQualifiedName,
    pub from_role: String,
    pub to_role: String,
}

/// Entity type with properties, navigation properties and a key
///
/// A non-abstract entity type always resolves to a non-empty key once its
/// base-type chain is walked; see `SchemaGraph::effective_key`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityType {
    pub name: FullQualifiedName,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_type: Option<FullQualifiedName>,
    #[serde(default)]
    pub is_abstract: bool,
    #[serde(default)]
    pub has_stream: bool,
    pub properties: Vec<Property>,
    #[serde(default)]
    pub navigation_properties: Vec<NavigationProperty>,
    #[serde(default)]
    pub key: Key,
}

impl EntityType {
    pub fn new(name: FullQualifiedName) -> Self {
        Self {
            name,
            base_type: None,
            is_abstract: false,
            has_stream: false,
            properties: Vec::new(),
            navigation_properties: Vec::new(),
            key: Key::default(),
        }
    }

    /// Declared (not inherited) property by name
    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }

    /// Declared (not inherited) navigation property by name
    pub fn navigation_property(&self, name: &str) -> Option<&NavigationProperty> {
        self.navigation_properties.iter().find(|n| n.name == name)
    }

    /// Names of declared properties and navigation properties, in declaration order
    pub fn member_names(&self) -> impl Iterator<Item = &str> {
        self.properties
            .iter()
            .map(|p| p.name.as_str())
            .chain(self.navigation_properties.iter().map(|n| n.name.as_str()))
    }
}
