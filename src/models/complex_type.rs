//! Complex type model

use serde::{Deserialize, Serialize};

use super::name::FullQualifiedName;
use super::property::Property;

/// Structured type without identity: simple or nested complex properties only
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplexType {
    pub name: FullQualifiedName,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_type: Option<FullQualifiedName>,
    pub properties: Vec<Property>,
}

impl ComplexType {
    pub fn new(name: FullQualifiedName, properties: Vec<Property>) -> Self {
        Self {
            name,
            base_type: None,
            properties,
        }
    }

    pub fn with_base_type(mut self, base_type: FullQualifiedName) -> Self {
        self.base_type = Some(base_type);
        self
    }

    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }

    /// Complex types referenced directly by this type's properties
    pub fn nested_types(&self) -> impl Iterator<Item = &FullQualifiedName> {
        self.properties
            .iter()
            .filter_map(|p| p.property_type.as_complex())
    }
}
