//! Mapping model for persistence metamodel sources
//!
//! Renames and exclusions applied on top of a persistence unit, loaded from
//! YAML or JSON:
//!
//! ```yaml
//! namespace: Facilities
//! entityTypes:
//!   - className: com.acme.RoomEntity
//!     edmName: Room
//!     entitySet: AllRooms
//!     properties:
//!       - attribute: bldg
//!         edmName: buildingId
//!       - attribute: internalNotes
//!         exclude: true
//! complexTypes:
//!   - className: com.acme.AddressEmbeddable
//!     edmName: Address
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::naming::simple_class_name;

/// Rename or exclusion of one attribute
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeMapping {
    pub attribute: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edm_name: Option<String>,
    #[serde(default)]
    pub exclude: bool,
}

/// Mapping of one managed class (entity or embeddable)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeMapping {
    /// Qualified or simple class name
    pub class_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edm_name: Option<String>,
    /// Entity set name (entity types only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_set: Option<String>,
    #[serde(default)]
    pub exclude: bool,
    #[serde(default)]
    pub properties: Vec<AttributeMapping>,
    #[serde(default)]
    pub navigation_properties: Vec<AttributeMapping>,
}

/// Renames and exclusions for a persistence unit
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingModel {
    /// EDM namespace replacing the persistence-unit name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default)]
    pub entity_types: Vec<TypeMapping>,
    #[serde(default)]
    pub complex_types: Vec<TypeMapping>,
}

impl MappingModel {
    pub fn from_yaml(yaml_content: &str) -> Result<Self> {
        serde_yaml::from_str(yaml_content).context("Failed to parse mapping model YAML")
    }

    pub fn from_json(json_content: &str) -> Result<Self> {
        serde_json::from_str(json_content).context("Failed to parse mapping model JSON")
    }

    /// Load from a `.yaml`/`.yml` or `.json` file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read mapping model {}", path.display()))?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml(&content),
            _ => Self::from_json(&content),
        }
        .with_context(|| format!("Invalid mapping model {}", path.display()))
    }

    fn type_mapping(&self, class_name: &str) -> Option<&TypeMapping> {
        let simple = simple_class_name(class_name);
        self.entity_types
            .iter()
            .chain(self.complex_types.iter())
            .find(|m| m.class_name == class_name || m.class_name == simple)
    }

    pub fn is_type_excluded(&self, class_name: &str) -> bool {
        self.type_mapping(class_name).is_some_and(|m| m.exclude)
    }

    /// EDM type name for a class: the mapped name, else the simple class name
    pub fn type_name(&self, class_name: &str) -> String {
        self.type_mapping(class_name)
            .and_then(|m| m.edm_name.clone())
            .unwrap_or_else(|| simple_class_name(class_name).to_string())
    }

    pub fn entity_set(&self, class_name: &str) -> Option<String> {
        self.type_mapping(class_name).and_then(|m| m.entity_set.clone())
    }

    /// EDM name of a property attribute; `None` when excluded
    pub fn property_name(&self, class_name: &str, attribute: &str) -> Option<String> {
        Self::attribute_name(
            self.type_mapping(class_name).map(|m| m.properties.as_slice()),
            attribute,
        )
    }

    /// EDM name of a relationship attribute; `None` when excluded
    pub fn navigation_name(&self, class_name: &str, attribute: &str) -> Option<String> {
        Self::attribute_name(
            self.type_mapping(class_name)
                .map(|m| m.navigation_properties.as_slice()),
            attribute,
        )
    }

    fn attribute_name(mappings: Option<&[AttributeMapping]>, attribute: &str) -> Option<String> {
        match mappings.and_then(|m| m.iter().find(|a| a.attribute == attribute)) {
            Some(mapping) if mapping.exclude => None,
            Some(mapping) => Some(
                mapping
                    .edm_name
                    .clone()
                    .unwrap_or_else(|| attribute.to_string()),
            ),
            None => Some(attribute.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAPPING: &str = r#"
namespace: Facilities
entityTypes:
  - className: com.acme.RoomEntity
    edmName: Room
    entitySet: AllRooms
    properties:
      - attribute: bldg
        edmName: buildingId
      - attribute: internalNotes
        exclude: true
  - className: AuditLog
    exclude: true
"#;

    #[test]
    fn test_yaml_mapping() {
        let mapping = MappingModel::from_yaml(MAPPING).unwrap();
        assert_eq!(mapping.namespace.as_deref(), Some("Facilities"));
        assert_eq!(mapping.type_name("com.acme.RoomEntity"), "Room");
        assert_eq!(mapping.type_name("com.acme.Building"), "Building");
        assert_eq!(mapping.entity_set("com.acme.RoomEntity").as_deref(), Some("AllRooms"));
        assert_eq!(
            mapping.property_name("com.acme.RoomEntity", "bldg").as_deref(),
            Some("buildingId")
        );
        assert_eq!(mapping.property_name("com.acme.RoomEntity", "internalNotes"), None);
        assert_eq!(
            mapping.property_name("com.acme.RoomEntity", "name").as_deref(),
            Some("name")
        );
        assert!(mapping.is_type_excluded("com.acme.audit.AuditLog"));
    }

    #[test]
    fn test_json_mapping_and_errors() {
        let mapping = MappingModel::from_json(r#"{"complexTypes": [{"className": "Addr", "edmName": "Address"}]}"#)
            .unwrap();
        assert_eq!(mapping.type_name("com.acme.Addr"), "Address");
        assert!(MappingModel::from_json("{not json").is_err());
    }

    #[test]
    fn test_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mapping.yaml");
        std::fs::write(&path, MAPPING).unwrap();
        let mapping = MappingModel::from_path(&path).unwrap();
        assert_eq!(mapping.entity_types.len(), 2);

        let missing = MappingModel::from_path(dir.path().join("missing.json"));
        assert!(missing.is_err());
    }
}
