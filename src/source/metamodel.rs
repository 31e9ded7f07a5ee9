//! Persistence metamodel source
//!
//! Reads a persistence unit's managed types (entities, embeddables and mapped
//! superclasses) and their attributes, as an object-relational mapper reports
//! them. Class names are reduced to simple names, mapped-superclass
//! attributes are folded into the inheriting type, and an entity supertype
//! becomes the EDM base type. An optional `MappingModel` renames or excludes
//! types and attributes.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, warn};

use super::mapping::MappingModel;
use super::{
    AttributeKind, CandidateKind, CandidateTable, JoinColumn, KeyDescriptor, MetadataSource,
    NavigationDescriptor, PropertyDescriptor, RawType, TypeDescriptor, TypeEntry,
};
use crate::error::BuildError;
use crate::models::{Facets, FullQualifiedName};

/// Kind of managed type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ManagedTypeKind {
    Entity,
    Embeddable,
    MappedSuperclass,
}

fn default_optional() -> bool {
    true
}

/// Persistent attribute of a managed type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attribute {
    pub name: String,
    /// Declared Java type; the embeddable class for embedded attributes
    pub java_type: String,
    pub kind: AttributeKind,
    #[serde(default)]
    pub id: bool,
    #[serde(default)]
    pub version: bool,
    #[serde(default = "default_optional")]
    pub optional: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precision: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<u32>,
    /// Target entity class of a relationship
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default)]
    pub join_columns: Vec<JoinColumn>,
}

impl Attribute {
    fn new(name: impl Into<String>, java_type: impl Into<String>, kind: AttributeKind) -> Self {
        Self {
            name: name.into(),
            java_type: java_type.into(),
            kind,
            id: false,
            version: false,
            optional: true,
            column: None,
            length: None,
            precision: None,
            scale: None,
            target: None,
            join_columns: Vec::new(),
        }
    }

    pub fn basic(name: impl Into<String>, java_type: impl Into<String>) -> Self {
        Self::new(name, java_type, AttributeKind::Basic)
    }

    /// Simple identifier attribute
    pub fn id(name: impl Into<String>, java_type: impl Into<String>) -> Self {
        let mut attribute = Self::basic(name, java_type);
        attribute.id = true;
        attribute.optional = false;
        attribute
    }

    /// Optimistic-locking version attribute
    pub fn version(name: impl Into<String>, java_type: impl Into<String>) -> Self {
        let mut attribute = Self::basic(name, java_type);
        attribute.version = true;
        attribute
    }

    pub fn embedded(name: impl Into<String>, embeddable: impl Into<String>) -> Self {
        Self::new(name, embeddable, AttributeKind::Embedded)
    }

    pub fn embedded_id(name: impl Into<String>, embeddable: impl Into<String>) -> Self {
        let mut attribute = Self::new(name, embeddable, AttributeKind::EmbeddedId);
        attribute.optional = false;
        attribute
    }

    /// Relationship attribute (`OneToOne`, `ManyToOne`, `OneToMany`, `ManyToMany`)
    pub fn relationship(name: impl Into<String>, kind: AttributeKind, target: impl Into<String>) -> Self {
        let target = target.into();
        let mut attribute = Self::new(name, target.clone(), kind);
        attribute.target = Some(target);
        attribute
    }

    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    pub fn length(mut self, length: u32) -> Self {
        self.length = Some(length);
        self
    }

    pub fn precision(mut self, precision: u32, scale: Option<u32>) -> Self {
        self.precision = Some(precision);
        self.scale = scale;
        self
    }

    pub fn required(mut self) -> Self {
        self.optional = false;
        self
    }

    pub fn join_column(mut self, name: impl Into<String>, referenced_column_name: impl Into<String>) -> Self {
        self.join_columns.push(JoinColumn {
            name: name.into(),
            referenced_column_name: referenced_column_name.into(),
        });
        self
    }

    fn facets(&self) -> Facets {
        Facets {
            nullable: Some(self.optional && !self.id),
            max_length: self.length,
            precision: self.precision,
            scale: self.scale,
            ..Facets::default()
        }
    }
}

/// Entity, embeddable or mapped superclass of a persistence unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagedType {
    pub class_name: String,
    pub kind: ManagedTypeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supertype: Option<String>,
    #[serde(default)]
    pub is_abstract: bool,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
}

impl ManagedType {
    fn new(class_name: impl Into<String>, kind: ManagedTypeKind) -> Self {
        Self {
            class_name: class_name.into(),
            kind,
            supertype: None,
            is_abstract: false,
            attributes: Vec::new(),
        }
    }

    pub fn entity(class_name: impl Into<String>) -> Self {
        Self::new(class_name, ManagedTypeKind::Entity)
    }

    pub fn embeddable(class_name: impl Into<String>) -> Self {
        Self::new(class_name, ManagedTypeKind::Embeddable)
    }

    pub fn mapped_superclass(class_name: impl Into<String>) -> Self {
        Self::new(class_name, ManagedTypeKind::MappedSuperclass)
    }

    pub fn extends(mut self, supertype: impl Into<String>) -> Self {
        self.supertype = Some(supertype.into());
        self
    }

    pub fn abstract_type(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    pub fn attribute(mut self, attribute: Attribute) -> Self {
        self.attributes.push(attribute);
        self
    }
}

/// Named set of managed types
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistenceUnit {
    pub name: String,
    #[serde(default)]
    pub managed_types: Vec<ManagedType>,
}

impl PersistenceUnit {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            managed_types: Vec::new(),
        }
    }

    pub fn with_type(mut self, managed_type: ManagedType) -> Self {
        self.managed_types.push(managed_type);
        self
    }

    pub fn from_yaml(yaml_content: &str) -> Result<Self> {
        serde_yaml::from_str(yaml_content).context("Failed to parse persistence unit YAML")
    }

    pub fn from_json(json_content: &str) -> Result<Self> {
        serde_json::from_str(json_content).context("Failed to parse persistence unit JSON")
    }

    fn managed_type(&self, class_name: &str) -> Option<&ManagedType> {
        self.managed_types.iter().find(|t| t.class_name == class_name)
    }
}

/// Source reading a persistence unit
#[derive(Debug, Clone)]
pub struct PersistenceMetamodelSource {
    name: String,
    namespace: String,
    unit: PersistenceUnit,
    mapping: MappingModel,
    table: CandidateTable,
}

impl PersistenceMetamodelSource {
    pub fn new(unit: PersistenceUnit) -> Self {
        let mut source = Self {
            name: format!("metamodel:{}", unit.name),
            namespace: unit.name.clone(),
            unit,
            mapping: MappingModel::default(),
            table: CandidateTable::default(),
        };
        source.load();
        source
    }

    /// Apply renames and exclusions
    pub fn with_mapping(mut self, mapping: MappingModel) -> Self {
        self.mapping = mapping;
        self.load();
        self
    }

    pub fn unit(&self) -> &PersistenceUnit {
        &self.unit
    }

    fn load(&mut self) {
        self.namespace = self
            .mapping
            .namespace
            .clone()
            .unwrap_or_else(|| self.unit.name.clone());
        let mut table = CandidateTable::default();
        for managed_type in &self.unit.managed_types {
            if managed_type.kind == ManagedTypeKind::MappedSuperclass {
                continue;
            }
            if self.mapping.is_type_excluded(&managed_type.class_name) {
                debug!("Excluding managed type '{}'", managed_type.class_name);
                continue;
            }
            table.push(self.entry(managed_type));
        }
        self.table = table;
    }

    fn type_name(&self, class_name: &str) -> FullQualifiedName {
        FullQualifiedName::new(&self.namespace, self.mapping.type_name(class_name))
    }

    /// Attributes of `managed_type` with inherited mapped-superclass
    /// attributes first, plus the nearest entity supertype
    fn collect_attributes<'u>(&'u self, managed_type: &'u ManagedType) -> (Vec<&'u Attribute>, Option<&'u str>) {
        let mut chain = vec![managed_type];
        let mut seen: HashSet<&str> = HashSet::from([managed_type.class_name.as_str()]);
        let mut base = None;
        let mut next = managed_type.supertype.as_deref();
        while let Some(class_name) = next {
            if !seen.insert(class_name) {
                warn!("Supertype cycle at '{}' in unit '{}'", class_name, self.unit.name);
                break;
            }
            match self.unit.managed_type(class_name) {
                Some(supertype) if supertype.kind == ManagedTypeKind::MappedSuperclass => {
                    chain.push(supertype);
                    next = supertype.supertype.as_deref();
                }
                Some(supertype) => {
                    base = Some(supertype.class_name.as_str());
                    break;
                }
                None => {
                    debug!("Supertype '{}' is not managed; ignored", class_name);
                    break;
                }
            }
        }
        let attributes = chain
            .iter()
            .rev()
            .flat_map(|t| t.attributes.iter())
            .collect();
        (attributes, base)
    }

    fn entry(&self, managed_type: &ManagedType) -> TypeEntry {
        let class_name = managed_type.class_name.as_str();
        let kind = match managed_type.kind {
            ManagedTypeKind::Embeddable => CandidateKind::Complex,
            _ => CandidateKind::Entity,
        };
        let (attributes, base) = self.collect_attributes(managed_type);

        let mut descriptor = TypeDescriptor::new(self.type_name(class_name), kind, 0);
        descriptor.base_type = base
            .filter(|b| !self.mapping.is_type_excluded(b))
            .map(|b| self.type_name(b));
        descriptor.is_abstract = managed_type.is_abstract;
        descriptor.entity_set = self.mapping.entity_set(class_name);

        let mut properties = Vec::new();
        let mut navigations = Vec::new();
        let mut key_properties = Vec::new();
        let mut embedded_key = None;

        for attribute in attributes {
            if attribute.kind.is_navigation() {
                if let Some(navigation) = self.navigation(class_name, attribute) {
                    navigations.push(navigation);
                }
                continue;
            }
            let Some(name) = self.mapping.property_name(class_name, &attribute.name) else {
                continue;
            };
            let raw_type = match attribute.kind {
                AttributeKind::Basic => RawType::Native(attribute.java_type.clone()),
                _ => RawType::Named(self.type_name(&attribute.java_type)),
            };
            let mut property = PropertyDescriptor::new(name.clone(), raw_type, attribute.kind);
            property.facets = match attribute.kind {
                AttributeKind::Basic => attribute.facets(),
                _ => Facets::nullable(attribute.optional),
            };
            property.concurrency_token = attribute.version;
            property.column = attribute.column.clone();
            properties.push(property);

            if attribute.kind == AttributeKind::EmbeddedId {
                embedded_key = Some(name);
            } else if attribute.id {
                key_properties.push(name);
            }
        }

        let key = match embedded_key {
            Some(member) => KeyDescriptor::Embedded(member),
            None if !key_properties.is_empty() => KeyDescriptor::Properties(key_properties),
            None => KeyDescriptor::None,
        };

        TypeEntry {
            descriptor,
            listed: true,
            properties,
            navigations,
            key,
        }
    }

    fn navigation(&self, class_name: &str, attribute: &Attribute) -> Option<NavigationDescriptor> {
        let name = self.mapping.navigation_name(class_name, &attribute.name)?;
        let target_class = attribute.target.as_deref().unwrap_or(&attribute.java_type);
        if self.mapping.is_type_excluded(target_class) {
            warn!(
                "Dropping navigation '{}.{}': target '{}' is excluded",
                class_name, attribute.name, target_class
            );
            return None;
        }
        let mut navigation = NavigationDescriptor::new(name, self.type_name(target_class), attribute.kind);
        navigation.optional = attribute.optional;
        navigation.join_columns = attribute.join_columns.clone();
        Some(navigation)
    }
}

impl MetadataSource for PersistenceMetamodelSource {
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
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit() -> PersistenceUnit {
        PersistenceUnit::new("Facilities")
            .with_type(
                ManagedType::mapped_superclass("com.acme.Audited")
                    .attribute(Attribute::version("revision", "long"))
                    .attribute(Attribute::basic("createdBy", "java.lang.String").length(64)),
            )
            .with_type(
                ManagedType::entity("com.acme.Building")
                    .extends("com.acme.Audited")
                    .attribute(Attribute::id("id", "int"))
                    .attribute(Attribute::relationship("rooms", AttributeKind::OneToMany, "com.acme.Room")),
            )
            .with_type(
                ManagedType::entity("com.acme.Room")
                    .attribute(Attribute::id("id", "java.lang.Integer").column("ROOM_ID"))
                    .attribute(Attribute::basic("buildingId", "int").column("BUILDING_ID"))
                    .attribute(Attribute::embedded("address", "com.acme.Address"))
                    .attribute(
                        Attribute::relationship("building", AttributeKind::ManyToOne, "com.acme.Building")
                            .required()
                            .join_column("BUILDING_ID", "id"),
                    ),
            )
            .with_type(
                ManagedType::entity("com.acme.MeetingRoom")
                    .extends("com.acme.Room")
                    .attribute(Attribute::basic("seats", "int")),
            )
            .with_type(
                ManagedType::embeddable("com.acme.Address")
                    .attribute(Attribute::basic("city", "java.lang.String")),
            )
    }

    fn candidate(source: &PersistenceMetamodelSource, name: &str) -> TypeDescriptor {
        source
            .list_candidates()
            .into_iter()
            .find(|c| c.name.name() == name)
            .unwrap()
    }

    #[test]
    fn test_managed_types_become_candidates() {
        let source = PersistenceMetamodelSource::new(unit());
        assert_eq!(source.default_namespace(), "Facilities");

        let names: Vec<_> = source.list_candidates().iter().map(|c| c.name.to_string()).collect();
        assert_eq!(
            names,
            vec!["Facilities.Building", "Facilities.Room", "Facilities.MeetingRoom", "Facilities.Address"]
        );

        let address = candidate(&source, "Address");
        assert_eq!(address.kind, CandidateKind::Complex);

        let meeting_room = candidate(&source, "MeetingRoom");
        assert_eq!(meeting_room.base_type, Some(FullQualifiedName::new("Facilities", "Room")));
        assert_eq!(source.describe_key(&meeting_room).unwrap(), KeyDescriptor::None);
    }

    #[test]
    fn test_mapped_superclass_attributes_are_folded() {
        let source = PersistenceMetamodelSource::new(unit());
        let building = candidate(&source, "Building");
        assert_eq!(building.base_type, None);

        let properties = source.describe_properties(&building).unwrap();
        let names: Vec<_> = properties.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["revision", "createdBy", "id"]);
        assert!(properties[0].concurrency_token);
        assert_eq!(properties[1].facets.max_length, Some(64));
        assert_eq!(properties[2].facets.nullable, Some(false));
        assert_eq!(
            source.describe_key(&building).unwrap(),
            KeyDescriptor::Properties(vec!["id".to_string()])
        );
    }

    #[test]
    fn test_relationships_become_navigations() {
        let source = PersistenceMetamodelSource::new(unit());
        let room = candidate(&source, "Room");
        let navigations = source.describe_navigations(&room).unwrap();
        assert_eq!(navigations.len(), 1);
        assert_eq!(navigations[0].kind, AttributeKind::ManyToOne);
        assert_eq!(navigations[0].target, FullQualifiedName::new("Facilities", "Building"));
        assert!(!navigations[0].optional);
        assert_eq!(navigations[0].join_columns[0].name, "BUILDING_ID");

        let properties = source.describe_properties(&room).unwrap();
        assert_eq!(properties[0].column.as_deref(), Some("ROOM_ID"));
        assert_eq!(
            properties[2].raw_type,
            RawType::Named(FullQualifiedName::new("Facilities", "Address"))
        );
    }

    #[test]
    fn test_mapping_renames_and_excludes() {
        let mapping = MappingModel::from_yaml(
            r#"
namespace: Campus
entityTypes:
  - className: com.acme.Room
    edmName: Space
    entitySet: Spaces
    properties:
      - attribute: buildingId
        exclude: true
  - className: com.acme.Building
    navigationProperties:
      - attribute: rooms
        edmName: spaces
  - className: com.acme.MeetingRoom
    exclude: true
"#,
        )
        .unwrap();
        let source = PersistenceMetamodelSource::new(unit()).with_mapping(mapping);
        assert_eq!(source.default_namespace(), "Campus");
        assert_eq!(source.list_candidates().len(), 3);

        let space = candidate(&source, "Space");
        assert_eq!(space.entity_set.as_deref(), Some("Spaces"));
        let properties = source.describe_properties(&space).unwrap();
        assert!(properties.iter().all(|p| p.name != "buildingId"));

        let building = candidate(&source, "Building");
        let navigations = source.describe_navigations(&building).unwrap();
        assert_eq!(navigations[0].name, "spaces");
        assert_eq!(navigations[0].target, FullQualifiedName::new("Campus", "Space"));
    }

    #[test]
    fn test_unit_from_yaml() {
        let unit = PersistenceUnit::from_yaml(
            r#"
name: Inventory
managedTypes:
  - className: com.acme.Item
    kind: Entity
    attributes:
      - name: sku
        javaType: java.lang.String
        kind: Basic
        id: true
        optional: false
"#,
        )
        .unwrap();
        let source = PersistenceMetamodelSource::new(unit);
        let item = candidate(&source, "Item");
        assert_eq!(
            source.describe_key(&item).unwrap(),
            KeyDescriptor::Properties(vec!["sku".to_string()])
        );
    }
}
