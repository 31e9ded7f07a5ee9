//! External schema document source
//!
//! A `SchemaDocument` lists one or more namespaces with their entity types,
//! complex types and containers:
//!
//! ```yaml
//! schemas:
//!   - namespace: Acme
//!     entityTypes:
//!       - name: Room
//!         key: [id]
//!         properties:
//!           - { name: id, type: Edm.Int32, nullable: false }
//!           - { name: address, type: Address }
//!         navigationProperties:
//!           - { name: building, target: Building, multiplicity: "1" }
//!     complexTypes:
//!       - name: Address
//!         properties:
//!           - { name: city, type: Edm.String, maxLength: 80 }
//! ```
//!
//! Bare type names resolve in the declaring namespace.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::{
    AttributeKind, CandidateKind, CandidateTable, ContainerDescriptor, EntitySetDescriptor,
    FunctionImportDescriptor, JoinColumn, KeyDescriptor, MetadataSource, NavigationDescriptor,
    ParameterDescriptor, PropertyDescriptor, RawType, TypeDescriptor, TypeEntry,
};
use crate::error::BuildError;
use crate::models::{Facets, FullQualifiedName, HttpMethod, Multiplicity};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentProperty {
    pub name: String,
    /// `Edm.*` simple type or complex type name
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(flatten)]
    pub facets: Facets,
    #[serde(default)]
    pub concurrency_token: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentNavigation {
    pub name: String,
    pub target: String,
    pub multiplicity: Multiplicity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_multiplicity: Option<Multiplicity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub association: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_role: Option<String>,
    #[serde(default)]
    pub join_columns: Vec<JoinColumn>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentEntityType {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_type: Option<String>,
    #[serde(default, rename = "abstract")]
    pub is_abstract: bool,
    #[serde(default)]
    pub has_stream: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_set: Option<String>,
    /// Simple key properties in key order
    #[serde(default)]
    pub key: Vec<String>,
    /// Complex property whose leaves form the key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedded_key: Option<String>,
    #[serde(default)]
    pub properties: Vec<DocumentProperty>,
    #[serde(default)]
    pub navigation_properties: Vec<DocumentNavigation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentComplexType {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_type: Option<String>,
    #[serde(default)]
    pub properties: Vec<DocumentProperty>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentEntitySet {
    pub name: String,
    pub entity_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentParameter {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(flatten)]
    pub facets: Facets,
}

fn default_return_multiplicity() -> Multiplicity {
    Multiplicity::One
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentFunctionImport {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_type: Option<String>,
    #[serde(default = "default_return_multiplicity")]
    pub return_multiplicity: Multiplicity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_set: Option<String>,
    #[serde(default)]
    pub http_method: HttpMethod,
    #[serde(default)]
    pub parameters: Vec<DocumentParameter>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentContainer {
    pub name: String,
    #[serde(default)]
    pub is_default: bool,
    /// Parent container, qualified or in the declaring namespace
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extends: Option<String>,
    #[serde(default)]
    pub entity_sets: Vec<DocumentEntitySet>,
    #[serde(default)]
    pub expose_all_entity_types: bool,
    #[serde(default)]
    pub function_imports: Vec<DocumentFunctionImport>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSchema {
    pub namespace: String,
    #[serde(default)]
    pub entity_types: Vec<DocumentEntityType>,
    #[serde(default)]
    pub complex_types: Vec<DocumentComplexType>,
    #[serde(default)]
    pub entity_containers: Vec<DocumentContainer>,
}

/// Parsed schema document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaDocument {
    #[serde(default)]
    pub schemas: Vec<DocumentSchema>,
}

fn property_descriptor(property: &DocumentProperty, namespace: &str, kind: AttributeKind) -> PropertyDescriptor {
    let raw_type = RawType::Named(FullQualifiedName::parse_in(&property.type_name, namespace));
    let mut descriptor = PropertyDescriptor::new(property.name.clone(), raw_type, kind);
    descriptor.facets = property.facets.clone();
    descriptor.concurrency_token = property.concurrency_token;
    descriptor.column = property.column.clone();
    descriptor
}

fn entity_entry(entity_type: &DocumentEntityType, namespace: &str) -> TypeEntry {
    let mut descriptor = TypeDescriptor::new(
        FullQualifiedName::new(namespace, &entity_type.name),
        CandidateKind::Entity,
        0,
    );
    descriptor.base_type = entity_type
        .base_type
        .as_deref()
        .map(|b| FullQualifiedName::parse_in(b, namespace));
    descriptor.is_abstract = entity_type.is_abstract;
    descriptor.has_stream = entity_type.has_stream;
    descriptor.entity_set = entity_type.entity_set.clone();

    let properties = entity_type
        .properties
        .iter()
        .map(|p| {
            let kind = if entity_type.embedded_key.as_deref() == Some(p.name.as_str()) {
                AttributeKind::EmbeddedId
            } else {
                AttributeKind::Basic
            };
            property_descriptor(p, namespace, kind)
        })
        .collect();

    let navigations = entity_type
        .navigation_properties
        .iter()
        .map(|n| {
            let mut navigation = NavigationDescriptor::new(
                n.name.clone(),
                FullQualifiedName::parse_in(&n.target, namespace),
                AttributeKind::Navigation(n.multiplicity),
            );
            navigation.optional = n.multiplicity == Multiplicity::ZeroOrOne;
            navigation.from_multiplicity = n.from_multiplicity;
            navigation.association = n.association.clone();
            navigation.from_role = n.from_role.clone();
            navigation.to_role = n.to_role.clone();
            navigation.join_columns = n.join_columns.clone();
            navigation
        })
        .collect();

    let key = match (&entity_type.embedded_key, entity_type.key.is_empty()) {
        (Some(member), _) => KeyDescriptor::Embedded(member.clone()),
        (None, false) => KeyDescriptor::Properties(entity_type.key.clone()),
        (None, true) => KeyDescriptor::None,
    };

    TypeEntry {
        descriptor,
        listed: true,
        properties,
        navigations,
        key,
    }
}

fn complex_entry(complex_type: &DocumentComplexType, namespace: &str) -> TypeEntry {
    let mut descriptor = TypeDescriptor::new(
        FullQualifiedName::new(namespace, &complex_type.name),
        CandidateKind::Complex,
        0,
    );
    descriptor.base_type = complex_type
        .base_type
        .as_deref()
        .map(|b| FullQualifiedName::parse_in(b, namespace));
    TypeEntry {
        descriptor,
        listed: true,
        properties: complex_type
            .properties
            .iter()
            .map(|p| property_descriptor(p, namespace, AttributeKind::Basic))
            .collect(),
        navigations: Vec::new(),
        key: KeyDescriptor::None,
    }
}

fn container_descriptor(container: &DocumentContainer, namespace: &str) -> ContainerDescriptor {
    let mut descriptor = ContainerDescriptor::new(container.name.clone(), namespace);
    descriptor.is_default = container.is_default;
    descriptor.extends = container.extends.clone();
    descriptor.expose_all_entity_types = container.expose_all_entity_types;
    descriptor.entity_sets = container
        .entity_sets
        .iter()
        .map(|s| EntitySetDescriptor {
            name: s.name.clone(),
            entity_type: FullQualifiedName::parse_in(&s.entity_type, namespace),
        })
        .collect();
    descriptor.function_imports = container
        .function_imports
        .iter()
        .map(|f| {
            let mut function_import = FunctionImportDescriptor::new(f.name.clone());
            function_import.return_type = f
                .return_type
                .as_deref()
                .map(|t| RawType::Named(FullQualifiedName::parse_in(t, namespace)));
            function_import.return_multiplicity = f.return_multiplicity;
            function_import.entity_set = f.entity_set.clone();
            function_import.http_method = f.http_method;
            function_import.parameters = f
                .parameters
                .iter()
                .map(|p| ParameterDescriptor {
                    name: p.name.clone(),
                    raw_type: RawType::Named(FullQualifiedName::parse_in(&p.type_name, namespace)),
                    facets: p.facets.clone(),
                })
                .collect();
            function_import
        })
        .collect();
    descriptor
}

/// Source backed by a schema document
#[derive(Debug, Clone)]
pub struct ExternalSchemaSource {
    name: String,
    namespace: String,
    table: CandidateTable,
    containers: Vec<ContainerDescriptor>,
}

impl ExternalSchemaSource {
    pub fn new(document: SchemaDocument) -> Self {
        let namespace = document
            .schemas
            .first()
            .map(|s| s.namespace.clone())
            .unwrap_or_else(|| "Default".to_string());
        let mut table = CandidateTable::default();
        let mut containers = Vec::new();
        for schema in &document.schemas {
            for entity_type in &schema.entity_types {
                table.push(entity_entry(entity_type, &schema.namespace));
            }
            for complex_type in &schema.complex_types {
                table.push(complex_entry(complex_type, &schema.namespace));
            }
            containers.extend(
                schema
                    .entity_containers
                    .iter()
                    .map(|c| container_descriptor(c, &schema.namespace)),
            );
        }
        Self {
            name: format!("document:{}", namespace),
            namespace,
            table,
            containers,
        }
    }

    pub fn from_json_str(json_content: &str) -> Result<Self> {
        let document: SchemaDocument =
            serde_json::from_str(json_content).context("Failed to parse schema document JSON")?;
        Ok(Self::new(document))
    }

    pub fn from_yaml_str(yaml_content: &str) -> Result<Self> {
        let document: SchemaDocument =
            serde_yaml::from_str(yaml_content).context("Failed to parse schema document YAML")?;
        Ok(Self::new(document))
    }

    /// Load a `.json`, `.yaml` or `.yml` schema document
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read schema document {}", path.display()))?;
        let source = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&content),
            _ => Self::from_yaml_str(&content),
        }
        .with_context(|| format!("Invalid schema document {}", path.display()))?;
        Ok(Self {
            name: format!("document:{}", path.display()),
            ..source
        })
    }
}

impl MetadataSource for ExternalSchemaSource {
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

    fn containers(&self) -> Vec<ContainerDescriptor> {
        self.containers.clone()
    }
}
