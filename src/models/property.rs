//! Property model: simple or complex typed members with facets

use serde::{Deserialize, Serialize};

use super::name::FullQualifiedName;
use super::simple_type::EdmSimpleType;

/// Declared type of a property
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropertyType {
    /// One of the fixed EDM simple types
    Simple(EdmSimpleType),
    /// Reference to a complex type by qualified name
    Complex(FullQualifiedName),
}

impl PropertyType {
    pub fn is_simple(&self) -> bool {
        matches!(self, PropertyType::Simple(_))
    }

    pub fn as_complex(&self) -> Option<&FullQualifiedName> {
        match self {
            PropertyType::Complex(fqn) => Some(fqn),
            PropertyType::Simple(_) => None,
        }
    }
}

/// Property facets
///
/// Unset facets are `None` and take the protocol defaults downstream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Facets {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nullable: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub precision: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fixed_length: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unicode: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
}

impl Facets {
    pub fn nullable(nullable: bool) -> Self {
        Self {
            nullable: Some(nullable),
            ..Self::default()
        }
    }

    pub fn with_max_length(mut self, max_length: u32) -> Self {
        self.max_length = Some(max_length);
        self
    }

    pub fn with_precision(mut self, precision: u32, scale: Option<u32>) -> Self {
        self.precision = Some(precision);
        self.scale = scale;
        self
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable.unwrap_or(true)
    }

    /// Check the facets against the simple type they decorate
    pub fn validate_for(&self, simple_type: EdmSimpleType) -> Result<(), String> {
        if (self.max_length.is_some() || self.fixed_length.is_some() || self.unicode.is_some())
            && !simple_type.supports_length()
        {
            return Err(format!("length facets are not allowed on {}", simple_type));
        }
        if self.max_length == Some(0) {
            return Err("maxLength must be greater than zero".to_string());
        }
        if self.precision.is_some() && !simple_type.supports_precision() {
            return Err(format!("precision is not allowed on {}", simple_type));
        }
        if self.scale.is_some() && !simple_type.supports_scale() {
            return Err(format!("scale is not allowed on {}", simple_type));
        }
        if let (Some(precision), Some(scale)) = (self.precision, self.scale)
            && scale > precision
        {
            return Err(format!(
                "scale {} exceeds precision {}",
                scale, precision
            ));
        }
        Ok(())
    }
}

/// Where a property's value lives in the backing store
///
/// Consumed by statement builders; the EDM itself does not depend on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyMapping {
    /// Column name in the backing table
    pub column_name: String,
    /// Attribute path in the source model (`id.buildingNo` for embedded members)
    pub source_path: String,
}

/// A named, typed member of an entity or complex type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Property {
    pub name: String,
    pub property_type: PropertyType,
    #[serde(default)]
    pub facets: Facets,
    #[serde(default)]
    pub concurrency_token: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mapping: Option<PropertyMapping>,
}

impl Property {
    pub fn simple(name: impl Into<String>, simple_type: EdmSimpleType) -> Self {
        Self {
            name: name.into(),
            property_type: PropertyType::Simple(simple_type),
            facets: Facets::default(),
            concurrency_token: false,
            mapping: None,
        }
    }

    pub fn complex(name: impl Into<String>, complex_type: FullQualifiedName) -> Self {
        Self {
            name: name.into(),
            property_type: PropertyType::Complex(complex_type),
            facets: Facets::default(),
            concurrency_token: false,
            mapping: None,
        }
    }

    pub fn with_facets(mut self, facets: Facets) -> Self {
        self.facets = facets;
        self
    }

    pub fn with_concurrency_token(mut self, concurrency_token: bool) -> Self {
        self.concurrency_token = concurrency_token;
        self
    }

    pub fn with_mapping(mut self, mapping: PropertyMapping) -> Self {
        self.mapping = Some(mapping);
        self
    }

    pub fn simple_type(&self) -> Option<EdmSimpleType> {
        match self.property_type {
            PropertyType::Simple(simple) => Some(simple),
            PropertyType::Complex(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nullable_defaults_to_true() {
        assert!(Facets::default().is_nullable());
        assert!(!Facets::nullable(false).is_nullable());
    }

    #[test]
    fn test_facet_validation() {
        let string_facets = Facets::default().with_max_length(100);
        assert!(string_facets.validate_for(EdmSimpleType::String).is_ok());
        assert!(string_facets.validate_for(EdmSimpleType::Int32).is_err());

        let decimal = Facets::default().with_precision(10, Some(2));
        assert!(decimal.validate_for(EdmSimpleType::Decimal).is_ok());
        assert!(decimal.validate_for(EdmSimpleType::DateTime).is_err());

        let inverted = Facets::default().with_precision(2, Some(4));
        assert!(inverted.validate_for(EdmSimpleType::Decimal).is_err());

        let zero = Facets::default().with_max_length(0);
        assert!(zero.validate_for(EdmSimpleType::String).is_err());
    }
}
