//! Error types for model construction
//!
//! `Model` and `UnknownSimpleType` describe a single malformed source element
//! and are recoverable at the driver's discretion. Every other variant is
//! fatal to the build session: no partial schema graph is published.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::FullQualifiedName;
use crate::registry::ElementKind;

/// Errors raised while building the schema graph
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BuildError {
    /// Malformed single-element source data
    #[error("Model error in '{element}': {reason}")]
    Model { element: String, reason: String },

    /// Name in the `Edm` namespace that is not one of the fixed simple types
    #[error("Unknown simple type: {0}")]
    UnknownSimpleType(String),

    /// Type reference that names no simple, complex or entity type
    #[error("Unresolvable type: {0}")]
    UnresolvableType(FullQualifiedName),

    /// Container `extends` reference that names no known container
    #[error("Container '{container}' extends unknown container '{extends}'")]
    UnresolvableContainer { container: String, extends: String },

    /// Association end whose entity type is exposed by no entity set
    #[error("No entity set for type '{entity_type}' in container '{container}'")]
    NoEntitySetForType {
        container: String,
        entity_type: FullQualifiedName,
    },

    /// Two fragments of the same association disagree on roles or end types
    #[error("Conflicting definition of association '{association}': {reason}")]
    ConflictingAssociationDefinition {
        association: FullQualifiedName,
        reason: String,
    },

    /// Complex type that transitively contains itself
    #[error("Complex type '{complex_type}' contains itself via {}", format_path(.path))]
    CyclicComplexType {
        complex_type: FullQualifiedName,
        path: Vec<FullQualifiedName>,
    },

    /// Re-entrant construction of a view, or an unbounded inheritance chain
    #[error("Cyclic build of {kind:?} '{element}'")]
    CyclicBuildError { kind: ElementKind, element: String },

    /// Complex type and entity type sharing one qualified name
    #[error("Type name '{0}' is declared as both a complex type and an entity type")]
    TypeNameCollision(FullQualifiedName),

    /// Two different instances registered under one qualified name
    #[error("Duplicate registration of {kind:?} '{name}'")]
    DuplicateRegistration {
        kind: ElementKind,
        name: FullQualifiedName,
    },

    /// Every recoverable error found during one candidate walk
    #[error("{} model errors: {}", .0.len(), format_errors(.0))]
    Aggregate(Vec<BuildError>),
}

impl BuildError {
    pub fn model(element: impl ToString, reason: impl Into<String>) -> Self {
        BuildError::Model {
            element: element.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether the driver may skip the offending element and continue
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            BuildError::Model { .. } | BuildError::UnknownSimpleType(_)
        )
    }
}

fn format_path(path: &[FullQualifiedName]) -> String {
    path.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" -> ")
}

fn format_errors(errors: &[BuildError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Summary of a completed build session
#[derive(Debug, Clone)]
pub struct BuildReport {
    pub built_at: DateTime<Utc>,
    pub source: String,
    pub entity_types: usize,
    pub complex_types: usize,
    pub associations: usize,
    pub entity_containers: usize,
    /// Recoverable errors for types skipped under `skip_invalid_types`
    pub skipped: Vec<BuildError>,
}

impl BuildReport {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            built_at: Utc::now(),
            source: source.into(),
            entity_types: 0,
            complex_types: 0,
            associations: 0,
            entity_containers: 0,
            skipped: Vec::new(),
        }
    }
}
