//! Type resolution
//!
//! A qualified type name resolves, in this order, to an EDM simple type (the
//! `Edm` namespace), a complex type, or an entity type. A name that is both a
//! complex and an entity type is reported rather than silently favouring
//! either kind.

use std::sync::Arc;

use crate::error::BuildError;
use crate::models::{ComplexType, EdmSimpleType, EntityType, FullQualifiedName, TypeReference};
use crate::registry::ElementKind;
use crate::source::RawType;
use crate::view::BuildContext;

/// Result of resolving a type reference
#[derive(Debug, Clone)]
pub enum ResolvedType {
    Simple(EdmSimpleType),
    Complex(Arc<ComplexType>),
    Entity(Arc<EntityType>),
}

impl ResolvedType {
    pub fn type_reference(&self) -> TypeReference {
        match self {
            ResolvedType::Simple(simple) => TypeReference::Simple(*simple),
            ResolvedType::Complex(complex) => TypeReference::Complex(complex.name.clone()),
            ResolvedType::Entity(entity) => TypeReference::Entity(entity.name.clone()),
        }
    }
}

/// Resolve a simple type by its qualified `Edm.*` name
pub fn resolve_simple(name: &FullQualifiedName) -> Result<EdmSimpleType, BuildError> {
    EdmSimpleType::from_name(name.name())
        .ok_or_else(|| BuildError::UnknownSimpleType(name.to_string()))
}

/// Which non-simple kind `name` denotes, if any
fn classify(ctx: &BuildContext<'_>, name: &FullQualifiedName) -> Result<Option<ElementKind>, BuildError> {
    let is_complex = ctx.is_known(ElementKind::ComplexType, name);
    let is_entity = ctx.is_known(ElementKind::EntityType, name);
    match (is_complex, is_entity) {
        (true, true) => Err(BuildError::TypeNameCollision(name.clone())),
        (true, false) => Ok(Some(ElementKind::ComplexType)),
        (false, true) => Ok(Some(ElementKind::EntityType)),
        (false, false) => Ok(None),
    }
}

/// Resolve `name`, building the complex or entity type on a registry miss
pub fn resolve_type(ctx: &mut BuildContext<'_>, name: &FullQualifiedName) -> Result<ResolvedType, BuildError> {
    if name.is_edm() {
        return resolve_simple(name).map(ResolvedType::Simple);
    }
    match classify(ctx, name)? {
        Some(ElementKind::ComplexType) => ctx.build_complex_type(name).map(ResolvedType::Complex),
        Some(ElementKind::EntityType) => ctx.build_entity_type(name).map(ResolvedType::Entity),
        _ => Err(BuildError::UnresolvableType(name.clone())),
    }
}

/// Resolve a raw source type
///
/// Host-language names map onto simple types; an unmapped one is a `Model`
/// error against `element`.
pub fn resolve_raw(
    ctx: &mut BuildContext<'_>,
    raw: &RawType,
    element: &str,
) -> Result<ResolvedType, BuildError> {
    match raw {
        RawType::Simple(simple) => Ok(ResolvedType::Simple(*simple)),
        RawType::Native(native) => EdmSimpleType::from_native(native)
            .map(ResolvedType::Simple)
            .ok_or_else(|| {
                BuildError::model(element, format!("type '{}' has no EDM simple type mapping", native))
            }),
        RawType::Named(name) => resolve_type(ctx, name),
    }
}

/// Resolve the type of a property member
///
/// Entity types are rejected before they are built, so two entity types
/// naming each other as property types do not recurse.
pub fn resolve_member(
    ctx: &mut BuildContext<'_>,
    raw: &RawType,
    element: &str,
) -> Result<ResolvedType, BuildError> {
    if let RawType::Named(name) = raw
        && !name.is_edm()
        && classify(ctx, name)? == Some(ElementKind::EntityType)
    {
        return Err(BuildError::model(
            element,
            format!("property refers to entity type {}; declare it as a navigation", name),
        ));
    }
    resolve_raw(ctx, raw, element)
}
